// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Batching exporter to an OpenTelemetry collector over OTLP/HTTP JSON.
//!
//! Writers never block on the network: [`OtlpExporter::write_log`] and
//! [`OtlpExporter::write_span`] only `try_send` into a bounded queue. A
//! dedicated thread runs a current-thread tokio runtime whose worker drains
//! the queue, batches by size or interval, and hands each batch to a
//! [`CollectorTransport`].
//!
//! ```text
//! callers --try_send--> [bounded queue] --> worker task --POST--> collector
//!                         (full: drop)       (batch/interval)
//! ```

mod payload;
mod transport;

pub use payload::{logs_payload, traces_payload};
pub use transport::{CollectorTransport, HttpTransport, LOGS_PATH, TRACES_PATH};

use std::net::TcpStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::runtime::{Builder, Handle};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, MissedTickBehavior};

#[cfg(feature = "telemetry")]
use tracing::{debug, warn};

use super::{Output, OutputError};
use crate::error::{ConfigError, ExportError};
use crate::schema::LogRecord;
use crate::tracer::SpanData;

/// Collector connection and batching settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OtlpConfig {
    /// `host:port`, or a full URL with scheme.
    pub endpoint: String,
    /// Use plaintext `http` when the endpoint has no scheme.
    pub insecure: bool,
    /// Reported as the `service.name` resource attribute.
    pub service_name: String,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub timeout: Duration,
    pub queue_capacity: usize,
    /// Attempts per batch after the first, for retryable failures.
    pub max_retries: u32,
}

impl Default for OtlpConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost:4318".to_string(),
            insecure: true,
            service_name: "agentrace".to_string(),
            batch_size: 256,
            flush_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(10),
            queue_capacity: 2048,
            max_retries: 2,
        }
    }
}

impl OtlpConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Endpoint with a scheme and without a trailing slash.
    pub fn base_url(&self) -> String {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        if endpoint.contains("://") {
            endpoint.to_string()
        } else if self.insecure {
            format!("http://{endpoint}")
        } else {
            format!("https://{endpoint}")
        }
    }

    pub fn traces_url(&self) -> String {
        format!("{}{}", self.base_url(), TRACES_PATH)
    }

    pub fn logs_url(&self) -> String {
        format!("{}{}", self.base_url(), LOGS_PATH)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::invalid("collector.endpoint", "must not be empty"));
        }
        let url = reqwest::Url::parse(&self.base_url())
            .map_err(|e| ConfigError::invalid("collector.endpoint", e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "collector.endpoint",
                format!("unsupported scheme {}", url.scheme()),
            ));
        }
        if url.host_str().is_none() {
            return Err(ConfigError::invalid("collector.endpoint", "missing host"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("collector.batchSize", "must be greater than zero"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::invalid(
                "collector.queueCapacity",
                "must be greater than zero",
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::invalid(
                "collector.flushIntervalMs",
                "must be greater than zero",
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::invalid("collector.timeoutMs", "must be greater than zero"));
        }
        Ok(())
    }

    /// Open a TCP connection to the collector to check it is reachable.
    pub fn probe(&self) -> Result<(), ConfigError> {
        let unreachable = |message: String| ConfigError::CollectorUnreachable {
            endpoint: self.base_url(),
            message,
        };

        let url = reqwest::Url::parse(&self.base_url()).map_err(|e| unreachable(e.to_string()))?;
        let addrs = url
            .socket_addrs(|| None)
            .map_err(|e| unreachable(e.to_string()))?;

        let mut last_error = "no addresses resolved".to_string();
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(_) => return Ok(()),
                Err(e) => last_error = e.to_string(),
            }
        }
        Err(unreachable(last_error))
    }
}

/// Counters kept by one exporter.
#[derive(Debug, Default)]
pub struct ExporterStats {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    exported_spans: AtomicU64,
    exported_logs: AtomicU64,
    failed_batches: AtomicU64,
}

/// Point-in-time copy of [`ExporterStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExporterStatsSnapshot {
    pub enqueued: u64,
    pub dropped: u64,
    pub exported_spans: u64,
    pub exported_logs: u64,
    pub failed_batches: u64,
}

impl ExporterStats {
    pub fn snapshot(&self) -> ExporterStatsSnapshot {
        ExporterStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            exported_spans: self.exported_spans.load(Ordering::Relaxed),
            exported_logs: self.exported_logs.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
        }
    }
}

enum Command {
    Log(Arc<LogRecord>),
    Span(Arc<SpanData>),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Non-blocking, batching OTLP exporter.
pub struct OtlpExporter {
    config: OtlpConfig,
    sender: Mutex<Option<mpsc::Sender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<ExporterStats>,
}

impl OtlpExporter {
    /// Validate `config` and start an exporter posting over HTTP.
    pub fn new(config: OtlpConfig) -> Result<Self, ConfigError> {
        let transport = HttpTransport::new(config.base_url(), config.timeout);
        Self::with_transport(config, transport)
    }

    /// Start an exporter with a custom transport.
    pub fn with_transport(
        config: OtlpConfig,
        transport: impl CollectorTransport,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let init_error = |message: String| ConfigError::OutputInit {
            name: "otlp".to_string(),
            message,
        };
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| init_error(e.to_string()))?;

        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let stats = Arc::new(ExporterStats::default());
        let worker = Worker {
            transport: Box::new(transport),
            config: config.clone(),
            stats: Arc::clone(&stats),
            logs: Vec::with_capacity(config.batch_size),
            spans: Vec::with_capacity(config.batch_size),
        };

        let handle = thread::Builder::new()
            .name("agentrace-otlp".to_string())
            .spawn(move || runtime.block_on(worker.run(receiver)))
            .map_err(|e| init_error(e.to_string()))?;

        Ok(Self {
            config,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(handle)),
            stats,
        })
    }

    pub fn config(&self) -> &OtlpConfig {
        &self.config
    }

    pub fn stats(&self) -> ExporterStatsSnapshot {
        self.stats.snapshot()
    }

    fn enqueue(&self, command: Command) -> Result<(), OutputError> {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = guard.as_ref().ok_or(OutputError::Closed)?;
        match sender.try_send(command) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Err(OutputError::QueueFull(1))
            }
            Err(TrySendError::Closed(_)) => Err(ExportError::WorkerGone.into()),
        }
    }

    fn sender(&self) -> Option<mpsc::Sender<Command>> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Send a control command and wait for the worker to acknowledge it.
///
/// Tokio refuses blocking waits on a runtime thread, so when called from
/// inside a runtime the exchange happens on a scoped helper thread.
fn round_trip(
    sender: mpsc::Sender<Command>,
    command: impl FnOnce(oneshot::Sender<()>) -> Command,
) -> Result<(), OutputError> {
    let (ack, done) = oneshot::channel();
    let command = command(ack);
    let exchange = move || -> Result<(), OutputError> {
        sender
            .blocking_send(command)
            .map_err(|_| ExportError::WorkerGone)?;
        done.blocking_recv().map_err(|_| ExportError::WorkerGone)?;
        Ok(())
    };

    if Handle::try_current().is_ok() {
        thread::scope(|scope| scope.spawn(exchange).join())
            .unwrap_or_else(|_| Err(ExportError::WorkerGone.into()))
    } else {
        exchange()
    }
}

impl Output for OtlpExporter {
    fn name(&self) -> &str {
        "otlp"
    }

    fn write_log(&self, record: &Arc<LogRecord>) -> Result<(), OutputError> {
        self.enqueue(Command::Log(Arc::clone(record)))
    }

    fn write_span(&self, span: &Arc<SpanData>) -> Result<(), OutputError> {
        self.enqueue(Command::Span(Arc::clone(span)))
    }

    /// Blocks until everything queued so far has been handed to the
    /// transport.
    fn flush(&self) -> Result<(), OutputError> {
        match self.sender() {
            Some(sender) => round_trip(sender, Command::Flush),
            None => Ok(()),
        }
    }

    /// Drains the queue and stops the worker. Safe to call more than once.
    fn close(&self) -> Result<(), OutputError> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(sender) = sender else {
            return Ok(());
        };

        let result = round_trip(sender, Command::Shutdown);

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                return Err(ExportError::WorkerGone.into());
            }
        }
        result
    }
}

impl std::fmt::Debug for OtlpExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtlpExporter")
            .field("endpoint", &self.config.base_url())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

/// State owned by the worker task.
struct Worker {
    transport: Box<dyn CollectorTransport>,
    config: OtlpConfig,
    stats: Arc<ExporterStats>,
    logs: Vec<Arc<LogRecord>>,
    spans: Vec<Arc<SpanData>>,
}

impl Worker {
    async fn run(mut self, mut receiver: mpsc::Receiver<Command>) {
        let mut ticker = time::interval(self.config.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                command = receiver.recv() => match command {
                    Some(Command::Log(record)) => {
                        self.logs.push(record);
                        if self.logs.len() >= self.config.batch_size {
                            self.export_logs().await;
                        }
                    }
                    Some(Command::Span(span)) => {
                        self.spans.push(span);
                        if self.spans.len() >= self.config.batch_size {
                            self.export_spans().await;
                        }
                    }
                    Some(Command::Flush(ack)) => {
                        self.export_all().await;
                        ticker.reset();
                        let _ = ack.send(());
                    }
                    Some(Command::Shutdown(ack)) => {
                        self.export_all().await;
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        self.export_all().await;
                        break;
                    }
                },
                _ = ticker.tick() => self.export_all().await,
            }
        }

        #[cfg(feature = "telemetry")]
        debug!(stats = ?self.stats.snapshot(), "OTLP exporter stopped");
    }

    async fn export_all(&mut self) {
        self.export_spans().await;
        self.export_logs().await;
    }

    async fn export_spans(&mut self) {
        if self.spans.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.spans);
        let body = traces_payload(&self.config.service_name, &batch);
        if self.post_with_retry(TRACES_PATH, &body).await {
            self.stats
                .exported_spans
                .fetch_add(batch.len() as u64, Ordering::Relaxed);
        }
    }

    async fn export_logs(&mut self) {
        if self.logs.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.logs);
        let body = logs_payload(&self.config.service_name, &batch);
        if self.post_with_retry(LOGS_PATH, &body).await {
            self.stats
                .exported_logs
                .fetch_add(batch.len() as u64, Ordering::Relaxed);
        }
    }

    /// Returns whether the batch was accepted. Failed batches are dropped.
    async fn post_with_retry(&mut self, path: &str, body: &serde_json::Value) -> bool {
        let mut attempt = 0;
        loop {
            match self.transport.post(path, body).await {
                Ok(()) => {
                    #[cfg(feature = "telemetry")]
                    debug!(path, attempt, "Exported batch");
                    return true;
                }
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    time::sleep(Duration::from_millis(100 * u64::from(attempt))).await;
                }
                Err(err) => {
                    self.stats.failed_batches.fetch_add(1, Ordering::Relaxed);
                    #[cfg(feature = "telemetry")]
                    warn!(path, error = %err, "Dropping batch after export failure");
                    #[cfg(not(feature = "telemetry"))]
                    let _ = err;
                    return false;
                }
            }
        }
    }
}
