// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Delivery of OTLP/JSON bodies to a collector.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

#[cfg(feature = "telemetry")]
use tracing::debug;

use crate::error::ExportError;

/// Collector path for span exports.
pub const TRACES_PATH: &str = "/v1/traces";

/// Collector path for log exports.
pub const LOGS_PATH: &str = "/v1/logs";

/// Sends one export request.
///
/// Runs on the exporter's own runtime; a slow post delays later batches but
/// never a caller.
#[async_trait]
pub trait CollectorTransport: Send + 'static {
    /// POST `body` to `path` (one of [`TRACES_PATH`], [`LOGS_PATH`]).
    async fn post(&mut self, path: &str, body: &Value) -> Result<(), ExportError>;
}

/// OTLP/HTTP transport backed by an async `reqwest` client.
///
/// The client is built on first use.
#[derive(Debug)]
pub struct HttpTransport {
    base_url: String,
    timeout: Duration,
    client: Option<reqwest::Client>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            client: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn client(&mut self) -> Result<reqwest::Client, ExportError> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ExportError::Network(e.to_string()))?;
        self.client = Some(client.clone());
        Ok(client)
    }
}

#[async_trait]
impl CollectorTransport for HttpTransport {
    async fn post(&mut self, path: &str, body: &Value) -> Result<(), ExportError> {
        let url = format!("{}{}", self.base_url, path);
        let timeout_ms = self.timeout.as_millis() as u64;

        let response = self
            .client()?
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExportError::Timeout(timeout_ms)
                } else {
                    ExportError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        #[cfg(feature = "telemetry")]
        debug!(url = %url, status = status.as_u16(), "Collector responded");

        if status.is_success() {
            Ok(())
        } else {
            Err(ExportError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}
