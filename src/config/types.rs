// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! [`FileConfig`] is what a single source (file, environment) provides: every
//! field optional. [`ObservabilityConfig`] is the resolved result with
//! defaults filled in.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::output::otlp::OtlpConfig;
use crate::output::ConsoleStream;
use crate::serializer::DEFAULT_MAX_DEPTH;

/// Default service name reported to collectors.
pub const DEFAULT_SERVICE_NAME: &str = "agentrace";

/// Configuration from one source.
/// Can be defined in .agentrace.json, .agentrace/config.json or agentrace.yaml.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    /// Service name (the `service.name` resource attribute)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    /// Fixed session id; a fresh UUID is used when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Nesting budget for captured arguments and results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,

    /// Include a backtrace in error records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_backtrace: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub console: Option<ConsoleConfigPartial>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collector: Option<CollectorConfigPartial>,

    /// Append records and spans to this JSON-lines file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsonl_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleConfigPartial {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<ConsoleStream>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorConfigPartial {
    /// `host:port` or URL of an OTLP/HTTP collector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Plaintext http instead of https
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flush_interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_capacity: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Check the collector is reachable at startup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_on_start: Option<bool>,
}

/// Resolved console settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub color: bool,
    pub stream: ConsoleStream,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            color: true,
            stream: ConsoleStream::Stdout,
        }
    }
}

/// Resolved collector settings. Present only when an endpoint is configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorConfig {
    pub endpoint: String,
    pub insecure: bool,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub timeout_ms: u64,
    pub queue_capacity: usize,
    pub max_retries: u32,
    pub probe_on_start: bool,
}

impl CollectorConfig {
    /// Defaults for everything but the endpoint.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let defaults = OtlpConfig::default();
        Self {
            endpoint: endpoint.into(),
            insecure: defaults.insecure,
            batch_size: defaults.batch_size,
            flush_interval_ms: defaults.flush_interval.as_millis() as u64,
            timeout_ms: defaults.timeout.as_millis() as u64,
            queue_capacity: defaults.queue_capacity,
            max_retries: defaults.max_retries,
            probe_on_start: false,
        }
    }

    /// Exporter settings for `service_name`.
    pub fn to_otlp(&self, service_name: &str) -> OtlpConfig {
        OtlpConfig {
            endpoint: self.endpoint.clone(),
            insecure: self.insecure,
            service_name: service_name.to_string(),
            batch_size: self.batch_size,
            flush_interval: Duration::from_millis(self.flush_interval_ms),
            timeout: Duration::from_millis(self.timeout_ms),
            queue_capacity: self.queue_capacity,
            max_retries: self.max_retries,
        }
    }
}

/// Fully resolved configuration, immutable once a runtime is built from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityConfig {
    pub service_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub max_depth: usize,
    pub capture_backtrace: bool,
    pub console: ConsoleConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collector: Option<CollectorConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsonl_path: Option<PathBuf>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            session_id: None,
            max_depth: DEFAULT_MAX_DEPTH,
            capture_backtrace: true,
            console: ConsoleConfig::default(),
            collector: None,
            jsonl_path: None,
        }
    }
}

impl ObservabilityConfig {
    /// Check the resolved values. Called once at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::invalid("serviceName", "must not be empty"));
        }
        if let Some(session_id) = &self.session_id {
            if session_id.trim().is_empty() {
                return Err(ConfigError::invalid("sessionId", "must not be empty"));
            }
        }
        if self.max_depth == 0 {
            return Err(ConfigError::invalid("maxDepth", "must be greater than zero"));
        }
        if let Some(collector) = &self.collector {
            collector.to_otlp(&self.service_name).validate()?;
        }
        Ok(())
    }

    /// Exporter settings, when a collector is configured.
    pub fn otlp(&self) -> Option<OtlpConfig> {
        self.collector
            .as_ref()
            .map(|c| c.to_otlp(&self.service_name))
    }
}
