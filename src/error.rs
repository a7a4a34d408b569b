// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for agentrace.
//!
//! Only configuration errors ever reach a host program, and only at startup.
//! Output and export errors are absorbed at the [`OutputRegistry`] boundary;
//! they exist so backends can report what went wrong to the diagnostics
//! counters and the self-diagnostic log.
//!
//! [`OutputRegistry`]: crate::output::OutputRegistry

use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config format: {0}")]
    InvalidFormat(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Collector unreachable at {endpoint}: {message}")]
    CollectorUnreachable { endpoint: String, message: String },

    #[error("Failed to open output {name}: {message}")]
    OutputInit { name: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl ConfigError {
    /// Create an invalid-value error for a named field.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Errors raised by an output backend while writing, flushing or closing.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Output is closed")]
    Closed,

    #[error("Queue full, dropped {0} item(s)")]
    QueueFull(usize),

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),
}

/// Errors that can occur while shipping a batch to a collector.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Collector rejected batch: HTTP {status}")]
    Rejected { status: u16 },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Exporter worker is gone")]
    WorkerGone,
}

impl ExportError {
    /// Check if the batch could succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Rejected { status } => *status == 429 || *status >= 500,
            Self::WorkerGone => false,
        }
    }
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ConfigError = io_err.into();
        assert!(matches!(err, ConfigError::NotFound(_)));

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err: ConfigError = io_err.into();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    fn test_config_error_from_json() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: ConfigError = result.unwrap_err().into();
        assert!(matches!(err, ConfigError::JsonError(_)));
    }

    #[test]
    fn test_config_error_invalid_display() {
        let err = ConfigError::invalid("collector.batchSize", "must be greater than zero");
        let display = err.to_string();
        assert!(display.contains("collector.batchSize"));
        assert!(display.contains("greater than zero"));
    }

    #[test]
    fn test_export_error_retryable() {
        assert!(ExportError::Network("refused".to_string()).is_retryable());
        assert!(ExportError::Timeout(5000).is_retryable());
        assert!(ExportError::Rejected { status: 503 }.is_retryable());
        assert!(ExportError::Rejected { status: 429 }.is_retryable());
        assert!(!ExportError::Rejected { status: 400 }.is_retryable());
        assert!(!ExportError::WorkerGone.is_retryable());
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("static str")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static str");

        let payload = std::panic::catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 42");

        let payload = std::panic::catch_unwind(|| std::panic::panic_any(7u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_output_error_from_export() {
        let err: OutputError = ExportError::WorkerGone.into();
        assert!(matches!(err, OutputError::Export(ExportError::WorkerGone)));
        assert!(err.to_string().contains("worker"));
    }
}
