// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Human-readable, one-line-per-record console output.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Local;
use colored::Colorize;
use serde::{Deserialize, Serialize};

use super::{Output, OutputError};
use crate::schema::{metric, LogLevel, LogRecord};

/// Which standard stream the console output writes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleStream {
    #[default]
    Stdout,
    Stderr,
}

/// Prints each record as a single line:
///
/// ```text
/// 14:02:11.348 INFO    [00f067aa] tool.output navigate (120.0ms, tokens=12/34, $0.0021)
/// ```
///
/// Spans are not printed; their identity already appears on every record.
pub struct ConsoleOutput {
    writer: Mutex<Box<dyn Write + Send>>,
    color: bool,
}

impl ConsoleOutput {
    pub fn stdout(color: bool) -> Self {
        Self::with_writer(Box::new(io::stdout()), color)
    }

    pub fn stderr(color: bool) -> Self {
        Self::with_writer(Box::new(io::stderr()), color)
    }

    pub fn for_stream(stream: ConsoleStream, color: bool) -> Self {
        match stream {
            ConsoleStream::Stdout => Self::stdout(color),
            ConsoleStream::Stderr => Self::stderr(color),
        }
    }

    pub fn with_writer(writer: Box<dyn Write + Send>, color: bool) -> Self {
        Self {
            writer: Mutex::new(writer),
            color,
        }
    }

    /// Everything after the timestamp.
    pub(crate) fn render(&self, record: &LogRecord) -> String {
        let level = format!("{:<7}", record.level.as_str());
        let level = if self.color {
            match record.level {
                LogLevel::Debug => level.dimmed().to_string(),
                LogLevel::Info => level.green().to_string(),
                LogLevel::Warning => level.yellow().to_string(),
                LogLevel::Error => level.red().bold().to_string(),
            }
        } else {
            level
        };

        let span = record
            .span_id
            .map(|id| id.short())
            .unwrap_or_else(|| "--------".to_string());

        let mut line = format!(
            "{} [{}] {} {}",
            level, span, record.event, record.component_name
        );

        let summary = metric_summary(record);
        if !summary.is_empty() {
            let _ = write!(line, " ({})", summary.join(", "));
        }

        if let Some((error_type, message)) = error_summary(record) {
            let error = format!("! {error_type}: {message}");
            if self.color {
                let _ = write!(line, " {}", error.red());
            } else {
                let _ = write!(line, " {error}");
            }
        }

        line
    }
}

fn metric_summary(record: &LogRecord) -> Vec<String> {
    let mut parts = Vec::new();
    if let Some(duration) = record.duration_ms() {
        parts.push(format!("{duration:.1}ms"));
    }

    let input = record.metrics.get(metric::INPUT_TOKENS);
    let output = record.metrics.get(metric::OUTPUT_TOKENS);
    if input.is_some() || output.is_some() {
        parts.push(format!(
            "tokens={}/{}",
            input.copied().unwrap_or(0.0),
            output.copied().unwrap_or(0.0)
        ));
    }

    if let Some(cost) = record.metrics.get(metric::COST_USD) {
        parts.push(format!("${cost:.4}"));
    }
    parts
}

fn error_summary(record: &LogRecord) -> Option<(&str, &str)> {
    let error = record.data.get("error")?;
    let error_type = error.get("error_type")?.as_str()?;
    let message = error
        .get("error_message")
        .and_then(|m| m.as_str())
        .unwrap_or("");
    Some((error_type, message))
}

impl Output for ConsoleOutput {
    fn name(&self) -> &str {
        "console"
    }

    fn write_log(&self, record: &Arc<LogRecord>) -> Result<(), OutputError> {
        let time = record.timestamp.with_timezone(&Local).format("%H:%M:%S%.3f");
        let line = format!("{} {}\n", time, self.render(record));

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(line.as_bytes())?;
        Ok(())
    }

    fn flush(&self) -> Result<(), OutputError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for ConsoleOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleOutput")
            .field("color", &self.color)
            .finish()
    }
}
