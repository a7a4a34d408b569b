// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Append-only JSON-lines file output.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use super::{Output, OutputError};
use crate::error::ConfigError;
use crate::schema::LogRecord;
use crate::tracer::SpanData;

/// Span lines are wrapped so they can be told apart from records.
#[derive(Serialize)]
struct SpanLine<'a> {
    span: &'a SpanData,
}

/// Writes one JSON object per line: records as-is, spans as `{"span": ..}`.
///
/// Writes are buffered; [`flush`](Output::flush) pushes them to disk.
#[derive(Debug)]
pub struct JsonLinesOutput {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl JsonLinesOutput {
    /// Open `path` for appending, creating it and its parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let init_error = |err: std::io::Error| ConfigError::OutputInit {
            name: format!("jsonl:{}", path.display()),
            message: err.to_string(),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(init_error)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(init_error)?;

        Ok(Self {
            path,
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, value: &impl Serialize) -> Result<(), OutputError> {
        // Encode before locking so the lock covers only the write.
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');

        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let writer = guard.as_mut().ok_or(OutputError::Closed)?;
        writer.write_all(&line)?;
        Ok(())
    }
}

impl Output for JsonLinesOutput {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn write_log(&self, record: &Arc<LogRecord>) -> Result<(), OutputError> {
        self.write_line(record.as_ref())
    }

    fn write_span(&self, span: &Arc<SpanData>) -> Result<(), OutputError> {
        self.write_line(&SpanLine { span })
    }

    fn flush(&self) -> Result<(), OutputError> {
        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(writer) = guard.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn close(&self) -> Result<(), OutputError> {
        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.take() {
            Some(mut writer) => Ok(writer.flush()?),
            None => Ok(()),
        }
    }
}
