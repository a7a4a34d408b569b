// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::output::ConsoleStream;

use super::types::{
    CollectorConfig, CollectorConfigPartial, ConsoleConfigPartial, FileConfig,
    ObservabilityConfig,
};

/// Prefix of every environment variable read by [`env_overrides`].
pub const ENV_PREFIX: &str = "AGENTRACE_";

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub service_name: Option<String>,
    pub session_id: Option<String>,
    pub endpoint: Option<String>,
    pub insecure: Option<bool>,
    pub no_console: bool,
    pub jsonl_path: Option<PathBuf>,
    pub max_depth: Option<usize>,
}

/// Default configuration values.
pub fn default_config() -> ObservabilityConfig {
    ObservabilityConfig::default()
}

/// Read `AGENTRACE_*` overrides through `lookup`.
///
/// Recognised variables: `SERVICE_NAME`, `SESSION_ID`, `MAX_DEPTH`,
/// `CAPTURE_BACKTRACE`, `CONSOLE`, `CONSOLE_COLOR`, `CONSOLE_STREAM`,
/// `ENDPOINT`, `INSECURE`, `BATCH_SIZE`, `FLUSH_INTERVAL_MS`, `TIMEOUT_MS`,
/// `JSONL_PATH`. Returns `None` when none of them are set.
pub fn env_overrides<F>(lookup: F) -> Result<Option<FileConfig>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| {
        lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.trim().is_empty())
    };

    let console = ConsoleConfigPartial {
        enabled: parse_var(&var, "CONSOLE", "console", parse_bool)?,
        color: parse_var(&var, "CONSOLE_COLOR", "console.color", parse_bool)?,
        stream: parse_var(&var, "CONSOLE_STREAM", "console.stream", parse_stream)?,
    };
    let collector = CollectorConfigPartial {
        endpoint: var("ENDPOINT"),
        insecure: parse_var(&var, "INSECURE", "collector.insecure", parse_bool)?,
        batch_size: parse_var(&var, "BATCH_SIZE", "collector.batchSize", parse_num)?,
        flush_interval_ms: parse_var(
            &var,
            "FLUSH_INTERVAL_MS",
            "collector.flushIntervalMs",
            parse_num,
        )?,
        timeout_ms: parse_var(&var, "TIMEOUT_MS", "collector.timeoutMs", parse_num)?,
        ..Default::default()
    };

    let config = FileConfig {
        service_name: var("SERVICE_NAME"),
        session_id: var("SESSION_ID"),
        max_depth: parse_var(&var, "MAX_DEPTH", "maxDepth", parse_num)?,
        capture_backtrace: parse_var(&var, "CAPTURE_BACKTRACE", "captureBacktrace", parse_bool)?,
        console: (console != ConsoleConfigPartial::default()).then_some(console),
        collector: (collector != CollectorConfigPartial::default()).then_some(collector),
        jsonl_path: var("JSONL_PATH").map(PathBuf::from),
    };

    if config == FileConfig::default() {
        Ok(None)
    } else {
        Ok(Some(config))
    }
}

/// Environment overrides from the process environment.
pub fn env_config() -> Result<Option<FileConfig>, ConfigError> {
    env_overrides(|name| std::env::var(name).ok())
}

fn parse_var<V, T, P>(var: &V, name: &str, field: &str, parse: P) -> Result<Option<T>, ConfigError>
where
    V: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Option<T>,
{
    match var(name) {
        None => Ok(None),
        Some(raw) => parse(raw.trim()).map(Some).ok_or_else(|| {
            ConfigError::invalid(field, format!("cannot parse {ENV_PREFIX}{name}={raw:?}"))
        }),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_num<T: std::str::FromStr>(raw: &str) -> Option<T> {
    raw.parse().ok()
}

fn parse_stream(raw: &str) -> Option<ConsoleStream> {
    match raw.to_ascii_lowercase().as_str() {
        "stdout" => Some(ConsoleStream::Stdout),
        "stderr" => Some(ConsoleStream::Stderr),
        _ => None,
    }
}

/// Merge multiple configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Environment (`AGENTRACE_*`)
/// 3. Local config (.agentrace.local.json)
/// 4. Workspace config (.agentrace.json)
/// 5. Global config (~/.agentrace/config.json)
/// 6. Default values
pub fn merge_config(
    global: Option<FileConfig>,
    workspace: Option<FileConfig>,
    local: Option<FileConfig>,
    env: Option<FileConfig>,
    cli: CliOptions,
) -> ObservabilityConfig {
    let mut result = default_config();

    for config in [global, workspace, local, env].into_iter().flatten() {
        apply_file_config(&mut result, &config);
    }

    // Apply CLI options (highest precedence)
    apply_cli_options(&mut result, &cli);

    result
}

fn apply_file_config(result: &mut ObservabilityConfig, config: &FileConfig) {
    if let Some(ref name) = config.service_name {
        result.service_name = name.clone();
    }

    if config.session_id.is_some() {
        result.session_id = config.session_id.clone();
    }

    if let Some(depth) = config.max_depth {
        result.max_depth = depth;
    }

    if let Some(capture) = config.capture_backtrace {
        result.capture_backtrace = capture;
    }

    if let Some(ref console) = config.console {
        apply_console_config(result, console);
    }

    if let Some(ref collector) = config.collector {
        apply_collector_config(result, collector);
    }

    if config.jsonl_path.is_some() {
        result.jsonl_path = config.jsonl_path.clone();
    }
}

fn apply_console_config(result: &mut ObservabilityConfig, console: &ConsoleConfigPartial) {
    if let Some(enabled) = console.enabled {
        result.console.enabled = enabled;
    }
    if let Some(color) = console.color {
        result.console.color = color;
    }
    if let Some(stream) = console.stream {
        result.console.stream = stream;
    }
}

/// Collector settings only take effect once some source names an endpoint.
fn apply_collector_config(result: &mut ObservabilityConfig, partial: &CollectorConfigPartial) {
    if let Some(endpoint) = &partial.endpoint {
        result
            .collector
            .get_or_insert_with(|| CollectorConfig::with_endpoint(endpoint.clone()))
            .endpoint = endpoint.clone();
    }
    let Some(collector) = result.collector.as_mut() else {
        return;
    };

    if let Some(insecure) = partial.insecure {
        collector.insecure = insecure;
    }
    if let Some(size) = partial.batch_size {
        collector.batch_size = size;
    }
    if let Some(interval) = partial.flush_interval_ms {
        collector.flush_interval_ms = interval;
    }
    if let Some(timeout) = partial.timeout_ms {
        collector.timeout_ms = timeout;
    }
    if let Some(capacity) = partial.queue_capacity {
        collector.queue_capacity = capacity;
    }
    if let Some(retries) = partial.max_retries {
        collector.max_retries = retries;
    }
    if let Some(probe) = partial.probe_on_start {
        collector.probe_on_start = probe;
    }
}

fn apply_cli_options(result: &mut ObservabilityConfig, cli: &CliOptions) {
    if let Some(ref name) = cli.service_name {
        result.service_name = name.clone();
    }

    if cli.session_id.is_some() {
        result.session_id = cli.session_id.clone();
    }

    if let Some(depth) = cli.max_depth {
        result.max_depth = depth;
    }

    if cli.no_console {
        result.console.enabled = false;
    }

    if cli.endpoint.is_some() || cli.insecure.is_some() {
        apply_collector_config(
            result,
            &CollectorConfigPartial {
                endpoint: cli.endpoint.clone(),
                insecure: cli.insecure,
                ..Default::default()
            },
        );
    }

    if cli.jsonl_path.is_some() {
        result.jsonl_path = cli.jsonl_path.clone();
    }
}
