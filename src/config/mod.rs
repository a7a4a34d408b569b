// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for agentrace.
//!
//! Handles loading, merging, and validation of configuration from multiple sources:
//! - Global config: ~/.agentrace/config.json
//! - Workspace config: .agentrace.json, .agentrace/config.json, or agentrace.yaml
//! - Local config: .agentrace.local.json (gitignored, for personal overrides)
//! - Environment: `AGENTRACE_*` variables
//! - CLI options: command-line arguments
//!
//! Configuration is merged with precedence
//! (CLI > environment > local > workspace > global > defaults) and validated
//! once, before any output is opened.

mod loader;
mod merger;
mod types;

// Re-export public types
pub use loader::{
    find_workspace_root, get_example_config, get_global_config_dir, get_global_config_path,
    init_config, load_config_file, load_global_config, load_local_config, load_workspace_config,
    save_workspace_config, CONFIG_FILES, GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILE, LOCAL_CONFIG_FILE,
};

pub use merger::{default_config, env_config, env_overrides, merge_config, CliOptions, ENV_PREFIX};

pub use types::{
    CollectorConfig, CollectorConfigPartial, ConsoleConfig, ConsoleConfigPartial, FileConfig,
    ObservabilityConfig, DEFAULT_SERVICE_NAME,
};

use crate::error::ConfigError;
use std::path::Path;

/// Load, merge and validate all configuration sources for a workspace.
///
/// This is the main entry point for configuration loading.
pub fn load_config(
    workspace_root: &Path,
    cli_options: CliOptions,
) -> Result<ObservabilityConfig, ConfigError> {
    let global = load_global_config()?;
    let workspace = load_workspace_config(workspace_root)?;
    let local = load_local_config(workspace_root)?;
    let env = env_config()?;

    let config = merge_config(global, workspace, local, env, cli_options);
    config.validate()?;
    Ok(config)
}
