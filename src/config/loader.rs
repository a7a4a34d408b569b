// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files.
//!
//! Handles loading configuration from JSON and YAML files in various locations.

use std::path::{Path, PathBuf};

#[cfg(feature = "telemetry")]
use tracing::debug;

use crate::error::ConfigError;

use super::types::{CollectorConfigPartial, ConsoleConfigPartial, FileConfig};

/// Config file names to search for (in order).
pub const CONFIG_FILES: &[&str] = &[
    ".agentrace.json",
    ".agentrace/config.json",
    "agentrace.yaml",
    "agentrace.yml",
];

/// Local config file name (for per-directory overrides).
pub const LOCAL_CONFIG_FILE: &str = ".agentrace.local.json";

/// Global config directory name.
pub const GLOBAL_CONFIG_DIR: &str = ".agentrace";

/// Global config file name.
pub const GLOBAL_CONFIG_FILE: &str = "config.json";

/// Get the global config directory path.
pub fn get_global_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(GLOBAL_CONFIG_DIR))
}

/// Get the global config file path.
pub fn get_global_config_path() -> Option<PathBuf> {
    get_global_config_dir().map(|dir| dir.join(GLOBAL_CONFIG_FILE))
}

/// Load global configuration from ~/.agentrace/config.json.
pub fn load_global_config() -> Result<Option<FileConfig>, ConfigError> {
    let path = match get_global_config_path() {
        Some(p) => p,
        None => return Ok(None),
    };

    if !path.exists() {
        return Ok(None);
    }

    load_config_file(&path).map(Some)
}

/// Load workspace configuration from the workspace root.
///
/// The first of [`CONFIG_FILES`] that exists wins.
pub fn load_workspace_config(workspace_root: &Path) -> Result<Option<FileConfig>, ConfigError> {
    for filename in CONFIG_FILES {
        let path = workspace_root.join(filename);
        if path.exists() {
            return load_config_file(&path).map(Some);
        }
    }
    Ok(None)
}

/// Load local configuration from .agentrace.local.json.
pub fn load_local_config(workspace_root: &Path) -> Result<Option<FileConfig>, ConfigError> {
    let path = workspace_root.join(LOCAL_CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }
    load_config_file(&path).map(Some)
}

/// Load a configuration file (JSON or YAML).
pub fn load_config_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    #[cfg(feature = "telemetry")]
    debug!(path = %path.display(), "Loading config file");

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(ConfigError::from),
        _ => serde_json::from_str(&content).map_err(ConfigError::from),
    }
}

/// Write a config file into the workspace root.
pub fn save_workspace_config(
    workspace_root: &Path,
    config: &FileConfig,
    filename: Option<&str>,
) -> Result<PathBuf, ConfigError> {
    let filename = filename.unwrap_or(CONFIG_FILES[0]);
    let path = workspace_root.join(filename);

    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, content)?;

    Ok(path)
}

/// Initialize a new config file with example or provided configuration.
pub fn init_config(
    workspace_root: &Path,
    config: Option<FileConfig>,
) -> Result<PathBuf, ConfigError> {
    let config = config.unwrap_or_else(get_example_config);
    save_workspace_config(workspace_root, &config, None)
}

/// Find the workspace root by searching for config files.
///
/// Walks up the directory tree from `start` until it finds a directory
/// containing a config file or reaches the filesystem root.
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        for filename in CONFIG_FILES {
            if current.join(filename).exists() {
                return Some(current);
            }
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return None,
        }
    }
}

/// An example configuration exporting to a local collector.
pub fn get_example_config() -> FileConfig {
    FileConfig {
        service_name: Some("my-agent-service".to_string()),
        console: Some(ConsoleConfigPartial {
            enabled: Some(true),
            color: Some(true),
            stream: None,
        }),
        collector: Some(CollectorConfigPartial {
            endpoint: Some("localhost:4318".to_string()),
            insecure: Some(true),
            batch_size: Some(256),
            flush_interval_ms: Some(2000),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_files_order() {
        assert_eq!(CONFIG_FILES[0], ".agentrace.json");
        assert!(CONFIG_FILES.contains(&"agentrace.yaml"));
    }

    #[test]
    fn test_global_config_dir() {
        if let Some(dir) = get_global_config_dir() {
            assert!(dir.ends_with(".agentrace"));
        }
    }

    #[test]
    fn test_load_workspace_config_not_found() {
        let temp = TempDir::new().unwrap();
        let result = load_workspace_config(temp.path());
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_load_workspace_config_json() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".agentrace.json"),
            r#"{"serviceName": "crawler", "maxDepth": 6}"#,
        )
        .unwrap();

        let config = load_workspace_config(temp.path()).unwrap().unwrap();
        assert_eq!(config.service_name, Some("crawler".to_string()));
        assert_eq!(config.max_depth, Some(6));
    }

    #[test]
    fn test_load_workspace_config_nested_dir() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(".agentrace")).unwrap();
        std::fs::write(
            temp.path().join(".agentrace").join("config.json"),
            r#"{"serviceName": "nested"}"#,
        )
        .unwrap();

        let config = load_workspace_config(temp.path()).unwrap().unwrap();
        assert_eq!(config.service_name, Some("nested".to_string()));
    }

    #[test]
    fn test_load_workspace_config_yaml() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("agentrace.yaml"),
            "serviceName: planner\ncollector:\n  endpoint: collector:4318\n",
        )
        .unwrap();

        let config = load_workspace_config(temp.path()).unwrap().unwrap();
        assert_eq!(config.service_name, Some("planner".to_string()));
        assert_eq!(
            config.collector.unwrap().endpoint,
            Some("collector:4318".to_string())
        );
    }

    #[test]
    fn test_json_wins_over_yaml() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".agentrace.json"), r#"{"serviceName": "json"}"#)
            .unwrap();
        std::fs::write(temp.path().join("agentrace.yaml"), "serviceName: yaml\n").unwrap();

        let config = load_workspace_config(temp.path()).unwrap().unwrap();
        assert_eq!(config.service_name, Some("json".to_string()));
    }

    #[test]
    fn test_invalid_file_is_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".agentrace.json"), "{ nope").unwrap();

        let err = load_workspace_config(temp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::JsonError(_)));
    }

    #[test]
    fn test_load_local_config() {
        let temp = TempDir::new().unwrap();
        assert!(load_local_config(temp.path()).unwrap().is_none());

        std::fs::write(
            temp.path().join(LOCAL_CONFIG_FILE),
            r#"{"console": {"color": false}}"#,
        )
        .unwrap();
        let config = load_local_config(temp.path()).unwrap().unwrap();
        assert_eq!(config.console.unwrap().color, Some(false));
    }

    #[test]
    fn test_find_workspace_root() {
        let temp = TempDir::new().unwrap();
        let subdir = temp.path().join("a").join("b").join("c");
        std::fs::create_dir_all(&subdir).unwrap();
        std::fs::write(temp.path().join(".agentrace.json"), "{}").unwrap();

        let found = find_workspace_root(&subdir);
        assert_eq!(found.unwrap(), temp.path());
    }

    #[test]
    fn test_init_config_roundtrips() {
        let temp = TempDir::new().unwrap();
        let path = init_config(temp.path(), None).unwrap();
        assert_eq!(path.file_name().unwrap(), ".agentrace.json");

        let loaded = load_config_file(&path).unwrap();
        assert_eq!(loaded, get_example_config());
    }
}
