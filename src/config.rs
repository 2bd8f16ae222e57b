//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$LETTERBOX_CONFIG` (environment variable)
//! 2. `~/.config/letterbox/config.toml` (Linux)
//!    `~/Library/Application Support/letterbox/config.toml` (macOS)
//!    `%APPDATA%\letterbox\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::parser::{ProcessingMode, DEFAULT_MAX_DEPTH};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub parser: ParserConfig,
    pub output: OutputConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Defaults for [`Parser`](crate::parser::Parser) construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// "full", "headers-only" or "no-attachments".
    pub mode: ProcessingMode,
    /// Content types whose parts are ignored.
    pub skip_content_types: Vec<String>,
    /// Maximum nested multipart levels.
    pub max_depth: usize,
    /// Log every part decision at info level.
    pub verbose: bool,
}

/// CLI output settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Print JSON instead of the text summary.
    pub json: bool,
    /// Write extracted files here.
    pub save_dir: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            mode: ProcessingMode::Full,
            skip_content_types: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            verbose: false,
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    let Some(path) = config_file_path() else {
        return Config::default();
    };
    if !path.exists() {
        return Config::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            Config::default()
        }
    }
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<PathBuf> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(&path, toml::to_string_pretty(config)?)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(path)
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("LETTERBOX_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("letterbox").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("letterbox")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("letterbox.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.parser.mode, ProcessingMode::Full);
        assert_eq!(cfg.parser.max_depth, DEFAULT_MAX_DEPTH);
        assert!(!cfg.output.json);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut cfg = Config::default();
        cfg.parser.skip_content_types = vec!["text/calendar".into()];
        cfg.output.save_dir = Some(PathBuf::from("/tmp/files"));
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[parser]
mode = "no-attachments"
skip_content_types = ["application/pkcs7-signature"]

[output]
json = true
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.parser.mode, ProcessingMode::NoAttachments);
        assert_eq!(cfg.parser.skip_content_types, ["application/pkcs7-signature"]);
        assert!(cfg.output.json);
        // Other fields use defaults
        assert_eq!(cfg.parser.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(cfg.general.log_level, "warn");
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(toml::from_str::<Config>("[parser]\nmode = \"partial\"\n").is_err());
    }

    #[test]
    fn test_log_file_in_cache_dir() {
        let mut cfg = Config::default();
        cfg.general.cache_dir = Some(PathBuf::from("/var/cache/lb"));
        assert_eq!(log_file_path(&cfg), PathBuf::from("/var/cache/lb/letterbox.log"));
    }
}
