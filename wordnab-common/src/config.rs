//! Bootstrap configuration loading and config file resolution
//!
//! Configuration is read once at startup from a TOML file. Every field has a
//! built-in default, so a missing file (or a missing section) is never fatal.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (applied by the binary)
//! 2. Environment variables (applied by the binary through clap `env`)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "WORDNAB_CONFIG";

/// Default HTTP port of the ingest service
pub const DEFAULT_PORT: u16 = 5731;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Context job polling
    #[serde(default)]
    pub poller: PollerConfig,

    /// Word table aggregation
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Batch processing
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Collaborator base URLs
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Lyrics source throttling
    #[serde(default)]
    pub lyrics: LyricsConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            logging: LoggingConfig::default(),
            poller: PollerConfig::default(),
            aggregation: AggregationConfig::default(),
            pipeline: PipelineSection::default(),
            endpoints: EndpointsConfig::default(),
            lyrics: LyricsConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Context job polling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Maximum status checks per job before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between status checks, in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_ms: default_interval_ms(),
        }
    }
}

/// Word table aggregation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Number of words kept in the aggregated table
    #[serde(default = "default_cap")]
    pub cap: usize,

    /// Words with a smaller total are left out of the table
    #[serde(default = "default_min_total_count")]
    pub min_total_count: u32,

    /// Multiply a track's word counts by its play count in the run
    #[serde(default)]
    pub weight_by_plays: bool,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            cap: default_cap(),
            min_total_count: default_min_total_count(),
            weight_by_plays: false,
        }
    }
}

/// Batch processing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Tracks processed concurrently within one batch
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

/// Base URLs of the external collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Lyrics lookup service
    #[serde(default = "default_lyrics_base_url")]
    pub lyrics_base_url: String,

    /// Word matching, language detection and context job backend
    #[serde(default = "default_backend_base_url")]
    pub backend_base_url: String,

    /// Listening history provider
    #[serde(default = "default_history_base_url")]
    pub history_base_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            lyrics_base_url: default_lyrics_base_url(),
            backend_base_url: default_backend_base_url(),
            history_base_url: default_history_base_url(),
        }
    }
}

/// Lyrics source throttling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricsConfig {
    /// Maximum lyric lookups per second
    #[serde(default = "default_lyrics_rps")]
    pub requests_per_second: u32,
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_lyrics_rps(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_attempts() -> u32 {
    60
}

fn default_interval_ms() -> u64 {
    10_000
}

fn default_cap() -> usize {
    30
}

fn default_min_total_count() -> u32 {
    1
}

fn default_concurrency() -> usize {
    4
}

fn default_lyrics_base_url() -> String {
    "https://api.lyrics.ovh".to_string()
}

fn default_backend_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_history_base_url() -> String {
    "https://api.spotify.com".to_string()
}

fn default_lyrics_rps() -> u32 {
    5
}

impl TomlConfig {
    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.poller.max_attempts == 0 {
            return Err(Error::Config("poller.max_attempts must be at least 1".to_string()));
        }
        if self.poller.interval_ms == 0 {
            return Err(Error::Config("poller.interval_ms must be greater than 0".to_string()));
        }
        if self.aggregation.cap == 0 {
            return Err(Error::Config("aggregation.cap must be at least 1".to_string()));
        }
        if self.pipeline.concurrency == 0 {
            return Err(Error::Config("pipeline.concurrency must be at least 1".to_string()));
        }
        if self.lyrics.requests_per_second == 0 {
            return Err(Error::Config(
                "lyrics.requests_per_second must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve the config file path
///
/// Priority: explicit path (CLI) > `WORDNAB_CONFIG` > platform config dir.
/// Returns `None` only when no platform config dir can be determined.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path()
}

/// Platform default: `<config dir>/wordnab/wordnab.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("wordnab").join("wordnab.toml"))
}

/// Load TOML config, falling back to defaults when the file does not exist
///
/// A file that exists but cannot be parsed is an error: silently ignoring a
/// typo would run the service with settings the operator did not ask for.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    config.validate()?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write TOML config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
