//! Configuration resolution for wordnab-ingest
//!
//! Provides multi-tier resolution with CLI → ENV → TOML → default priority.
//! CLI and environment values arrive together through clap (`env = ...`), so
//! this module only has to lay them over the TOML file.

use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt::MakeWriter, EnvFilter};
use wordnab_common::config::{load_toml_config, TomlConfig};
use wordnab_common::Result;

/// Values supplied on the command line or through environment variables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub backend_base_url: Option<String>,
    pub lyrics_base_url: Option<String>,
    pub max_attempts: Option<u32>,
    pub interval_ms: Option<u64>,
    pub cap: Option<usize>,
}

/// Lay `overrides` over the TOML configuration and validate the result
pub fn resolve(mut config: TomlConfig, overrides: &Overrides) -> Result<TomlConfig> {
    let mut applied = Vec::new();

    if let Some(port) = overrides.port {
        config.port = port;
        applied.push("port");
    }
    if let Some(level) = non_blank(&overrides.log_level) {
        config.logging.level = level;
        applied.push("log_level");
    }
    if let Some(file) = &overrides.log_file {
        config.logging.file = Some(file.clone());
        applied.push("log_file");
    }
    if let Some(url) = non_blank(&overrides.backend_base_url) {
        config.endpoints.backend_base_url = url;
        applied.push("backend_url");
    }
    if let Some(url) = non_blank(&overrides.lyrics_base_url) {
        config.endpoints.lyrics_base_url = url;
        applied.push("lyrics_url");
    }
    if let Some(max_attempts) = overrides.max_attempts {
        config.poller.max_attempts = max_attempts;
        applied.push("max_attempts");
    }
    if let Some(interval_ms) = overrides.interval_ms {
        config.poller.interval_ms = interval_ms;
        applied.push("poll_interval_ms");
    }
    if let Some(cap) = overrides.cap {
        config.aggregation.cap = cap;
        applied.push("cap");
    }

    config.validate()?;

    if !applied.is_empty() {
        info!("Settings overridden from CLI/environment: {}", applied.join(", "));
    }
    Ok(config)
}

/// Load the TOML file (when a path is known) and apply `overrides`
///
/// The global subscriber is built from the result, so messages emitted while
/// loading go to a stderr subscriber scoped to this call.
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<TomlConfig> {
    load_config_with_writer(path, overrides, std::io::stderr)
}

/// [`load_config`] logging to `writer`
pub fn load_config_with_writer<W>(
    path: Option<&Path>,
    overrides: &Overrides,
    writer: W,
) -> Result<TomlConfig>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let level = non_blank(&overrides.log_level).unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("wordnab_ingest={0},wordnab_common={0}", level))
    });
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let toml_config = match path {
            Some(path) => load_toml_config(path)?,
            None => TomlConfig::default(),
        };
        resolve(toml_config, overrides)
    })
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
