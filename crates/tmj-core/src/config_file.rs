use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub server: Option<ServerConfig>,
    pub extraction: Option<ExtractionConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_upload_mb: Option<u64>,
    pub task_retention_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Shortest digit run treated as a number.
    pub min_digits: Option<usize>,
    pub corrigenda_marker: Option<String>,
    pub renewal_marker: Option<String>,
    pub pr_marker: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive, e.g. `info` or `tmj_parsing=debug`.
    pub level: Option<String>,
}

/// Platform config directory path: `<config_dir>/tmj/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tmj").join("config.toml"))
}

/// Load config by cascading CWD `.tmj.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".tmj.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        server: merge_table(base.server, overlay.server, |b, o| ServerConfig {
            host: o.host.or(b.host),
            port: o.port.or(b.port),
            max_upload_mb: o.max_upload_mb.or(b.max_upload_mb),
            task_retention_secs: o.task_retention_secs.or(b.task_retention_secs),
        }),
        extraction: merge_table(base.extraction, overlay.extraction, |b, o| {
            ExtractionConfig {
                min_digits: o.min_digits.or(b.min_digits),
                corrigenda_marker: o.corrigenda_marker.or(b.corrigenda_marker),
                renewal_marker: o.renewal_marker.or(b.renewal_marker),
                pr_marker: o.pr_marker.or(b.pr_marker),
            }
        }),
        logging: merge_table(base.logging, overlay.logging, |b, o| LoggingConfig {
            level: o.level.or(b.level),
        }),
    }
}

fn merge_table<T>(base: Option<T>, overlay: Option<T>, both: impl FnOnce(T, T) -> T) -> Option<T> {
    match (base, overlay) {
        (None, None) => None,
        (Some(b), None) => Some(b),
        (None, Some(o)) => Some(o),
        (Some(b), Some(o)) => Some(both(b, o)),
    }
}
