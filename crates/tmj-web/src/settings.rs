use std::time::Duration;

use tmj_core::DEFAULT_TASK_RETENTION;
use tmj_core::config_file::ConfigFile;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 50;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Resolved server settings. Environment variables win over the config file,
/// which wins over the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub max_upload_mb: u64,
    pub task_retention: Duration,
    pub log_level: String,
    /// Environment values that failed to parse and were ignored.
    pub rejected: Vec<RejectedEnv>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEnv {
    pub key: &'static str,
    pub value: String,
}

impl Settings {
    pub fn resolve(config: &ConfigFile) -> Self {
        Self::resolve_with(config, |key| std::env::var(key).ok())
    }

    /// Resolve with a custom variable lookup. Unparsable values are ignored
    /// and collected in [`Settings::rejected`].
    pub fn resolve_with<F>(config: &ConfigFile, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = config.server.clone().unwrap_or_default();
        let mut rejected = Vec::new();

        let host = env("TMJ_HOST")
            .filter(|h| !h.trim().is_empty())
            .or(server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_env(&env, "TMJ_PORT", &mut rejected)
            .or(server.port)
            .unwrap_or(DEFAULT_PORT);
        let max_upload_mb = parse_env(&env, "TMJ_MAX_UPLOAD_MB", &mut rejected)
            .or(server.max_upload_mb)
            .unwrap_or(DEFAULT_MAX_UPLOAD_MB);
        let task_retention = parse_env(&env, "TMJ_TASK_RETENTION_SECS", &mut rejected)
            .or(server.task_retention_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TASK_RETENTION);
        let log_level = config
            .logging
            .as_ref()
            .and_then(|l| l.level.clone())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        Self {
            host,
            port,
            max_upload_mb,
            task_retention,
            log_level,
            rejected,
        }
    }

    /// Log every ignored environment value. Call once the subscriber is up.
    pub fn report_rejected(&self) {
        for RejectedEnv { key, value } in &self.rejected {
            tracing::warn!(key, value = %value, "ignoring invalid environment value");
        }
    }
}

fn parse_env<T, F>(env: &F, key: &'static str, rejected: &mut Vec<RejectedEnv>) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = env(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            rejected.push(RejectedEnv { key, value: raw });
            None
        }
    }
}
