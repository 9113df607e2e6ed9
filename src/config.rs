// TOML configuration: engine, server, refresh worker, logging

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::engine_repo::CliRunner;

/// Used when CONFIG_FILE is unset. A missing default file means built-in defaults.
pub const DEFAULT_CONFIG_PATH: &str = "dockside.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub server: ServerConfig,
    pub refresh: RefreshConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine executable, looked up on PATH (`docker`, `podman`).
    pub binary: String,
    /// Flags placed before every subcommand, e.g. `["--context", "remote"]`.
    pub global_args: Vec<String>,
    pub timeout_secs: u64,
    /// Lines requested by the logs operation.
    pub logs_tail: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: "docker".into(),
            global_args: Vec::new(),
            timeout_secs: 300,
            logs_tail: 500,
        }
    }
}

impl EngineConfig {
    pub fn runner(&self) -> CliRunner {
        CliRunner::new(self.binary.clone())
            .with_global_args(self.global_args.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Period of the background refresh of all four kinds (serve only).
    pub interval_secs: u64,
    /// Max number of inventory events kept for slow /ws/events clients.
    pub broadcast_capacity: usize,
    /// How often to log app stats (ws clients, refresh counters) at INFO level.
    pub stats_log_interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            broadcast_capacity: 64,
            stats_log_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl AppConfig {
    /// Reads CONFIG_FILE if set (must exist), else `dockside.toml` if present, else defaults.
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var("CONFIG_FILE") {
            Ok(path) => Self::load_from_path(Path::new(&path)),
            Err(_) => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::load_from_path(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::load_from_str(&s).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.engine.binary.trim().is_empty(),
            "engine.binary must be non-empty"
        );
        anyhow::ensure!(
            self.engine.timeout_secs > 0,
            "engine.timeout_secs must be > 0, got {}",
            self.engine.timeout_secs
        );
        anyhow::ensure!(
            self.engine.logs_tail > 0,
            "engine.logs_tail must be > 0, got {}",
            self.engine.logs_tail
        );
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(!self.server.host.is_empty(), "server.host must be non-empty");
        anyhow::ensure!(
            self.refresh.interval_secs > 0,
            "refresh.interval_secs must be > 0, got {}",
            self.refresh.interval_secs
        );
        anyhow::ensure!(
            self.refresh.broadcast_capacity > 0,
            "refresh.broadcast_capacity must be > 0, got {}",
            self.refresh.broadcast_capacity
        );
        anyhow::ensure!(
            self.refresh.stats_log_interval_secs > 0,
            "refresh.stats_log_interval_secs must be > 0, got {}",
            self.refresh.stats_log_interval_secs
        );
        anyhow::ensure!(
            !self.logging.level.trim().is_empty(),
            "logging.level must be non-empty"
        );
        Ok(())
    }
}
