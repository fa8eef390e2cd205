//! Service configuration.
//!
//! Layers, later wins: built-in defaults, the config file (TOML or JSON),
//! a `.env` file in the working directory, then `TASKS_*` environment
//! variables (`TASKS_SERVER__PORT=9000` sets `server.port`).

use lattice_config::{ConfigError, ConfigManager, ConfigValidator, Validate};
use lattice_core::logging::{LogConfig, LogFormat, LogLevel, LogOutput};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Prefix of environment variables read by the service
pub const ENV_PREFIX: &str = "TASKS";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Default database the service works in
    pub name: String,
    pub namespace: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            name: "shimo".to_string(),
            namespace: "ns".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    pub thread_ids: bool,
    /// Include the event target
    pub targets: bool,
    pub file_line: bool,
    /// Log span close events
    pub spans: bool,
    pub colors: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            output: LogOutput::Stdout,
            thread_ids: false,
            targets: true,
            file_line: false,
            spans: false,
            colors: false,
        }
    }
}

impl LoggingSettings {
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig::new()
            .level(self.level)
            .format(self.format)
            .output(self.output.clone())
            .with_thread_ids(self.thread_ids)
            .with_targets(self.targets)
            .with_file_line(self.file_line)
            .with_spans(self.spans)
            .with_colors(self.colors)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    /// Directory served by `GET /`
    pub static_dir: PathBuf,
    pub logging: LoggingSettings,
    /// Add the failing phase and route pattern to error responses
    pub diagnostics: bool,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            database: DatabaseSettings::default(),
            static_dir: PathBuf::from("public"),
            logging: LoggingSettings::default(),
            diagnostics: false,
        }
    }
}

impl TasksConfig {
    /// Load from `path` (skipped when absent), `.env` and the environment
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let manager = ConfigManager::with_prefix(ENV_PREFIX);
        manager.load_file_if_exists(path)?;
        if Path::new(".env").exists() {
            manager.load_dotenv(".env")?;
        }
        manager.load_env();
        Self::from_manager(&manager)
    }

    pub fn from_manager(manager: &ConfigManager) -> Result<Self, ConfigError> {
        manager.load_validated()
    }

    /// Address to listen on, as `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Validate for TasksConfig {
    fn validate(&self) -> lattice_config::Result<()> {
        ConfigValidator::not_empty(&self.server.host, "server.host")?;
        ConfigValidator::is_port(self.server.port, "server.port")?;
        ConfigValidator::not_empty(&self.database.name, "database.name")?;
        ConfigValidator::not_empty(&self.database.namespace, "database.namespace")
    }
}
