use crate::error::ConfigError;
use crate::scheduler::DailySchedule;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable name for config file override
pub const ENV_CONFIG_PATH: &str = "RAPWATCH_CONFIG";

/// Default device command, already percent-encoded: `'show clients wired'`
pub const DEFAULT_DEVICE_COMMAND: &str = "%27show%20clients%20wired%27";

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Raise the default log level to debug
    pub debug: bool,
    /// Local hour of the daily run (0-23)
    pub hour: u32,
    /// Local minute of the daily run (0-59)
    pub minute: u32,
    /// Per-request network timeout
    pub timeout_secs: u64,
    /// Maximum number of devices scraped at once
    pub max_concurrency: usize,
    /// Ceiling for the device fan-out of one cycle; 0 disables it
    pub cycle_deadline_secs: u64,
    pub console: ConsoleConfig,
    pub device: DeviceConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Console host name or IP address
    pub address: String,
    pub user: String,
    pub password: String,
    /// AP folder whose routers are inventoried
    pub folder_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// CGI path on the device web server
    pub path: String,
    pub user: String,
    pub password: String,
    /// Percent-encoded CLI command
    pub command: String,
    /// MAC vendor prefixes always treated as personal computers
    pub include_mac: Vec<String>,
    /// Keep only personal computers in stored snapshots
    pub only_pc: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            hour: 2,
            minute: 30,
            timeout_secs: 10,
            max_concurrency: 16,
            cycle_deadline_secs: 300,
            console: ConsoleConfig::default(),
            device: DeviceConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: "swarm.cgi".to_string(),
            user: "admin".to_string(),
            password: String::new(),
            command: DEFAULT_DEVICE_COMMAND.to_string(),
            include_mac: Vec::new(),
            only_pc: true,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.schedule()?;

        if self.console.address.trim().is_empty() {
            return Err(ConfigError::Invalid("console.address is empty".to_string()));
        }
        if self.device.path.trim().is_empty() {
            return Err(ConfigError::Invalid("device.path is empty".to_string()));
        }
        if self.device.command.contains(' ') {
            return Err(ConfigError::Invalid(
                "device.command must be percent-encoded".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn schedule(&self) -> Result<DailySchedule, ConfigError> {
        DailySchedule::new(self.hour, self.minute)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cycle_deadline(&self) -> Option<Duration> {
        (self.cycle_deadline_secs > 0).then(|| Duration::from_secs(self.cycle_deadline_secs))
    }
}

/// Where the config file path came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Passed with `--config`
    CommandLine,
    /// Loaded from environment variable
    Environment,
    /// Default per-user location
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CommandLine => write!(f, "command line"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::Default => write!(f, "default location"),
        }
    }
}

/// Get the default path to the configuration file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|p| p.join("rapwatch").join("config.toml"))
}

/// Default location of the registry database
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .map(|p| p.join("rapwatch"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rapwatch.db")
}

/// Resolve the config file path with priority:
/// 1. Explicit path (`--config`)
/// 2. Environment variable (RAPWATCH_CONFIG)
/// 3. Default location (~/.config/rapwatch/config.toml)
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<(PathBuf, ConfigSource), ConfigError> {
    if let Some(path) = explicit {
        return Ok((path.to_path_buf(), ConfigSource::CommandLine));
    }

    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        let path = path.trim();
        if !path.is_empty() {
            return Ok((PathBuf::from(path), ConfigSource::Environment));
        }
    }

    default_config_path()
        .map(|p| (p, ConfigSource::Default))
        .ok_or(ConfigError::NoConfigPath)
}

/// Read and validate a config file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    config.validate()?;
    tracing::debug!("Loaded config from {:?}", path);
    Ok(config)
}

/// Generate example config file content
pub fn generate_example_config() -> String {
    format!(
        r#"# rapwatch configuration
# Default location: ~/.config/rapwatch/config.toml (override with RAPWATCH_CONFIG)

# Log at debug level
debug = false
# Local time of the daily inventory run
hour = 2
minute = 30
# Per-request network timeout in seconds
timeout_secs = 10
# Devices scraped concurrently
max_concurrency = 16
# Ceiling for one cycle's device scrapes in seconds (0 disables)
cycle_deadline_secs = 300

[console]
address = "5.5.5.16"
user = "user"
password = "password"
folder_id = 32

[device]
path = "swarm.cgi"
user = "admin"
password = "password"
# Sent as-is, must be percent-encoded
command = "{DEFAULT_DEVICE_COMMAND}"
# Keep only personal computers (Windows clients or allow-listed MAC vendors)
only_pc = true
include_mac = ["c0:3f:d5:7e", "44:37:e6:ce"]

[database]
# path = "/var/lib/rapwatch/rapwatch.db"
"#
    )
}
