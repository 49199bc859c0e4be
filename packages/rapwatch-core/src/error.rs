//! Error types for rapwatch.

use std::path::PathBuf;
use thiserror::Error;

/// Console login failures. Fatal to the login call only.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The login form could not be submitted
    #[error("login request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The login response carried no `Set-Cookie` header
    #[error("login response carried no session cookie")]
    MissingCookie,

    /// The first cookie pair was not `name=value`
    #[error("session cookie is malformed: '{0}'")]
    MalformedCookie(String),
}

/// Network, decode and session failures for a single fetch.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("{stage} request to {target} failed: {source}")]
    Transport {
        stage: &'static str,
        target: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{stage} request to {target} returned {status}")]
    Status {
        stage: &'static str,
        target: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to decode {stage} response from {target}: {reason}")]
    Decode {
        stage: &'static str,
        target: String,
        reason: String,
    },

    /// The device login document had no usable `sid` field
    #[error("no session")]
    NoSession,

    #[error("invalid device address {target}: {reason}")]
    InvalidAddress { target: String, reason: String },
}

/// Start-up configuration problems. Fatal to process start.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("hour must be between 0 and 23, got {0}")]
    HourOutOfRange(u32),

    #[error("minute must be between 0 and 59, got {0}")]
    MinuteOutOfRange(u32),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("no config file path could be determined")]
    NoConfigPath,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Storage failures. The containing transaction is rolled back.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("'{0}' is not a valid device code for a table name")]
    InvalidCode(String),

    #[error("failed to prepare database directory {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database connection lock poisoned")]
    LockPoisoned,

    #[error("stored timestamp '{0}' is not RFC 3339")]
    Timestamp(String),
}

/// Failures while asking the console for the device list.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("console authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("console device list failed: {0}")]
    Fetch(#[from] FetchError),
}

/// Failures that abort a whole inventory cycle.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("registry reconciliation failed: {0}")]
    Persistence(#[from] PersistenceError),
}
