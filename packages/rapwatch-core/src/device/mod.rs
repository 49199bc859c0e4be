//! Per-device client for the router's embedded web server.
//!
//! Each scrape is two requests against `https://<addr>:4343/<path>`:
//! - `opcode=login` returns an XML document carrying a session id (`sid`)
//! - `opcode=support` runs a CLI command with that sid and returns plain text
//!
//! The text is a column table parsed by [`table::TableParser`] and then
//! narrowed by the [`filter::PcFilter`] policy.

pub mod filter;
pub mod table;

pub use filter::PcFilter;
pub use table::{ColumnPatternParser, ParsedTable, TableParser};

use crate::config::DeviceConfig;
use crate::error::{ConfigError, FetchError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Port of the device management web server.
pub const DEVICE_PORT: u16 = 4343;

/// A wired client as reported by `show clients wired`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    pub name: String,
    pub ip: String,
    pub mac: String,
    /// OS label as fingerprinted by the router (often empty)
    pub os: String,
    pub network: String,
    pub access_point: String,
    pub role: String,
}

/// Session id from a device login. Lives for one scrape attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Device login document: `<re><data name="sid">TOKEN</data>...</re>`
#[derive(Debug, Deserialize)]
struct LoginDocument {
    #[serde(rename = "data", default)]
    fields: Vec<LoginField>,
}

#[derive(Debug, Deserialize)]
struct LoginField {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "$text", default)]
    value: String,
}

/// Extract the session token from a device login response body.
pub fn parse_session_token(body: &str) -> Result<SessionToken, FetchError> {
    let doc: LoginDocument = quick_xml::de::from_str(body).map_err(|e| {
        tracing::debug!("Device login document did not parse: {}", e);
        FetchError::NoSession
    })?;

    doc.fields
        .into_iter()
        .find(|field| field.name == "sid")
        .map(|field| field.value.trim().to_string())
        .filter(|sid| !sid.is_empty())
        .map(SessionToken)
        .ok_or(FetchError::NoSession)
}

#[derive(Debug, Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
    config: DeviceConfig,
    parser: ColumnPatternParser,
    filter: PcFilter,
    scheme: &'static str,
    port: u16,
}

impl DeviceClient {
    /// Devices present self-signed certificates, so validation is disabled.
    pub fn new(config: DeviceConfig, timeout: Duration) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .map_err(ConfigError::HttpClient)?;

        let filter = PcFilter::new(config.only_pc, &config.include_mac);

        Ok(Self {
            http,
            config,
            parser: ColumnPatternParser::default(),
            filter,
            scheme: "https",
            port: DEVICE_PORT,
        })
    }

    /// Talk plain HTTP to a local listener.
    #[cfg(test)]
    pub(crate) fn plain_http(mut self, port: u16) -> Self {
        self.scheme = "http";
        self.port = port;
        self
    }

    fn base_url(&self, address: &str) -> String {
        format!(
            "{}://{}:{}/{}",
            self.scheme,
            address,
            self.port,
            self.config.path.trim_start_matches('/')
        )
    }

    /// Credentials are form-encoded into the query.
    pub fn login_url(&self, address: &str) -> Result<reqwest::Url, FetchError> {
        let mut url = reqwest::Url::parse(&self.base_url(address)).map_err(|e| {
            FetchError::InvalidAddress {
                target: address.to_string(),
                reason: e.to_string(),
            }
        })?;

        url.query_pairs_mut()
            .append_pair("opcode", "login")
            .append_pair("user", &self.config.user)
            .append_pair("passwd", &self.config.password)
            .append_pair("refresh", "false");
        Ok(url)
    }

    /// The configured command is sent as-is and must already be percent-encoded.
    pub fn command_url(&self, address: &str, sid: &SessionToken) -> String {
        format!(
            "{}?opcode=support&sid={}&cmd={}&refresh=false",
            self.base_url(address),
            sid.as_str(),
            self.config.command
        )
    }

    /// Log in to the device and list its wired clients.
    ///
    /// Any failure aborts the whole fetch; a partial table is never returned.
    pub async fn fetch_wired_clients(&self, address: &str) -> Result<Vec<ClientRecord>, FetchError> {
        let login_url = self.login_url(address)?;
        let login = self.get_text("login", address, login_url.as_str()).await?;
        let sid = parse_session_token(&login)?;

        let output = self
            .get_text("command", address, &self.command_url(address, &sid))
            .await?;

        let table = self.parser.parse(&output);
        if table.unparsed > 0 {
            tracing::debug!(
                "{}: {} table lines did not match the client pattern",
                address,
                table.unparsed
            );
        }

        let total = table.records.len();
        let clients: Vec<ClientRecord> = table
            .records
            .into_iter()
            .filter(|record| self.filter.keep(record))
            .collect();

        tracing::debug!("{}: kept {} of {} wired clients", address, clients.len(), total);
        Ok(clients)
    }

    /// URLs carry credentials, so they are stripped from transport errors.
    async fn get_text(&self, stage: &'static str, address: &str, url: &str) -> Result<String, FetchError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                stage,
                target: address.to_string(),
                source: e.without_url(),
            })?;

        if !resp.status().is_success() {
            return Err(FetchError::Status {
                stage,
                target: address.to_string(),
                status: resp.status(),
            });
        }

        resp.text().await.map_err(|e| FetchError::Transport {
            stage,
            target: address.to_string(),
            source: e.without_url(),
        })
    }
}
