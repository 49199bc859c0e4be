use super::records::{parse_device_list, ConsoleRecord};
use crate::config::ConsoleConfig;
use crate::error::{AuthError, ConfigError, DiscoveryError, FetchError};
use crate::registry::Device;
use reqwest::header::{COOKIE, REFERER, SET_COOKIE};
use reqwest::StatusCode;
use std::time::Duration;

/// Raw outcome of the login form post: the first, un-followed response.
#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub status: StatusCode,
    /// Every `Set-Cookie` header value in response order
    pub set_cookies: Vec<String>,
}

/// Console session cookie (`name=value`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

impl SessionCookie {
    pub fn header_value(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// Take the first `name=value` pair of the first `Set-Cookie` header.
pub fn extract_session_cookie(resp: &LoginResponse) -> Result<SessionCookie, AuthError> {
    let header = resp.set_cookies.first().ok_or(AuthError::MissingCookie)?;

    let pair = header.split("; ").next().unwrap_or_default().trim();
    if pair.is_empty() {
        return Err(AuthError::MissingCookie);
    }

    match pair.split_once('=') {
        Some((name, value)) if !name.is_empty() && !value.is_empty() => Ok(SessionCookie {
            name: name.to_string(),
            value: value.to_string(),
        }),
        _ => Err(AuthError::MalformedCookie(pair.to_string())),
    }
}

/// Client for the management console.
///
/// The console answers a successful login with a redirect whose response
/// carries the session cookie, so redirects are never followed here.
#[derive(Debug, Clone)]
pub struct ConsoleClient {
    http: reqwest::Client,
    config: ConsoleConfig,
    scheme: &'static str,
}

impl ConsoleClient {
    pub fn new(config: ConsoleConfig, timeout: Duration) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self {
            http,
            config,
            scheme: "https",
        })
    }

    /// Talk plain HTTP to a local listener.
    #[cfg(test)]
    pub(crate) fn plain_http(mut self) -> Self {
        self.scheme = "http";
        self
    }

    fn login_url(&self) -> String {
        format!("{}://{}/LOGIN", self.scheme, self.config.address)
    }

    pub fn list_url(&self) -> String {
        format!(
            "{}://{}/api/list_view.json?list=ap_list&fv_id=0&ap_folder_id={}&expand_all=1",
            self.scheme, self.config.address, self.config.folder_id
        )
    }

    /// Post the login form and return the raw first response.
    pub async fn submit_login_form(&self) -> Result<LoginResponse, AuthError> {
        let form = [
            ("credential_0", self.config.user.as_str()),
            ("credential_1", self.config.password.as_str()),
            ("login", "Log In"),
            ("destination", "/"),
        ];

        let resp = self
            .http
            .post(self.login_url())
            .form(&form)
            .send()
            .await
            .map_err(AuthError::Transport)?;

        let set_cookies = resp
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();

        Ok(LoginResponse {
            status: resp.status(),
            set_cookies,
        })
    }

    pub async fn authenticate(&self) -> Result<SessionCookie, AuthError> {
        let resp = self.submit_login_form().await?;
        tracing::debug!(
            "Console login returned {} with {} cookies",
            resp.status,
            resp.set_cookies.len()
        );
        extract_session_cookie(&resp)
    }

    /// Fetch the router entries of the configured folder.
    ///
    /// Entries without a routing code are dropped. Any error aborts the
    /// whole listing.
    pub async fn list_devices(&self, cookie: &SessionCookie) -> Result<Vec<ConsoleRecord>, FetchError> {
        let target = self.config.address.clone();

        let resp = self
            .http
            .get(self.list_url())
            .header(COOKIE, cookie.header_value())
            .header(REFERER, format!("{}://{}/index.html", self.scheme, self.config.address))
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                stage: "device list",
                target: target.clone(),
                source: e,
            })?;

        if !resp.status().is_success() {
            return Err(FetchError::Status {
                stage: "device list",
                target,
                status: resp.status(),
            });
        }

        let body = resp.text().await.map_err(|e| FetchError::Transport {
            stage: "device list",
            target: target.clone(),
            source: e,
        })?;

        parse_device_list(&body)
    }

    /// Authenticate and list devices as registry candidates.
    pub async fn discover(&self) -> Result<Vec<Device>, DiscoveryError> {
        tracing::info!("Connecting to console {}", self.config.address);

        let cookie = self.authenticate().await?;
        let records = self.list_devices(&cookie).await?;

        tracing::info!(
            "Console folder {} lists {} routers",
            self.config.folder_id,
            records.len()
        );

        Ok(records.iter().map(ConsoleRecord::to_device).collect())
    }
}
