//! HTTP client for the remote host-listing API
//!
//! Endpoints, relative to the configured base URL:
//! - `POST users/login` with `{username, password}` -> `{token, expiresIn?}`
//! - `GET ssh/db/host` with a bearer token -> array of host records

use crate::sources::RemoteHostClient;
use crate::types::{
    deserialize_optional_port, AuthRequired, Host, RemoteError, SessionToken, Source, DEFAULT_PORT,
};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

/// Token lifetime assumed when the login response does not state one.
const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteHostRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    ip: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_port")]
    port: Option<u16>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    key_path: Option<String>,
    #[serde(default)]
    proxy_jump: Option<String>,
    #[serde(default)]
    default_path: Option<String>,
}

impl RemoteHostRecord {
    fn into_host(self) -> Option<Host> {
        let hostname = self.ip.as_deref().unwrap_or_default().trim().to_string();
        if hostname.is_empty() {
            return None;
        }
        let alias = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| hostname.clone());

        let mut host = Host::new(alias, hostname)
            .with_user(self.username.unwrap_or_default())
            .with_port(self.port.unwrap_or(DEFAULT_PORT))
            .with_source(Source::Remote);
        host.identity_file = self.key_path.filter(|v| !v.is_empty());
        host.proxy_jump = self.proxy_jump.filter(|v| !v.is_empty());
        host.default_remote_path = self.default_path.filter(|v| !v.is_empty());
        Some(host)
    }
}

pub struct HttpRemoteClient {
    http: reqwest::Client,
    credentials: Option<Credentials>,
    token: Mutex<Option<SessionToken>>,
}

impl HttpRemoteClient {
    pub fn new(request_timeout: Duration) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("sshbuddy/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            http,
            credentials: None,
            token: Mutex::new(None),
        })
    }

    /// Log in with these credentials whenever no usable token is available.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    async fn set_token(&self, token: Option<SessionToken>) {
        *self.token.lock().await = token;
    }
}

/// Join `path` onto `base_url`, keeping any path prefix the base carries.
fn endpoint(base_url: &str, path: &str) -> Result<Url, RemoteError> {
    let trimmed = base_url.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };

    let invalid = |reason: String| RemoteError::InvalidUrl {
        url: trimmed.to_string(),
        reason,
    };

    let base = Url::parse(&with_slash).map_err(|e| invalid(e.to_string()))?;
    if base.cannot_be_a_base() {
        return Err(invalid("not a hierarchical URL".to_string()));
    }
    base.join(path).map_err(|e| invalid(e.to_string()))
}

fn is_auth_status(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

async fn error_body(resp: reqwest::Response) -> String {
    let body = resp.text().await.unwrap_or_default();
    body.trim().chars().take(180).collect()
}

#[async_trait]
impl RemoteHostClient for HttpRemoteClient {
    async fn authenticate(
        &self,
        base_url: &str,
        username: &str,
        password: &str,
    ) -> Result<SessionToken, RemoteError> {
        let url = endpoint(base_url, "users/login")?;
        debug!("Authenticating against {}", url);

        let resp = self
            .http
            .post(url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let status = resp.status();
        if is_auth_status(status) {
            return Err(AuthRequired::new(format!("login rejected ({})", status)).into());
        }
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: error_body(resp).await,
            });
        }

        let login: LoginResponse = resp.json().await?;
        let ttl = login.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        let token = SessionToken::new(login.token, Some(Utc::now() + ChronoDuration::seconds(ttl)));

        info!("Authenticated with remote host list");
        self.set_token(Some(token.clone())).await;
        Ok(token)
    }

    async fn fetch_hosts(
        &self,
        base_url: &str,
        cached: Option<SessionToken>,
    ) -> Result<Vec<Host>, RemoteError> {
        let url = endpoint(base_url, "ssh/db/host")?;

        let token = match cached.filter(|t| !t.is_expired()) {
            Some(token) => token,
            None => match &self.credentials {
                Some(creds) => {
                    debug!("No usable session token, logging in");
                    self.authenticate(base_url, &creds.username, &creds.password)
                        .await?
                }
                None => {
                    self.set_token(None).await;
                    return Err(AuthRequired::new("no valid session token").into());
                }
            },
        };

        let resp = self
            .http
            .get(url)
            .bearer_auth(&token.token)
            .send()
            .await?;

        let status = resp.status();
        if is_auth_status(status) {
            self.set_token(None).await;
            return Err(AuthRequired::new(format!("session token rejected ({})", status)).into());
        }
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: error_body(resp).await,
            });
        }

        let records: Vec<RemoteHostRecord> = resp.json().await?;
        self.set_token(Some(token)).await;

        let hosts: Vec<Host> = records
            .into_iter()
            .filter_map(RemoteHostRecord::into_host)
            .collect();
        debug!("Fetched {} remote hosts", hosts.len());
        Ok(hosts)
    }

    async fn current_token(&self) -> Option<SessionToken> {
        self.token.lock().await.clone()
    }
}
