// Hub session
//
// Owns the single `reqwest::Client` and the session token. Every REST call
// goes through `send`, which performs at most one re-authentication when
// the hub answers 401.

use std::sync::RwLock;

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::transport::TransportConfig;

/// Login credentials for the hub.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(rename = "sessionToken")]
    session_token: Option<String>,
}

/// Authenticated connection to one hub.
///
/// Shared between the device directory, entity commands, and the push
/// channel (wrap it in an `Arc`). The token is only ever written by
/// [`login`](Self::login) and [`invalidate_token`](Self::invalidate_token).
pub struct HubSession {
    http: reqwest::Client,
    endpoint: Endpoint,
    credentials: Credentials,
    transport: TransportConfig,
    token: RwLock<Option<SecretString>>,
}

impl HubSession {
    /// Create a session with its own connection pool built from `transport`.
    pub fn new(
        endpoint: Endpoint,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            endpoint,
            credentials,
            transport: transport.clone(),
            token: RwLock::new(None),
        })
    }

    /// Create a session around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, endpoint: Endpoint, credentials: Credentials) -> Self {
        Self {
            http,
            endpoint,
            credentials,
            transport: TransportConfig::default(),
            token: RwLock::new(None),
        }
    }

    /// Seed the session with a known token (skips the first login).
    pub fn with_token(self, token: SecretString) -> Self {
        *self.token.write().expect("token lock poisoned") = Some(token);
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    // ── Token management ─────────────────────────────────────────────

    /// Current session token, if logged in.
    pub fn token(&self) -> Option<SecretString> {
        self.token.read().expect("token lock poisoned").clone()
    }

    pub fn has_token(&self) -> bool {
        self.token.read().expect("token lock poisoned").is_some()
    }

    /// Drop the stored token. The next request logs in again.
    pub fn invalidate_token(&self) {
        *self.token.write().expect("token lock poisoned") = None;
    }

    fn store_token(&self, token: String) {
        *self.token.write().expect("token lock poisoned") = Some(SecretString::from(token));
    }

    // ── Authentication ───────────────────────────────────────────────

    /// `POST /api/login` and store the returned `sessionToken`.
    ///
    /// The previous token is cleared first, so a failed login always leaves
    /// the session unauthenticated.
    pub async fn login(&self) -> Result<(), Error> {
        self.invalidate_token();

        let url = self.endpoint.api_url("login")?;
        debug!(%url, username = %self.credentials.username, "logging in");

        let body = LoginRequest {
            username: &self.credentials.username,
            password: self.credentials.password.expose_secret(),
        };

        let resp = self.http.post(url).json(&body).send().await?;
        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status}): {body}"),
            });
        }

        let text = resp.text().await?;
        let parsed: LoginResponse =
            serde_json::from_str(&text).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: text.clone(),
            })?;

        match parsed.session_token.filter(|t| !t.is_empty()) {
            Some(token) => {
                self.store_token(token);
                info!("authenticated with hub");
                Ok(())
            }
            None => Err(Error::MissingToken),
        }
    }

    /// Log in, absorbing the failure into a `bool`.
    pub async fn authenticate(&self) -> bool {
        match self.login().await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "hub authentication failed");
                false
            }
        }
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Send an authenticated request to an API-relative path.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, Error> {
        let url = self.endpoint.api_url(path)?;
        self.send_url(method, url, body).await
    }

    /// Send an authenticated request to a fully built URL.
    ///
    /// Logs in first when no token is held. A 401 clears the token, logs in
    /// again, and replays the request once; a second 401 yields
    /// [`Error::SessionExpired`].
    pub async fn send_url(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Value, Error> {
        if !self.has_token() {
            warn!("no session token, authenticating before request");
            self.login().await?;
        }

        match self.attempt(&method, &url, body).await {
            Err(Error::SessionExpired) => {
                warn!(%method, %url, "session token rejected, re-authenticating");
                self.invalidate_token();
                self.login().await?;
                let result = self.attempt(&method, &url, body).await;
                if matches!(result, Err(Error::SessionExpired)) {
                    self.invalidate_token();
                }
                result
            }
            other => other,
        }
    }

    /// Contract form of [`send`](Self::send): any failure is logged and
    /// reported as `None`.
    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Option<Value> {
        match self.send(method.clone(), path, body).await {
            Ok(value) => Some(value),
            Err(e) => {
                error!(%method, path, error = %e, "hub request failed");
                None
            }
        }
    }

    /// [`request`](Self::request) against a fully built URL.
    pub async fn request_url(&self, method: Method, url: Url, body: Option<&Value>) -> Option<Value> {
        let path = url.path().to_owned();
        match self.send_url(method.clone(), url, body).await {
            Ok(value) => Some(value),
            Err(e) => {
                error!(%method, path, error = %e, "hub request failed");
                None
            }
        }
    }

    async fn attempt(&self, method: &Method, url: &Url, body: Option<&Value>) -> Result<Value, Error> {
        let Some(token) = self.token() else {
            return Err(Error::MissingToken);
        };

        debug!(%method, %url, "hub request");
        let mut builder = self
            .http
            .request(method.clone(), url.clone())
            .bearer_auth(token.expose_secret());
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        match status {
            StatusCode::OK | StatusCode::CREATED => {
                let text = resp.text().await?;
                trace!(status = %status, bytes = text.len(), "hub response");
                if text.trim().is_empty() {
                    return Ok(Value::Null);
                }
                serde_json::from_str(&text).map_err(|e| Error::Deserialization {
                    message: e.to_string(),
                    body: text,
                })
            }
            StatusCode::UNAUTHORIZED => Err(Error::SessionExpired),
            _ => {
                let message = resp.text().await.unwrap_or_default();
                Err(Error::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

impl std::fmt::Debug for HubSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubSession")
            .field("endpoint", &self.endpoint)
            .field("username", &self.credentials.username)
            .field("authenticated", &self.has_token())
            .finish_non_exhaustive()
    }
}
