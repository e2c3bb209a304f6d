use thiserror::Error;

/// Top-level error type for the `wibutler-api` crate.
///
/// Covers every failure mode of the hub surfaces: login, REST transport,
/// response decoding, and the push stream. The contract methods on
/// [`HubSession`](crate::HubSession) absorb these into `bool` / `Option`
/// results; the typed forms are available for callers that want detail.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (non-200 status from `/api/login`).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Login answered 200 but carried no `sessionToken`.
    #[error("Login response did not contain a session token")]
    MissingToken,

    /// The hub kept rejecting the token after a fresh login.
    #[error("Session expired -- re-authentication did not help")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Non-success status from a REST endpoint.
    #[error("Hub API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// Push stream connection failed or broke mid-stream.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// Push stream closed by the hub.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates the session is gone
    /// and a fresh login might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::MissingToken | Self::SessionExpired
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) => true,
            _ => false,
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
