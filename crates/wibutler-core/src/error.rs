// ── Core error types ──
//
// User-facing errors from wibutler-core. Entity commands never raise; these
// cover hub setup, lookups, and the typed command path used by hosts.
// The `From<wibutler_api::Error>` impl translates transport-layer errors
// into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to hub at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Hub connection is closed")]
    HubClosed,

    // ── Lookup errors ────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Entity not found: {identifier}")]
    EntityNotFound { identifier: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Operation not supported: {operation} on {entity}")]
    Unsupported { operation: String, entity: String },

    #[error("Command had no effect: {message}")]
    CommandFailed { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<wibutler_api::Error> for CoreError {
    fn from(err: wibutler_api::Error) -> Self {
        use wibutler_api::Error as ApiError;

        match err {
            ApiError::Authentication { message } => CoreError::AuthenticationFailed { message },
            ApiError::MissingToken => CoreError::AuthenticationFailed {
                message: "hub did not return a session token".into(),
            },
            ApiError::SessionExpired => CoreError::AuthenticationFailed {
                message: "session expired -- re-authentication did not help".into(),
            },
            ApiError::Transport(ref e) => CoreError::ConnectionFailed {
                url: e.url().map(ToString::to_string).unwrap_or_default(),
                reason: e.to_string(),
            },
            ApiError::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ApiError::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            ApiError::Api { status, message } => CoreError::CommandFailed {
                message: format!("HTTP {status}: {message}"),
            },
            ApiError::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("push channel connection failed: {reason}"),
            },
            ApiError::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("push channel closed (code {code}): {reason}"),
            },
            ApiError::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_authentication_failed() {
        let err = CoreError::from(wibutler_api::Error::MissingToken);
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));

        let err = CoreError::from(wibutler_api::Error::SessionExpired);
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
    }

    #[test]
    fn websocket_errors_map_to_connection_failed() {
        let err = CoreError::from(wibutler_api::Error::WebSocketConnect("refused".into()));
        assert!(err.to_string().contains("refused"));
        assert!(matches!(err, CoreError::ConnectionFailed { .. }));
    }

    #[test]
    fn api_status_is_kept_in_message() {
        let err = CoreError::from(wibutler_api::Error::Api {
            status: 400,
            message: "bad value".into(),
        });
        assert_eq!(err.to_string(), "Command had no effect: HTTP 400: bad value");
    }
}
