// ── Runtime connection configuration ──
//
// Describes *how* to connect to a hub. Carries credentials and connection
// tuning, but never touches disk; the CLI builds a `HubConfig` and hands it
// in.

use std::time::Duration;

use secrecy::SecretString;
use wibutler_api::{
    Credentials, DEFAULT_PORT, Endpoint, ReconnectConfig, TlsMode, TransportConfig,
};

use crate::error::CoreError;

/// Default delay between the two pulses of a cover stop.
pub const DEFAULT_STOP_SETTLE: Duration = Duration::from_millis(500);

/// Configuration for connecting to a single hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Hostname or IP. A scheme prefix is accepted and stripped.
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// `https`/`wss` instead of `http`/`ws`.
    pub use_tls: bool,
    /// Verify the hub certificate. Off by default (self-signed hubs).
    pub verify_tls: bool,
    /// Overall request timeout. `None` = transport default (no deadline).
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    /// Delay between the two pulses of a cover stop.
    pub stop_settle: Duration,
    /// Push-channel reconnection policy (off by default).
    pub reconnect: ReconnectConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            username: String::new(),
            password: SecretString::from(String::new()),
            use_tls: false,
            verify_tls: false,
            timeout: None,
            connect_timeout: None,
            stop_settle: DEFAULT_STOP_SETTLE,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl HubConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password,
            ..Self::default()
        }
    }

    /// Presence/type checks only; reachability is not probed.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.host.trim().is_empty() {
            return Err(CoreError::ValidationFailed {
                message: "host must not be empty".into(),
            });
        }
        if self.username.trim().is_empty() {
            return Err(CoreError::ValidationFailed {
                message: "username must not be empty".into(),
            });
        }
        if self.port == 0 {
            return Err(CoreError::ValidationFailed {
                message: "port must be greater than 0".into(),
            });
        }
        Ok(())
    }

    pub fn endpoint(&self) -> Result<Endpoint, CoreError> {
        Endpoint::new(&self.host, self.port, self.use_tls).map_err(|e| CoreError::Config {
            message: format!("invalid hub address '{}': {e}", self.host),
        })
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: TlsMode::from_verify(self.verify_tls),
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }
}
