//! Configuration for wibutler tools.
//!
//! One TOML file plus `WIBUTLER_*` environment overrides, password
//! resolution (env + keyring + plaintext), and translation to
//! `wibutler_core::HubConfig`. The CLI layers its flag overrides on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use wibutler_core::{HubConfig, ReconnectConfig};

/// Keyring service name under which hub passwords are stored.
pub const KEYRING_SERVICE: &str = "wibutler";

/// Environment variable consulted for the password after `password_env`.
pub const PASSWORD_ENV: &str = "WIBUTLER_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for '{username}'")]
    NoCredentials { username: String },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Hub hostname or IP. A scheme prefix is tolerated and stripped.
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub username: String,

    /// Plaintext password (prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable name containing the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    #[serde(default)]
    pub use_tls: bool,

    /// Verify the hub's certificate. Hubs ship self-signed ones.
    #[serde(default)]
    pub verify_tls: bool,

    /// Request timeout. No deadline when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,

    /// Delay between the two pulses of a cover stop.
    #[serde(default = "default_stop_settle_ms")]
    pub stop_settle_ms: u64,

    #[serde(default)]
    pub reconnect: ReconnectSettings,

    #[serde(default)]
    pub defaults: Defaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            username: String::new(),
            password: None,
            password_env: None,
            use_tls: false,
            verify_tls: false,
            timeout_secs: None,
            connect_timeout_secs: None,
            stop_settle_ms: default_stop_settle_ms(),
            reconnect: ReconnectSettings::default(),
            defaults: Defaults::default(),
        }
    }
}

/// `[reconnect]`: push-channel reconnection policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReconnectSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_retries: None,
        }
    }
}

impl From<&ReconnectSettings> for ReconnectConfig {
    fn from(settings: &ReconnectSettings) -> Self {
        Self {
            enabled: settings.enabled,
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            max_retries: settings.max_retries,
        }
    }
}

/// `[defaults]`: CLI presentation defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_port() -> u16 {
    wibutler_core::DEFAULT_PORT
}
fn default_stop_settle_ms() -> u64 {
    500
}
fn default_initial_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "wibutler", "wibutler").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("wibutler");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file is not an error.
///
/// Nested keys use a double underscore: `WIBUTLER_RECONNECT__ENABLED=true`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config = file_figment(path)
        .merge(Env::prefixed("WIBUTLER_").split("__"))
        .extract()?;
    Ok(config)
}

/// Load from `path` only, ignoring the environment.
pub fn load_file(path: &Path) -> Result<Config, ConfigError> {
    Ok(file_figment(path).extract()?)
}

fn file_figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    tracing::debug!(path = %path.display(), "config written");
    Ok(())
}

// ── Validation ──────────────────────────────────────────────────────

impl Config {
    /// Presence and range checks. Reachability is not probed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "host".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "username".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.port == 0 {
            return Err(ConfigError::Validation {
                field: "port".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            return Err(ConfigError::Validation {
                field: "reconnect.initial_delay_ms".into(),
                reason: "must not exceed reconnect.max_delay_ms".into(),
            });
        }
        Ok(())
    }

    /// Keyring account for this hub login.
    pub fn keyring_account(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the password: `password_env` → `WIBUTLER_PASSWORD` → keyring →
/// plaintext.
pub fn resolve_password(cfg: &Config) -> Result<SecretString, ConfigError> {
    resolve_password_with(cfg, |name| std::env::var(name).ok(), keyring_password)
}

fn resolve_password_with(
    cfg: &Config,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Configured env var
    if let Some(ref env_name) = cfg.password_env {
        if let Some(pw) = env(env_name) {
            return Ok(SecretString::from(pw));
        }
        tracing::debug!(env = %env_name, "password_env is set but the variable is not");
    }

    // 2. Well-known env var
    if let Some(pw) = env(PASSWORD_ENV) {
        return Ok(SecretString::from(pw));
    }

    // 3. System keyring
    if let Some(pw) = keyring(&cfg.keyring_account()) {
        return Ok(SecretString::from(pw));
    }

    // 4. Plaintext in config
    if let Some(ref pw) = cfg.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        username: cfg.username.clone(),
    })
}

fn keyring_password(account: &str) -> Option<String> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, account).ok()?;
    match entry.get_password() {
        Ok(pw) => Some(pw),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            tracing::debug!(error = %e, "keyring lookup failed");
            None
        }
    }
}

/// Store `password` in the system keyring for this hub login.
pub fn store_password(cfg: &Config, password: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &cfg.keyring_account())
        .and_then(|entry| entry.set_password(password))
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `HubConfig`, resolving the password.
pub fn to_hub_config(cfg: &Config) -> Result<HubConfig, ConfigError> {
    cfg.validate()?;
    let password = resolve_password(cfg)?;
    Ok(hub_config_with(cfg, password))
}

/// Build a `HubConfig` with an already-resolved password.
pub fn hub_config_with(cfg: &Config, password: SecretString) -> HubConfig {
    HubConfig {
        host: cfg.host.trim().to_owned(),
        port: cfg.port,
        username: cfg.username.clone(),
        password,
        use_tls: cfg.use_tls,
        verify_tls: cfg.verify_tls,
        timeout: cfg.timeout_secs.map(Duration::from_secs),
        connect_timeout: cfg.connect_timeout_secs.map(Duration::from_secs),
        stop_settle: Duration::from_millis(cfg.stop_settle_ms),
        reconnect: ReconnectConfig::from(&cfg.reconnect),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn valid() -> Config {
        Config {
            host: "hub.local".into(),
            username: "admin".into(),
            ..Config::default()
        }
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.port, 8081);
        assert_eq!(cfg.stop_settle_ms, 500);
        assert!(!cfg.reconnect.enabled);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"
host = "https://hub.local"
username = "admin"
password_env = "HUB_PW"
use_tls = true
timeout_secs = 15

[reconnect]
enabled = true
max_retries = 5
"#,
        );

        let cfg = load_file(&path).unwrap();
        assert_eq!(cfg.host, "https://hub.local");
        assert_eq!(cfg.password_env.as_deref(), Some("HUB_PW"));
        assert!(cfg.use_tls);
        assert_eq!(cfg.timeout_secs, Some(15));
        assert_eq!(cfg.reconnect.max_retries, Some(5));
        assert_eq!(cfg.reconnect.initial_delay_ms, 1_000);
        assert_eq!(cfg.defaults.output, "table");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "port = \"eighty\"\n");
        assert!(matches!(load_file(&path), Err(ConfigError::Figment(_))));
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = valid();
        cfg.connect_timeout_secs = Some(3);
        cfg.reconnect.enabled = true;

        save_config_to(&cfg, &path).unwrap();
        assert_eq!(load_file(&path).unwrap(), cfg);
    }

    #[test]
    fn validation_rejects_missing_fields() {
        let mut cfg = valid();
        cfg.host = " ".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation { ref field, .. }) if field == "host"));

        let mut cfg = valid();
        cfg.username.clear();
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation { ref field, .. }) if field == "username"));

        let mut cfg = valid();
        cfg.port = 0;
        assert!(cfg.validate().is_err());

        assert!(valid().validate().is_ok());
    }

    #[test]
    fn password_chain_order() {
        let mut cfg = valid();
        cfg.password_env = Some("HUB_PW".into());
        cfg.password = Some("plain".into());

        let everything = |name: &str| match name {
            "HUB_PW" => Some("from-custom-env".to_owned()),
            PASSWORD_ENV => Some("from-env".to_owned()),
            _ => None,
        };
        let keyring = |_: &str| Some("from-keyring".to_owned());
        let none = |_: &str| None;

        let pw = resolve_password_with(&cfg, everything, keyring).unwrap();
        assert_eq!(pw.expose_secret(), "from-custom-env");

        let only_default = |name: &str| (name == PASSWORD_ENV).then(|| "from-env".to_owned());
        let pw = resolve_password_with(&cfg, only_default, keyring).unwrap();
        assert_eq!(pw.expose_secret(), "from-env");

        let pw = resolve_password_with(&cfg, none, keyring).unwrap();
        assert_eq!(pw.expose_secret(), "from-keyring");

        let pw = resolve_password_with(&cfg, none, none).unwrap();
        assert_eq!(pw.expose_secret(), "plain");

        cfg.password = None;
        assert!(matches!(
            resolve_password_with(&cfg, none, none),
            Err(ConfigError::NoCredentials { .. })
        ));
    }

    #[test]
    fn hub_config_translation() {
        let mut cfg = valid();
        cfg.timeout_secs = Some(10);
        cfg.stop_settle_ms = 250;
        cfg.reconnect.enabled = true;
        cfg.reconnect.max_retries = Some(2);

        let hub = hub_config_with(&cfg, SecretString::from("pw".to_string()));
        assert_eq!(hub.host, "hub.local");
        assert_eq!(hub.port, 8081);
        assert_eq!(hub.timeout, Some(Duration::from_secs(10)));
        assert_eq!(hub.connect_timeout, None);
        assert_eq!(hub.stop_settle, Duration::from_millis(250));
        assert!(hub.reconnect.enabled);
        assert_eq!(hub.reconnect.max_retries, Some(2));
        assert_eq!(hub.password.expose_secret(), "pw");
    }

    #[test]
    fn keyring_account_names_login() {
        assert_eq!(valid().keyring_account(), "admin@hub.local");
    }
}
