//! CLI configuration: thin wrapper around `wibutler_config`.
//!
//! Loads the file named by `--config` (or the platform default) and applies
//! `GlobalOpts` flag overrides (--host, --port, --tls, ...) on top.

use std::path::PathBuf;

use wibutler_core::HubConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use wibutler_config::Config;

/// Config file in effect: `--config` or the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(wibutler_config::config_path)
}

/// Load the config file + environment, then apply CLI flag overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = wibutler_config::load_config_from(&config_path(global))?;
    apply_overrides(&mut cfg, global);
    Ok(cfg)
}

fn apply_overrides(cfg: &mut Config, global: &GlobalOpts) {
    if let Some(ref host) = global.host {
        cfg.host.clone_from(host);
    }
    if let Some(port) = global.port {
        cfg.port = port;
    }
    if let Some(ref username) = global.username {
        cfg.username.clone_from(username);
    }
    if global.tls {
        cfg.use_tls = true;
    }
    if global.insecure {
        cfg.verify_tls = false;
    }
    if global.timeout.is_some() {
        cfg.timeout_secs = global.timeout;
    }
}

/// Resolve a ready-to-connect `HubConfig`.
pub fn hub_config(global: &GlobalOpts) -> Result<HubConfig, CliError> {
    let cfg = load(global)?;
    if cfg.host.trim().is_empty() {
        return Err(CliError::NoConfig {
            path: config_path(global).display().to_string(),
        });
    }
    Ok(wibutler_config::to_hub_config(&cfg)?)
}
