//! Config subcommand handlers.

use dialoguer::{Confirm, Input, Password, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of `cfg` that is safe to print.
fn redacted(cfg: &Config) -> Config {
    let mut out = cfg.clone();
    if out.password.is_some() {
        out.password = Some("****".into());
    }
    out
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Offer keyring storage for the password.
///
/// Returns `Some(password)` if the user chose plaintext, `None` if stored
/// in the keyring.
fn prompt_password_storage(cfg: &Config, password: String) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where should the password be kept?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        wibutler_config::store_password(cfg, &password)?;
        eprintln!("   ✓ password stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(password))
    }
}

fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_path(global);
    if path.exists() {
        let overwrite = Confirm::new()
            .with_prompt(format!("{} exists. Overwrite?", path.display()))
            .default(false)
            .interact()
            .map_err(prompt_err)?;
        if !overwrite {
            return Ok(());
        }
    }

    let mut cfg = Config::default();

    cfg.host = Input::new()
        .with_prompt("Hub host or IP")
        .with_initial_text(global.host.clone().unwrap_or_default())
        .interact_text()
        .map_err(prompt_err)?;
    cfg.port = Input::new()
        .with_prompt("Port")
        .default(global.port.unwrap_or(cfg.port))
        .interact_text()
        .map_err(prompt_err)?;
    cfg.use_tls = Confirm::new()
        .with_prompt("Use https/wss?")
        .default(global.tls)
        .interact()
        .map_err(prompt_err)?;
    cfg.username = Input::new()
        .with_prompt("Username")
        .with_initial_text(global.username.clone().unwrap_or_default())
        .interact_text()
        .map_err(prompt_err)?;

    cfg.validate()?;

    let password = Password::new()
        .with_prompt("Password")
        .interact()
        .map_err(prompt_err)?;
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "cannot be empty".into(),
        });
    }
    cfg.password = prompt_password_storage(&cfg, password)?;

    wibutler_config::save_config_to(&cfg, &path)?;
    eprintln!("   ✓ config written to {}", path.display());
    Ok(())
}

fn show(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = redacted(&config::load(global)?);

    let out = match global.output {
        OutputFormat::Table | OutputFormat::Plain => toml::to_string_pretty(&cfg)
            .map_err(|e| CliError::Config(wibutler_config::ConfigError::Serialization(e)))?,
        _ => output::render_single(&global.output, &cfg, |_| String::new(), |_| String::new()),
    };
    output::print_output(out.trim_end(), global.quiet);
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global),
        ConfigCommand::Show => show(global),
        ConfigCommand::Path => {
            output::print_output(&config::config_path(global).display().to_string(), false);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redaction_masks_plaintext_password_only() {
        let cfg = Config {
            password: Some("hunter2".into()),
            password_env: Some("HUB_PW".into()),
            ..Config::default()
        };
        let shown = redacted(&cfg);
        assert_eq!(shown.password.as_deref(), Some("****"));
        assert_eq!(shown.password_env.as_deref(), Some("HUB_PW"));

        assert_eq!(redacted(&Config::default()).password, None);
    }
}
