//! Command handlers, one module per top-level subcommand.

pub mod config_cmd;
mod control;
mod devices;
mod entities;
mod watch;

use wibutler_core::HubConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Route a hub-backed command to its handler.
pub async fn dispatch(
    cmd: Command,
    hub_config: HubConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(hub_config, args, global).await,
        Command::Entities(args) => entities::handle(hub_config, args, global).await,
        Command::Watch(args) => watch::handle(hub_config, args, global).await,
        Command::Switch(args) => control::switch(hub_config, args, global).await,
        Command::Light(args) => control::light(hub_config, args, global).await,
        Command::Cover(args) => control::cover(hub_config, args, global).await,
        Command::Climate(args) => control::climate(hub_config, args, global).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command does not use a hub connection".into(),
        )),
    }
}
