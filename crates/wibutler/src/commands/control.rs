//! Switch, light, cover, and climate commands.
//!
//! Each invocation connects without the push channel, runs one entity
//! command, prints the resulting state, and closes.

use wibutler_core::{CoreError, Direction, Entity, EntityCommand, Hub, HubConfig};

use crate::cli::{
    ClimateArgs, ClimateCommand, CoverArgs, CoverCommand, CoverDirection, GlobalOpts, LightArgs,
    LightCommand, SwitchArgs, SwitchCommand,
};
use crate::error::CliError;
use crate::output;

use super::entities::EntityView;

pub async fn switch(
    hub_config: HubConfig,
    args: SwitchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (entity, command) = match args.command {
        SwitchCommand::On { entity } => (entity, EntityCommand::TurnOn { brightness: None }),
        SwitchCommand::Off { entity } => (entity, EntityCommand::TurnOff),
    };
    run(hub_config, entity, command, None, global).await
}

pub async fn light(
    hub_config: HubConfig,
    args: LightArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (entity, command) = match args.command {
        LightCommand::On { entity, brightness } => (entity, EntityCommand::TurnOn { brightness }),
        LightCommand::Off { entity } => (entity, EntityCommand::TurnOff),
    };
    run(hub_config, entity, command, None, global).await
}

pub async fn cover(
    hub_config: HubConfig,
    args: CoverArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (entity, command, last) = match args.command {
        CoverCommand::Open { entity } => (entity, EntityCommand::Open, None),
        CoverCommand::Close { entity } => (entity, EntityCommand::Close, None),
        CoverCommand::Stop { entity, last } => (
            entity,
            EntityCommand::Stop,
            last.map(|d| match d {
                CoverDirection::Open => Direction::Up,
                CoverDirection::Close => Direction::Down,
            }),
        ),
        CoverCommand::Position { entity, percent } => {
            (entity, EntityCommand::SetPosition(percent), None)
        }
    };
    run(hub_config, entity, command, last, global).await
}

pub async fn climate(
    hub_config: HubConfig,
    args: ClimateArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ClimateCommand::Set { entity, celsius } => {
            run(
                hub_config,
                entity,
                EntityCommand::SetTemperature(celsius),
                None,
                global,
            )
            .await
        }
    }
}

/// Connect, optionally seed a cover's last direction, execute, print.
async fn run(
    hub_config: HubConfig,
    unique_id: String,
    command: EntityCommand,
    last_direction: Option<Direction>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    tracing::debug!(entity = %unique_id, ?command, "executing");

    let view = Hub::oneshot(hub_config, |hub| async move {
        if let (Some(direction), Some(Entity::Cover(cover))) =
            (last_direction, hub.entity(&unique_id))
        {
            cover.remember_direction(direction);
        }
        hub.execute(&unique_id, command).await?;
        hub.entity(&unique_id)
            .map(EntityView::from)
            .ok_or_else(|| CoreError::EntityNotFound {
                identifier: unique_id.clone(),
            })
    })
    .await?;

    let out = output::render_single(
        &global.output,
        &view,
        |v| format!("{}: {}", v.unique_id, v.state),
        |v| v.state.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
