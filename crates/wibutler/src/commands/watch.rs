//! Live state watcher.

use serde::Serialize;
use tokio_stream::{StreamExt, StreamMap};
use wibutler_core::{EntityState, Hub, HubConfig, StreamState};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ChangeLine<'a> {
    time: String,
    entity: &'a str,
    state: &'a EntityState,
}

fn print_change(global: &GlobalOpts, color: bool, entity: &str, state: &EntityState) {
    let time = chrono::Local::now().format("%H:%M:%S").to_string();
    let line = match global.output {
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => {
            output::json_line(&ChangeLine {
                time,
                entity,
                state,
            })
        }
        OutputFormat::Table | OutputFormat::Plain => format!(
            "{} {} {state}",
            output::dim(&time, color),
            output::accent(entity, color)
        ),
    };
    output::print_output(&line, global.quiet);
}

pub async fn handle(
    mut hub_config: HubConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.reconnect {
        hub_config.reconnect.enabled = true;
    }
    let reconnect = hub_config.reconnect.enabled;

    let hub = Hub::connect(hub_config).await?;
    let color = output::should_color(&global.color);

    if let Some(missing) = args.entity.iter().find(|id| hub.entity(id).is_none()) {
        let identifier = missing.clone();
        hub.close().await;
        return Err(CliError::NotFound {
            resource_type: "entity".into(),
            identifier,
            list_command: "entities list".into(),
        });
    }

    let mut changes = StreamMap::new();
    for entity in hub.entities() {
        if args.entity.is_empty() || args.entity.iter().any(|id| id == entity.unique_id()) {
            print_change(global, color, entity.unique_id(), &entity.state());
            changes.insert(entity.unique_id().to_owned(), entity.changes());
        }
    }

    let mut stream_state = hub.stream_state();
    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("interrupted");
                break Ok(());
            }
            Some((entity, state)) = changes.next() => {
                print_change(global, color, &entity, &state);
            }
            changed = stream_state.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = *stream_state.borrow_and_update();
                tracing::info!(%state, "push channel");
                match state {
                    StreamState::Failed if !reconnect => {
                        break Err(CliError::ConnectionFailed {
                            url: hub.session().endpoint().to_string(),
                            reason: "push channel failed (use --reconnect to retry)".into(),
                        });
                    }
                    StreamState::Stopped if !reconnect => break Ok(()),
                    _ => {}
                }
            }
        }
    };

    hub.close().await;
    result
}
