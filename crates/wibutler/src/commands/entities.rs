//! Entity listing.

use serde::Serialize;
use tabled::Tabled;
use wibutler_core::{Entity, EntityKind, EntityState, Hub, HubConfig};

use crate::cli::{EntitiesArgs, EntitiesCommand, EntityKindArg, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Serializable snapshot of one entity.
#[derive(Debug, Serialize)]
pub struct EntityView {
    pub unique_id: String,
    pub kind: EntityKind,
    pub name: String,
    pub device_id: String,
    pub state: EntityState,
}

impl From<&Entity> for EntityView {
    fn from(e: &Entity) -> Self {
        Self {
            unique_id: e.unique_id().to_owned(),
            kind: e.kind(),
            name: e.name().to_owned(),
            device_id: e.device_id().to_owned(),
            state: e.state(),
        }
    }
}

#[derive(Tabled)]
struct EntityRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
}

impl From<&EntityView> for EntityRow {
    fn from(v: &EntityView) -> Self {
        Self {
            id: v.unique_id.clone(),
            kind: v.kind.to_string(),
            name: v.name.clone(),
            state: v.state.to_string(),
        }
    }
}

impl From<EntityKindArg> for EntityKind {
    fn from(arg: EntityKindArg) -> Self {
        match arg {
            EntityKindArg::Switch => Self::Switch,
            EntityKindArg::Light => Self::Light,
            EntityKindArg::Climate => Self::Climate,
            EntityKindArg::Cover => Self::Cover,
            EntityKindArg::Button => Self::Button,
            EntityKindArg::Sensor => Self::Sensor,
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    hub_config: HubConfig,
    args: EntitiesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        EntitiesCommand::List { kind } => {
            let wanted = kind.map(EntityKind::from);
            let views: Vec<EntityView> = Hub::oneshot(hub_config, |hub| async move {
                Ok(hub
                    .entities()
                    .iter()
                    .filter(|e| wanted.is_none_or(|k| e.kind() == k))
                    .map(EntityView::from)
                    .collect())
            })
            .await?;

            let out = output::render_list(&global.output, &views, |v| EntityRow::from(v), |v| {
                v.unique_id.clone()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
