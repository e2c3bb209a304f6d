//! Device directory handlers.

use tabled::Tabled;
use wibutler_core::{Device, DeviceKind, Hub, HubConfig};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Components")]
    components: usize,
}

impl From<&Device> for DeviceRow {
    fn from(d: &Device) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            kind: DeviceKind::from_type(&d.kind).to_string(),
            components: d.components.len(),
        }
    }
}

fn detail(d: &Device) -> String {
    let mut lines = vec![
        format!("ID:       {}", d.id),
        format!("Name:     {}", d.name),
        format!("Type:     {}", d.kind),
    ];
    if !d.components.is_empty() {
        lines.push("Components:".into());
    }
    for c in &d.components {
        let mut line = format!("  {:<10} {}", c.name, c.value);
        if !c.text.is_empty() {
            line.push_str(&format!("  ({})", c.text));
        }
        if c.readonly {
            line.push_str("  [ro]");
        }
        lines.push(line);
    }
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    hub_config: HubConfig,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::List => {
            let devices: Vec<Device> = Hub::oneshot(hub_config, |hub| async move {
                Ok(hub.devices().values().cloned().collect())
            })
            .await?;

            let out = output::render_list(&global.output, &devices, |d| DeviceRow::from(d), |d| {
                d.id.clone()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Get { device } => {
            let found = Hub::oneshot(hub_config, |hub| async move {
                hub.device(&device).cloned()
            })
            .await?;

            let out = output::render_single(&global.output, &found, detail, |d| d.id.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
