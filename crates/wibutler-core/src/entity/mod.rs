// ── Entity consumers ──
//
// One consumer per controllable aspect of a device. Each variant binds to a
// single device id, decodes the components it cares about, and encodes
// host commands into component PATCHes.

mod button;
mod climate;
mod cover;
mod light;
mod sensor;
mod switch;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_core::Stream;
use serde::Serialize;
use tokio_stream::StreamExt;
use wibutler_api::{Component, Device, HubSession};

pub use button::{Button, ButtonState};
pub use climate::{Climate, ClimateState, HVAC_MODES, HvacMode};
pub use cover::{Cover, CoverPhase, CoverState, Direction};
pub use light::{Light, LightState};
pub use sensor::{Sensor, SensorState};
pub use switch::{Switch, SwitchState};

use crate::config::DEFAULT_STOP_SETTLE;
use crate::error::CoreError;
use crate::registry::DeviceListener;

/// Last component named `name` in a (possibly partial) list.
pub(crate) fn last_component<'a>(components: &'a [Component], name: &str) -> Option<&'a Component> {
    components.iter().rev().find(|c| c.name == name)
}

// ── Device classification ────────────────────────────────────────────

/// Vendor device category, from the directory's `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// `RoomOperatingPanels` → climate.
    RoomOperatingPanel,
    /// `Blind` → cover.
    Blind,
    /// `DimminActuators` (vendor spelling) → light.
    DimmingActuator,
    /// `SwitchingRelays` → switch.
    SwitchingRelay,
    /// `FloorHeatingController` → sensors.
    FloorHeatingController,
    Other(String),
}

impl DeviceKind {
    pub fn from_type(kind: &str) -> Self {
        match kind {
            "RoomOperatingPanels" => Self::RoomOperatingPanel,
            "Blind" => Self::Blind,
            "DimminActuators" => Self::DimmingActuator,
            "SwitchingRelays" => Self::SwitchingRelay,
            "FloorHeatingController" => Self::FloorHeatingController,
            other => Self::Other(other.to_owned()),
        }
    }

    /// The vendor spelling.
    pub fn as_str(&self) -> &str {
        match self {
            Self::RoomOperatingPanel => "RoomOperatingPanels",
            Self::Blind => "Blind",
            Self::DimmingActuator => "DimminActuators",
            Self::SwitchingRelay => "SwitchingRelays",
            Self::FloorHeatingController => "FloorHeatingController",
            Self::Other(other) => other,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Entity kinds, states, commands ───────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Switch,
    Light,
    Climate,
    Cover,
    Button,
    Sensor,
}

/// Snapshot of any entity's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityState {
    Switch(SwitchState),
    Light(LightState),
    Climate(ClimateState),
    Cover(CoverState),
    Button(ButtonState),
    Sensor(SensorState),
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Switch(s) => match s.is_on {
                Some(true) => f.write_str("on"),
                Some(false) => f.write_str("off"),
                None => f.write_str("unknown"),
            },
            Self::Light(s) if s.is_on => write!(f, "on, {}%", s.brightness_pct),
            Self::Light(_) => f.write_str("off"),
            Self::Climate(s) => {
                let fmt_temp = |t: Option<f64>| t.map_or_else(|| "?".to_owned(), |v| format!("{v:.1}°C"));
                write!(
                    f,
                    "{} -> {} ({})",
                    fmt_temp(s.current_temperature),
                    fmt_temp(s.target_temperature),
                    s.hvac_mode
                )
            }
            Self::Cover(s) => write!(f, "{}", s.phase()),
            Self::Button(s) => f.write_str(if s.pressed { "pressed" } else { "released" }),
            Self::Sensor(s) => match s.unit {
                Some(unit) => write!(f, "{} {unit}", s.value),
                None => write!(f, "{}", s.value),
            },
        }
    }
}

/// A host-issued command.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityCommand {
    /// Switch or light on; `brightness` is host scale 0..=255.
    TurnOn { brightness: Option<u8> },
    TurnOff,
    Open,
    Close,
    Stop,
    /// Cover position, percent open.
    SetPosition(u8),
    /// Target temperature in °C.
    SetTemperature(f64),
}

impl EntityCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::TurnOn { .. } => "turn_on",
            Self::TurnOff => "turn_off",
            Self::Open => "open",
            Self::Close => "close",
            Self::Stop => "stop",
            Self::SetPosition(_) => "set_position",
            Self::SetTemperature(_) => "set_temperature",
        }
    }
}

/// Per-hub construction options.
#[derive(Debug, Clone)]
pub struct EntityOptions {
    pub stop_settle: Duration,
}

impl Default for EntityOptions {
    fn default() -> Self {
        Self {
            stop_settle: DEFAULT_STOP_SETTLE,
        }
    }
}

// ── Entity ───────────────────────────────────────────────────────────

/// Boxed stream of state changes.
pub type StateChanges = std::pin::Pin<Box<dyn Stream<Item = EntityState> + Send>>;

/// Any consumer built from the device directory.
#[derive(Clone)]
pub enum Entity {
    Switch(Arc<Switch>),
    Light(Arc<Light>),
    Climate(Arc<Climate>),
    Cover(Arc<Cover>),
    Button(Arc<Button>),
    Sensor(Arc<Sensor>),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Switch(_) => EntityKind::Switch,
            Self::Light(_) => EntityKind::Light,
            Self::Climate(_) => EntityKind::Climate,
            Self::Cover(_) => EntityKind::Cover,
            Self::Button(_) => EntityKind::Button,
            Self::Sensor(_) => EntityKind::Sensor,
        }
    }

    pub fn unique_id(&self) -> &str {
        match self {
            Self::Switch(e) => e.unique_id(),
            Self::Light(e) => e.unique_id(),
            Self::Climate(e) => e.unique_id(),
            Self::Cover(e) => e.unique_id(),
            Self::Button(e) => e.unique_id(),
            Self::Sensor(e) => e.unique_id(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Switch(e) => e.name(),
            Self::Light(e) => e.name(),
            Self::Climate(e) => e.name(),
            Self::Cover(e) => e.name(),
            Self::Button(e) => e.name(),
            Self::Sensor(e) => e.name(),
        }
    }

    pub fn device_id(&self) -> &str {
        self.listener_ref().device_id()
    }

    pub fn state(&self) -> EntityState {
        match self {
            Self::Switch(e) => EntityState::Switch(e.state()),
            Self::Light(e) => EntityState::Light(e.state()),
            Self::Climate(e) => EntityState::Climate(e.state()),
            Self::Cover(e) => EntityState::Cover(e.state()),
            Self::Button(e) => EntityState::Button(e.state()),
            Self::Sensor(e) => EntityState::Sensor(e.state()),
        }
    }

    /// Each state change from now on.
    pub fn changes(&self) -> StateChanges {
        match self {
            Self::Switch(e) => Box::pin(e.subscribe().into_stream().map(EntityState::Switch)),
            Self::Light(e) => Box::pin(e.subscribe().into_stream().map(EntityState::Light)),
            Self::Climate(e) => Box::pin(e.subscribe().into_stream().map(EntityState::Climate)),
            Self::Cover(e) => Box::pin(e.subscribe().into_stream().map(EntityState::Cover)),
            Self::Button(e) => Box::pin(e.subscribe().into_stream().map(EntityState::Button)),
            Self::Sensor(e) => Box::pin(e.subscribe().into_stream().map(EntityState::Sensor)),
        }
    }

    fn listener_ref(&self) -> &dyn DeviceListener {
        match self {
            Self::Switch(e) => e.as_ref(),
            Self::Light(e) => e.as_ref(),
            Self::Climate(e) => e.as_ref(),
            Self::Cover(e) => e.as_ref(),
            Self::Button(e) => e.as_ref(),
            Self::Sensor(e) => e.as_ref(),
        }
    }

    /// Registry handle for this entity.
    pub fn listener(&self) -> Arc<dyn DeviceListener> {
        match self {
            Self::Switch(e) => Arc::clone(e) as Arc<dyn DeviceListener>,
            Self::Light(e) => Arc::clone(e) as Arc<dyn DeviceListener>,
            Self::Climate(e) => Arc::clone(e) as Arc<dyn DeviceListener>,
            Self::Cover(e) => Arc::clone(e) as Arc<dyn DeviceListener>,
            Self::Button(e) => Arc::clone(e) as Arc<dyn DeviceListener>,
            Self::Sensor(e) => Arc::clone(e) as Arc<dyn DeviceListener>,
        }
    }

    /// Run `command` against this entity.
    ///
    /// The entity methods themselves never fail loudly; a command the hub
    /// did not accept comes back as [`CoreError::CommandFailed`].
    pub async fn execute(&self, command: EntityCommand) -> Result<(), CoreError> {
        let accepted = match (self, &command) {
            (Self::Switch(e), EntityCommand::TurnOn { brightness: None }) => e.turn_on().await,
            (Self::Switch(e), EntityCommand::TurnOff) => e.turn_off().await,
            (Self::Light(e), EntityCommand::TurnOn { brightness }) => e.turn_on(*brightness).await,
            (Self::Light(e), EntityCommand::TurnOff) => e.turn_off().await,
            (Self::Cover(e), EntityCommand::Open) => e.open().await,
            (Self::Cover(e), EntityCommand::Close) => e.close().await,
            (Self::Cover(e), EntityCommand::Stop) => e.stop().await,
            (Self::Cover(e), EntityCommand::SetPosition(position)) => {
                if *position > 100 {
                    return Err(CoreError::ValidationFailed {
                        message: format!("position must be 0-100, got {position}"),
                    });
                }
                e.set_position(*position).await
            }
            (Self::Climate(e), EntityCommand::SetTemperature(celsius)) => {
                if !celsius.is_finite() {
                    return Err(CoreError::ValidationFailed {
                        message: format!("invalid temperature {celsius}"),
                    });
                }
                e.set_temperature(*celsius).await
            }
            _ => {
                return Err(CoreError::Unsupported {
                    operation: command.name().to_owned(),
                    entity: format!("{} '{}'", self.kind(), self.unique_id()),
                });
            }
        };

        if accepted {
            Ok(())
        } else {
            Err(CoreError::CommandFailed {
                message: format!("{} on '{}'", command.name(), self.unique_id()),
            })
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("kind", &self.kind())
            .field("unique_id", &self.unique_id())
            .field("state", &self.state())
            .finish()
    }
}

// ── Construction ─────────────────────────────────────────────────────

/// Build every consumer for one device snapshot.
///
/// The device's kind yields at most one primary entity (or one sensor per
/// qualifying output); every `BTN*` component yields a button regardless
/// of kind.
pub fn build_for_device(
    session: &Arc<HubSession>,
    device: &Device,
    options: &EntityOptions,
) -> Vec<Entity> {
    let mut entities = Vec::new();

    match DeviceKind::from_type(&device.kind) {
        DeviceKind::RoomOperatingPanel => {
            entities.push(Entity::Climate(Arc::new(Climate::new(Arc::clone(session), device))));
        }
        DeviceKind::Blind => {
            entities.push(Entity::Cover(Arc::new(Cover::new(
                Arc::clone(session),
                device,
                options.stop_settle,
            ))));
        }
        DeviceKind::DimmingActuator => {
            entities.push(Entity::Light(Arc::new(Light::new(Arc::clone(session), device))));
        }
        DeviceKind::SwitchingRelay => {
            entities.push(Entity::Switch(Arc::new(Switch::new(Arc::clone(session), device))));
        }
        DeviceKind::FloorHeatingController => {
            entities.extend(
                device
                    .components
                    .iter()
                    .filter(|c| Sensor::qualifies(device, c))
                    .map(|c| Entity::Sensor(Arc::new(Sensor::new(device, c)))),
            );
        }
        DeviceKind::Other(kind) => {
            tracing::trace!(device_id = %device.id, %kind, "no primary entity for device type");
        }
    }

    entities.extend(
        device
            .components
            .iter()
            .filter(|c| c.name.starts_with("BTN"))
            .map(|c| Entity::Button(Arc::new(Button::new(device, c)))),
    );

    entities
}
