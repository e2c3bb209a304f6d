//! Entity model and live dispatch on top of `wibutler-api`.
//!
//! - **[`Hub`]** owns one hub connection: it authenticates, snapshots the
//!   device directory, builds an [`Entity`] per controllable aspect, and
//!   runs the push channel in a background task until [`Hub::close`].
//!
//! - **[`DispatchRegistry`]** routes each pushed delta to the listeners
//!   registered for that device id, synchronously and in registration
//!   order.
//!
//! - **Entities** ([`entity`]) decode vendor component values into host
//!   state (see [`codec`]) and encode host commands as component PATCHes.
//!   Each exposes a [`StateStream`] in place of a "state changed" callback.

pub mod codec;
pub mod config;
pub mod entity;
pub mod error;
pub mod hub;
pub mod registry;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DEFAULT_STOP_SETTLE, HubConfig};
pub use entity::{
    Button, ButtonState, Climate, ClimateState, Cover, CoverPhase, CoverState, DeviceKind,
    Direction, Entity, EntityCommand, EntityKind, EntityOptions, EntityState, HvacMode, Light,
    LightState, Sensor, SensorState, Switch, SwitchState,
};
pub use error::CoreError;
pub use hub::Hub;
pub use registry::{DeviceListener, DispatchRegistry};
pub use stream::{StateStream, StateWatchStream};

// Wire types hosts commonly need alongside the entity model.
pub use wibutler_api::{Component, DEFAULT_PORT, Device, ReconnectConfig, StreamState};
