// Room operating panel (`RoomOperatingPanels`).

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use wibutler_api::{Component, ComponentCommand, Device, HubSession};

use super::last_component;
use crate::codec;
use crate::registry::DeviceListener;
use crate::stream::StateStream;

/// Heating mode. Panels always report heat; off is offered but not
/// switchable through the hub.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HvacMode {
    #[default]
    Heat,
    Off,
}

/// Modes a panel advertises.
pub const HVAC_MODES: [HvacMode; 2] = [HvacMode::Heat, HvacMode::Off];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClimateState {
    /// °C from `TMP`.
    pub current_temperature: Option<f64>,
    /// °C from `TSP`.
    pub target_temperature: Option<f64>,
    pub hvac_mode: HvacMode,
}

impl ClimateState {
    fn apply(&mut self, device_id: &str, components: &[Component]) -> bool {
        let before = self.clone();

        if let Some(tmp) = last_component(components, "TMP") {
            match codec::decode_temperature(&tmp.value) {
                Some(c) => self.current_temperature = Some(c),
                None => tracing::warn!(device_id, raw = %tmp.value, "unparsable TMP value"),
            }
        }
        if let Some(tsp) = last_component(components, "TSP") {
            match codec::decode_setpoint(&tsp.value) {
                Some(c) => self.target_temperature = Some(c),
                None => tracing::warn!(device_id, raw = %tsp.value, "unparsable TSP value"),
            }
        }

        *self != before
    }
}

pub struct Climate {
    session: Arc<HubSession>,
    device_id: String,
    name: String,
    state: watch::Sender<ClimateState>,
}

impl Climate {
    pub fn new(session: Arc<HubSession>, device: &Device) -> Self {
        let mut initial = ClimateState::default();
        initial.apply(&device.id, &device.components);
        Self {
            session,
            device_id: device.id.clone(),
            name: device.name.clone(),
            state: watch::Sender::new(initial),
        }
    }

    /// Climate entities use the bare device id.
    pub fn unique_id(&self) -> &str {
        &self.device_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ClimateState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> StateStream<ClimateState> {
        StateStream::new(self.state.subscribe())
    }

    pub fn hvac_modes(&self) -> &'static [HvacMode] {
        &HVAC_MODES
    }

    pub async fn set_temperature(&self, celsius: f64) -> bool {
        let raw = codec::encode_setpoint(celsius);
        let ok = self
            .session
            .patch_component(&self.device_id, "TSP", &ComponentCommand::numeric(raw))
            .await;

        if ok {
            tracing::info!(entity = %self.name, celsius, raw, "target temperature set");
            self.state.send_if_modified(|s| {
                let changed = s.target_temperature != Some(celsius);
                s.target_temperature = Some(celsius);
                changed
            });
        } else {
            tracing::error!(entity = %self.name, celsius, "setting temperature had no effect");
        }
        ok
    }
}

impl DeviceListener for Climate {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn receive_update(&self, device_id: &str, components: &[Component]) {
        self.state.send_if_modified(|s| s.apply(device_id, components));
    }
}
