// Dimmable light (`DimminActuators`).

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use wibutler_api::{Component, ComponentCommand, Device, HubSession};

use super::last_component;
use crate::codec::{self, BRIGHTNESS_FLOOR_PCT, DEFAULT_LAST_BRIGHTNESS_PCT};
use crate::registry::DeviceListener;
use crate::stream::StateStream;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LightState {
    pub is_on: bool,
    /// Vendor percent; 0 whenever the light is below the floor.
    pub brightness_pct: u8,
    /// Restored by a plain `turn_on`.
    pub last_brightness_pct: u8,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            is_on: false,
            brightness_pct: 0,
            last_brightness_pct: DEFAULT_LAST_BRIGHTNESS_PCT,
        }
    }
}

impl LightState {
    /// Host-scale brightness (0..=255).
    pub fn brightness(&self) -> u8 {
        codec::pct_to_host(self.brightness_pct)
    }

    /// Decode `BRI_LVL`, then `STATE`, then `SWT`, whatever their order in
    /// the list, so a switch value sees the brightness from the same delta.
    /// A level below the floor in the same list forces the light off last.
    fn apply(&mut self, components: &[Component]) -> bool {
        let before = self.clone();

        if let Some(level) = last_component(components, "BRI_LVL") {
            match codec::decode_brightness_pct(&level.value) {
                Some(pct) => {
                    self.brightness_pct = pct;
                    self.last_brightness_pct = pct;
                }
                None => {
                    self.brightness_pct = 0;
                    self.is_on = false;
                }
            }
        }
        if let Some(state) = last_component(components, "STATE") {
            self.is_on = codec::decode_dimmer_state(&state.value);
        }
        if let Some(switch) = last_component(components, "SWT") {
            if codec::switch_forces_off(&switch.value) {
                self.is_on = false;
            } else if self.brightness_pct >= BRIGHTNESS_FLOOR_PCT {
                self.is_on = true;
            }
        }
        // A reported level below the floor holds the light off whatever
        // STATE says.
        if self.brightness_pct < BRIGHTNESS_FLOOR_PCT
            && last_component(components, "BRI_LVL").is_some()
        {
            self.is_on = false;
        }

        *self != before
    }
}

pub struct Light {
    session: Arc<HubSession>,
    device_id: String,
    unique_id: String,
    name: String,
    state: watch::Sender<LightState>,
}

impl Light {
    pub fn new(session: Arc<HubSession>, device: &Device) -> Self {
        let mut initial = LightState::default();
        initial.apply(&device.components);
        Self {
            session,
            device_id: device.id.clone(),
            unique_id: format!("{}_{}", device.id, device.name),
            name: device.name.clone(),
            state: watch::Sender::new(initial),
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> LightState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> StateStream<LightState> {
        StateStream::new(self.state.subscribe())
    }

    /// Switch on at `brightness` (host 0..=255), or at the remembered level.
    ///
    /// Levels below the floor turn the light off instead.
    pub async fn turn_on(&self, brightness: Option<u8>) -> bool {
        let pct = brightness.map_or_else(
            || self.state.borrow().last_brightness_pct,
            codec::host_to_pct,
        );

        if pct < BRIGHTNESS_FLOOR_PCT {
            tracing::debug!(entity = %self.name, pct, "brightness below floor, turning off");
            return self.turn_off().await;
        }

        let switched = self
            .session
            .patch_component(&self.device_id, "SWT", &ComponentCommand::switch(true))
            .await;
        let dimmed = self
            .session
            .patch_component(&self.device_id, "BRI_LVL", &ComponentCommand::numeric(pct))
            .await;

        if switched && dimmed {
            tracing::info!(entity = %self.name, pct, "light on");
            self.state.send_if_modified(|s| {
                let before = s.clone();
                s.is_on = true;
                s.brightness_pct = pct;
                s.last_brightness_pct = pct;
                *s != before
            });
            true
        } else {
            tracing::error!(entity = %self.name, switched, dimmed, "light on/dim had no effect");
            false
        }
    }

    pub async fn turn_off(&self) -> bool {
        // Remember the level for the next plain turn_on, even if the
        // command below fails.
        self.state.send_if_modified(|s| {
            if s.brightness_pct >= BRIGHTNESS_FLOOR_PCT && s.last_brightness_pct != s.brightness_pct {
                s.last_brightness_pct = s.brightness_pct;
                return true;
            }
            false
        });

        let ok = self
            .session
            .patch_component(&self.device_id, "SWT", &ComponentCommand::switch(false))
            .await;

        if ok {
            self.state.send_if_modified(|s| {
                let before = s.clone();
                s.is_on = false;
                s.brightness_pct = 0;
                *s != before
            });
            tracing::info!(
                entity = %self.name,
                last_pct = self.state.borrow().last_brightness_pct,
                "light off"
            );
        } else {
            tracing::error!(entity = %self.name, "light off had no effect");
        }
        ok
    }
}

impl DeviceListener for Light {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn receive_update(&self, _device_id: &str, components: &[Component]) {
        self.state.send_if_modified(|s| s.apply(components));
    }
}
