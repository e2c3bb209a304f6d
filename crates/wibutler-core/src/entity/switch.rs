// Relay switch (`SwitchingRelays`).

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use wibutler_api::{Component, ComponentCommand, Device, HubSession};

use super::last_component;
use crate::codec;
use crate::registry::DeviceListener;
use crate::stream::StateStream;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SwitchState {
    /// `None` until the hub has reported `STATE`.
    pub is_on: Option<bool>,
}

impl SwitchState {
    fn apply(&mut self, components: &[Component]) -> bool {
        let before = self.clone();
        if let Some(state) = last_component(components, "STATE") {
            self.is_on = Some(codec::decode_relay_state(&state.value));
        }
        *self != before
    }
}

pub struct Switch {
    session: Arc<HubSession>,
    device_id: String,
    unique_id: String,
    name: String,
    state: watch::Sender<SwitchState>,
}

impl Switch {
    pub fn new(session: Arc<HubSession>, device: &Device) -> Self {
        let mut initial = SwitchState::default();
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

    pub fn state(&self) -> SwitchState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> StateStream<SwitchState> {
        StateStream::new(self.state.subscribe())
    }

    pub async fn turn_on(&self) -> bool {
        self.set(true).await
    }

    pub async fn turn_off(&self) -> bool {
        self.set(false).await
    }

    async fn set(&self, on: bool) -> bool {
        let ok = self
            .session
            .patch_component(&self.device_id, "SWT", &ComponentCommand::switch(on))
            .await;
        if ok {
            tracing::info!(entity = %self.name, on, "switch updated");
            self.state.send_if_modified(|s| {
                let changed = s.is_on != Some(on);
                s.is_on = Some(on);
                changed
            });
        } else {
            tracing::error!(entity = %self.name, on, "switch command had no effect");
        }
        ok
    }
}

impl DeviceListener for Switch {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn receive_update(&self, _device_id: &str, components: &[Component]) {
        self.state.send_if_modified(|s| s.apply(components));
    }
}
