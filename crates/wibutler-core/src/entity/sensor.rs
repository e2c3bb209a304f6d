// Read-only output of a `FloorHeatingController`.

use serde::Serialize;
use tokio::sync::watch;
use wibutler_api::{Component, Device};

use super::last_component;
use crate::codec::{SensorKind, SensorUnit, SensorValue};
use crate::registry::DeviceListener;
use crate::stream::StateStream;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorState {
    pub value: SensorValue,
    pub unit: Option<SensorUnit>,
}

pub struct Sensor {
    device_id: String,
    component: String,
    unique_id: String,
    name: String,
    kind: SensorKind,
    state: watch::Sender<SensorState>,
}

impl Sensor {
    pub fn new(device: &Device, component: &Component) -> Self {
        let kind = SensorKind::from_text(&component.text);
        let initial = SensorState {
            value: kind.decode(&component.value),
            unit: kind.unit(),
        };
        Self {
            device_id: device.id.clone(),
            component: component.name.clone(),
            unique_id: format!("{}_{}", device.id, component.name),
            name: format!("{} - {}", device.name, component.text),
            kind,
            state: watch::Sender::new(initial),
        }
    }

    /// Whether `component` of `device` is exposed as a sensor.
    pub fn qualifies(device: &Device, component: &Component) -> bool {
        component.readonly && device.has_output(&component.name)
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn state(&self) -> SensorState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> StateStream<SensorState> {
        StateStream::new(self.state.subscribe())
    }
}

impl DeviceListener for Sensor {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn receive_update(&self, _device_id: &str, components: &[Component]) {
        let Some(update) = last_component(components, &self.component) else {
            return;
        };
        let value = self.kind.decode(&update.value);
        self.state.send_if_modified(|s| {
            let changed = s.value != value;
            s.value = value;
            changed
        });
    }
}
