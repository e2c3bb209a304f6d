// Rocker sub-button (`BTN*` components), exposed as a binary sensor.

use serde::Serialize;
use tokio::sync::watch;
use wibutler_api::{Component, Device};

use crate::codec;
use crate::registry::DeviceListener;
use crate::stream::StateStream;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ButtonState {
    pub pressed: bool,
}

pub struct Button {
    device_id: String,
    component: String,
    unique_id: String,
    name: String,
    state: watch::Sender<ButtonState>,
}

impl Button {
    /// Button for one `BTN*` component of `device`. Starts released.
    pub fn new(device: &Device, component: &Component) -> Self {
        Self {
            device_id: device.id.clone(),
            component: component.name.clone(),
            unique_id: format!("{}_{}", device.id, component.name),
            name: format!("{} - {}", device.name, component.text),
            state: watch::Sender::new(ButtonState::default()),
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Component code this button owns, e.g. `BTN_A0`.
    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn state(&self) -> ButtonState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> StateStream<ButtonState> {
        StateStream::new(self.state.subscribe())
    }

    fn apply(&self, state: &mut ButtonState, components: &[Component]) -> bool {
        let before = *state;
        for component in components {
            let Some(event) = codec::decode_button(&component.name, &component.value) else {
                continue;
            };
            if event.button == self.component {
                state.pressed = event.pressed;
            }
        }
        *state != before
    }
}

impl DeviceListener for Button {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn receive_update(&self, device_id: &str, components: &[Component]) {
        if self.state.send_if_modified(|s| self.apply(s, components)) {
            tracing::debug!(
                device_id,
                button = %self.component,
                pressed = self.state().pressed,
                "button changed"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn rocker_device() -> Device {
        serde_json::from_value(json!({
            "id": "r1",
            "name": "Hall rocker",
            "type": "Switches",
            "components": [
                {"name": "BTN_A0", "value": "", "text": "Left top"},
                {"name": "BTN_A1", "value": "", "text": "Left bottom"},
                {"name": "BTN_B0", "value": "", "text": "Right top"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn naming_follows_device_and_label() {
        let device = rocker_device();
        let button = Button::new(&device, &device.components[1]);
        assert_eq!(button.unique_id(), "r1_BTN_A1");
        assert_eq!(button.name(), "Hall rocker - Left bottom");
        assert!(!button.state().pressed);
    }

    #[test]
    fn only_matching_side_and_index_update() {
        let device = rocker_device();
        let a0 = Button::new(&device, &device.components[0]);
        let a1 = Button::new(&device, &device.components[1]);
        let b0 = Button::new(&device, &device.components[2]);

        let delta = [Component::new("SWT_A", "1D")];
        for button in [&a0, &a1, &b0] {
            button.receive_update("r1", &delta);
        }
        assert!(!a0.state().pressed);
        assert!(a1.state().pressed);
        assert!(!b0.state().pressed);

        a1.receive_update("r1", &[Component::new("SWT_A", "1U")]);
        assert!(!a1.state().pressed);

        b0.receive_update("r1", &[Component::new("SWT_B", "0D")]);
        assert!(b0.state().pressed);
    }

    #[test]
    fn empty_and_unknown_codes_are_ignored() {
        let device = rocker_device();
        let a0 = Button::new(&device, &device.components[0]);
        a0.receive_update("r1", &[Component::new("SWT_A", "0D")]);

        a0.receive_update("r1", &[Component::new("SWT_A", "")]);
        a0.receive_update("r1", &[Component::new("SWT_A", "0?")]);
        assert!(a0.state().pressed);
    }
}
