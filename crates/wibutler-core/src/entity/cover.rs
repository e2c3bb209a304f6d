// Blind / shutter (`Blind`).
//
// The hub reports position as percent *closed*; the host model is percent
// open. There is no stop primitive: stopping resends the last direction
// command twice with a settle delay in between.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use wibutler_api::{Component, ComponentCommand, Device, HubSession};

use super::last_component;
use crate::codec;
use crate::registry::DeviceListener;
use crate::stream::StateStream;

/// Direction command last sent on `SWT_POS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
pub enum Direction {
    /// `ON`: open.
    #[strum(serialize = "ON")]
    #[serde(rename = "ON")]
    Up,
    /// `OFF`: close.
    #[strum(serialize = "OFF")]
    #[serde(rename = "OFF")]
    Down,
}

impl Direction {
    fn command(self) -> ComponentCommand {
        ComponentCommand::switch(self == Self::Up)
    }
}

/// Derived cover phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "open_pct", rename_all = "snake_case")]
pub enum CoverPhase {
    Open,
    Closed,
    Opening,
    Closing,
    Stopped,
    PartiallyOpen(u8),
    Unknown,
}

impl std::fmt::Display for CoverPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
            Self::Opening => f.write_str("opening"),
            Self::Closing => f.write_str("closing"),
            Self::Stopped => f.write_str("stopped"),
            Self::PartiallyOpen(pct) => write!(f, "{pct}% open"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverState {
    /// Vendor `POS`: percent closed. `None` when unknown or unparsable.
    pub closed_pct: Option<u8>,
    /// Raw vendor `STATE` (`Opening`, `Closing`, `Stopped`, ...).
    pub motion: Option<String>,
    pub last_direction: Option<Direction>,
}

impl CoverState {
    /// Host position: percent open.
    pub fn current_position(&self) -> Option<u8> {
        self.closed_pct.map(codec::invert_position)
    }

    pub fn is_opening(&self) -> bool {
        self.motion.as_deref() == Some("Opening")
    }

    pub fn is_closing(&self) -> bool {
        self.motion.as_deref() == Some("Closing")
    }

    pub fn is_stopped(&self) -> bool {
        self.motion.as_deref() == Some("Stopped")
    }

    pub fn is_closed(&self) -> bool {
        self.closed_pct == Some(100)
    }

    /// Motion wins over position; partial positions report how far open.
    pub fn phase(&self) -> CoverPhase {
        if self.is_opening() {
            return CoverPhase::Opening;
        }
        if self.is_closing() {
            return CoverPhase::Closing;
        }
        match self.closed_pct {
            Some(100) => CoverPhase::Closed,
            Some(0) => CoverPhase::Open,
            Some(closed) => CoverPhase::PartiallyOpen(codec::invert_position(closed)),
            None if self.is_stopped() => CoverPhase::Stopped,
            None => CoverPhase::Unknown,
        }
    }

    fn apply(&mut self, components: &[Component]) -> bool {
        let before = self.clone();
        if let Some(pos) = last_component(components, "POS") {
            self.closed_pct = codec::decode_position(&pos.value);
        }
        if let Some(state) = last_component(components, "STATE") {
            self.motion = Some(state.value.clone());
        }
        *self != before
    }
}

pub struct Cover {
    session: Arc<HubSession>,
    device_id: String,
    name: String,
    stop_settle: Duration,
    state: watch::Sender<CoverState>,
}

impl Cover {
    pub fn new(session: Arc<HubSession>, device: &Device, stop_settle: Duration) -> Self {
        let mut initial = CoverState::default();
        initial.apply(&device.components);
        Self {
            session,
            device_id: device.id.clone(),
            name: device.name.clone(),
            stop_settle,
            state: watch::Sender::new(initial),
        }
    }

    /// Covers use the bare device id.
    pub fn unique_id(&self) -> &str {
        &self.device_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CoverState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> StateStream<CoverState> {
        StateStream::new(self.state.subscribe())
    }

    /// Seed the remembered direction, for hosts that restart between a
    /// movement command and the stop that follows it.
    pub fn remember_direction(&self, direction: Direction) {
        self.state.send_if_modified(|s| {
            let changed = s.last_direction != Some(direction);
            s.last_direction = Some(direction);
            changed
        });
    }

    pub async fn open(&self) -> bool {
        self.drive(Direction::Up, 0).await
    }

    pub async fn close(&self) -> bool {
        self.drive(Direction::Down, 100).await
    }

    async fn drive(&self, direction: Direction, closed_pct: u8) -> bool {
        let ok = self
            .session
            .patch_component(&self.device_id, "SWT_POS", &direction.command())
            .await;

        if ok {
            tracing::info!(entity = %self.name, %direction, "cover moving");
            self.state.send_if_modified(|s| {
                let before = s.clone();
                s.closed_pct = Some(closed_pct);
                s.last_direction = Some(direction);
                *s != before
            });
        } else {
            tracing::error!(entity = %self.name, %direction, "cover command had no effect");
        }
        ok
    }

    /// Move to `position` percent open (0..=100).
    pub async fn set_position(&self, position: u8) -> bool {
        let closed = codec::invert_position(position);
        let ok = self
            .session
            .patch_component(&self.device_id, "POS", &ComponentCommand::numeric(closed))
            .await;

        if ok {
            tracing::info!(entity = %self.name, position, "cover position set");
            self.state.send_if_modified(|s| {
                let changed = s.closed_pct != Some(closed);
                s.closed_pct = Some(closed);
                changed
            });
        } else {
            tracing::error!(entity = %self.name, position, "setting cover position had no effect");
        }
        ok
    }

    /// Two-pulse stop: resend the last direction, wait, resend again.
    ///
    /// Reports success only if both pulses were accepted.
    pub async fn stop(&self) -> bool {
        let last = self.state.borrow().last_direction;
        let Some(direction) = last else {
            tracing::warn!(entity = %self.name, "no previous direction, cannot stop");
            return false;
        };
        let command = direction.command();

        if !self
            .session
            .patch_component(&self.device_id, "SWT_POS", &command)
            .await
        {
            tracing::error!(entity = %self.name, "first stop pulse had no effect");
            return false;
        }

        tokio::time::sleep(self.stop_settle).await;

        if self
            .session
            .patch_component(&self.device_id, "SWT_POS", &command)
            .await
        {
            tracing::info!(entity = %self.name, %direction, "cover stopped");
            true
        } else {
            tracing::error!(entity = %self.name, "second stop pulse had no effect");
            false
        }
    }
}

impl DeviceListener for Cover {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn receive_update(&self, _device_id: &str, components: &[Component]) {
        self.state.send_if_modified(|s| s.apply(components));
    }
}
