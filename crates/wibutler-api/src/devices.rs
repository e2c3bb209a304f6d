// Device directory and component commands
//
// Wire models for `GET /api/devices` plus the
// `PATCH /api/devices/{id}/components/{code}` command endpoint.

use std::collections::BTreeMap;
use std::fmt;

use reqwest::Method;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::session::HubSession;

// ── Wire models ──────────────────────────────────────────────────────

/// One device as reported by the hub directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Vendor category, e.g. `"Blind"` or `"DimminActuators"`.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub outputs: Vec<Output>,
}

impl Device {
    /// Look up a component by its code.
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Whether `name` appears among the device's output descriptors.
    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|o| o.name == name)
    }
}

/// A single vendor-encoded value on a device (`TMP`, `SWT`, `BTN_0`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    /// Raw vendor value, normalised to a string.
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub readonly: bool,
}

impl Component {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            text: String::new(),
            readonly: false,
        }
    }
}

/// Named output descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub name: String,
}

#[derive(Deserialize)]
struct DeviceListResponse {
    devices: Option<Map<String, Value>>,
}

/// Accept string, number, bool, or null and keep the textual form.
///
/// The hub sends values as strings, but numeric literals show up in
/// pushed frames often enough that they must not fail the whole payload.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct LenientVisitor;

    impl Visitor<'_> for LenientVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string, number, boolean, or null")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_owned())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_unit<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(LenientVisitor)
}

/// [`lenient_string`] for optional fields; empty or null reads as `None`.
pub(crate) fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_string(deserializer).map(|s| Some(s).filter(|s| !s.is_empty()))
}

// ── Commands ─────────────────────────────────────────────────────────

/// Value type of a component command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Numeric,
    Switch,
}

/// Body of a component PATCH: `{"type": "numeric"|"switch", "value": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentCommand {
    #[serde(rename = "type")]
    pub kind: CommandType,
    pub value: String,
}

impl ComponentCommand {
    pub fn switch(on: bool) -> Self {
        Self {
            kind: CommandType::Switch,
            value: if on { "ON" } else { "OFF" }.to_owned(),
        }
    }

    /// Switch command with a raw value (`"ON"` / `"OFF"`).
    pub fn switch_raw(value: impl Into<String>) -> Self {
        Self {
            kind: CommandType::Switch,
            value: value.into(),
        }
    }

    pub fn numeric(value: impl fmt::Display) -> Self {
        Self {
            kind: CommandType::Numeric,
            value: value.to_string(),
        }
    }
}

// ── Session endpoints ────────────────────────────────────────────────

impl HubSession {
    /// `GET /api/devices`, keyed by device id.
    ///
    /// Any failure or unexpected shape yields an empty map.
    pub async fn list_devices(&self) -> BTreeMap<String, Device> {
        let Some(body) = self.request(Method::GET, "devices", None).await else {
            error!("device directory unavailable");
            return BTreeMap::new();
        };

        match serde_json::from_value::<DeviceListResponse>(body) {
            Ok(DeviceListResponse {
                devices: Some(entries),
            }) => {
                let total = entries.len();
                let devices: BTreeMap<String, Device> = entries
                    .into_iter()
                    .filter_map(|(key, entry)| match serde_json::from_value::<Device>(entry) {
                        Ok(device) => Some((key, device)),
                        Err(e) => {
                            warn!(device = %key, error = %e, "skipping malformed device entry");
                            None
                        }
                    })
                    .collect();
                info!(
                    count = devices.len(),
                    skipped = total - devices.len(),
                    "loaded device directory"
                );
                devices
            }
            Ok(DeviceListResponse { devices: None }) => {
                error!("device directory response has no devices field");
                BTreeMap::new()
            }
            Err(e) => {
                error!(error = %e, "malformed device directory response");
                BTreeMap::new()
            }
        }
    }

    /// `PATCH /api/devices/{id}/components/{code}`.
    ///
    /// Returns `true` iff the hub accepted the command.
    pub async fn patch_component(
        &self,
        device_id: &str,
        code: &str,
        command: &ComponentCommand,
    ) -> bool {
        let url = match self
            .endpoint()
            .api_url_segments(["devices", device_id, "components", code])
        {
            Ok(url) => url,
            Err(e) => {
                error!(device_id, code, error = %e, "cannot build component URL");
                return false;
            }
        };
        let body = match serde_json::to_value(command) {
            Ok(body) => body,
            Err(e) => {
                error!(device_id, code, error = %e, "cannot encode component command");
                return false;
            }
        };

        debug!(device_id, code, value = %command.value, "patching component");
        self.request_url(Method::PATCH, url, Some(&body))
            .await
            .is_some()
    }
}
