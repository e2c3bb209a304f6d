// ── Value codec ──
//
// Conversions between the hub's component encodings and host units.
// Everything here is pure; entities call into it when decoding snapshots
// and deltas and when encoding commands.

use serde::Serialize;

/// Vendor brightness below this percentage counts as off.
pub const BRIGHTNESS_FLOOR_PCT: u8 = 10;

/// Host brightness scale maximum.
pub const HOST_BRIGHTNESS_MAX: u8 = 255;

/// Remembered brightness before any observation.
pub const DEFAULT_LAST_BRIGHTNESS_PCT: u8 = 100;

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn parse_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| parse_number(trimmed).map(|v| v.trunc() as i64))
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
fn clamp_percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

// ── Temperature ──────────────────────────────────────────────────────

/// `TMP`: centi-degrees → °C.
pub fn decode_temperature(raw: &str) -> Option<f64> {
    parse_number(raw).map(|v| v / 100.0)
}

/// `TSP`: half-degree steps above 10 °C → °C.
pub fn decode_setpoint(raw: &str) -> Option<f64> {
    parse_number(raw).map(|v| v / 2.0 + 10.0)
}

/// °C → `TSP` vendor units: `round((c - 10) * 2)`.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
pub fn encode_setpoint(celsius: f64) -> i64 {
    ((celsius - 10.0) * 2.0).round() as i64
}

// ── Cover position ───────────────────────────────────────────────────

/// `POS` (percent closed) → vendor position clamped to 0..=100.
pub fn decode_position(raw: &str) -> Option<u8> {
    parse_integer(raw).map(|v| u8::try_from(v.clamp(0, 100)).unwrap_or(100))
}

/// Percent closed ↔ percent open. Its own inverse.
pub fn invert_position(pct: u8) -> u8 {
    100 - pct.min(100)
}

// ── Brightness ───────────────────────────────────────────────────────

/// `BRI_LVL`: vendor percent, or `None` when off (below the floor or
/// unparsable).
pub fn decode_brightness_pct(raw: &str) -> Option<u8> {
    let pct = parse_integer(raw)?;
    if pct < i64::from(BRIGHTNESS_FLOOR_PCT) {
        return None;
    }
    Some(u8::try_from(pct.min(100)).unwrap_or(100))
}

/// Vendor percent → host 0..=255, with the off floor applied.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
pub fn pct_to_host(pct: u8) -> u8 {
    if pct < BRIGHTNESS_FLOOR_PCT {
        return 0;
    }
    let scaled = f64::from(pct.min(100)) * f64::from(HOST_BRIGHTNESS_MAX) / 100.0;
    scaled.round().clamp(0.0, 255.0) as u8
}

/// Host 0..=255 → vendor percent.
pub fn host_to_pct(host: u8) -> u8 {
    clamp_percent(f64::from(host) * 100.0 / f64::from(HOST_BRIGHTNESS_MAX))
}

// ── Switches ─────────────────────────────────────────────────────────

/// Relay `STATE`: only `"1"` means on.
pub fn decode_relay_state(raw: &str) -> bool {
    raw == "1"
}

/// Dimmer `STATE`: anything but `"0"` means on.
pub fn decode_dimmer_state(raw: &str) -> bool {
    raw != "0"
}

/// Dimmer `SWT`: `"0"`/`"OFF"` switch off; other values only switch on
/// when brightness is at or above the floor.
pub fn switch_forces_off(raw: &str) -> bool {
    matches!(raw, "0" | "OFF")
}

// ── Buttons ──────────────────────────────────────────────────────────

/// Rocker components and the sub-buttons each one owns.
pub const BUTTON_TABLE: [(&str, [&str; 2]); 3] = [
    ("SWT", ["BTN_0", "BTN_1"]),
    ("SWT_A", ["BTN_A0", "BTN_A1"]),
    ("SWT_B", ["BTN_B0", "BTN_B1"]),
];

/// A decoded rocker event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    /// Sub-button the event belongs to, e.g. `"BTN_A1"`.
    pub button: &'static str,
    /// `D` (down) → pressed, `U` (up) → released.
    pub pressed: bool,
}

fn button_prefix(rocker: &str) -> Option<&'static str> {
    match rocker {
        "SWT" => Some("BTN_"),
        "SWT_A" => Some("BTN_A"),
        "SWT_B" => Some("BTN_B"),
        _ => None,
    }
}

/// Decode a rocker component value `<index><U|D>`.
///
/// Returns `None` for components outside the table, empty values, unknown
/// transitions, and indexes the rocker does not own.
pub fn decode_button(rocker: &str, raw: &str) -> Option<ButtonEvent> {
    let prefix = button_prefix(rocker)?;
    let owned = BUTTON_TABLE
        .iter()
        .find(|(name, _)| *name == rocker)
        .map(|(_, buttons)| buttons)?;

    let index = raw.chars().next()?;
    let pressed = match raw.chars().last()? {
        'D' => true,
        'U' => false,
        _ => return None,
    };

    let wanted = format!("{prefix}{index}");
    owned
        .iter()
        .copied()
        .find(|b| *b == wanted)
        .map(|button| ButtonEvent { button, pressed })
}

/// Rocker component that reports for `button`, if any.
pub fn rocker_for_button(button: &str) -> Option<&'static str> {
    BUTTON_TABLE
        .iter()
        .find(|(_, buttons)| buttons.iter().any(|b| *b == button))
        .map(|(rocker, _)| *rocker)
}

// ── Sensors ──────────────────────────────────────────────────────────

/// Unit inferred from a component's human label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
pub enum SensorUnit {
    #[strum(serialize = "°C")]
    #[serde(rename = "°C")]
    Celsius,
    #[strum(serialize = "%")]
    #[serde(rename = "%")]
    Percent,
}

/// How a sensor reading is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    /// Centi-degrees.
    Temperature,
    /// Integer percent.
    SwitchOnTime,
    /// Raw percent string.
    Humidity,
    /// No unit, raw string.
    Generic,
}

impl SensorKind {
    pub fn from_text(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("temperature") {
            Self::Temperature
        } else if lower.contains("switch-on time") {
            Self::SwitchOnTime
        } else if lower.contains("humidity") {
            Self::Humidity
        } else {
            Self::Generic
        }
    }

    pub fn unit(self) -> Option<SensorUnit> {
        match self {
            Self::Temperature => Some(SensorUnit::Celsius),
            Self::SwitchOnTime | Self::Humidity => Some(SensorUnit::Percent),
            Self::Generic => None,
        }
    }

    /// Decode a raw value. Unparsable numbers fall back to the raw text.
    pub fn decode(self, raw: &str) -> SensorValue {
        match self {
            Self::Temperature => decode_temperature(raw)
                .map_or_else(|| SensorValue::Text(raw.to_owned()), SensorValue::Number),
            Self::SwitchOnTime => parse_integer(raw)
                .map_or_else(|| SensorValue::Text(raw.to_owned()), SensorValue::Integer),
            Self::Humidity | Self::Generic => SensorValue::Text(raw.to_owned()),
        }
    }
}

/// A decoded sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SensorValue {
    Number(f64),
    Integer(i64),
    Text(String),
}

impl std::fmt::Display for SensorValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}
