#![allow(clippy::unwrap_used)]
// Integration tests for `Hub` and the entity command path using wiremock.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use wibutler_core::{
    Component, CoreError, CoverPhase, Entity, EntityCommand, EntityKind, EntityState, Hub,
    HubConfig, StreamState,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn directory() -> Value {
    json!({
        "devices": {
            "d1": {
                "id": "d1", "name": "Lamp", "type": "DimminActuators",
                "components": [{"name": "SWT", "value": "ON"}, {"name": "BRI_LVL", "value": "60"}]
            },
            "s1": {
                "id": "s1", "name": "Pump", "type": "SwitchingRelays",
                "components": [
                    {"name": "STATE", "value": "0"},
                    {"name": "BTN_0", "value": "", "text": "Up"}
                ]
            },
            "c1": {
                "id": "c1", "name": "Living room", "type": "RoomOperatingPanels",
                "components": [{"name": "TMP", "value": "2050"}, {"name": "TSP", "value": "22"}]
            },
            "b1": {
                "id": "b1", "name": "Blind", "type": "Blind",
                "components": [{"name": "POS", "value": "100"}, {"name": "STATE", "value": "Stopped"}]
            },
            "fh1": {
                "id": "fh1", "name": "Floor", "type": "FloorHeatingController",
                "components": [
                    {"name": "TMP", "value": "2800", "text": "Flow temperature", "readonly": true},
                    {"name": "VALVE", "value": "1", "text": "Valve", "readonly": false}
                ],
                "outputs": [{"name": "TMP"}, {"name": "VALVE"}]
            }
        }
    })
}

fn config_for(server: &MockServer) -> HubConfig {
    let addr = server.address();
    let mut config = HubConfig::new(
        addr.ip().to_string(),
        "admin",
        SecretString::from("hunter2".to_string()),
    );
    config.port = addr.port();
    config.stop_settle = Duration::from_millis(20);
    config
}

async fn mount_hub(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessionToken": "tok"})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(directory()))
        .mount(server)
        .await;
}

async fn expect_patch(server: &MockServer, url: &str, body: Value, times: u64) {
    Mock::given(method("PATCH"))
        .and(path(url))
        .and(body_json(body))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(times)
        .mount(server)
        .await;
}

async fn connected() -> (MockServer, Hub) {
    let server = MockServer::start().await;
    mount_hub(&server).await;
    let hub = Hub::connect_without_stream(config_for(&server)).await.unwrap();
    (server, hub)
}

// ── Connect ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_builds_entities_from_directory() {
    let (_server, hub) = connected().await;

    assert_eq!(hub.devices().len(), 5);

    let mut ids: Vec<(&str, EntityKind)> = hub
        .entities()
        .iter()
        .map(|e| (e.unique_id(), e.kind()))
        .collect();
    ids.sort_unstable_by_key(|(id, _)| *id);
    assert_eq!(
        ids,
        vec![
            ("b1", EntityKind::Cover),
            ("c1", EntityKind::Climate),
            ("d1_Lamp", EntityKind::Light),
            ("fh1_TMP", EntityKind::Sensor),
            ("s1_BTN_0", EntityKind::Button),
            ("s1_Pump", EntityKind::Switch),
        ]
    );
    assert_eq!(hub.registry().len(), 6);
    assert_eq!(hub.registry().listeners_for("s1"), 2);
    assert_eq!(*hub.stream_state().borrow(), StreamState::Idle);

    let EntityState::Light(light) = hub.entity("d1_Lamp").unwrap().state() else {
        panic!("expected light state");
    };
    assert!(light.is_on);
    assert_eq!(light.brightness_pct, 60);
    assert_eq!(light.brightness(), 153);
}

#[tokio::test]
async fn test_connect_rejected_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(directory()))
        .expect(0)
        .mount(&server)
        .await;

    let result = Hub::connect_without_stream(config_for(&server)).await;
    assert!(
        matches!(result, Err(CoreError::AuthenticationFailed { .. })),
        "got {result:?}"
    );
}

#[tokio::test]
async fn test_connect_validates_config_first() {
    let config = HubConfig::new("  ", "admin", SecretString::from("pw".to_string()));
    let result = Hub::connect_without_stream(config).await;
    assert!(matches!(result, Err(CoreError::ValidationFailed { .. })));
}

#[tokio::test]
async fn test_empty_directory_builds_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessionToken": "tok"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let hub = Hub::connect_without_stream(config_for(&server)).await.unwrap();
    assert!(hub.devices().is_empty());
    assert!(hub.entities().is_empty());
    assert!(hub.registry().is_empty());
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_switch_turn_on_patches_swt() {
    let (server, hub) = connected().await;
    expect_patch(
        &server,
        "/api/devices/s1/components/SWT",
        json!({"type": "switch", "value": "ON"}),
        1,
    )
    .await;

    hub.execute("s1_Pump", EntityCommand::TurnOn { brightness: None })
        .await
        .unwrap();

    assert_eq!(hub.entity("s1_Pump").unwrap().state().to_string(), "on");
}

#[tokio::test]
async fn test_light_turn_on_sends_switch_and_level() {
    let (server, hub) = connected().await;
    expect_patch(
        &server,
        "/api/devices/d1/components/SWT",
        json!({"type": "switch", "value": "ON"}),
        1,
    )
    .await;
    expect_patch(
        &server,
        "/api/devices/d1/components/BRI_LVL",
        json!({"type": "numeric", "value": "40"}),
        1,
    )
    .await;

    hub.execute("d1_Lamp", EntityCommand::TurnOn { brightness: Some(102) })
        .await
        .unwrap();

    let EntityState::Light(state) = hub.entity("d1_Lamp").unwrap().state() else {
        panic!("expected light state");
    };
    assert_eq!(state.brightness_pct, 40);
    assert_eq!(state.last_brightness_pct, 40);
}

#[tokio::test]
async fn test_light_below_floor_turns_off() {
    let (server, hub) = connected().await;
    expect_patch(
        &server,
        "/api/devices/d1/components/SWT",
        json!({"type": "switch", "value": "OFF"}),
        1,
    )
    .await;
    expect_patch(
        &server,
        "/api/devices/d1/components/BRI_LVL",
        json!({"type": "numeric", "value": "5"}),
        0,
    )
    .await;

    hub.execute("d1_Lamp", EntityCommand::TurnOn { brightness: Some(13) })
        .await
        .unwrap();

    let EntityState::Light(state) = hub.entity("d1_Lamp").unwrap().state() else {
        panic!("expected light state");
    };
    assert!(!state.is_on);
    // Remembered from the level before switching off.
    assert_eq!(state.last_brightness_pct, 60);
}

#[tokio::test]
async fn test_climate_setpoint_is_encoded() {
    let (server, hub) = connected().await;
    expect_patch(
        &server,
        "/api/devices/c1/components/TSP",
        json!({"type": "numeric", "value": "23"}),
        1,
    )
    .await;

    hub.execute("c1", EntityCommand::SetTemperature(21.5))
        .await
        .unwrap();

    let EntityState::Climate(state) = hub.entity("c1").unwrap().state() else {
        panic!("expected climate state");
    };
    assert_eq!(state.target_temperature, Some(21.5));
}

#[tokio::test]
async fn test_cover_position_is_inverted() {
    let (server, hub) = connected().await;
    expect_patch(
        &server,
        "/api/devices/b1/components/POS",
        json!({"type": "numeric", "value": "25"}),
        1,
    )
    .await;

    hub.execute("b1", EntityCommand::SetPosition(75)).await.unwrap();

    let EntityState::Cover(state) = hub.entity("b1").unwrap().state() else {
        panic!("expected cover state");
    };
    assert_eq!(state.current_position(), Some(75));
    assert_eq!(state.phase(), CoverPhase::PartiallyOpen(75));
}

#[tokio::test]
async fn test_cover_stop_without_direction_has_no_effect() {
    let (server, hub) = connected().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let result = hub.execute("b1", EntityCommand::Stop).await;
    assert!(matches!(result, Err(CoreError::CommandFailed { .. })), "got {result:?}");
}

#[tokio::test]
async fn test_cover_stop_resends_last_direction_twice() {
    let (server, hub) = connected().await;
    expect_patch(
        &server,
        "/api/devices/b1/components/SWT_POS",
        json!({"type": "switch", "value": "ON"}),
        3,
    )
    .await;

    hub.execute("b1", EntityCommand::Open).await.unwrap();
    hub.execute("b1", EntityCommand::Stop).await.unwrap();

    let Some(Entity::Cover(cover)) = hub.entity("b1") else {
        panic!("expected cover");
    };
    assert_eq!(cover.state().current_position(), Some(100));
}

/// Accepts every request and records when it arrived.
#[derive(Clone, Default)]
struct ArrivalLog(Arc<Mutex<Vec<Instant>>>);

impl Respond for ArrivalLog {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.0.lock().unwrap().push(Instant::now());
        ResponseTemplate::new(200).set_body_json(json!({"ok": true}))
    }
}

#[tokio::test]
async fn test_cover_stop_pulses_are_separated_by_settle_delay() {
    let server = MockServer::start().await;
    mount_hub(&server).await;
    let mut config = config_for(&server);
    config.stop_settle = Duration::from_millis(150);
    let hub = Hub::connect_without_stream(config).await.unwrap();

    let arrivals = ArrivalLog::default();
    Mock::given(method("PATCH"))
        .and(path("/api/devices/b1/components/SWT_POS"))
        .and(body_json(json!({"type": "switch", "value": "OFF"})))
        .respond_with(arrivals.clone())
        .expect(3)
        .mount(&server)
        .await;

    hub.execute("b1", EntityCommand::Close).await.unwrap();
    hub.execute("b1", EntityCommand::Stop).await.unwrap();

    let times = arrivals.0.lock().unwrap().clone();
    assert_eq!(times.len(), 3);
    let gap = times[2].duration_since(times[1]);
    assert!(gap >= Duration::from_millis(150), "pulses {gap:?} apart");
}

#[tokio::test]
async fn test_cover_stop_fails_when_second_pulse_is_rejected() {
    let (server, hub) = connected().await;
    Mock::given(method("PATCH"))
        .and(path("/api/devices/b1/components/SWT_POS"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/devices/b1/components/SWT_POS"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    hub.execute("b1", EntityCommand::Open).await.unwrap();
    let result = hub.execute("b1", EntityCommand::Stop).await;
    assert!(matches!(result, Err(CoreError::CommandFailed { .. })), "got {result:?}");
}

#[tokio::test]
async fn test_rejected_command_is_reported() {
    let (server, hub) = connected().await;
    Mock::given(method("PATCH"))
        .and(path("/api/devices/s1/components/SWT"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad value"))
        .mount(&server)
        .await;

    let result = hub.execute("s1_Pump", EntityCommand::TurnOff).await;
    assert!(matches!(result, Err(CoreError::CommandFailed { .. })));
    assert_eq!(hub.entity("s1_Pump").unwrap().state().to_string(), "off");
}

#[tokio::test]
async fn test_invalid_commands_are_refused_locally() {
    let (_server, hub) = connected().await;

    assert!(matches!(
        hub.execute("b1", EntityCommand::SetPosition(150)).await,
        Err(CoreError::ValidationFailed { .. })
    ));
    assert!(matches!(
        hub.execute("c1", EntityCommand::SetTemperature(f64::NAN)).await,
        Err(CoreError::ValidationFailed { .. })
    ));
    assert!(matches!(
        hub.execute("fh1_TMP", EntityCommand::TurnOff).await,
        Err(CoreError::Unsupported { .. })
    ));
    assert!(matches!(
        hub.execute("nope", EntityCommand::TurnOff).await,
        Err(CoreError::EntityNotFound { .. })
    ));
}

// ── Dispatch ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_partial_delta_updates_only_named_fields() {
    let (_server, hub) = connected().await;

    let delivered = hub
        .registry()
        .dispatch("c1", &[Component::new("TMP", "2175")]);
    assert_eq!(delivered, 1);

    let EntityState::Climate(state) = hub.entity("c1").unwrap().state() else {
        panic!("expected climate state");
    };
    assert_eq!(state.current_temperature, Some(21.75));
    assert_eq!(state.target_temperature, Some(21.0));
}

#[tokio::test]
async fn test_delta_reaches_every_listener_of_device() {
    let (_server, hub) = connected().await;
    let mut changes = hub.entity("s1_Pump").unwrap().changes();

    let delivered = hub.registry().dispatch(
        "s1",
        &[Component::new("STATE", "1"), Component::new("SWT", "0D")],
    );
    assert_eq!(delivered, 2);

    let next = tokio::time::timeout(Duration::from_secs(1), futures::StreamExt::next(&mut changes))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next.to_string(), "on");
    assert_eq!(hub.entity("s1_BTN_0").unwrap().state().to_string(), "pressed");

    assert_eq!(hub.registry().dispatch("unknown", &[]), 0);
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_close_is_idempotent_and_blocks_commands() {
    let (_server, hub) = connected().await;

    hub.close().await;
    hub.close().await;

    assert!(hub.is_closed());
    assert!(matches!(
        hub.execute("s1_Pump", EntityCommand::TurnOn { brightness: None }).await,
        Err(CoreError::HubClosed)
    ));
    assert!(matches!(hub.start_streaming().await, Err(CoreError::HubClosed)));
}

#[tokio::test]
async fn test_stream_failure_is_observable() {
    let (_server, hub) = connected().await;
    let mut state = hub.stream_state();

    // wiremock does not speak websocket; the single attempt fails.
    hub.start_streaming().await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), state.wait_for(|s| *s == StreamState::Failed))
        .await
        .unwrap()
        .unwrap();
    hub.close().await;
}

#[tokio::test]
async fn test_oneshot_closes_afterwards() {
    let server = MockServer::start().await;
    mount_hub(&server).await;

    let hub = Hub::oneshot(config_for(&server), |hub| async move {
        assert_eq!(hub.entities().len(), 6);
        Ok(hub)
    })
    .await
    .unwrap();

    assert!(hub.is_closed());
}
