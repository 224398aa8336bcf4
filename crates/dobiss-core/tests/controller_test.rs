#![allow(clippy::unwrap_used)]
// Integration tests for `Controller` discovery, status and actions using wiremock.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dobiss_core::{
    Controller, ControllerConfig, CoreError, EntityKind, ObjectId, SyncReport, TurnOff, TurnOn,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn discovery_body() -> Value {
    json!({
        "groups": [
            {"group": {"id": 0, "name": "System"}, "subjects": [
                {"name": "Internal", "address": 1, "channel": 0, "icons_id": 0, "type": 8}
            ]},
            {"group": {"id": 1, "name": "Living"}, "subjects": [
                {"name": "Spots", "address": 65, "channel": 0, "dimmable": true,
                 "icons_id": 0, "type": 24},
                {"name": "Socket", "address": 66, "channel": 1, "icons_id": 1, "type": 8},
                {"name": "Living", "address": 90, "channel": 0, "icons_id": 204, "type": 204},
                {"name": "All zones", "address": 90, "channel": 7, "icons_id": 204, "type": 204}
            ]},
            {"group": {"id": 2, "name": "Outside"}, "subjects": [
                {"name": "Garage op", "address": 70, "channel": 0, "icons_id": 3, "type": 0},
                {"name": "Garage neer", "address": 70, "channel": 1, "icons_id": 4, "type": 0}
            ]}
        ],
        "temp_calendars": [{"id": 4, "name": "Winter"}, {"id": 5, "name": "Away"}]
    })
}

async fn setup() -> (MockServer, Controller) {
    let server = MockServer::start().await;
    let config = ControllerConfig::new(
        server.address().to_string(),
        SecretString::from("secret".to_string()),
    );
    let controller = Controller::new(config).unwrap();
    (server, controller)
}

async fn mount_discovery(server: &MockServer, times: u64) {
    Mock::given(method("GET"))
        .and(path("/api/local/discover"))
        .respond_with(ResponseTemplate::new(200).set_body_json(discovery_body()))
        .expect(times)
        .mount(server)
        .await;
}

async fn mount_action(server: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path("/api/local/action"))
        .and(body_json(body))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(server)
        .await;
}

fn id(address: u32, channel: u32) -> ObjectId {
    ObjectId::new(address, channel)
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_discovery_maps_and_filters_subjects() {
    let (server, controller) = setup().await;
    mount_discovery(&server, 1).await;

    let entities = controller.discover().await.unwrap();

    let ids: Vec<&str> = entities.iter().map(|e| e.object_id().as_str()).collect();
    assert_eq!(
        ids,
        [
            "dobissid_65_0",
            "dobissid_66_1",
            "dobissid_90_0",
            "dobissid_70_0",
            "dobissid_70_1"
        ]
    );
    let spots = controller.entity(&id(65, 0)).unwrap();
    assert_eq!(spots.kind(), EntityKind::Light);
    assert!(spots.dimmable());
    assert_eq!(spots.group(), "Living");
    assert_eq!(
        controller.entity(&id(90, 0)).unwrap().kind(),
        EntityKind::TemperatureZone
    );
    assert_eq!(controller.calendars().len(), 2);
}

#[tokio::test]
async fn test_discovery_is_cached_within_interval() {
    let (server, controller) = setup().await;
    mount_discovery(&server, 1).await;

    let first = controller.discover().await.unwrap();
    let second = controller.discover().await.unwrap();
    assert_eq!(first.len(), second.len());
    // `expect(1)` is verified when the server drops.
}

#[tokio::test]
async fn test_forced_discovery_keeps_entity_identity() {
    let (server, controller) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/local/discover"))
        .respond_with(ResponseTemplate::new(200).set_body_json(discovery_body()))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    let mut renamed = discovery_body();
    renamed["groups"][1]["subjects"][0]["name"] = json!("Ceiling");
    Mock::given(method("GET"))
        .and(path("/api/local/discover"))
        .respond_with(ResponseTemplate::new(200).set_body_json(renamed))
        .expect(1)
        .mount(&server)
        .await;

    let before = controller.discover().await.unwrap();
    let spots = controller.entity(&id(65, 0)).unwrap();
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    spots.register_observer(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    controller.force_discovery();
    let after = controller.discover().await.unwrap();

    assert_eq!(before.len(), after.len());
    for (old, new) in before.iter().zip(after.iter()) {
        assert!(Arc::ptr_eq(old, new), "{} was replaced", old.object_id());
    }
    let current = controller.entity(&id(65, 0)).unwrap();
    assert!(Arc::ptr_eq(&spots, &current));
    assert_eq!(current.name(), "Ceiling");
    assert_eq!(current.observer_count(), 1);
    assert_eq!(notified.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_discovery_pairs_buddies_by_name() {
    let (server, controller) = setup().await;
    mount_discovery(&server, 1).await;
    controller.discover().await.unwrap();

    let up = controller.entity(&id(70, 0)).unwrap();
    let down = controller.entity(&id(70, 1)).unwrap();
    assert_eq!(up.buddy(), Some(down.object_id().clone()));
    assert_eq!(down.buddy(), Some(up.object_id().clone()));
}

#[tokio::test]
async fn test_discovery_failure_surfaces_and_is_rate_limited() {
    let (server, controller) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/local/discover"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = controller.discover().await.unwrap_err();
    assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
    // The failed attempt still counts as a discovery; no second request.
    assert!(controller.discover().await.unwrap().is_empty());
}

// ── Status ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_refresh_all_projects_and_isolates_failures() {
    let (server, controller) = setup().await;
    mount_discovery(&server, 1).await;
    controller.discover().await.unwrap();

    Mock::given(method("GET"))
        .and(path("/api/local/status"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": {
                "65": [42],
                "66": ["bogus", "bogus"],
                "90": {"0": {"temp": 20.5, "asked": 21, "time": 254, "calendar": 4}},
                "70": [0, 1]
            }
        })))
        .mount(&server)
        .await;

    let report = controller.refresh_all().await.unwrap();
    assert_eq!(
        report,
        SyncReport {
            examined: 5,
            updated: 4,
            failed: 1
        }
    );
    assert_eq!(controller.entity(&id(65, 0)).unwrap().value(), Some(42.0));
    assert_eq!(controller.entity(&id(70, 1)).unwrap().value(), Some(1.0));

    let zone = controller.entity(&id(90, 0)).unwrap();
    assert_eq!(zone.value(), Some(20.5));
    let temperature = zone.temperature().unwrap();
    assert_eq!(temperature.asked_temperature, Some(21.0));
    assert_eq!(temperature.timer_minutes, Some(dobiss_core::INDEFINITE_MINUTES));
}

#[tokio::test]
async fn test_forced_projection_notifies_unchanged_entities() {
    let (server, controller) = setup().await;
    mount_discovery(&server, 1).await;
    controller.discover().await.unwrap();

    let spots = controller.entity(&id(65, 0)).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    spots.register_observer(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let snapshot = json!({"65": [10]});
    controller.apply_status(&snapshot, false);
    controller.apply_status(&snapshot, false);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    controller.apply_status(&snapshot, true);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_update_entity_polls_single_cell() {
    let (server, controller) = setup().await;
    mount_discovery(&server, 1).await;
    controller.discover().await.unwrap();

    Mock::given(method("GET"))
        .and(path("/api/local/status"))
        .and(body_json(json!({"address": 66, "channel": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 1})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(controller.update_entity(&id(66, 1)).await.unwrap());
    assert!(controller.entity(&id(66, 1)).unwrap().is_on());
}

// ── Actions ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_turn_on_dimmable_sends_brightness() {
    let (server, controller) = setup().await;
    mount_discovery(&server, 1).await;
    controller.discover().await.unwrap();
    mount_action(
        &server,
        json!({"address": 65, "channel": 0, "action": 1, "option1": 60}),
    )
    .await;

    controller
        .turn_on(
            &id(65, 0),
            TurnOn {
                brightness: Some(60),
                ..TurnOn::default()
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_toggle_turns_off_when_on() {
    let (server, controller) = setup().await;
    mount_discovery(&server, 1).await;
    controller.discover().await.unwrap();
    controller.apply_status(&json!({"66": [0, 1]}), false);
    mount_action(&server, json!({"address": 66, "channel": 1, "action": 0})).await;

    controller.toggle(&id(66, 1)).await.unwrap();
}

#[tokio::test]
async fn test_turn_off_on_temperature_zone_is_unsupported() {
    let (server, controller) = setup().await;
    mount_discovery(&server, 1).await;
    controller.discover().await.unwrap();

    let err = controller
        .turn_off(&id(90, 0), TurnOff::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Unsupported { .. }));
}

#[tokio::test]
async fn test_temperature_timer_rounds_to_quarters() {
    let (server, controller) = setup().await;
    mount_discovery(&server, 1).await;
    controller.discover().await.unwrap();
    mount_action(
        &server,
        json!({"address": 90, "channel": 0, "action": 1, "option1": 21.5, "option2": 3}),
    )
    .await;

    controller.set_temp_timer(&id(90, 0), 21.5, 45).await.unwrap();
}

#[tokio::test]
async fn test_set_preset_resolves_calendar_by_name() {
    let (server, controller) = setup().await;
    mount_discovery(&server, 1).await;
    controller.discover().await.unwrap();
    mount_action(
        &server,
        json!({"address": 90, "channel": 0, "action": 2, "option1": 5}),
    )
    .await;

    controller.set_preset(&id(90, 0), "away").await.unwrap();

    let err = controller
        .set_preset(&id(90, 0), "Summer")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_manual_mode_off_returns_to_calendar() {
    let (server, controller) = setup().await;
    mount_discovery(&server, 1).await;
    controller.discover().await.unwrap();
    mount_action(&server, json!({"address": 90, "channel": 0, "action": 3})).await;

    controller.set_manual_mode(&id(90, 0), false).await.unwrap();
}

#[tokio::test]
async fn test_action_failure_is_reported() {
    let (server, controller) = setup().await;
    mount_discovery(&server, 1).await;
    controller.discover().await.unwrap();
    Mock::given(method("POST"))
        .and(path("/api/local/action"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let err = controller
        .turn_on(&id(66, 1), TurnOn::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Transport(_)));
}
