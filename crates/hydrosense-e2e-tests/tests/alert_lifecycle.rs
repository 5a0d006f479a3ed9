//! End-to-end coverage of the Alert Engine and Notification Queue
//! reached through real sensor frames: debounce, occurrence counting,
//! auto-resolve, at-most-one-open-alert, and the resolve-all sweep.

mod helpers;

use helpers::TestHarness;
use hydrosense_alerts::AlertConfig;
use hydrosense_protocol::alert::{AlertStatus, Parameter, Severity};
use hydrosense_protocol::ws_event::WsEvent;
use hydrosense_store::Store;

#[tokio::test]
async fn first_breach_creates_alert_and_sends_exactly_one_email() {
    let harness = TestHarness::new();
    harness.seed_staff_user("ops@hydrosense.example", "tok");
    harness
        .publish_register("tank-01", serde_json::json!({ "name": "Tank One" }))
        .await;

    harness.publish_data("tank-01", serde_json::json!({ "pH": 5.499 })).await;
    harness.settle().await;

    let alert = harness
        .open_alert("tank-01", Parameter::Ph)
        .await
        .expect("breach should create an open alert");
    assert_eq!(alert.severity, Severity::Critical);
    assert_eq!(alert.occurrence_count, 1);
    assert_eq!(harness.smtp.sent().len(), 1);

    // Repeat breach at the same severity: occurrence increments, no
    // second alert, no second email.
    harness.publish_data("tank-01", serde_json::json!({ "pH": 5.499 })).await;
    harness.settle().await;

    let alert = harness.open_alert("tank-01", Parameter::Ph).await.unwrap();
    assert_eq!(alert.occurrence_count, 2);
    assert_eq!(harness.list_alerts().await.len(), 1);
    assert_eq!(harness.smtp.sent().len(), 1);
}

#[tokio::test]
async fn sustained_nominal_reading_resolves_the_alert() {
    let harness = TestHarness::new();
    harness
        .publish_register("tank-01", serde_json::json!({})).await;
    harness.publish_data("tank-01", serde_json::json!({ "pH": 5.0 })).await;

    assert!(harness.open_alert("tank-01", Parameter::Ph).await.is_some());

    // An instantaneous nominal reading doesn't resolve — only after the
    // idle window elapses. Drive the engine directly with a short
    // config so the test doesn't need to sleep ten minutes.
    let short = TestHarness::with_configs(
        AlertConfig { auto_resolve_idle_secs: 0 },
        hydrosense_presence::PresenceConfig::default(),
    );
    let mut events = short.subscribe_events();
    short.publish_register("tank-02", serde_json::json!({})).await;
    short.publish_data("tank-02", serde_json::json!({ "pH": 5.0 })).await;
    assert!(short.open_alert("tank-02", Parameter::Ph).await.is_some());

    // First nominal reading only starts the idle timer.
    short.publish_data("tank-02", serde_json::json!({ "pH": 7.0 })).await;
    let alert = short.open_alert("tank-02", Parameter::Ph).await.unwrap();
    assert_eq!(alert.status, AlertStatus::Active);

    // A second nominal reading, with the window already elapsed, resolves it.
    short.publish_data("tank-02", serde_json::json!({ "pH": 7.0 })).await;
    assert!(short.open_alert("tank-02", Parameter::Ph).await.is_none());

    let mut saw_resolved = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, WsEvent::AlertResolved { .. }) {
            saw_resolved = true;
        }
    }
    assert!(saw_resolved);
}

#[tokio::test]
async fn at_most_one_open_alert_per_device_and_parameter() {
    let harness = TestHarness::new();
    harness.publish_register("tank-01", serde_json::json!({})).await;

    harness.publish_data("tank-01", serde_json::json!({ "pH": 5.0 })).await;
    harness.publish_data("tank-01", serde_json::json!({ "pH": 5.2 })).await;
    harness.publish_data("tank-01", serde_json::json!({ "pH": 4.8 })).await;

    let open: Vec<_> = harness
        .list_alerts()
        .await
        .into_iter()
        .filter(|a| a.device_id == "tank-01" && a.parameter == Parameter::Ph && a.status != AlertStatus::Resolved)
        .collect();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].occurrence_count, 3);
}

#[tokio::test]
async fn resolve_all_by_severity_is_idempotent() {
    let harness = TestHarness::new();
    harness.publish_register("tank-01", serde_json::json!({})).await;
    harness.publish_register("tank-02", serde_json::json!({})).await;
    harness.publish_register("tank-03", serde_json::json!({})).await;

    harness.publish_data("tank-01", serde_json::json!({ "pH": 5.0 })).await; // Critical
    harness.publish_data("tank-02", serde_json::json!({ "pH": 5.8 })).await; // Warning
    harness.publish_data("tank-03", serde_json::json!({ "pH": 5.3 })).await; // Critical

    let filter = hydrosense_protocol::alert::AlertFilter {
        severity: Some(Severity::Critical),
        ..Default::default()
    };
    let resolved_first = harness
        .store
        .resolve_all_alerts(&filter, Some("maintenance window".into()), chrono::Utc::now())
        .await
        .unwrap();
    assert_eq!(resolved_first, 2);

    let resolved_second = harness
        .store
        .resolve_all_alerts(&filter, Some("maintenance window".into()), chrono::Utc::now())
        .await
        .unwrap();
    assert_eq!(resolved_second, 0);

    let warning_still_open = harness.open_alert("tank-02", Parameter::Ph).await.unwrap();
    assert_ne!(warning_still_open.status, AlertStatus::Resolved);
}
