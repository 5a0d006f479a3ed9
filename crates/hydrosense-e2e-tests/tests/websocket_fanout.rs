//! End-to-end coverage of room fan-out from real pipeline events: a
//! sensor frame and an alert each reach every socket subscribed to a
//! matching room, and nothing else.

mod helpers;

use std::time::Duration;

use helpers::TestHarness;
use hydrosense_ws::rooms::{device_room, ALERTS_ALL, ROLE_STAFF};
use uuid::Uuid;

#[tokio::test]
async fn two_subscribers_to_the_same_device_room_both_get_the_reading() {
    let harness = TestHarness::new();
    harness.start_hub();
    harness.publish_register("tank-01", serde_json::json!({})).await;

    let socket_a = Uuid::new_v4();
    let socket_b = Uuid::new_v4();
    let mut rx_a = harness.hub.register(socket_a, vec![device_room("tank-01")]).await;
    let mut rx_b = harness.hub.register(socket_b, vec![device_room("tank-01")]).await;

    harness.publish_data("tank-01", serde_json::json!({ "pH": 7.0 })).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let frame_a = rx_a.try_recv().expect("socket a should receive the reading");
    let frame_b = rx_b.try_recv().expect("socket b should receive the reading");
    assert_eq!(frame_a, frame_b);
    assert!(frame_a.contains("sensor:data") || frame_a.contains("\"type\""));
}

#[tokio::test]
async fn subscriber_to_an_unrelated_device_room_receives_nothing() {
    let harness = TestHarness::new();
    harness.start_hub();
    harness.publish_register("tank-01", serde_json::json!({})).await;

    let socket = Uuid::new_v4();
    let mut rx = harness.hub.register(socket, vec![device_room("tank-02")]).await;

    harness.publish_data("tank-01", serde_json::json!({ "pH": 7.0 })).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn a_new_alert_reaches_the_alerts_all_room_and_the_device_room() {
    let harness = TestHarness::new();
    harness.start_hub();
    harness.publish_register("tank-01", serde_json::json!({})).await;

    let staff_socket = Uuid::new_v4();
    let mut staff_rx = harness.hub.register(staff_socket, vec![ALERTS_ALL.to_string()]).await;

    let device_socket = Uuid::new_v4();
    let mut device_rx = harness
        .hub
        .register(device_socket, vec![device_room("tank-01")])
        .await;

    harness.publish_data("tank-01", serde_json::json!({ "pH": 5.0 })).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(staff_rx.try_recv().is_ok());
    // The device room socket sees both the reading and the alert.
    assert!(device_rx.try_recv().is_ok());
    assert!(device_rx.try_recv().is_ok());

    assert_eq!(harness.hub.room_count(ROLE_STAFF).await, 0);
}
