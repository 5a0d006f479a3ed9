//! Room naming and event-to-room mapping (spec.md §4.7 "Rooms",
//! "Broadcasts").

use hydrosense_protocol::user::Role;
use hydrosense_protocol::ws_event::WsEvent;

pub const ROLE_STAFF: &str = "role:staff";
pub const ROLE_ADMIN: &str = "role:admin";
pub const ALERTS_ALL: &str = "alerts:all";

pub fn device_room(device_id: &str) -> String {
    format!("device:{device_id}")
}

/// Role rooms a socket joins on connect (spec.md §4.7 "Rooms" —
/// Staff join `role:staff`; Admin additionally join `role:admin`).
pub fn role_rooms(role: Role) -> Vec<String> {
    match role {
        Role::Staff => vec![ROLE_STAFF.to_string()],
        Role::Admin => vec![ROLE_STAFF.to_string(), ROLE_ADMIN.to_string()],
    }
}

/// Rooms a given event fans out to.
pub fn target_rooms(event: &WsEvent) -> Vec<String> {
    match event {
        WsEvent::SensorData { device_id, .. }
        | WsEvent::DeviceStatus { device_id, .. }
        | WsEvent::DeviceHeartbeat { device_id, .. } => {
            vec![device_room(device_id), ROLE_STAFF.to_string()]
        }
        WsEvent::AlertNew { alert, .. } | WsEvent::AlertResolved { alert, .. } => {
            vec![ALERTS_ALL.to_string(), device_room(&alert.device_id), ROLE_STAFF.to_string()]
        }
        WsEvent::SystemHealth { .. } | WsEvent::AnalyticsUpdate { .. } => {
            vec![ROLE_STAFF.to_string(), ROLE_ADMIN.to_string()]
        }
        WsEvent::ConnectionStatus { .. } | WsEvent::Error { .. } => Vec::new(),
    }
}
