use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Operator role. Only used to gate WebSocket room membership; the
/// Hub always resolves it server-side from the Store, never from a
/// client-supplied claim (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Staff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Pending,
    Suspended,
}

/// Operator account (spec.md §3 "User").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// Bearer token presented by WebSocket clients (spec.md §4.7,
    /// §6 "Handshake carries a bearer identity token"). The Hub never
    /// trusts a role carried in the token itself; it looks this record
    /// up and reads `role` from here.
    #[serde(skip_serializing)]
    pub auth_token: String,
    pub role: Role,
    pub status: UserStatus,
    pub email_notifications: bool,
}

impl User {
    /// Eligible to receive alert emails: Active status and notifications on.
    pub fn wants_alert_email(&self) -> bool {
        self.status == UserStatus::Active && self.email_notifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(status: UserStatus, notifications: bool) -> User {
        User {
            id: Uuid::nil(),
            email: "ops@example.com".into(),
            auth_token: "tok".into(),
            role: Role::Staff,
            status,
            email_notifications: notifications,
        }
    }

    #[test]
    fn active_with_notifications_wants_email() {
        assert!(user(UserStatus::Active, true).wants_alert_email());
    }

    #[test]
    fn suspended_never_wants_email() {
        assert!(!user(UserStatus::Suspended, true).wants_alert_email());
    }

    #[test]
    fn notifications_disabled_suppresses_email() {
        assert!(!user(UserStatus::Active, false).wants_alert_email());
    }
}
