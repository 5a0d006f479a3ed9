//! Port the Alert Engine calls to enqueue an alert email, implemented by
//! the Notification Queue (spec.md §9 "Cyclic import of services" — this
//! is the `DeviceLookup`-style seam that keeps the two crates decoupled).

use async_trait::async_trait;

use hydrosense_protocol::alert::Alert;
use hydrosense_protocol::device::Device;

#[async_trait]
pub trait AlertNotifier: Send + Sync {
    /// Called exactly once per alert creation (invariant I4), never on
    /// occurrence increments.
    async fn notify_new_alert(&self, alert: &Alert, device: &Device);
}

/// No-op notifier for tests and deployments without email configured.
pub struct NullNotifier;

#[async_trait]
impl AlertNotifier for NullNotifier {
    async fn notify_new_alert(&self, _alert: &Alert, _device: &Device) {}
}
