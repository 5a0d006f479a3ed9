//! [`AlertNotifier`] adapter: resolves recipients through the Store and
//! enqueues one rendered email per active, notification-enabled staff
//! member (spec.md §4.5 step 2, §4.6).

use std::sync::Arc;

use async_trait::async_trait;

use hydrosense_alerts::AlertNotifier;
use hydrosense_protocol::alert::Alert;
use hydrosense_protocol::device::Device;
use hydrosense_store::Store;

use crate::queue::{EmailJob, NotificationQueue};
use crate::templates::render_new_alert;

pub struct QueueNotifier {
    store: Arc<dyn Store>,
    queue: NotificationQueue,
}

impl QueueNotifier {
    pub fn new(store: Arc<dyn Store>, queue: NotificationQueue) -> Self {
        Self { store, queue }
    }
}

#[async_trait]
impl AlertNotifier for QueueNotifier {
    async fn notify_new_alert(&self, alert: &Alert, device: &Device) {
        let recipients = match self.store.list_active_staff_with_email_notifications().await {
            Ok(users) => users,
            Err(e) => {
                tracing::error!(error = %e, alert_id = %alert.alert_id, "failed to resolve alert recipients");
                return;
            }
        };

        let (subject, body) = render_new_alert(alert, device);
        for user in recipients {
            let job = EmailJob::new(user.email.clone(), subject.clone(), body.clone());
            if self.queue.enqueue(job).await.is_err() {
                tracing::error!(
                    alert_id = %alert.alert_id,
                    recipient = %user.email,
                    "notification queue closed, dropping alert email"
                );
            }
        }
    }
}
