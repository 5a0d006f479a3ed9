//! Notification Queue (spec.md §4.6): a bounded FIFO of outbound alert
//! emails, drained in batches with pooled SMTP and per-message retry.

pub mod config;
pub mod error;
pub mod notifier;
pub mod queue;
pub mod smtp;
pub mod templates;

pub use config::NotifyConfig;
pub use error::{NotifyError, NotifyResult};
pub use notifier::QueueNotifier;
pub use queue::{DrainStats, EmailJob, NotificationQueue};
pub use smtp::{LettreSmtpSender, MockSmtpSender, RenderedEmail, SmtpSender};
