//! Pooled SMTP transport (spec.md §4.6 "SMTP transport is pooled (5
//! connections, 100 messages per connection)").

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::PoolConfig;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::NotifyConfig;
use crate::error::{NotifyError, NotifyResult};

/// A rendered email ready to hand to the transport.
#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Port the queue drains through; mockable in tests without a live relay.
#[async_trait]
pub trait SmtpSender: Send + Sync {
    async fn send(&self, email: &RenderedEmail) -> NotifyResult<()>;
}

/// `lettre`-backed sender using a pooled async SMTP transport.
pub struct LettreSmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl LettreSmtpSender {
    pub fn new(config: &NotifyConfig) -> NotifyResult<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(config.smtp_port)
            .pool_config(PoolConfig::new().max_size(config.pool_max_connections));

        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let from: Mailbox = config
            .from_address
            .parse()
            .map_err(|e| NotifyError::Build(format!("invalid from address: {e}")))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl SmtpSender for LettreSmtpSender {
    async fn send(&self, email: &RenderedEmail) -> NotifyResult<()> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| NotifyError::Build(format!("invalid recipient address: {e}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject)
            .header(lettre::message::header::ContentType::TEXT_HTML)
            .body(email.html_body.clone())
            .map_err(|e| NotifyError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::Transport(e.to_string()))
    }
}

/// Records sends in memory; used by tests that exercise the queue's
/// retry and batching behavior without a relay.
#[derive(Default)]
pub struct MockSmtpSender {
    sent: std::sync::Mutex<Vec<RenderedEmail>>,
    fail_next: std::sync::atomic::AtomicUsize,
}

impl MockSmtpSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` send attempts (across all messages), then succeed.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<RenderedEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmtpSender for MockSmtpSender {
    async fn send(&self, email: &RenderedEmail) -> NotifyResult<()> {
        use std::sync::atomic::Ordering;
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(NotifyError::Transport("mock transport failure".into()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}
