//! Security alert delivery.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

/// Subject line of the origin-anomaly alert.
pub const ORIGIN_ALERT_SUBJECT: &str = "Refresh Tokens Warning";

/// Body of the origin-anomaly alert.
pub const ORIGIN_ALERT_BODY: &str =
    "Your session was refreshed from a new network address. If this was not you, sign in again and review your account.";

/// Alert could not be accepted for delivery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("send alert: {0}")]
pub struct NotifyError(pub String);

/// Delivers alerts to a recipient. `Ok` means accepted for delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Hand one alert to the delivery channel.
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Accepts every alert and records it in the service log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    /// Create a log notifier.
    pub fn new() -> Self {
        LogNotifier
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: &str, subject: &str, _body: &str) -> Result<(), NotifyError> {
        warn!(
            event_type = "ORIGIN_ALERT",
            recipient = %recipient,
            subject = %subject,
            "Security alert queued"
        );
        Ok(())
    }
}
