//! Alert delivery channels.
//!
//! A [`Notifier`] sends one formatted alert to one destination. Delivery is a
//! single bounded attempt; retries are left to the downstream service.

mod console;
mod mock;
mod sns;

pub use console::ConsoleNotifier;
pub use mock::{MockNotifier, PublishedMessage};
pub use sns::{truncate_subject, SnsNotifier, SNS_SUBJECT_LIMIT};

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when delivering an alert.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The destination service refused the message.
    #[error("publish rejected: {0}")]
    Rejected(String),

    /// The destination could not be reached or timed out.
    #[error("publish transport failure: {0}")]
    Transport(String),

    /// Destination identifier is empty or unusable.
    #[error("invalid destination: {0}")]
    InvalidDestination(String),
}

/// Acknowledgement returned by a successful publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReceipt {
    pub message_id: Option<String>,
}

/// Outbound notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Destination identifier, used in logs.
    fn destination(&self) -> &str;

    /// Deliver one alert. Called once per alert, never retried.
    async fn publish(&self, subject: &str, body: &str) -> Result<PublishReceipt, NotifyError>;
}
