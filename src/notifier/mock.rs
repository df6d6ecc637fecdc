//! In-memory notifier for tests and local runs.
//!
//! Records every publish call. Can be switched into a failing mode to
//! exercise delivery-failure handling without a network.

use super::{Notifier, NotifyError, PublishReceipt};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// One recorded publish call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub destination: String,
    pub subject: String,
    pub body: String,
}

pub struct MockNotifier {
    destination: String,
    failure: Option<NotifyError>,
    calls: Mutex<Vec<PublishedMessage>>,
    next_id: AtomicU64,
}

impl MockNotifier {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            failure: None,
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// A notifier whose every publish fails with `error`.
    /// Calls are still recorded.
    pub fn failing(destination: impl Into<String>, error: NotifyError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(destination)
        }
    }

    /// Every publish attempt so far, successful or not.
    pub fn calls(&self) -> Vec<PublishedMessage> {
        self.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PublishedMessage>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn destination(&self) -> &str {
        &self.destination
    }

    async fn publish(&self, subject: &str, body: &str) -> Result<PublishReceipt, NotifyError> {
        self.lock().push(PublishedMessage {
            destination: self.destination.clone(),
            subject: subject.to_string(),
            body: body.to_string(),
        });

        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(PublishReceipt {
            message_id: Some(format!("mock-{}", id)),
        })
    }
}
