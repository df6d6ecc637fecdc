//! Stdout notifier used by `classify` dry runs.

use super::{Notifier, NotifyError, PublishReceipt};
use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

pub struct ConsoleNotifier {
    out: Mutex<Stdout>,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn destination(&self) -> &str {
        "stdout"
    }

    async fn publish(&self, subject: &str, body: &str) -> Result<PublishReceipt, NotifyError> {
        let text = format!("{}\n{}\n\n", subject, body);
        let mut out = self.out.lock().await;
        out.write_all(text.as_bytes())
            .await
            .map_err(|err| NotifyError::Transport(err.to_string()))?;
        out.flush()
            .await
            .map_err(|err| NotifyError::Transport(err.to_string()))?;
        Ok(PublishReceipt::default())
    }
}
