// In-memory mail transport that captures every message instead of
// sending it. Used by tests to assert on outbound notifications.

use crate::core::notify::{EmailMessage, MailError, MailTransport};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Capturing mail transport. Clones share the same mailbox.
#[derive(Clone)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    fail: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// A transport that rejects every message, for exercising the
    /// best-effort delivery path.
    pub fn failing() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }

    /// Everything accepted so far, in send order.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for MemoryMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailTransport for MemoryMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Transport("simulated transport failure".into()));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}
