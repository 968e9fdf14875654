//! Notification dispatch: bounded, split, fire-and-forget sends.

use std::{sync::Arc, time::Duration};

use crate::{domain::ChatId, formatting::split_message, messaging::port::MessagingPort};

#[derive(Clone)]
pub struct Notifier {
    messenger: Arc<dyn MessagingPort>,
    timeout: Duration,
    safe_limit: usize,
}

impl Notifier {
    pub fn new(messenger: Arc<dyn MessagingPort>, timeout: Duration, safe_limit: usize) -> Self {
        let cap = messenger.capabilities().max_message_len;
        Self {
            messenger,
            timeout,
            safe_limit: safe_limit.min(cap).max(200),
        }
    }

    /// Send HTML to a chat, splitting long text. Failures are logged and
    /// reported as `false`; the core never retries.
    pub async fn send_html(&self, chat_id: ChatId, html: &str) -> bool {
        for chunk in split_message(html, self.safe_limit) {
            match tokio::time::timeout(self.timeout, self.messenger.send_html(chat_id, &chunk))
                .await
            {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::warn!(%chat_id, error = %e, "send failed");
                    return false;
                }
                Err(_) => {
                    tracing::warn!(%chat_id, timeout_ms = self.timeout.as_millis() as u64, "send timed out");
                    return false;
                }
            }
        }
        true
    }
}
