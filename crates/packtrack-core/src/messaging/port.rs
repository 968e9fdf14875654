use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{FormatMode, MessagingCapabilities},
    Result,
};

/// Cross-messenger send boundary.
///
/// Delivery is fire-and-forget from the core's point of view: callers log a
/// failed send and move on, they never retry.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send(&self, chat_id: ChatId, text: &str, mode: FormatMode) -> Result<MessageRef>;

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.send(chat_id, html, FormatMode::Html).await
    }
}
