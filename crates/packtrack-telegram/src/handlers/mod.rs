//! Telegram update handlers.
//!
//! Every text message becomes an [`InboundMessage`] for the intake state
//! machine, handled under the sending chat's lock. Non-text updates and
//! messages without a sender are ignored.

use std::sync::Arc;

use teloxide::{prelude::*, types::User};

use packtrack_core::{
    domain::{ChatId, SenderProfile},
    intake::InboundMessage,
};

use crate::router::BotState;

pub async fn handle_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(inbound) = inbound_from_message(&msg) else {
        return Ok(());
    };

    let _guard = state.chat_locks.lock_chat(inbound.chat_id).await;
    state.intake.handle(inbound).await;
    Ok(())
}

pub fn inbound_from_message(msg: &Message) -> Option<InboundMessage> {
    let user = msg.from()?;
    let text = msg.text()?;
    Some(InboundMessage {
        chat_id: ChatId(msg.chat.id.0),
        sender: sender_profile(user),
        text: text.to_string(),
    })
}

fn sender_profile(user: &User) -> SenderProfile {
    SenderProfile {
        user_id: user.id.0 as i64,
        username: user.username.clone(),
        first_name: Some(user.first_name.clone()).filter(|n| !n.is_empty()),
        last_name: user.last_name.clone(),
    }
}
