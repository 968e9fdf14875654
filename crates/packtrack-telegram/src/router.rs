use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tokio_util::sync::CancellationToken;

use packtrack_core::intake::{ChatLocks, IntakeService};

use crate::handlers;

#[derive(Clone)]
pub struct BotState {
    pub intake: Arc<IntakeService>,
    pub chat_locks: Arc<ChatLocks>,
}

/// Long-poll Telegram until `shutdown` fires.
pub async fn run_polling(
    bot: Bot,
    state: Arc<BotState>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "telegram long polling started"),
        Err(e) => tracing::warn!(error = %e, "telegram get_me failed, polling anyway"),
    }

    // A webhook left over from a previous deployment blocks getUpdates.
    if let Err(e) = bot.delete_webhook().await {
        tracing::warn!(error = %e, "failed to clear telegram webhook");
    }

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|_| async {})
        .build();

    let token = dispatcher.shutdown_token();
    tokio::spawn(async move {
        shutdown.cancelled().await;
        match token.shutdown() {
            Ok(done) => done.await,
            Err(e) => tracing::debug!(error = %e, "dispatcher was not running"),
        }
    });

    dispatcher.dispatch().await;
    tracing::info!("telegram long polling stopped");
    Ok(())
}
