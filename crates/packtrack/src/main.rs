use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use packtrack_17track::Track17Client;
use packtrack_core::{
    config::Config,
    intake::{dialog::DialogStates, ChatLocks, IntakeService},
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    notify::Notifier,
    pacing::FixedDelay,
    provider::TrackingProvider,
    reconcile::ReconciliationEngine,
    registration::RegistrationService,
    scheduler::ReconcileScheduler,
    store::file::JsonFileStore,
};
use packtrack_http::AppState;
use packtrack_telegram::{router::BotState, TelegramMessenger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    packtrack_core::logging::init("packtrack")?;

    let cfg = Config::load()?;

    let store = Arc::new(
        JsonFileStore::open(cfg.store_path.clone())
            .await
            .with_context(|| format!("opening store at {}", cfg.store_path.display()))?,
    );

    let provider: Arc<dyn TrackingProvider> = Arc::new(Track17Client::new(
        &cfg.track17_api_key,
        &cfg.track17_api_base,
        cfg.provider_timeout,
    )?);

    let telegram = TelegramMessenger::from_token(&cfg.telegram_bot_token);
    let bot = telegram.bot();
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        Arc::new(telegram),
        ThrottleConfig::default(),
    ));
    let notifier = Notifier::new(messenger, cfg.io_timeout, cfg.telegram_safe_limit);

    let engine = ReconciliationEngine::new(
        provider.clone(),
        store.clone(),
        notifier.clone(),
        Arc::new(FixedDelay(cfg.poll_delay)),
        cfg.io_timeout,
    );
    let shutdown = CancellationToken::new();
    let scheduler = ReconcileScheduler::with_shutdown(Arc::new(engine), &shutdown);
    if let Some(period) = cfg.reconcile_interval {
        scheduler.start_interval(period).await;
    }

    let intake = Arc::new(IntakeService::new(
        provider.clone(),
        store.clone(),
        store.clone(),
        notifier.clone(),
        DialogStates::new(cfg.dialog_ttl, cfg.dialog_capacity),
        cfg.io_timeout,
    ));
    let registration = Arc::new(RegistrationService::new(
        provider,
        store.clone(),
        store,
        notifier,
        cfg.io_timeout,
    ));
    let chat_locks = Arc::new(ChatLocks::default());

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                return;
            }
            tracing::info!("shutdown requested");
            shutdown.cancel();
        });
    }

    let state = AppState {
        scheduler: scheduler.clone(),
        intake: intake.clone(),
        registration,
        chat_locks: chat_locks.clone(),
        cron_secret: Arc::from(cfg.cron_secret.as_str()),
    };
    let http = {
        let shutdown = shutdown.clone();
        let addr = cfg.http_addr;
        tokio::spawn(async move {
            let served = packtrack_http::serve(addr, state, shutdown.clone()).await;
            // The server going away for any reason takes the process down.
            shutdown.cancel();
            served
        })
    };

    if cfg.telegram_use_webhook {
        tracing::info!("telegram updates arrive via webhook, polling disabled");
    } else {
        let bot_state = Arc::new(BotState { intake, chat_locks });
        let polled =
            packtrack_telegram::router::run_polling(bot, bot_state, shutdown.clone()).await;
        if let Err(e) = polled {
            tracing::error!(error = %e, "telegram polling failed");
            shutdown.cancel();
        }
    }

    // A pass running inside an HTTP trigger must stop before the server can
    // finish draining.
    shutdown.cancelled().await;
    scheduler.shutdown().await;
    http.await.context("http server task panicked")??;
    Ok(())
}
