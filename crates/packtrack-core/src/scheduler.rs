//! Single-flight trigger and optional fixed-interval runner for
//! reconciliation passes.
//!
//! - At most one pass runs at a time; a second trigger is rejected, not queued.
//! - The interval runner, the HTTP trigger and on-demand refreshes share the
//!   same guard.
//! - `shutdown` cancels a running pass between shipments and stops the ticker.

use std::{sync::Arc, time::Duration};

use tokio::{sync::Mutex, task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    reconcile::{PassReport, ReconciliationEngine},
    Error,
};

#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("a reconciliation pass is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Pass(#[from] Error),
}

#[derive(Clone)]
pub struct ReconcileScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    engine: Arc<ReconciliationEngine>,
    execution_lock: Mutex<()>,
    shutdown: CancellationToken,
    state: Mutex<SchedulerState>,
}

#[derive(Default)]
struct SchedulerState {
    ticker: Option<JoinHandle<()>>,
    last_report: Option<PassReport>,
}

impl ReconcileScheduler {
    pub fn new(engine: Arc<ReconciliationEngine>) -> Self {
        Self::with_shutdown(engine, &CancellationToken::new())
    }

    /// Cancelling `parent` has the same effect on passes and the ticker as
    /// [`Self::shutdown`], without waiting for them.
    pub fn with_shutdown(engine: Arc<ReconciliationEngine>, parent: &CancellationToken) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                engine,
                execution_lock: Mutex::new(()),
                shutdown: parent.child_token(),
                state: Mutex::new(SchedulerState::default()),
            }),
        }
    }

    /// Run one pass now, unless one is already in flight.
    pub async fn trigger(&self) -> Result<PassReport, TriggerError> {
        let Ok(_guard) = self.inner.execution_lock.try_lock() else {
            tracing::info!("reconciliation pass already running, trigger rejected");
            return Err(TriggerError::AlreadyRunning);
        };

        let cancel = self.inner.shutdown.child_token();
        let report = self.inner.engine.run_pass(&cancel).await?;
        self.inner.state.lock().await.last_report = Some(report.clone());
        Ok(report)
    }

    /// Reconcile the given numbers now under the same single-flight guard.
    /// Does not replace the last pass report.
    pub async fn refresh(&self, numbers: &[String]) -> Result<PassReport, TriggerError> {
        let Ok(_guard) = self.inner.execution_lock.try_lock() else {
            tracing::info!("reconciliation pass already running, refresh rejected");
            return Err(TriggerError::AlreadyRunning);
        };

        let cancel = self.inner.shutdown.child_token();
        Ok(self.inner.engine.refresh(numbers, &cancel).await)
    }

    pub fn is_running(&self) -> bool {
        self.inner.execution_lock.try_lock().is_err()
    }

    pub async fn last_report(&self) -> Option<PassReport> {
        self.inner.state.lock().await.last_report.clone()
    }

    /// Run a pass every `period` until shutdown. A tick that finds a pass in
    /// flight is skipped. Calling this again replaces the previous ticker.
    pub async fn start_interval(&self, period: Duration) {
        let mut state = self.inner.state.lock().await;
        if let Some(old) = state.ticker.take() {
            old.abort();
        }

        let this = self.clone();
        let shutdown = self.inner.shutdown.clone();
        tracing::info!(period_secs = period.as_secs(), "reconciliation interval started");

        state.ticker = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                match this.trigger().await {
                    Ok(_) => {}
                    Err(TriggerError::AlreadyRunning) => {
                        tracing::debug!("tick skipped, pass in flight");
                    }
                    Err(TriggerError::Pass(e)) => {
                        tracing::error!(error = %e, "scheduled reconciliation pass failed");
                    }
                }
            }
        }));
    }

    /// Cancel any running pass, stop the ticker, and wait for it to exit.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let ticker = self.inner.state.lock().await.ticker.take();
        if let Some(handle) = ticker {
            let _ = handle.await;
        }
        // Wait for a pass started by the HTTP trigger to observe cancellation.
        let _guard = self.inner.execution_lock.lock().await;
        tracing::info!("reconciliation scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{Carrier, ChatId, MessageId, MessageRef, Shipment},
        messaging::{
            port::MessagingPort,
            types::{FormatMode, MessagingCapabilities},
        },
        notify::Notifier,
        pacing::{NoDelay, Pacer},
        provider::{GatewayError, TrackingProvider, TrackingSnapshot},
        store::{memory::MemoryStore, ShipmentStore},
        Result,
    };
    use async_trait::async_trait;
    use tokio::sync::Notify;

    struct NothingFound;

    #[async_trait]
    impl TrackingProvider for NothingFound {
        async fn register(&self, _n: &str, _c: Option<Carrier>) -> bool {
            true
        }

        async fn fetch_info(
            &self,
            _n: &str,
        ) -> std::result::Result<TrackingSnapshot, GatewayError> {
            Err(GatewayError::NotFound)
        }
    }

    struct Silent;

    #[async_trait]
    impl MessagingPort for Silent {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                supports_html: true,
                max_message_len: 4096,
            }
        }

        async fn send(&self, chat_id: ChatId, _t: &str, _m: FormatMode) -> Result<MessageRef> {
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }
    }

    /// Blocks inside the first inter-shipment delay until released.
    struct GatePacer {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Pacer for GatePacer {
        async fn pace(&self) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }

    async fn engine(pacer: Arc<dyn Pacer>, shipments: usize) -> Arc<ReconciliationEngine> {
        let store = Arc::new(MemoryStore::new());
        for i in 0..shipments {
            store
                .upsert(&Shipment::new(format!("YT{i:010}"), Carrier::Temu))
                .await
                .unwrap();
        }
        let engine = ReconciliationEngine::new(
            Arc::new(NothingFound),
            store,
            Notifier::new(Arc::new(Silent), Duration::from_secs(1), 4000),
            pacer,
            Duration::from_secs(1),
        );
        Arc::new(engine)
    }

    async fn scheduler(pacer: Arc<dyn Pacer>, shipments: usize) -> ReconcileScheduler {
        ReconcileScheduler::new(engine(pacer, shipments).await)
    }

    #[tokio::test]
    async fn concurrent_trigger_is_rejected() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let sched = scheduler(
            Arc::new(GatePacer {
                entered: entered.clone(),
                release: release.clone(),
            }),
            2,
        )
        .await;

        let bg = sched.clone();
        let first = tokio::spawn(async move { bg.trigger().await });
        entered.notified().await;

        assert!(sched.is_running());
        assert!(matches!(
            sched.trigger().await,
            Err(TriggerError::AlreadyRunning)
        ));

        release.notify_one();
        let report = first.await.unwrap().unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(report.errored, 2);
        assert!(sched.last_report().await.is_some());
        assert!(!sched.is_running());
    }

    #[tokio::test]
    async fn refresh_waits_its_turn() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let sched = scheduler(
            Arc::new(GatePacer {
                entered: entered.clone(),
                release: release.clone(),
            }),
            2,
        )
        .await;

        let bg = sched.clone();
        let first = tokio::spawn(async move { bg.trigger().await });
        entered.notified().await;

        let numbers = vec!["YT0000000000".to_string()];
        assert!(matches!(
            sched.refresh(&numbers).await,
            Err(TriggerError::AlreadyRunning)
        ));

        release.notify_one();
        let pass = first.await.unwrap().unwrap();

        let refreshed = sched.refresh(&numbers).await.unwrap();
        assert_eq!(refreshed.processed, 1);
        assert_eq!(refreshed.errored, 1);
        assert_eq!(sched.last_report().await.unwrap().started_at, pass.started_at);
    }

    #[tokio::test]
    async fn shutdown_interrupts_running_pass() {
        let entered = Arc::new(Notify::new());
        let sched = scheduler(
            Arc::new(GatePacer {
                entered: entered.clone(),
                release: Arc::new(Notify::new()),
            }),
            3,
        )
        .await;

        let bg = sched.clone();
        let first = tokio::spawn(async move { bg.trigger().await });
        entered.notified().await;

        sched.shutdown().await;
        let report = first.await.unwrap().unwrap();
        assert!(report.interrupted);
        assert_eq!(report.processed, 1);
    }

    #[tokio::test]
    async fn process_shutdown_interrupts_running_pass() {
        let entered = Arc::new(Notify::new());
        let process = CancellationToken::new();
        let pacer = Arc::new(GatePacer {
            entered: entered.clone(),
            release: Arc::new(Notify::new()),
        });
        let sched = ReconcileScheduler::with_shutdown(engine(pacer, 3).await, &process);

        let bg = sched.clone();
        let first = tokio::spawn(async move { bg.trigger().await });
        entered.notified().await;

        process.cancel();
        let report = first.await.unwrap().unwrap();
        assert!(report.interrupted);
        assert_eq!(report.processed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_runs_passes_until_shutdown() {
        let sched = scheduler(Arc::new(NoDelay), 1).await;
        sched.start_interval(Duration::from_secs(60)).await;

        tokio::time::sleep(Duration::from_millis(10)).await;
        let first = sched.last_report().await.unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        let second = sched.last_report().await.unwrap();
        assert!(second.started_at >= first.started_at);

        sched.shutdown().await;
    }
}
