//! Reconciliation pass: fetch, diff, apply, notify.
//!
//! Shipments are processed strictly one after another with a [`Pacer`]
//! between them, so a pass never bursts the provider. Each shipment commits
//! independently; a cancelled pass leaves every processed shipment consistent.

use std::{collections::HashSet, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{Shipment, ShipmentStatus, TrackingEvent},
    notify::Notifier,
    pacing::Pacer,
    provider::TrackingProvider,
    store::ShipmentStore,
    templates,
    utils::with_timeout,
    validate::normalize_number,
    Result,
};

/// Upper bound on numbers per on-demand refresh (the provider's batch size).
pub const MAX_REFRESH_NUMBERS: usize = 40;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Delivery,
    StatusUpdate,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Unchanged {
        status: ShipmentStatus,
    },
    Updated {
        old_status: ShipmentStatus,
        new_status: ShipmentStatus,
        has_new_events: bool,
        notification: Option<NotificationKind>,
        notified: bool,
    },
    Errored {
        error: String,
        not_found: bool,
    },
    /// No shipment record: an unknown number, or deleted while the pass ran.
    Untracked,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShipmentReport {
    pub tracking_number: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl ShipmentReport {
    pub fn is_updated(&self) -> bool {
        matches!(self.outcome, Outcome::Updated { .. })
    }

    pub fn is_errored(&self) -> bool {
        matches!(self.outcome, Outcome::Errored { .. })
    }
}

/// Observability summary of one pass. Not persisted.
#[derive(Clone, Debug, Serialize)]
pub struct PassReport {
    /// Shipments (or requested numbers) the pass set out to process.
    pub total: usize,
    pub processed: usize,
    pub updated: usize,
    pub errored: usize,
    pub interrupted: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<ShipmentReport>,
}

enum Target {
    Stored(Shipment),
    Lookup(String),
}

pub struct ReconciliationEngine {
    provider: Arc<dyn TrackingProvider>,
    shipments: Arc<dyn ShipmentStore>,
    notifier: Notifier,
    pacer: Arc<dyn Pacer>,
    io_timeout: Duration,
}

impl ReconciliationEngine {
    pub fn new(
        provider: Arc<dyn TrackingProvider>,
        shipments: Arc<dyn ShipmentStore>,
        notifier: Notifier,
        pacer: Arc<dyn Pacer>,
        io_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            shipments,
            notifier,
            pacer,
            io_timeout,
        }
    }

    /// Run one pass over every shipment eligible for polling.
    ///
    /// Only a failure to load the candidate list fails the pass; everything
    /// after that is recorded per shipment.
    pub async fn run_pass(&self, cancel: &CancellationToken) -> Result<PassReport> {
        let candidates = with_timeout(
            self.io_timeout,
            "load shipments for polling",
            self.shipments.find_active_for_polling(),
        )
        .await?;

        tracing::info!(total = candidates.len(), "reconciliation pass started");
        let targets = candidates.into_iter().map(Target::Stored).collect();
        Ok(self.walk("reconciliation pass", targets, cancel).await)
    }

    /// Reconcile the given numbers now, due for polling or not. Numbers are
    /// normalized and deduplicated; ones with no shipment are `Untracked`.
    pub async fn refresh(&self, numbers: &[String], cancel: &CancellationToken) -> PassReport {
        let mut seen = HashSet::new();
        let targets: Vec<Target> = numbers
            .iter()
            .map(|n| normalize_number(n))
            .filter(|n| !n.is_empty() && seen.insert(n.clone()))
            .map(Target::Lookup)
            .collect();

        tracing::info!(total = targets.len(), "on-demand refresh started");
        self.walk("on-demand refresh", targets, cancel).await
    }

    async fn walk(
        &self,
        kind: &'static str,
        targets: Vec<Target>,
        cancel: &CancellationToken,
    ) -> PassReport {
        let started_at = Utc::now();
        let total = targets.len();
        let mut results = Vec::with_capacity(total);
        let mut interrupted = false;

        for (idx, target) in targets.into_iter().enumerate() {
            if cancel.is_cancelled() {
                interrupted = true;
                break;
            }

            let result = match target {
                Target::Stored(shipment) => self.reconcile_one(shipment).await,
                Target::Lookup(number) => self.reconcile_number(number).await,
            };
            results.push(result);

            if idx + 1 < total {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        interrupted = true;
                        break;
                    }
                    _ = self.pacer.pace() => {}
                }
            }
        }

        let report = PassReport {
            total,
            processed: results.len(),
            updated: results.iter().filter(|r| r.is_updated()).count(),
            errored: results.iter().filter(|r| r.is_errored()).count(),
            interrupted,
            started_at,
            finished_at: Utc::now(),
            results,
        };

        tracing::info!(
            kind,
            total = report.total,
            processed = report.processed,
            updated = report.updated,
            errored = report.errored,
            interrupted = report.interrupted,
            "reconciliation finished"
        );
        report
    }

    async fn reconcile_number(&self, tracking_number: String) -> ShipmentReport {
        let found = with_timeout(
            self.io_timeout,
            "find shipment",
            self.shipments.find_by_tracking_number(&tracking_number),
        )
        .await;
        match found {
            Ok(Some(shipment)) => self.reconcile_one(shipment).await,
            Ok(None) => ShipmentReport {
                tracking_number,
                outcome: Outcome::Untracked,
            },
            Err(e) => {
                tracing::error!(%tracking_number, error = %e, "shipment lookup failed");
                ShipmentReport {
                    tracking_number,
                    outcome: Outcome::Errored {
                        error: e.to_string(),
                        not_found: false,
                    },
                }
            }
        }
    }

    async fn reconcile_one(&self, stored: Shipment) -> ShipmentReport {
        let tracking_number = stored.tracking_number.clone();
        let report = |outcome| ShipmentReport {
            tracking_number: tracking_number.clone(),
            outcome,
        };

        let snapshot = match self.provider.fetch_info(&stored.tracking_number).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(tracking_number = %stored.tracking_number, error = %e, "fetch failed");
                return report(Outcome::Errored {
                    not_found: e.is_not_found(),
                    error: e.to_string(),
                });
            }
        };

        let events = order_latest_first(snapshot.events);
        let status_changed = stored.status != snapshot.status;
        let has_new_events = events.len() > stored.events.len();

        if !status_changed && !has_new_events {
            tracing::debug!(tracking_number = %stored.tracking_number, "no changes");
            return report(Outcome::Unchanged {
                status: stored.status,
            });
        }

        // Apply onto the current record: owner and notification flag may have
        // changed since the candidate list was loaded.
        let applied = with_timeout(
            self.io_timeout,
            "persist shipment",
            self.shipments.apply_tracking(&stored.tracking_number, snapshot.status, events),
        )
        .await;
        let updated = match applied {
            Ok(Some(s)) => s,
            Ok(None) => {
                tracing::info!(
                    tracking_number = %stored.tracking_number,
                    "shipment removed during pass"
                );
                return report(Outcome::Untracked);
            }
            Err(e) => {
                tracing::error!(tracking_number = %stored.tracking_number, error = %e, "store write failed");
                return report(Outcome::Errored {
                    error: e.to_string(),
                    not_found: false,
                });
            }
        };

        tracing::info!(
            tracking_number = %stored.tracking_number,
            old_status = %stored.status,
            new_status = %updated.status,
            has_new_events,
            "shipment updated"
        );

        let (notification, notified) = self.notify_change(&updated, has_new_events).await;
        report(Outcome::Updated {
            old_status: stored.status,
            new_status: updated.status,
            has_new_events,
            notification,
            notified,
        })
    }

    /// Delivery wins over a generic update. Only the shipment-level flag gates.
    async fn notify_change(
        &self,
        shipment: &Shipment,
        has_new_events: bool,
    ) -> (Option<NotificationKind>, bool) {
        let Some(chat_id) = shipment.chat_id else {
            return (None, false);
        };
        if !shipment.notifications_enabled {
            return (None, false);
        }

        let latest = shipment
            .latest_event()
            .map(|e| e.description.trim())
            .filter(|d| !d.is_empty())
            .unwrap_or(templates::STATUS_UPDATED_FALLBACK);

        let (kind, html) = if shipment.status == ShipmentStatus::Delivered {
            (
                NotificationKind::Delivery,
                templates::delivery_notification(&shipment.tracking_number, latest, Utc::now()),
            )
        } else {
            (
                NotificationKind::StatusUpdate,
                templates::status_update_notification(
                    &shipment.tracking_number,
                    shipment.status,
                    latest,
                    has_new_events,
                    Utc::now(),
                ),
            )
        };

        let sent = self.notifier.send_html(chat_id, &html).await;
        (Some(kind), sent)
    }
}

/// Index 0 must be the most recent event. When every event carries a
/// timestamp we sort (stable, newest first); otherwise provider order stands.
pub fn order_latest_first(mut events: Vec<TrackingEvent>) -> Vec<TrackingEvent> {
    if events.iter().all(|e| e.occurred_at.is_some()) {
        events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    }
    events
}
