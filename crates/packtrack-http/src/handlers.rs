//! Route handlers and their wire types.

use axum::extract::{rejection::JsonRejection, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use packtrack_core::{
    domain::{ChatId, SenderProfile, Shipment},
    intake::InboundMessage,
    reconcile::{PassReport, ShipmentReport, MAX_REFRESH_NUMBERS},
    registration::PackageRequest,
    utils::iso_timestamp_utc,
};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PassSummary {
    pub total: usize,
    pub updated: usize,
    pub errors: usize,
}

#[derive(Debug, Serialize)]
pub struct CronResponse {
    pub success: bool,
    pub message: String,
    pub summary: PassSummary,
    pub interrupted: bool,
    pub results: Vec<ShipmentReport>,
}

impl From<PassReport> for CronResponse {
    fn from(r: PassReport) -> Self {
        Self {
            success: true,
            message: format!("Processed {} packages", r.processed),
            summary: PassSummary {
                total: r.total,
                updated: r.updated,
                errors: r.errored,
            },
            interrupted: r.interrupted,
            results: r.results,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PackageResponse {
    pub success: bool,
    pub data: Shipment,
}

#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    #[serde(rename = "trackingNumbers", default)]
    pub tracking_numbers: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub success: bool,
    pub interrupted: bool,
    pub data: Vec<ShipmentReport>,
}

// =============================================================================
// Telegram webhook payload
// =============================================================================

/// The subset of a Telegram `Update` the intake needs. Everything is optional
/// so that unrelated update kinds still parse and get acknowledged.
#[derive(Debug, Default, Deserialize)]
pub struct TelegramUpdate {
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl TelegramUpdate {
    /// `None` when the update has no message, text, or sender.
    pub fn into_inbound(self) -> Option<InboundMessage> {
        let msg = self.message?;
        let text = msg.text?;
        let from = msg.from?;
        Some(InboundMessage {
            chat_id: ChatId(msg.chat.id),
            sender: SenderProfile {
                user_id: from.id,
                username: from.username,
                first_name: from.first_name,
                last_name: from.last_name,
            },
            text,
        })
    }
}

// =============================================================================
// Handler functions
// =============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: iso_timestamp_utc(),
    })
}

/// GET /api/cron/update-packages
pub async fn cron_info(State(state): State<AppState>) -> Json<Value> {
    let last = state.scheduler.last_report().await;
    Json(json!({
        "message": "Package update cron endpoint",
        "usage": "POST with Bearer token authorization",
        "running": state.scheduler.is_running(),
        "lastRun": last.as_ref().map(|r| r.finished_at.to_rfc3339()),
        "lastSummary": last.map(|r| PassSummary {
            total: r.total,
            updated: r.updated,
            errors: r.errored,
        }),
    }))
}

/// POST /api/cron/update-packages (bearer-protected)
pub async fn run_cron(State(state): State<AppState>) -> Result<Json<CronResponse>, ApiError> {
    tracing::info!("reconciliation pass requested over HTTP");
    let report = state.scheduler.trigger().await?;
    Ok(Json(CronResponse::from(report)))
}

/// POST /api/webhook/telegram
///
/// Always 200 once the body parses; Telegram would otherwise redeliver.
pub async fn telegram_webhook(
    State(state): State<AppState>,
    Json(update): Json<TelegramUpdate>,
) -> Json<Value> {
    let Some(inbound) = update.into_inbound() else {
        tracing::debug!("webhook update without message text or sender, ignored");
        return Json(json!({ "ok": true }));
    };

    let _guard = state.chat_locks.lock_chat(inbound.chat_id).await;
    state.intake.handle(inbound).await;
    Json(json!({ "ok": true }))
}

/// POST /api/packages
pub async fn create_package(
    State(state): State<AppState>,
    Json(req): Json<PackageRequest>,
) -> Result<Json<PackageResponse>, ApiError> {
    let shipment = state.registration.register(req).await?;
    Ok(Json(PackageResponse {
        success: true,
        data: shipment,
    }))
}

/// POST /api/track
///
/// Refreshes the listed shipments now. Numbers without a shipment come back
/// as `untracked`; nothing is registered.
pub async fn refresh_tracking(
    State(state): State<AppState>,
    body: Result<Json<TrackRequest>, JsonRejection>,
) -> Result<Json<TrackResponse>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let Some(numbers) = req.tracking_numbers else {
        return Err(ApiError::BadRequest(
            "trackingNumbers array is required".to_string(),
        ));
    };
    if numbers.len() > MAX_REFRESH_NUMBERS {
        return Err(ApiError::BadRequest(format!(
            "at most {MAX_REFRESH_NUMBERS} tracking numbers per request"
        )));
    }

    tracing::info!(count = numbers.len(), "tracking refresh requested over HTTP");
    let report = state.scheduler.refresh(&numbers).await?;
    Ok(Json(TrackResponse {
        success: true,
        interrupted: report.interrupted,
        data: report.results,
    }))
}
