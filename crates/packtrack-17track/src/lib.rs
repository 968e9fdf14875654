//! 17TRACK adapter (Provider Gateway).
//!
//! Talks to the v2.2 API: `POST {base}/register` and `POST {base}/gettrackinfo`,
//! both with a JSON array body and the `17token` header.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use packtrack_core::{
    domain::{Carrier, TrackingEvent},
    errors::Error,
    normalize::{carrier_code, carrier_from_provider_id, normalize_status, UNSPECIFIED_CARRIER},
    provider::{GatewayError, TrackingProvider, TrackingSnapshot},
    Result,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug)]
pub struct Track17Client {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct NumberRequest<'a> {
    number: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    carrier: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    data: Option<Vec<TrackRow>>,
}

#[derive(Debug, Deserialize)]
struct TrackRow {
    #[serde(default)]
    number: Option<String>,
    #[serde(default)]
    carrier: Option<Value>,
    #[serde(default)]
    track: Option<TrackBody>,
}

#[derive(Debug, Deserialize)]
struct TrackBody {
    /// Shipment-level status code.
    #[serde(default)]
    e: Option<i64>,
    #[serde(default)]
    z: Option<Vec<RawEvent>>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    a: Option<String>,
    #[serde(default)]
    z: Option<String>,
    #[serde(default)]
    c: Option<String>,
    #[serde(default)]
    e: Option<i64>,
}

impl Track17Client {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("17track client build error: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn post(
        &self,
        path: &str,
        body: &[NumberRequest<'_>],
    ) -> std::result::Result<String, GatewayError> {
        let resp = self
            .http
            .post(format!("{}/{path}", self.base_url))
            .header("17token", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("17track request error: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GatewayError::Transport(format!("17track read error: {e}")))?;

        if !status.is_success() {
            return Err(GatewayError::Transport(format!(
                "17track {path} failed: {status} {}",
                text.chars().take(200).collect::<String>()
            )));
        }
        Ok(text)
    }
}

#[async_trait]
impl TrackingProvider for Track17Client {
    async fn register(&self, tracking_number: &str, carrier_hint: Option<Carrier>) -> bool {
        let body = [NumberRequest {
            number: tracking_number,
            carrier: carrier_hint
                .map(carrier_code)
                .filter(|c| *c != UNSPECIFIED_CARRIER),
        }];

        let text = match self.post("register", &body).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(tracking_number, error = %e, "17track register failed");
                return false;
            }
        };

        match serde_json::from_str::<Envelope>(&text) {
            Ok(env) if env.code == 0 => true,
            Ok(env) => {
                tracing::warn!(tracking_number, code = env.code, "17track register rejected");
                false
            }
            Err(e) => {
                tracing::warn!(tracking_number, error = %e, "17track register response unreadable");
                false
            }
        }
    }

    async fn fetch_info(
        &self,
        tracking_number: &str,
    ) -> std::result::Result<TrackingSnapshot, GatewayError> {
        let body = [NumberRequest {
            number: tracking_number,
            carrier: None,
        }];
        let text = self.post("gettrackinfo", &body).await?;
        let snapshot = decode_track_info(tracking_number, &text)?;
        tracing::debug!(
            tracking_number,
            status = %snapshot.status,
            events = snapshot.events.len(),
            "17track snapshot"
        );
        Ok(snapshot)
    }
}

/// Decode a `gettrackinfo` response body into a snapshot.
///
/// Only the first data row is used. Zero rows with `code == 0` is
/// `NotFound`; any other code is `Rejected`.
pub fn decode_track_info(
    tracking_number: &str,
    body: &str,
) -> std::result::Result<TrackingSnapshot, GatewayError> {
    let env: Envelope = serde_json::from_str(body)
        .map_err(|e| GatewayError::Decode(format!("17track json error: {e}")))?;

    if env.code != 0 {
        return Err(GatewayError::Rejected { code: env.code });
    }

    let Some(row) = env.data.and_then(|rows| rows.into_iter().next()) else {
        return Err(GatewayError::NotFound);
    };

    let track = row.track.unwrap_or(TrackBody { e: None, z: None });
    let raw_status = track.e.unwrap_or(0);
    let carrier = row
        .carrier
        .as_ref()
        .and_then(Value::as_u64)
        .and_then(|id| u32::try_from(id).ok())
        .map(carrier_from_provider_id)
        .unwrap_or_default();

    let events = track
        .z
        .unwrap_or_default()
        .into_iter()
        .map(|ev| TrackingEvent {
            occurred_at: ev.a.as_deref().and_then(parse_event_time),
            description: ev.z.unwrap_or_default(),
            location: ev.c.filter(|c| !c.trim().is_empty()),
            status: ev.e.unwrap_or(raw_status).to_string(),
        })
        .collect();

    Ok(TrackingSnapshot {
        tracking_number: row
            .number
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| tracking_number.to_string()),
        carrier,
        status: normalize_status(raw_status),
        events,
    })
}

/// RFC 3339, or `YYYY-MM-DD HH:MM[:SS]` taken as UTC. Anything else is `None`.
pub fn parse_event_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
