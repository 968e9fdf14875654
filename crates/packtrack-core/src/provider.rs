//! Provider Gateway port.
//!
//! The 17TRACK adapter lives in `packtrack-17track`; the engine and the intake
//! dialog only see this trait.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::{Carrier, ShipmentStatus, TrackingEvent};

/// Fresh provider view of one tracking number.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackingSnapshot {
    pub tracking_number: String,
    pub carrier: Carrier,
    pub status: ShipmentStatus,
    /// Provider order, expected newest first.
    pub events: Vec<TrackingEvent>,
}

impl TrackingSnapshot {
    pub fn latest_event(&self) -> Option<&TrackingEvent> {
        self.events.first()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The provider answered successfully but has no data rows for the number.
    #[error("no tracking data found")]
    NotFound,

    #[error("provider rejected request (code {code})")]
    Rejected { code: i64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Not-found and transport failures are both retried on the next pass;
    /// callers that care can tell them apart here.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

#[async_trait]
pub trait TrackingProvider: Send + Sync {
    /// Register a number for tracking. Fails soft: any failure is `false`.
    async fn register(&self, tracking_number: &str, carrier_hint: Option<Carrier>) -> bool;

    async fn fetch_info(
        &self,
        tracking_number: &str,
    ) -> std::result::Result<TrackingSnapshot, GatewayError>;
}
