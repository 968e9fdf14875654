//! Shipment and chat-user persistence ports.
//!
//! Two implementations: [`memory::MemoryStore`] (process-local maps) and
//! [`file::JsonFileStore`] (the same maps persisted as one JSON document).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{ChatId, ChatUser, SenderProfile, Shipment, ShipmentStatus, TrackingEvent},
    Result,
};

pub mod file;
pub mod memory;

#[async_trait]
pub trait ShipmentStore: Send + Sync {
    /// Notifications enabled and status not terminal, oldest first.
    async fn find_active_for_polling(&self) -> Result<Vec<Shipment>>;

    async fn find_by_tracking_number(&self, tracking_number: &str) -> Result<Option<Shipment>>;

    /// Shipments owned by a chat, newest first.
    async fn find_by_owner(&self, chat_id: ChatId) -> Result<Vec<Shipment>>;

    /// Create a shipment. Fails with `Error::Duplicate` if the number is taken.
    async fn insert_new(&self, shipment: Shipment) -> Result<()>;

    /// Create or overwrite (last write wins).
    async fn upsert(&self, shipment: &Shipment) -> Result<()>;

    /// Returns whether a record was removed.
    async fn delete(&self, tracking_number: &str) -> Result<bool>;

    /// Replace status and events on the current record. Owner, description and
    /// the notification flag are left as they are. `None` if the shipment is gone.
    async fn apply_tracking(
        &self,
        tracking_number: &str,
        status: ShipmentStatus,
        events: Vec<TrackingEvent>,
    ) -> Result<Option<Shipment>>;

    /// Toggle the shipment-level notification flag.
    async fn set_notifications(
        &self,
        tracking_number: &str,
        enabled: bool,
    ) -> Result<Option<Shipment>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn upsert_by_chat_id(&self, chat_id: ChatId, profile: &SenderProfile)
        -> Result<ChatUser>;

    /// Append to the user's tracked-number index (no duplicates). Creates a
    /// bare record if the chat was never seen.
    async fn add_tracked_number(&self, chat_id: ChatId, tracking_number: &str) -> Result<()>;

    async fn find(&self, chat_id: ChatId) -> Result<Option<ChatUser>>;
}

/// On-disk document shape.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub shipments: Vec<Shipment>,
    #[serde(default)]
    pub users: Vec<ChatUser>,
}
