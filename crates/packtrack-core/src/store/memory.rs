use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    domain::{ChatId, ChatUser, SenderProfile, Shipment, ShipmentStatus, TrackingEvent},
    errors::Error,
    store::{ShipmentStore, StoreDocument, UserStore},
    Result,
};

/// Process-local store. Both maps are keyed by their natural identity, so
/// concurrent upserts for the same key are last-write-wins.
#[derive(Default)]
pub struct MemoryStore {
    shipments: RwLock<HashMap<String, Shipment>>,
    users: RwLock<HashMap<ChatId, ChatUser>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(doc: StoreDocument) -> Self {
        Self {
            shipments: RwLock::new(
                doc.shipments
                    .into_iter()
                    .map(|s| (s.tracking_number.clone(), s))
                    .collect(),
            ),
            users: RwLock::new(doc.users.into_iter().map(|u| (u.chat_id, u)).collect()),
        }
    }

    pub async fn document(&self) -> StoreDocument {
        let mut shipments: Vec<Shipment> = self.shipments.read().await.values().cloned().collect();
        shipments.sort_by(|a, b| a.tracking_number.cmp(&b.tracking_number));
        let mut users: Vec<ChatUser> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|u| u.chat_id);
        StoreDocument { shipments, users }
    }

    pub async fn shipment_count(&self) -> usize {
        self.shipments.read().await.len()
    }

    /// Take over the contents of `other`.
    pub async fn replace_with(&self, other: MemoryStore) {
        let MemoryStore { shipments, users } = other;
        *self.shipments.write().await = shipments.into_inner();
        *self.users.write().await = users.into_inner();
    }
}

#[async_trait]
impl ShipmentStore for MemoryStore {
    async fn find_active_for_polling(&self) -> Result<Vec<Shipment>> {
        let map = self.shipments.read().await;
        let mut out: Vec<Shipment> = map.values().filter(|s| s.is_pollable()).cloned().collect();
        out.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.tracking_number.cmp(&b.tracking_number))
        });
        Ok(out)
    }

    async fn find_by_tracking_number(&self, tracking_number: &str) -> Result<Option<Shipment>> {
        Ok(self.shipments.read().await.get(tracking_number).cloned())
    }

    async fn find_by_owner(&self, chat_id: ChatId) -> Result<Vec<Shipment>> {
        let map = self.shipments.read().await;
        let mut out: Vec<Shipment> = map
            .values()
            .filter(|s| s.chat_id == Some(chat_id))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.tracking_number.cmp(&b.tracking_number))
        });
        Ok(out)
    }

    async fn insert_new(&self, shipment: Shipment) -> Result<()> {
        let mut map = self.shipments.write().await;
        if map.contains_key(&shipment.tracking_number) {
            return Err(Error::Duplicate(shipment.tracking_number));
        }
        map.insert(shipment.tracking_number.clone(), shipment);
        Ok(())
    }

    async fn upsert(&self, shipment: &Shipment) -> Result<()> {
        self.shipments
            .write()
            .await
            .insert(shipment.tracking_number.clone(), shipment.clone());
        Ok(())
    }

    async fn delete(&self, tracking_number: &str) -> Result<bool> {
        Ok(self
            .shipments
            .write()
            .await
            .remove(tracking_number)
            .is_some())
    }

    async fn apply_tracking(
        &self,
        tracking_number: &str,
        status: ShipmentStatus,
        events: Vec<TrackingEvent>,
    ) -> Result<Option<Shipment>> {
        let mut map = self.shipments.write().await;
        let Some(s) = map.get_mut(tracking_number) else {
            return Ok(None);
        };
        s.status = status;
        s.events = events;
        s.updated_at = Utc::now();
        Ok(Some(s.clone()))
    }

    async fn set_notifications(
        &self,
        tracking_number: &str,
        enabled: bool,
    ) -> Result<Option<Shipment>> {
        let mut map = self.shipments.write().await;
        let Some(s) = map.get_mut(tracking_number) else {
            return Ok(None);
        };
        s.notifications_enabled = enabled;
        s.updated_at = Utc::now();
        Ok(Some(s.clone()))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn upsert_by_chat_id(
        &self,
        chat_id: ChatId,
        profile: &SenderProfile,
    ) -> Result<ChatUser> {
        let mut map = self.users.write().await;
        let user = map
            .entry(chat_id)
            .and_modify(|u| u.apply_profile(profile))
            .or_insert_with(|| ChatUser::new(chat_id, profile));
        Ok(user.clone())
    }

    async fn add_tracked_number(&self, chat_id: ChatId, tracking_number: &str) -> Result<()> {
        let mut map = self.users.write().await;
        let user = map
            .entry(chat_id)
            .or_insert_with(|| ChatUser::new(chat_id, &SenderProfile::default()));
        if !user.tracked_numbers.iter().any(|n| n == tracking_number) {
            user.tracked_numbers.push(tracking_number.to_string());
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find(&self, chat_id: ChatId) -> Result<Option<ChatUser>> {
        Ok(self.users.read().await.get(&chat_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Carrier;
    use chrono::Duration;

    fn shipment(n: &str, status: ShipmentStatus, owner: Option<i64>) -> Shipment {
        let mut s = Shipment::new(n, Carrier::Temu);
        s.status = status;
        s.chat_id = owner.map(ChatId);
        s
    }

    #[tokio::test]
    async fn active_for_polling_excludes_terminal_and_muted() {
        let store = MemoryStore::new();
        store
            .upsert(&shipment("A", ShipmentStatus::InTransit, None))
            .await
            .unwrap();
        store
            .upsert(&shipment("B", ShipmentStatus::Delivered, None))
            .await
            .unwrap();
        store
            .upsert(&shipment("C", ShipmentStatus::Expired, None))
            .await
            .unwrap();
        let mut muted = shipment("D", ShipmentStatus::Pending, None);
        muted.notifications_enabled = false;
        store.upsert(&muted).await.unwrap();
        store
            .upsert(&shipment("E", ShipmentStatus::Exception, None))
            .await
            .unwrap();

        let active: Vec<String> = store
            .find_active_for_polling()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.tracking_number)
            .collect();
        assert_eq!(active.len(), 2);
        assert!(active.contains(&"A".to_string()));
        assert!(active.contains(&"E".to_string()));
    }

    #[tokio::test]
    async fn reverting_status_reenables_polling() {
        let store = MemoryStore::new();
        let mut s = shipment("A", ShipmentStatus::Delivered, None);
        store.upsert(&s).await.unwrap();
        assert!(store.find_active_for_polling().await.unwrap().is_empty());

        s.status = ShipmentStatus::InTransit;
        store.upsert(&s).await.unwrap();
        assert_eq!(store.find_active_for_polling().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn insert_new_rejects_duplicates() {
        let store = MemoryStore::new();
        store
            .insert_new(shipment("A", ShipmentStatus::Pending, None))
            .await
            .unwrap();
        let err = store
            .insert_new(shipment("A", ShipmentStatus::Pending, None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Duplicate(n) if n == "A"));
        assert_eq!(store.shipment_count().await, 1);
    }

    #[tokio::test]
    async fn find_by_owner_is_newest_first() {
        let store = MemoryStore::new();
        let mut old = shipment("OLD", ShipmentStatus::Pending, Some(7));
        old.created_at = old.created_at - Duration::hours(1);
        store.upsert(&old).await.unwrap();
        store
            .upsert(&shipment("NEW", ShipmentStatus::Pending, Some(7)))
            .await
            .unwrap();
        store
            .upsert(&shipment("OTHER", ShipmentStatus::Pending, Some(8)))
            .await
            .unwrap();

        let mine: Vec<String> = store
            .find_by_owner(ChatId(7))
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.tracking_number)
            .collect();
        assert_eq!(mine, vec!["NEW", "OLD"]);
    }

    #[tokio::test]
    async fn user_upsert_is_idempotent_and_refreshes_profile() {
        let store = MemoryStore::new();
        let mut p = SenderProfile {
            user_id: 1,
            username: Some("alice".into()),
            ..Default::default()
        };
        store.upsert_by_chat_id(ChatId(1), &p).await.unwrap();
        store.add_tracked_number(ChatId(1), "YT1234567890").await.unwrap();
        store.add_tracked_number(ChatId(1), "YT1234567890").await.unwrap();

        p.username = Some("alice2".into());
        let u = store.upsert_by_chat_id(ChatId(1), &p).await.unwrap();
        assert_eq!(u.username.as_deref(), Some("alice2"));
        assert_eq!(u.tracked_numbers, vec!["YT1234567890"]);
    }

    #[tokio::test]
    async fn set_notifications_toggles_flag() {
        let store = MemoryStore::new();
        store
            .upsert(&shipment("A", ShipmentStatus::Pending, None))
            .await
            .unwrap();
        let s = store.set_notifications("A", false).await.unwrap().unwrap();
        assert!(!s.notifications_enabled);
        assert!(store.set_notifications("Z", false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn apply_tracking_keeps_owner_and_flag() {
        let store = MemoryStore::new();
        let mut s = shipment("A", ShipmentStatus::InTransit, Some(3));
        s.notifications_enabled = false;
        s.description = Some("Boots".into());
        store.upsert(&s).await.unwrap();

        let event = TrackingEvent {
            occurred_at: None,
            description: "Delivered".into(),
            location: None,
            status: "40".into(),
        };
        let applied = store
            .apply_tracking("A", ShipmentStatus::Delivered, vec![event])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(applied.status, ShipmentStatus::Delivered);
        assert_eq!(applied.events.len(), 1);
        assert_eq!(applied.chat_id, Some(ChatId(3)));
        assert_eq!(applied.description.as_deref(), Some("Boots"));
        assert!(!applied.notifications_enabled);

        assert!(store
            .apply_tracking("GONE", ShipmentStatus::Delivered, vec![])
            .await
            .unwrap()
            .is_none());
    }
}
