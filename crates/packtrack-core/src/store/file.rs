//! JSON-file persistence on top of [`MemoryStore`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs, sync::Mutex};

use crate::{
    domain::{ChatId, ChatUser, SenderProfile, Shipment, ShipmentStatus, TrackingEvent},
    store::{memory::MemoryStore, ShipmentStore, StoreDocument, UserStore},
    Result,
};

/// Every mutation runs against a scratch copy of the data. The copy is
/// written to a temp file and renamed over the target, and only then swapped
/// into memory, so a failed or abandoned write leaves both sides unchanged.
/// Reads never touch disk.
pub struct JsonFileStore {
    inner: MemoryStore,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Load `path` if it exists, otherwise start empty.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let doc = load_document(&path).await?;
        tracing::info!(
            path = %path.display(),
            shipments = doc.shipments.len(),
            users = doc.users.len(),
            "store loaded"
        );
        Ok(Self {
            inner: MemoryStore::from_document(doc),
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Callers hold `write_lock` from here until [`Self::commit`] returns.
    async fn scratch(&self) -> MemoryStore {
        MemoryStore::from_document(self.inner.document().await)
    }

    async fn commit(&self, scratch: MemoryStore) -> Result<()> {
        if let Err(e) = self.write_document(&scratch.document().await).await {
            tracing::error!(path = %self.path.display(), error = %e, "store write failed");
            return Err(e);
        }
        self.inner.replace_with(scratch).await;
        Ok(())
    }

    async fn write_document(&self, doc: &StoreDocument) -> Result<()> {
        let json = serde_json::to_string_pretty(doc)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json.as_bytes()).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

async fn load_document(path: &Path) -> Result<StoreDocument> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        return Ok(StoreDocument::default());
    }
    let txt = fs::read_to_string(path).await?;
    if txt.trim().is_empty() {
        return Ok(StoreDocument::default());
    }
    Ok(serde_json::from_str(&txt)?)
}

#[async_trait]
impl ShipmentStore for JsonFileStore {
    async fn find_active_for_polling(&self) -> Result<Vec<Shipment>> {
        self.inner.find_active_for_polling().await
    }

    async fn find_by_tracking_number(&self, tracking_number: &str) -> Result<Option<Shipment>> {
        self.inner.find_by_tracking_number(tracking_number).await
    }

    async fn find_by_owner(&self, chat_id: ChatId) -> Result<Vec<Shipment>> {
        self.inner.find_by_owner(chat_id).await
    }

    async fn insert_new(&self, shipment: Shipment) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let scratch = self.scratch().await;
        scratch.insert_new(shipment).await?;
        self.commit(scratch).await
    }

    async fn upsert(&self, shipment: &Shipment) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let scratch = self.scratch().await;
        scratch.upsert(shipment).await?;
        self.commit(scratch).await
    }

    async fn delete(&self, tracking_number: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let scratch = self.scratch().await;
        if !scratch.delete(tracking_number).await? {
            return Ok(false);
        }
        self.commit(scratch).await?;
        Ok(true)
    }

    async fn apply_tracking(
        &self,
        tracking_number: &str,
        status: ShipmentStatus,
        events: Vec<TrackingEvent>,
    ) -> Result<Option<Shipment>> {
        let _guard = self.write_lock.lock().await;
        let scratch = self.scratch().await;
        let applied = scratch
            .apply_tracking(tracking_number, status, events)
            .await?;
        if applied.is_some() {
            self.commit(scratch).await?;
        }
        Ok(applied)
    }

    async fn set_notifications(
        &self,
        tracking_number: &str,
        enabled: bool,
    ) -> Result<Option<Shipment>> {
        let _guard = self.write_lock.lock().await;
        let scratch = self.scratch().await;
        let updated = scratch.set_notifications(tracking_number, enabled).await?;
        if updated.is_some() {
            self.commit(scratch).await?;
        }
        Ok(updated)
    }
}

#[async_trait]
impl UserStore for JsonFileStore {
    async fn upsert_by_chat_id(
        &self,
        chat_id: ChatId,
        profile: &SenderProfile,
    ) -> Result<ChatUser> {
        let _guard = self.write_lock.lock().await;
        let scratch = self.scratch().await;
        let user = scratch.upsert_by_chat_id(chat_id, profile).await?;
        self.commit(scratch).await?;
        Ok(user)
    }

    async fn add_tracked_number(&self, chat_id: ChatId, tracking_number: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let scratch = self.scratch().await;
        scratch.add_tracked_number(chat_id, tracking_number).await?;
        self.commit(scratch).await
    }

    async fn find(&self, chat_id: ChatId) -> Result<Option<ChatUser>> {
        self.inner.find(chat_id).await
    }
}
