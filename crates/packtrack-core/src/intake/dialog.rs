//! Per-chat dialog state with a size bound and idle expiry.

use std::{collections::HashMap, time::Duration};

use tokio::{sync::Mutex, time::Instant};

use crate::domain::ChatId;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DialogState {
    #[default]
    Idle,
    AwaitingTrackingInput,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    state: DialogState,
    touched: Instant,
}

/// Absence of an entry (or an expired one) reads as [`DialogState::Idle`],
/// so only non-idle states are stored.
pub struct DialogStates {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<ChatId, Entry>>,
}

impl DialogStates {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, chat_id: ChatId) -> DialogState {
        let mut map = self.entries.lock().await;
        match map.get(&chat_id) {
            Some(e) if e.touched.elapsed() < self.ttl => e.state,
            Some(_) => {
                map.remove(&chat_id);
                DialogState::Idle
            }
            None => DialogState::Idle,
        }
    }

    pub async fn set(&self, chat_id: ChatId, state: DialogState) {
        let mut map = self.entries.lock().await;
        if state == DialogState::Idle {
            map.remove(&chat_id);
            return;
        }

        map.insert(
            chat_id,
            Entry {
                state,
                touched: Instant::now(),
            },
        );

        if map.len() > self.capacity {
            let ttl = self.ttl;
            map.retain(|_, e| e.touched.elapsed() < ttl);
        }
        while map.len() > self.capacity {
            let Some(oldest) = map
                .iter()
                .min_by_key(|(_, e)| e.touched)
                .map(|(id, _)| *id)
            else {
                break;
            };
            tracing::debug!(chat_id = %oldest, "dialog cache full, evicting oldest entry");
            map.remove(&oldest);
        }
    }

    pub async fn clear(&self, chat_id: ChatId) {
        self.entries.lock().await.remove(&chat_id);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
