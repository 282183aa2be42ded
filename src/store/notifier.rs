use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::account::AccountId;

use super::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient: AccountId,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub recipient: AccountId,
    pub message: String,
}

impl NotificationDraft {
    pub(crate) fn stamp(self, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            recipient: self.recipient,
            message: self.message,
            created_at,
            read: false,
        }
    }
}

#[derive(Default)]
struct NotifierState {
    items: Vec<Notification>,
    by_recipient: HashMap<AccountId, Vec<usize>>,
    by_id: HashMap<Uuid, usize>,
}

#[derive(Default)]
pub struct Notifier {
    state: RwLock<NotifierState>,
}

impl Notifier {
    pub fn list_by_recipient(&self, recipient: &str) -> Vec<Notification> {
        let state = self.state.read();
        state
            .by_recipient
            .get(recipient)
            .map(|indices| {
                indices
                    .iter()
                    .rev()
                    .map(|&idx| state.items[idx].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn unread_count(&self, recipient: &str) -> usize {
        let state = self.state.read();
        state.by_recipient.get(recipient).map_or(0, |indices| {
            indices.iter().filter(|&&idx| !state.items[idx].read).count()
        })
    }

    pub fn len(&self) -> usize {
        self.state.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Idempotent. Returns whether the flag actually changed.
    pub fn mark_read(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.write();
        let idx = *state
            .by_id
            .get(&id)
            .ok_or(StoreError::NotificationNotFound(id))?;
        let item = &mut state.items[idx];
        let changed = !item.read;
        item.read = true;
        Ok(changed)
    }

    pub(crate) fn append(&self, notifications: impl IntoIterator<Item = Notification>) {
        let mut state = self.state.write();
        for notification in notifications {
            let idx = state.items.len();
            state.by_id.insert(notification.id, idx);
            state
                .by_recipient
                .entry(notification.recipient.clone())
                .or_default()
                .push(idx);
            state.items.push(notification);
        }
    }
}
