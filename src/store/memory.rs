//! In-process `RemoteStore`.
//!
//! Behaves like the hosted store as far as the core can observe: server
//! assigned ids and strictly increasing timestamps, a change feed delivered
//! in commit order, a joinable profile table and the singleton settings row.
//! Reads can be denied and any operation can be made to fail once, which is
//! how the demo and the tests exercise the failure paths.

use crate::error::{SyncError, SyncResult};
use crate::models::{
    ChangeEvent, ChatSettings, FileUpload, MessageId, MessagePatch, MessageRow,
    MessageWithProfile, NewMessage, SenderProfile, SettingsPatch, SettingsRow, Table,
};
use crate::store::{RemoteStore, Subscription, SubscriptionId, SubscriptionRegistry};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Id no row can ever have. Bulk delete removes every row not equal to it.
const IMPOSSIBLE_ID: Uuid = Uuid::nil();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    SelectMessages,
    InsertMessage,
    UpdateMessage,
    DeleteMessage,
    DeleteAllMessages,
    FetchProfile,
    SelectSettings,
    UpdateSettings,
    UploadFile,
    Subscribe,
}

#[derive(Default)]
struct MemoryState {
    messages: Vec<MessageRow>,
    profiles: HashMap<Uuid, SenderProfile>,
    settings: Option<SettingsRow>,
    uploads: HashMap<String, FileUpload>,
    last_created_at: Option<DateTime<Utc>>,
    read_denied: bool,
    failures: HashMap<StoreOp, SyncError>,
    latency_before_snapshot: Duration,
    latency_after_snapshot: Duration,
}

impl MemoryState {
    fn take_failure(&mut self, op: StoreOp) -> SyncResult<()> {
        match self.failures.remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let created_at = match self.last_created_at {
            Some(last) if now <= last => last + ChronoDuration::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(created_at);
        created_at
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    registry: SubscriptionRegistry,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_settings(row_id: Uuid, settings: ChatSettings) -> Self {
        let store = Self::new();
        store.state.lock().await.settings = Some(SettingsRow {
            id: row_id,
            settings,
        });
        store
    }

    pub async fn put_profile(&self, user_id: Uuid, profile: SenderProfile) {
        self.state.lock().await.profiles.insert(user_id, profile);
    }

    /// Reject `select_messages` as the store would for an unauthorized reader.
    pub async fn set_read_denied(&self, denied: bool) {
        self.state.lock().await.read_denied = denied;
    }

    /// Make the next call of `op` fail with `err`.
    pub async fn fail_next(&self, op: StoreOp, err: SyncError) {
        self.state.lock().await.failures.insert(op, err);
    }

    /// Delay `select_messages` before and after it takes its snapshot.
    pub async fn set_select_latency(&self, before_snapshot: Duration, after_snapshot: Duration) {
        let mut state = self.state.lock().await;
        state.latency_before_snapshot = before_snapshot;
        state.latency_after_snapshot = after_snapshot;
    }

    /// Push an event onto the feed again, as a retrying store would.
    pub async fn redeliver(&self, event: ChangeEvent) {
        self.registry.broadcast(event).await;
    }

    pub async fn rows(&self) -> Vec<MessageRow> {
        self.state.lock().await.messages.clone()
    }

    pub async fn settings_row(&self) -> Option<SettingsRow> {
        self.state.lock().await.settings
    }

    pub async fn subscriber_count(&self, table: Table) -> usize {
        self.registry.subscriber_count(table).await
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn select_messages(&self) -> SyncResult<Vec<MessageWithProfile>> {
        let before = {
            let mut state = self.state.lock().await;
            state.take_failure(StoreOp::SelectMessages)?;
            if state.read_denied {
                return Err(SyncError::PermissionDenied(
                    "messages are not readable with the current credentials".into(),
                ));
            }
            state.latency_before_snapshot
        };
        if !before.is_zero() {
            tokio::time::sleep(before).await;
        }

        let (rows, after) = {
            let state = self.state.lock().await;
            let rows: Vec<MessageWithProfile> = state
                .messages
                .iter()
                .map(|row| MessageWithProfile {
                    row: row.clone(),
                    profile: row.sender_id.and_then(|id| state.profiles.get(&id).cloned()),
                })
                .collect();
            (rows, state.latency_after_snapshot)
        };
        if !after.is_zero() {
            tokio::time::sleep(after).await;
        }

        Ok(rows)
    }

    async fn insert_message(&self, message: NewMessage) -> SyncResult<MessageRow> {
        let mut state = self.state.lock().await;
        state.take_failure(StoreOp::InsertMessage)?;

        let row = MessageRow {
            id: Uuid::new_v4(),
            sender_id: message.sender_id,
            content: message.content,
            message_type: message.message_type,
            file_url: message.file_url,
            created_at: state.next_created_at(),
            expires_at: message.expires_at,
        };
        state.messages.push(row.clone());

        // Broadcast while still holding the lock so feed order matches commit order.
        self.registry
            .broadcast(ChangeEvent::MessageInserted { row: row.clone() })
            .await;
        Ok(row)
    }

    async fn update_message(&self, id: MessageId, patch: MessagePatch) -> SyncResult<()> {
        let mut state = self.state.lock().await;
        state.take_failure(StoreOp::UpdateMessage)?;

        let row = state
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(SyncError::NotFound)?;
        patch.apply_to(row);
        let row = row.clone();

        self.registry
            .broadcast(ChangeEvent::MessageUpdated { row })
            .await;
        Ok(())
    }

    async fn delete_message(&self, id: MessageId) -> SyncResult<()> {
        let mut state = self.state.lock().await;
        state.take_failure(StoreOp::DeleteMessage)?;

        let before = state.messages.len();
        state.messages.retain(|m| m.id != id);
        if state.messages.len() != before {
            self.registry
                .broadcast(ChangeEvent::MessageDeleted { id })
                .await;
        }
        Ok(())
    }

    async fn delete_all_messages(&self) -> SyncResult<()> {
        let mut state = self.state.lock().await;
        state.take_failure(StoreOp::DeleteAllMessages)?;

        let (removed, kept): (Vec<MessageRow>, Vec<MessageRow>) = std::mem::take(&mut state.messages)
            .into_iter()
            .partition(|m| m.id != IMPOSSIBLE_ID);
        state.messages = kept;

        for row in removed {
            self.registry
                .broadcast(ChangeEvent::MessageDeleted { id: row.id })
                .await;
        }
        Ok(())
    }

    async fn fetch_profile(&self, user_id: Uuid) -> SyncResult<Option<SenderProfile>> {
        let mut state = self.state.lock().await;
        state.take_failure(StoreOp::FetchProfile)?;
        Ok(state.profiles.get(&user_id).cloned())
    }

    async fn select_settings(&self, row_id: Uuid) -> SyncResult<ChatSettings> {
        let mut state = self.state.lock().await;
        state.take_failure(StoreOp::SelectSettings)?;
        match state.settings {
            Some(row) if row.id == row_id => Ok(row.settings),
            _ => Err(SyncError::NotFound),
        }
    }

    async fn update_settings(&self, row_id: Uuid, patch: SettingsPatch) -> SyncResult<()> {
        let mut state = self.state.lock().await;
        state.take_failure(StoreOp::UpdateSettings)?;

        let mut row = match state.settings {
            Some(row) if row.id == row_id => row,
            _ => SettingsRow {
                id: row_id,
                settings: ChatSettings::default(),
            },
        };
        patch.apply_to(&mut row.settings);
        state.settings = Some(row);

        self.registry
            .broadcast(ChangeEvent::SettingsUpdated { row })
            .await;
        Ok(())
    }

    async fn upload_file(&self, upload: FileUpload) -> SyncResult<String> {
        let mut state = self.state.lock().await;
        state.take_failure(StoreOp::UploadFile)?;
        if upload.bytes.is_empty() {
            return Err(SyncError::BadRequest("uploaded file is empty".into()));
        }
        let url = format!("memory://chat-files/{}/{}", Uuid::new_v4(), upload.file_name);
        state.uploads.insert(url.clone(), upload);
        Ok(url)
    }

    async fn subscribe(&self, table: Table) -> SyncResult<Subscription> {
        self.state.lock().await.take_failure(StoreOp::Subscribe)?;
        Ok(self.registry.add_subscriber(table).await)
    }

    async fn unsubscribe(&self, id: SubscriptionId) {
        self.registry.remove_subscriber(id).await;
    }
}
