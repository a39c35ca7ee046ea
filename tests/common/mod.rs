//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use realtime_chat_sync::config::DEFAULT_SETTINGS_ROW_ID;
use realtime_chat_sync::models::{
    ChatMessage, ChatSettings, ExpiryDuration, FileUpload, MessageId, MessagePatch, MessageRow,
    MessageWithProfile, NewMessage, PermissionLevel, SenderProfile, SettingsPatch, Table,
};
use realtime_chat_sync::store::{Subscription, SubscriptionId};
use realtime_chat_sync::{Actor, ChatClient, Config, MemoryStore, RemoteStore, SyncResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const ORGANIZER_EMAIL: &str = "organizer@example.org";

pub fn config() -> Config {
    Config::new(ORGANIZER_EMAIL)
}

pub fn settings(level: PermissionLevel, expiry: ExpiryDuration) -> ChatSettings {
    ChatSettings::new(level, expiry)
}

pub async fn store_with(level: PermissionLevel, expiry: ExpiryDuration) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_settings(DEFAULT_SETTINGS_ROW_ID, settings(level, expiry)).await)
}

pub fn organizer() -> Actor {
    Actor::signed_in(Uuid::new_v4(), ORGANIZER_EMAIL)
}

pub fn member() -> Actor {
    Actor::signed_in(Uuid::new_v4(), format!("{}@example.org", Uuid::new_v4()))
}

pub async fn client_for(store: Arc<dyn RemoteStore>, actor: Actor) -> ChatClient {
    let client = ChatClient::new(config(), store);
    client.initialize(actor).await;
    client
}

/// Poll the client's list until `check` holds, failing after two seconds.
pub async fn wait_for_messages<F>(client: &ChatClient, check: F) -> Vec<ChatMessage>
where
    F: Fn(&[ChatMessage]) -> bool,
{
    let result = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let messages = client.messages().await;
            if check(&messages) {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    match result {
        Ok(messages) => messages,
        Err(_) => panic!(
            "message list never reached the expected state: {:?}",
            client.messages().await
        ),
    }
}

pub async fn wait_for_settings(client: &ChatClient, expected: ChatSettings) {
    let result = tokio::time::timeout(Duration::from_secs(2), async {
        while client.settings().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "settings never became {expected:?}");
}

/// Let in-flight notifications land before asserting that nothing else happens.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// `RemoteStore` wrapper that counts writes so tests can prove none happened.
pub struct CountingStore {
    pub inner: Arc<MemoryStore>,
    inserts: AtomicUsize,
    uploads: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            inserts: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
            + self.uploads.load(Ordering::SeqCst)
            + self.updates.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for CountingStore {
    async fn select_messages(&self) -> SyncResult<Vec<MessageWithProfile>> {
        self.inner.select_messages().await
    }

    async fn insert_message(&self, message: NewMessage) -> SyncResult<MessageRow> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_message(message).await
    }

    async fn update_message(&self, id: MessageId, patch: MessagePatch) -> SyncResult<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_message(id, patch).await
    }

    async fn delete_message(&self, id: MessageId) -> SyncResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_message(id).await
    }

    async fn delete_all_messages(&self) -> SyncResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_all_messages().await
    }

    async fn fetch_profile(&self, user_id: Uuid) -> SyncResult<Option<SenderProfile>> {
        self.inner.fetch_profile(user_id).await
    }

    async fn select_settings(&self, row_id: Uuid) -> SyncResult<ChatSettings> {
        self.inner.select_settings(row_id).await
    }

    async fn update_settings(&self, row_id: Uuid, patch: SettingsPatch) -> SyncResult<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_settings(row_id, patch).await
    }

    async fn upload_file(&self, upload: FileUpload) -> SyncResult<String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.inner.upload_file(upload).await
    }

    async fn subscribe(&self, table: Table) -> SyncResult<Subscription> {
        self.inner.subscribe(table).await
    }

    async fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.unsubscribe(id).await
    }
}

/// `RemoteStore` wrapper that commits one extra change inside a call, after
/// the inner store has done its part but before the caller sees the result.
pub struct InterleavingStore {
    pub inner: Arc<MemoryStore>,
    after_delete_all: Mutex<Option<NewMessage>>,
    after_settings_read: Mutex<Option<SettingsPatch>>,
}

impl InterleavingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            after_delete_all: Mutex::new(None),
            after_settings_read: Mutex::new(None),
        }
    }

    /// Insert `message` right after the next bulk delete commits.
    pub async fn insert_after_delete_all(&self, message: NewMessage) {
        *self.after_delete_all.lock().await = Some(message);
    }

    /// Apply `patch` right after the next settings read.
    pub async fn update_after_settings_read(&self, patch: SettingsPatch) {
        *self.after_settings_read.lock().await = Some(patch);
    }
}

#[async_trait]
impl RemoteStore for InterleavingStore {
    async fn select_messages(&self) -> SyncResult<Vec<MessageWithProfile>> {
        self.inner.select_messages().await
    }

    async fn insert_message(&self, message: NewMessage) -> SyncResult<MessageRow> {
        self.inner.insert_message(message).await
    }

    async fn update_message(&self, id: MessageId, patch: MessagePatch) -> SyncResult<()> {
        self.inner.update_message(id, patch).await
    }

    async fn delete_message(&self, id: MessageId) -> SyncResult<()> {
        self.inner.delete_message(id).await
    }

    async fn delete_all_messages(&self) -> SyncResult<()> {
        self.inner.delete_all_messages().await?;
        if let Some(message) = self.after_delete_all.lock().await.take() {
            self.inner.insert_message(message).await?;
            // Ack arrives after the insert notification has been applied
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        Ok(())
    }

    async fn fetch_profile(&self, user_id: Uuid) -> SyncResult<Option<SenderProfile>> {
        self.inner.fetch_profile(user_id).await
    }

    async fn select_settings(&self, row_id: Uuid) -> SyncResult<ChatSettings> {
        let settings = self.inner.select_settings(row_id).await?;
        if let Some(patch) = self.after_settings_read.lock().await.take() {
            self.inner.update_settings(row_id, patch).await?;
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        Ok(settings)
    }

    async fn update_settings(&self, row_id: Uuid, patch: SettingsPatch) -> SyncResult<()> {
        self.inner.update_settings(row_id, patch).await
    }

    async fn upload_file(&self, upload: FileUpload) -> SyncResult<String> {
        self.inner.upload_file(upload).await
    }

    async fn subscribe(&self, table: Table) -> SyncResult<Subscription> {
        self.inner.subscribe(table).await
    }

    async fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.unsubscribe(id).await
    }
}
