//! Remote message store contract.
//!
//! The store is the authoritative, persisted, ordered collection of messages
//! plus the singleton settings row. The core only ever reads from it, asks it
//! to change, and listens to its change feed.

use crate::error::SyncResult;
use crate::models::{
    ChatSettings, FileUpload, MessageId, MessagePatch, MessageRow, MessageWithProfile,
    NewMessage, SenderProfile, SettingsPatch, Table,
};
use async_trait::async_trait;
use uuid::Uuid;

pub mod memory;
pub mod registry;

pub use memory::{MemoryStore, StoreOp};
pub use registry::{Subscription, SubscriptionId, SubscriptionRegistry};

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All visible messages with their joined sender profile, ascending by
    /// `created_at`. Fails with `PermissionDenied` when the store refuses the
    /// read for the current credentials.
    async fn select_messages(&self) -> SyncResult<Vec<MessageWithProfile>>;

    /// Insert a message; the store assigns `id` and `created_at`.
    async fn insert_message(&self, message: NewMessage) -> SyncResult<MessageRow>;

    async fn update_message(&self, id: MessageId, patch: MessagePatch) -> SyncResult<()>;

    async fn delete_message(&self, id: MessageId) -> SyncResult<()>;

    async fn delete_all_messages(&self) -> SyncResult<()>;

    /// Point lookup used for rows that arrive through the feed without a join.
    async fn fetch_profile(&self, user_id: Uuid) -> SyncResult<Option<SenderProfile>>;

    /// Fails with `NotFound` when the row has not been created yet.
    async fn select_settings(&self, row_id: Uuid) -> SyncResult<ChatSettings>;

    /// Creates the row from defaults when it does not exist yet.
    async fn update_settings(&self, row_id: Uuid, patch: SettingsPatch) -> SyncResult<()>;

    /// Stores binary content and returns the URL it is served from.
    async fn upload_file(&self, upload: FileUpload) -> SyncResult<String>;

    async fn subscribe(&self, table: Table) -> SyncResult<Subscription>;

    async fn unsubscribe(&self, id: SubscriptionId);
}
