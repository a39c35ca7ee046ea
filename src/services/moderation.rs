//! Organizer-only actions.
//!
//! None of these touch the local list. Every effect comes back through the
//! change feed like any other write, except delete-all which the client
//! clears eagerly once the store has accepted it.

use crate::error::{SyncError, SyncResult};
use crate::models::{MessageId, MessagePatch, SettingsPatch};
use crate::services::synchronizer::SessionToken;
use crate::store::RemoteStore;
use std::sync::Arc;
use uuid::Uuid;

pub struct Moderation {
    store: Arc<dyn RemoteStore>,
    settings_row_id: Uuid,
}

impl Moderation {
    pub fn new(store: Arc<dyn RemoteStore>, settings_row_id: Uuid) -> Self {
        Self {
            store,
            settings_row_id,
        }
    }

    fn ensure_organizer(token: &SessionToken, action: &str) -> SyncResult<()> {
        if token.is_organizer {
            return Ok(());
        }
        tracing::warn!(
            actor_id = ?token.actor.actor_id,
            action,
            "moderation attempt by non-organizer"
        );
        Err(SyncError::Forbidden)
    }

    /// Replace a message's content. Any message edited this way becomes a
    /// plain text message; an attached file is dropped.
    pub async fn edit_message(
        &self,
        token: &SessionToken,
        id: MessageId,
        content: &str,
    ) -> SyncResult<()> {
        Self::ensure_organizer(token, "edit")?;
        self.store
            .update_message(id, MessagePatch::demote_to_text(content))
            .await?;
        tracing::info!("Message {} edited by organizer", id);
        Ok(())
    }

    pub async fn delete_message(&self, token: &SessionToken, id: MessageId) -> SyncResult<()> {
        Self::ensure_organizer(token, "delete")?;
        self.store.delete_message(id).await?;
        tracing::info!("Message {} deleted by organizer", id);
        Ok(())
    }

    pub async fn delete_all_messages(&self, token: &SessionToken) -> SyncResult<()> {
        Self::ensure_organizer(token, "delete_all")?;
        self.store.delete_all_messages().await?;
        tracing::info!("All messages deleted by organizer");
        Ok(())
    }

    pub async fn update_settings(&self, token: &SessionToken, patch: SettingsPatch) -> SyncResult<()> {
        Self::ensure_organizer(token, "update_settings")?;
        if patch.is_empty() {
            return Err(SyncError::BadRequest("settings patch changes nothing".into()));
        }
        self.store.update_settings(self.settings_row_id, patch).await?;
        tracing::info!(
            permission_level = ?patch.permission_level,
            expiry_duration = ?patch.expiry_duration,
            "chat settings updated by organizer"
        );
        Ok(())
    }
}
