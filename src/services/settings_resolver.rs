//! Settings Resolver
//!
//! Single source of truth for who may post and how long messages live.
//! Reads never block the chat: a missing row or a failing store both resolve
//! to the fallback settings, the latter with a warning notice.

use crate::error::SyncError;
use crate::models::{ChatSettings, SettingsRow};
use crate::services::notices::{Notice, Notifier};
use crate::store::RemoteStore;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default, Clone, Copy)]
struct Snapshot {
    settings: ChatSettings,
    // bumped by every notification and reset
    revision: u64,
}

pub struct SettingsResolver {
    store: Arc<dyn RemoteStore>,
    row_id: Uuid,
    current: RwLock<Snapshot>,
    notifier: Notifier,
}

impl SettingsResolver {
    pub fn new(store: Arc<dyn RemoteStore>, row_id: Uuid, notifier: Notifier) -> Self {
        Self {
            store,
            row_id,
            current: RwLock::new(Snapshot::default()),
            notifier,
        }
    }

    pub fn row_id(&self) -> Uuid {
        self.row_id
    }

    /// Read the settings row, falling back to defaults.
    ///
    /// Never fails. The caller decides whether the result is still wanted
    /// before handing it to [`install`](Self::install).
    pub async fn fetch_settings(&self) -> ChatSettings {
        match self.store.select_settings(self.row_id).await {
            Ok(settings) => settings,
            Err(SyncError::NotFound) => {
                // Row not created yet - nobody has changed the defaults
                tracing::debug!(row_id = %self.row_id, "no settings row, using defaults");
                ChatSettings::default()
            }
            Err(e) => {
                tracing::warn!(
                    row_id = %self.row_id,
                    error = %e,
                    "failed to load chat settings, using defaults"
                );
                self.notifier.notify(Notice::SettingsUnavailable {
                    reason: e.to_string(),
                });
                ChatSettings::default()
            }
        }
    }

    pub async fn current(&self) -> ChatSettings {
        self.current.read().await.settings
    }

    pub async fn revision(&self) -> u64 {
        self.current.read().await.revision
    }

    /// Install fetched settings unless a notification landed since `revision`
    /// was read. A notification is never older than a fetch that raced it.
    pub async fn install(&self, settings: ChatSettings, revision: u64) -> bool {
        let mut guard = self.current.write().await;
        if guard.revision != revision {
            tracing::debug!(
                "Settings changed while fetching, keeping {}",
                guard.settings.permission_level
            );
            return false;
        }
        guard.settings = settings;
        true
    }

    pub async fn reset(&self) {
        let mut guard = self.current.write().await;
        guard.settings = ChatSettings::default();
        guard.revision += 1;
    }

    /// Apply a settings notification.
    ///
    /// Both fields are replaced together. Returns the new settings, or `None`
    /// when the notification is for some other row.
    pub async fn apply_notification(&self, row: &SettingsRow) -> Option<ChatSettings> {
        if row.id != self.row_id {
            tracing::debug!(row_id = %row.id, "ignoring settings update for foreign row");
            return None;
        }

        let mut guard = self.current.write().await;
        let previous = guard.settings;
        guard.settings = row.settings;
        guard.revision += 1;

        tracing::info!(
            permission_level = %row.settings.permission_level,
            expiry_duration = %row.settings.expiry_duration,
            previous_permission_level = %previous.permission_level,
            "chat settings changed"
        );
        Some(row.settings)
    }
}
