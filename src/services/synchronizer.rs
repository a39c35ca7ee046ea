//! # Message Synchronizer
//!
//! Keeps the local message list consistent with the remote store.
//!
//! The store is the only writer of truth: the list changes only in response
//! to a bulk fetch or a change notification (plus the two explicit local
//! removals used by the expiry sweep and delete-all). Nothing the actor
//! sends is shown until its own insert notification comes back.
//!
//! ## Sessions
//!
//! Every `begin_session` bumps a generation counter. Results of async work
//! (bulk fetches, profile lookups) are applied only while the generation they
//! started under is still current, so a fetch that resolves after the actor
//! changed is dropped instead of leaking into the new session.
//!
//! ## Fetch window
//!
//! The live feed is opened before the bulk fetch. While a fetch is in flight
//! every insert, update and delete the feed delivers is also recorded, and
//! the merge step reconciles the snapshot against them:
//!
//! - rows the feed inserted but the snapshot missed are kept
//! - rows the feed deleted are dropped even if the snapshot still has them
//! - feed updates are replayed on top of the snapshot, in delivery order
//! - an id never appears twice

use crate::error::SyncError;
use crate::identity::Actor;
use crate::models::{ChangeEvent, ChatMessage, ChatSettings, MessageId, MessageRow, MessageWithProfile, SenderProfile};
use crate::services::expiry;
use crate::services::notices::{Notice, Notifier};
use crate::services::permissions::can_view;
use crate::store::RemoteStore;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Identity of one actor session as seen by the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub generation: u64,
    pub actor: Actor,
    pub is_organizer: bool,
}

/// Result of a bulk load.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The list now holds this many messages
    Loaded(usize),
    /// The read gate is closed for this actor; the list was cleared
    Hidden,
    /// The store refused the read; treated as "no visible messages"
    Denied,
    /// The fetch failed; a notice was raised and the list left empty
    Failed(SyncError),
    /// A newer load started while this one was in flight
    Superseded,
    /// The session ended while the fetch was in flight
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    /// Insert for an id already in the list
    Duplicate,
    /// Update or delete for an id not in the list
    Missing,
    /// Not a message event, or the list is not visible to this session
    Ignored,
    Stale,
}

#[derive(Debug, Default)]
struct FetchWindow {
    load_id: u64,
    inserted: HashSet<MessageId>,
    deleted: HashSet<MessageId>,
    updates: Vec<MessageRow>,
}

#[derive(Debug, Default)]
struct SyncState {
    generation: u64,
    session: Option<SessionToken>,
    visible: bool,
    messages: Vec<ChatMessage>,
    next_load_id: u64,
    window: Option<FetchWindow>,
}

impl SyncState {
    fn is_current(&self, token: &SessionToken) -> bool {
        self.session
            .as_ref()
            .map(|s| s.generation == token.generation)
            .unwrap_or(false)
    }

    fn contains(&self, id: MessageId) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    fn reset(&mut self) {
        self.visible = false;
        self.messages.clear();
        self.window = None;
    }
}

pub struct MessageSynchronizer {
    store: Arc<dyn RemoteStore>,
    state: RwLock<SyncState>,
    notifier: Notifier,
}

impl MessageSynchronizer {
    pub fn new(store: Arc<dyn RemoteStore>, notifier: Notifier) -> Self {
        Self {
            store,
            state: RwLock::new(SyncState::default()),
            notifier,
        }
    }

    /// Start a new session for `actor`, invalidating any previous one.
    pub async fn begin_session(&self, actor: Actor, is_organizer: bool) -> SessionToken {
        let mut state = self.state.write().await;
        state.generation += 1;
        state.reset();

        let token = SessionToken {
            generation: state.generation,
            actor,
            is_organizer,
        };
        state.session = Some(token.clone());

        tracing::debug!(
            "Started sync session {} for {:?} (organizer: {})",
            token.generation,
            token.actor.actor_id,
            is_organizer
        );
        token
    }

    pub async fn end_session(&self) {
        let mut state = self.state.write().await;
        state.generation += 1;
        state.session = None;
        state.reset();
    }

    pub async fn current_session(&self) -> Option<SessionToken> {
        self.state.read().await.session.clone()
    }

    pub async fn is_current(&self, token: &SessionToken) -> bool {
        self.state.read().await.is_current(token)
    }

    /// Bulk-load the list for `token` under `settings`.
    ///
    /// Replaces the list with the store's snapshot merged against whatever
    /// the feed delivered while the fetch was in flight.
    pub async fn load(&self, token: &SessionToken, settings: &ChatSettings) -> LoadOutcome {
        let load_id = {
            let mut state = self.state.write().await;
            if !state.is_current(token) {
                return LoadOutcome::Stale;
            }

            if !can_view(settings, &token.actor, token.is_organizer) {
                tracing::info!(
                    actor_id = ?token.actor.actor_id,
                    permission_level = %settings.permission_level,
                    "message list not visible to this actor"
                );
                state.reset();
                return LoadOutcome::Hidden;
            }

            state.visible = true;
            state.next_load_id += 1;
            let load_id = state.next_load_id;
            state.window = Some(FetchWindow {
                load_id,
                ..FetchWindow::default()
            });
            load_id
        };

        let result = self.store.select_messages().await;

        let mut state = self.state.write().await;
        if !state.is_current(token) {
            tracing::debug!("Discarding fetch for ended session {}", token.generation);
            return LoadOutcome::Stale;
        }

        let window = match state.window.take() {
            Some(window) if window.load_id == load_id => window,
            newer => {
                state.window = newer;
                return LoadOutcome::Superseded;
            }
        };

        match result {
            Ok(rows) => {
                let merged = merge_snapshot(rows, window, &state.messages, token.actor.actor_id);
                let count = merged.len();
                state.messages = merged;
                tracing::debug!("Loaded {} message(s) for session {}", count, token.generation);
                LoadOutcome::Loaded(count)
            }
            Err(e) if e.is_permission_denied() => {
                tracing::info!(
                    actor_id = ?token.actor.actor_id,
                    reason = %e,
                    "message read denied, showing empty list"
                );
                state.reset();
                LoadOutcome::Denied
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load messages");
                state.messages.clear();
                self.notifier.notify(Notice::LoadFailed {
                    reason: e.to_string(),
                });
                LoadOutcome::Failed(e)
            }
        }
    }

    /// Apply one change notification from the messages feed.
    pub async fn apply_event(&self, token: &SessionToken, event: ChangeEvent) -> EventOutcome {
        match event {
            ChangeEvent::MessageInserted { row } => self.apply_insert(token, row).await,
            ChangeEvent::MessageUpdated { row } => self.apply_update(token, row).await,
            ChangeEvent::MessageDeleted { id } => self.apply_delete(token, id).await,
            ChangeEvent::SettingsUpdated { .. } => EventOutcome::Ignored,
        }
    }

    async fn apply_insert(&self, token: &SessionToken, row: MessageRow) -> EventOutcome {
        {
            let state = self.state.read().await;
            if !state.is_current(token) {
                return EventOutcome::Stale;
            }
            if !state.visible {
                return EventOutcome::Ignored;
            }
            if state.contains(row.id) {
                tracing::debug!(message_id = %row.id, "duplicate insert notification");
                return EventOutcome::Duplicate;
            }
        }

        // The feed carries the bare row, so the profile comes from a point lookup.
        let profile = match row.sender_id {
            Some(sender_id) => self.lookup_profile(sender_id).await,
            None => None,
        };

        let mut state = self.state.write().await;
        if !state.is_current(token) {
            return EventOutcome::Stale;
        }
        if !state.visible {
            return EventOutcome::Ignored;
        }
        if state.contains(row.id) {
            tracing::debug!(message_id = %row.id, "duplicate insert notification");
            return EventOutcome::Duplicate;
        }

        if let Some(window) = state.window.as_mut() {
            window.inserted.insert(row.id);
        }
        tracing::debug!(message_id = %row.id, message_type = %row.message_type, "message inserted");
        state
            .messages
            .push(ChatMessage::from_row(row, profile, token.actor.actor_id));
        EventOutcome::Applied
    }

    async fn apply_update(&self, token: &SessionToken, row: MessageRow) -> EventOutcome {
        let mut state = self.state.write().await;
        if !state.is_current(token) {
            return EventOutcome::Stale;
        }
        if !state.visible {
            return EventOutcome::Ignored;
        }

        if let Some(window) = state.window.as_mut() {
            window.updates.push(row.clone());
        }

        match state.messages.iter_mut().find(|m| m.id == row.id) {
            Some(message) => {
                message.apply_update(&row);
                tracing::debug!("Message {} updated", row.id);
                EventOutcome::Applied
            }
            None => {
                // Possibly filtered out by a permission change in between
                tracing::debug!(message_id = %row.id, "update for message not in list");
                EventOutcome::Missing
            }
        }
    }

    async fn apply_delete(&self, token: &SessionToken, id: MessageId) -> EventOutcome {
        let mut state = self.state.write().await;
        if !state.is_current(token) {
            return EventOutcome::Stale;
        }
        if !state.visible {
            return EventOutcome::Ignored;
        }

        if let Some(window) = state.window.as_mut() {
            window.deleted.insert(id);
        }

        let before = state.messages.len();
        state.messages.retain(|m| m.id != id);
        if state.messages.len() == before {
            tracing::debug!(message_id = %id, "delete for message not in list");
            return EventOutcome::Missing;
        }
        tracing::debug!("Message {} deleted", id);
        EventOutcome::Applied
    }

    async fn lookup_profile(&self, user_id: Uuid) -> Option<SenderProfile> {
        match self.store.fetch_profile(user_id).await {
            Ok(profile) => profile,
            Err(SyncError::NotFound) => None,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "profile lookup failed");
                None
            }
        }
    }

    /// Drop a message the store has confirmed deleting.
    pub async fn remove_local(&self, token: &SessionToken, id: MessageId) -> bool {
        let mut state = self.state.write().await;
        if !state.is_current(token) {
            return false;
        }
        if let Some(window) = state.window.as_mut() {
            window.deleted.insert(id);
        }
        let before = state.messages.len();
        state.messages.retain(|m| m.id != id);
        state.messages.len() != before
    }

    /// Drop the messages a confirmed delete-all covered.
    ///
    /// `ids` is the list as it stood before the delete was sent. Anything the
    /// feed inserted after that snapshot stays.
    pub async fn clear_local(&self, token: &SessionToken, ids: &[MessageId]) -> usize {
        let mut state = self.state.write().await;
        if !state.is_current(token) {
            return 0;
        }
        if let Some(window) = state.window.as_mut() {
            window.deleted.extend(ids.iter().copied());
        }
        let before = state.messages.len();
        state.messages.retain(|m| !ids.contains(&m.id));
        before - state.messages.len()
    }

    pub async fn message_ids(&self) -> Vec<MessageId> {
        self.state.read().await.messages.iter().map(|m| m.id).collect()
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.state.read().await.messages.clone()
    }

    pub async fn expired_ids(&self, now: DateTime<Utc>) -> Vec<MessageId> {
        let state = self.state.read().await;
        expiry::expired_ids(&state.messages, now)
    }
}

fn merge_snapshot(
    rows: Vec<MessageWithProfile>,
    window: FetchWindow,
    local: &[ChatMessage],
    actor_id: Option<Uuid>,
) -> Vec<ChatMessage> {
    let mut seen = HashSet::with_capacity(rows.len());
    let mut merged: Vec<ChatMessage> = Vec::with_capacity(rows.len());

    for MessageWithProfile { row, profile } in rows {
        if window.deleted.contains(&row.id) || !seen.insert(row.id) {
            continue;
        }
        merged.push(ChatMessage::from_row(row, profile, actor_id));
    }

    for message in local {
        if window.inserted.contains(&message.id)
            && !window.deleted.contains(&message.id)
            && seen.insert(message.id)
        {
            merged.push(message.clone());
        }
    }

    for row in &window.updates {
        if let Some(message) = merged.iter_mut().find(|m| m.id == row.id) {
            message.apply_update(row);
        }
    }

    merged.sort_by_key(|m| m.created_at);
    merged
}
