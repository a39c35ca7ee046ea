//! Session lifecycle and the actor-facing surface.
//!
//! A [`ChatClient`] owns one actor session at a time: the settings snapshot,
//! the two feed subscriptions, the message list and the expiry sweep. A change
//! of actor tears all of it down before the next session starts, so nothing
//! from the previous actor survives into the new one.

use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::identity::{Actor, IdentityProvider};
use crate::models::{
    ChangeEvent, ChatMessage, ChatSettings, ExpiryDuration, FileUpload, MessageId, NewMessage,
    PermissionLevel, SettingsPatch, Table,
};
use crate::services::expiry::compute_expiry;
use crate::services::permissions::{can_write, write_denial};
use crate::services::{
    EventOutcome, LoadOutcome, MessageSynchronizer, Moderation, Notice, Notifier,
    SessionToken, SettingsResolver,
};
use crate::store::{RemoteStore, Subscription, SubscriptionId};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, PartialEq)]
pub enum InitOutcome {
    /// Identity is still resolving; nothing was started
    Waiting,
    /// A session for this actor is already running
    AlreadyActive,
    Started { load: LoadOutcome },
}

#[derive(Default)]
struct Lifecycle {
    session: Option<SessionToken>,
    tasks: Vec<JoinHandle<()>>,
    subscriptions: Vec<SubscriptionId>,
}

struct ClientInner {
    config: Config,
    store: Arc<dyn RemoteStore>,
    resolver: Arc<SettingsResolver>,
    sync: Arc<MessageSynchronizer>,
    moderation: Moderation,
    notifier: Notifier,
    lifecycle: Mutex<Lifecycle>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        for task in self.lifecycle.get_mut().tasks.drain(..) {
            task.abort();
        }
    }
}

#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<ClientInner>,
}

impl ChatClient {
    pub fn new(config: Config, store: Arc<dyn RemoteStore>) -> Self {
        let notifier = Notifier::new(config.notice_capacity);
        let resolver = SettingsResolver::new(store.clone(), config.settings_row_id, notifier.clone());
        let sync = MessageSynchronizer::new(store.clone(), notifier.clone());
        let moderation = Moderation::new(store.clone(), config.settings_row_id);

        Self {
            inner: Arc::new(ClientInner {
                config,
                store,
                resolver: Arc::new(resolver),
                sync: Arc::new(sync),
                moderation,
                notifier,
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        }
    }

    /// Start a session for `actor`.
    ///
    /// Both feeds are opened first, then settings are resolved, then the
    /// list is fetched, so nothing committed during either fetch is missed.
    pub async fn initialize(&self, actor: Actor) -> InitOutcome {
        if !actor.is_ready() {
            tracing::debug!("identity still loading, deferring chat session");
            return InitOutcome::Waiting;
        }

        let mut lifecycle = self.inner.lifecycle.lock().await;
        if let Some(session) = &lifecycle.session {
            if session.actor.same_session(&actor) {
                return InitOutcome::AlreadyActive;
            }
        }
        self.inner.teardown_locked(&mut lifecycle).await;

        let is_organizer = actor.is_organizer(&self.inner.config);
        let token = self.inner.sync.begin_session(actor, is_organizer).await;
        lifecycle.session = Some(token.clone());

        for table in [Table::Messages, Table::Settings] {
            match self.inner.store.subscribe(table).await {
                Ok(subscription) => {
                    lifecycle.subscriptions.push(subscription.id);
                    let task = self.inner.spawn_feed(token.clone(), subscription);
                    lifecycle.tasks.push(task);
                }
                Err(e) => {
                    // Live updates are degraded; the list still loads.
                    tracing::warn!(%table, error = %e, "failed to subscribe to change feed");
                }
            }
        }

        let revision = self.inner.resolver.revision().await;
        let fetched = self.inner.resolver.fetch_settings().await;
        if !self.inner.sync.is_current(&token).await {
            return InitOutcome::Started {
                load: LoadOutcome::Stale,
            };
        }
        self.inner.resolver.install(fetched, revision).await;
        let settings = self.inner.resolver.current().await;

        let load = self.inner.sync.load(&token, &settings).await;

        lifecycle.tasks.push(self.inner.spawn_sweep(token.clone()));

        tracing::info!(
            generation = token.generation,
            actor_id = ?token.actor.actor_id,
            is_organizer,
            permission_level = %settings.permission_level,
            ?load,
            "chat session started"
        );
        InitOutcome::Started { load }
    }

    /// End the current session: cancel background work, close both feeds,
    /// empty the list and forget the settings snapshot.
    pub async fn teardown(&self) {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        self.inner.teardown_locked(&mut lifecycle).await;
    }

    /// Follow an identity provider, restarting the session whenever the actor
    /// changes. The session ends when the provider goes away.
    pub fn follow_identity(&self, provider: &dyn IdentityProvider) -> JoinHandle<()> {
        let mut identity = provider.watch();
        let client = self.clone();
        tokio::spawn(async move {
            loop {
                let actor = identity.borrow_and_update().clone();
                client.initialize(actor).await;
                if identity.changed().await.is_err() {
                    tracing::debug!("Identity source closed, ending chat session");
                    client.teardown().await;
                    break;
                }
            }
        })
    }

    pub async fn session(&self) -> Option<SessionToken> {
        self.inner.sync.current_session().await
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.inner.sync.messages().await
    }

    pub async fn settings(&self) -> ChatSettings {
        self.inner.resolver.current().await
    }

    pub async fn permission_level(&self) -> PermissionLevel {
        self.settings().await.permission_level
    }

    pub async fn expiry_duration(&self) -> ExpiryDuration {
        self.settings().await.expiry_duration
    }

    pub async fn is_organizer(&self) -> bool {
        self.session().await.map(|s| s.is_organizer).unwrap_or(false)
    }

    /// Whether the compose box should be enabled.
    pub async fn can_send(&self) -> bool {
        match self.session().await {
            Some(session) => can_write(&self.settings().await, &session.actor, session.is_organizer),
            None => false,
        }
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notifier.subscribe()
    }

    /// Send a text message, or a file with an optional caption.
    ///
    /// The message is not added locally; it shows up when the store's insert
    /// notification arrives.
    pub async fn send(&self, content: &str, file: Option<FileUpload>) -> SyncResult<MessageId> {
        let (token, settings) = self.write_session().await?;
        let content = content.trim();
        if content.is_empty() && file.is_none() {
            return Err(SyncError::BadRequest("message is empty".into()));
        }

        let sender_id = token.actor.actor_id;
        let message = match file {
            Some(upload) => {
                let url = self
                    .inner
                    .store
                    .upload_file(upload)
                    .await
                    .map_err(|e| self.inner.report("upload", e))?;
                NewMessage::file(sender_id, content, url)
            }
            None => NewMessage::text(sender_id, content),
        };

        self.insert(&token, &settings, message).await
    }

    pub async fn send_link(&self, url: &str) -> SyncResult<MessageId> {
        let (token, settings) = self.write_session().await?;
        let url = url.trim();
        if url.is_empty() {
            return Err(SyncError::BadRequest("link is empty".into()));
        }
        self.insert(&token, &settings, NewMessage::link(token.actor.actor_id, url))
            .await
    }

    async fn write_session(&self) -> SyncResult<(SessionToken, ChatSettings)> {
        let token = self.session().await.ok_or(SyncError::Unauthenticated)?;
        let settings = self.settings().await;
        if let Some(reason) = write_denial(&settings, &token.actor, token.is_organizer) {
            tracing::info!(
                actor_id = ?token.actor.actor_id,
                permission_level = %settings.permission_level,
                reason,
                "send blocked by permission level"
            );
            return Err(SyncError::PermissionDenied(reason.to_string()));
        }
        Ok((token, settings))
    }

    async fn insert(
        &self,
        token: &SessionToken,
        settings: &ChatSettings,
        message: NewMessage,
    ) -> SyncResult<MessageId> {
        // Upload may have taken a while; don't post under a session that's gone.
        if !self.inner.sync.is_current(token).await {
            return Err(SyncError::StaleSession);
        }

        let message = message.expiring_at(compute_expiry(settings.expiry_duration, Utc::now()));
        let row = self
            .inner
            .store
            .insert_message(message)
            .await
            .map_err(|e| self.inner.report("send", e))?;

        tracing::debug!(message_id = %row.id, message_type = %row.message_type, "message sent");
        Ok(row.id)
    }

    pub async fn edit_message(&self, id: MessageId, content: &str) -> SyncResult<()> {
        let token = self.session().await.ok_or(SyncError::Unauthenticated)?;
        self.inner
            .moderation
            .edit_message(&token, id, content)
            .await
            .map_err(|e| self.inner.report("edit", e))
    }

    pub async fn delete_message(&self, id: MessageId) -> SyncResult<()> {
        let token = self.session().await.ok_or(SyncError::Unauthenticated)?;
        self.inner
            .moderation
            .delete_message(&token, id)
            .await
            .map_err(|e| self.inner.report("delete", e))
    }

    /// Delete every message. Once the store accepts, the messages that were
    /// listed when the delete went out are dropped locally, ahead of their
    /// per-row delete notifications.
    pub async fn delete_all_messages(&self) -> SyncResult<()> {
        let token = self.session().await.ok_or(SyncError::Unauthenticated)?;
        let covered = self.inner.sync.message_ids().await;
        self.inner
            .moderation
            .delete_all_messages(&token)
            .await
            .map_err(|e| self.inner.report("delete_all", e))?;
        let cleared = self.inner.sync.clear_local(&token, &covered).await;
        tracing::debug!("Cleared {} local message(s) after delete-all", cleared);
        Ok(())
    }

    pub async fn update_settings(&self, patch: SettingsPatch) -> SyncResult<()> {
        let token = self.session().await.ok_or(SyncError::Unauthenticated)?;
        self.inner
            .moderation
            .update_settings(&token, patch)
            .await
            .map_err(|e| self.inner.report("update_settings", e))
    }

    /// Run one expiry pass now. Returns how many deletes the store acknowledged.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        match self.session().await {
            Some(token) => sweep(self.inner.store.as_ref(), &self.inner.sync, &token, now).await,
            None => 0,
        }
    }
}

impl ClientInner {
    async fn teardown_locked(&self, lifecycle: &mut Lifecycle) {
        for task in lifecycle.tasks.drain(..) {
            task.abort();
        }
        for id in lifecycle.subscriptions.drain(..) {
            self.store.unsubscribe(id).await;
        }
        if let Some(session) = lifecycle.session.take() {
            tracing::info!("Chat session {} ended", session.generation);
        }
        self.sync.end_session().await;
        self.resolver.reset().await;
    }

    /// Log a failed action and raise a notice when the actor should hear about it.
    fn report(&self, action: &'static str, e: SyncError) -> SyncError {
        if e.is_transient() {
            tracing::error!(action, error = %e, "chat action failed");
            self.notifier.notify(Notice::ActionFailed {
                action,
                reason: e.to_string(),
            });
        } else {
            tracing::info!(action, error = %e, "chat action rejected");
        }
        e
    }

    fn spawn_feed(&self, token: SessionToken, subscription: Subscription) -> JoinHandle<()> {
        let sync = self.sync.clone();
        let resolver = self.resolver.clone();
        let Subscription { table, mut events, .. } = subscription;

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    ChangeEvent::SettingsUpdated { row } => {
                        if !sync.is_current(&token).await {
                            break;
                        }
                        // Visibility may have changed, so the list is refetched.
                        if let Some(settings) = resolver.apply_notification(&row).await {
                            sync.load(&token, &settings).await;
                        }
                    }
                    event => {
                        if sync.apply_event(&token, event).await == EventOutcome::Stale {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("{} feed closed for session {}", table, token.generation);
        })
    }

    fn spawn_sweep(&self, token: SessionToken) -> JoinHandle<()> {
        let store = self.store.clone();
        let sync = self.sync.clone();
        let period = self.config.expiry_sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !sync.is_current(&token).await {
                    break;
                }
                sweep(store.as_ref(), &sync, &token, Utc::now()).await;
            }
        })
    }
}

/// Delete expired messages in the store, then locally.
///
/// A message leaves the local list only once the store has acknowledged its
/// deletion. A failed delete leaves it in place for the next pass.
async fn sweep(
    store: &dyn RemoteStore,
    sync: &MessageSynchronizer,
    token: &SessionToken,
    now: DateTime<Utc>,
) -> usize {
    let expired = sync.expired_ids(now).await;
    if expired.is_empty() {
        return 0;
    }

    let mut acknowledged = 0;
    for id in expired {
        match store.delete_message(id).await {
            Ok(()) | Err(SyncError::NotFound) => {
                sync.remove_local(token, id).await;
                acknowledged += 1;
            }
            Err(e) => {
                tracing::warn!(message_id = %id, error = %e, "failed to purge expired message");
            }
        }
    }

    tracing::debug!("Expiry sweep removed {} message(s)", acknowledged);
    acknowledged
}
