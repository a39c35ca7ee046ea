use crate::models::{ChangeEvent, Table};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

/// Unique identifier for a feed subscriber
///
/// Each subscription gets its own id so teardown removes exactly the
/// listener it opened and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// An open live subscription to one table's change feed.
pub struct Subscription {
    pub id: SubscriptionId,
    pub table: Table,
    pub events: UnboundedReceiver<ChangeEvent>,
}

struct Subscriber {
    id: SubscriptionId,
    sender: UnboundedSender<ChangeEvent>,
}

/// Fan-out of change events to per-table subscribers.
#[derive(Default, Clone)]
pub struct SubscriptionRegistry {
    // table -> list of subscribers
    inner: Arc<RwLock<HashMap<Table, Vec<Subscriber>>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_subscriber(&self, table: Table) -> Subscription {
        let (tx, rx) = unbounded_channel();
        let id = SubscriptionId::new();

        let mut guard = self.inner.write().await;
        guard.entry(table).or_default().push(Subscriber { id, sender: tx });

        tracing::debug!(
            "Added subscriber {:?} to {} feed, total subscribers: {}",
            id,
            table,
            guard.get(&table).map(|v| v.len()).unwrap_or(0)
        );

        Subscription {
            id,
            table,
            events: rx,
        }
    }

    /// Remove a subscriber from whichever table it listens on.
    ///
    /// Must run on teardown; a forgotten subscriber keeps its receiver alive
    /// and would feed events to a stale session.
    pub async fn remove_subscriber(&self, id: SubscriptionId) {
        let mut guard = self.inner.write().await;
        let mut emptied = Vec::new();

        for (table, subscribers) in guard.iter_mut() {
            let before = subscribers.len();
            subscribers.retain(|s| s.id != id);
            if before != subscribers.len() {
                tracing::debug!(
                    "Removed subscriber {:?} from {} feed, remaining: {}",
                    id,
                    table,
                    subscribers.len()
                );
            }
            if subscribers.is_empty() {
                emptied.push(*table);
            }
        }

        for table in emptied {
            guard.remove(&table);
        }
    }

    /// Deliver an event to every subscriber of its table.
    ///
    /// Subscribers whose receiver is gone are dropped on the way.
    pub async fn broadcast(&self, event: ChangeEvent) {
        let table = event.table();
        let mut guard = self.inner.write().await;
        if let Some(subscribers) = guard.get_mut(&table) {
            let before = subscribers.len();
            subscribers.retain(|s| s.sender.send(event.clone()).is_ok());

            let after = subscribers.len();
            if before != after {
                tracing::debug!(
                    "Cleaned up {} closed subscriber(s) on {} feed, {} active",
                    before - after,
                    table,
                    after
                );
            }
        }
    }

    pub async fn subscriber_count(&self, table: Table) -> usize {
        let guard = self.inner.read().await;
        guard.get(&table).map(|v| v.len()).unwrap_or(0)
    }
}
