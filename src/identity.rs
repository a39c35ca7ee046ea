//! Identity Provider contract.
//!
//! Authentication lives outside this crate. The core only sees an opaque
//! snapshot of who is at the keyboard and whether that answer is final yet.

use crate::config::Config;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Actor {
    /// `None` for anonymous visitors
    pub actor_id: Option<Uuid>,
    pub actor_email: Option<String>,
    /// True while the session is still being restored
    pub is_loading: bool,
}

impl Actor {
    pub fn anonymous() -> Self {
        Self {
            actor_id: None,
            actor_email: None,
            is_loading: false,
        }
    }

    pub fn signed_in(actor_id: Uuid, actor_email: impl Into<String>) -> Self {
        Self {
            actor_id: Some(actor_id),
            actor_email: Some(actor_email.into()),
            is_loading: false,
        }
    }

    pub fn loading() -> Self {
        Self {
            actor_id: None,
            actor_email: None,
            is_loading: true,
        }
    }

    pub fn is_ready(&self) -> bool {
        !self.is_loading
    }

    /// Whether a signed-in actor is present (as opposed to an anonymous visitor).
    pub fn is_present(&self) -> bool {
        self.actor_id.is_some()
    }

    pub fn is_organizer(&self, config: &Config) -> bool {
        self.is_present() && config.is_organizer_email(self.actor_email.as_deref())
    }

    /// Two snapshots belong to the same session when they name the same actor.
    pub fn same_session(&self, other: &Actor) -> bool {
        self.actor_id == other.actor_id && self.actor_email == other.actor_email
    }
}

/// Source of the current actor.
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Actor;

    /// Change stream the client follows to tear down and restart sessions.
    fn watch(&self) -> watch::Receiver<Actor>;
}

/// Identity provider fed by the host application.
pub struct StaticIdentity {
    tx: watch::Sender<Actor>,
}

impl StaticIdentity {
    pub fn new(initial: Actor) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn set(&self, actor: Actor) {
        self.tx.send_replace(actor);
    }
}

impl IdentityProvider for StaticIdentity {
    fn current(&self) -> Actor {
        self.tx.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Actor> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_and_present() {
        assert!(!Actor::loading().is_ready());
        assert!(Actor::anonymous().is_ready());
        assert!(!Actor::anonymous().is_present());
        assert!(Actor::signed_in(Uuid::new_v4(), "kid@example.org").is_present());
    }

    #[test]
    fn test_organizer_requires_signed_in_email_match() {
        let cfg = Config::new("host@example.org");
        assert!(Actor::signed_in(Uuid::new_v4(), "host@example.org").is_organizer(&cfg));
        assert!(!Actor::signed_in(Uuid::new_v4(), "kid@example.org").is_organizer(&cfg));

        let spoofed = Actor {
            actor_id: None,
            actor_email: Some("host@example.org".into()),
            is_loading: false,
        };
        assert!(!spoofed.is_organizer(&cfg));
    }

    #[test]
    fn test_static_identity_publishes_changes() {
        let provider = StaticIdentity::new(Actor::loading());
        let rx = provider.watch();
        let id = Uuid::new_v4();
        provider.set(Actor::signed_in(id, "kid@example.org"));
        assert_eq!(provider.current().actor_id, Some(id));
        assert_eq!(rx.borrow().actor_id, Some(id));
    }
}
