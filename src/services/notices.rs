use tokio::sync::broadcast;

/// Transient, dismissable notification for the UI ("toast").
///
/// Only failures the actor should hear about end up here. Permission-denied
/// states and background hiccups are logged instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Settings could not be loaded; fallback settings are in effect
    SettingsUnavailable { reason: String },
    /// The initial message load failed; the list stays empty until re-entered
    LoadFailed { reason: String },
    /// A send, edit, delete or settings change failed in the store
    ActionFailed { action: &'static str, reason: String },
}

#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn notify(&self, notice: Notice) {
        tracing::debug!(?notice, "raising notice");
        // Nobody listening is fine; the failure has already been logged.
        let _ = self.tx.send(notice);
    }
}
