pub mod expiry;
pub mod moderation;
pub mod notices;
pub mod permissions;
pub mod settings_resolver;
pub mod synchronizer;

pub use moderation::Moderation;
pub use notices::{Notice, Notifier};
pub use settings_resolver::SettingsResolver;
pub use synchronizer::{EventOutcome, LoadOutcome, MessageSynchronizer, SessionToken};
