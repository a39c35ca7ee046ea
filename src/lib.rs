pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod models;
pub mod services;
pub mod store;

pub use client::{ChatClient, InitOutcome};
pub use config::Config;
pub use error::{ErrorKind, SyncError, SyncResult};
pub use identity::{Actor, IdentityProvider, StaticIdentity};
pub use services::Notice;
pub use store::{MemoryStore, RemoteStore};
