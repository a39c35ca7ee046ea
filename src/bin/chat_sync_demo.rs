/// Walkthrough of a room chat against the in-process store
///
/// An organizer and an anonymous guest share one `MemoryStore`. The guest
/// posts, the organizer moderates and closes the room to guests, and the
/// resulting message lists are printed as JSON.
///
/// Usage:
/// ```bash
/// CHAT_ORGANIZER_EMAIL=host@example.org cargo run --bin chat-sync-demo
/// ```
use anyhow::{Context, Result};
use realtime_chat_sync::logging::init_tracing;
use realtime_chat_sync::models::{ExpiryDuration, PermissionLevel, SettingsPatch};
use realtime_chat_sync::{Actor, ChatClient, Config, MemoryStore, RemoteStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

const FALLBACK_ORGANIZER: &str = "organizer@example.org";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "using demo configuration");
            Config::new(FALLBACK_ORGANIZER)
        }
    };

    let store: Arc<dyn RemoteStore> = Arc::new(MemoryStore::new());
    let organizer = ChatClient::new(config.clone(), store.clone());
    let guest = ChatClient::new(config.clone(), store.clone());

    organizer
        .initialize(Actor::signed_in(Uuid::new_v4(), config.organizer_email.clone()))
        .await;
    guest.initialize(Actor::anonymous()).await;

    let first = guest
        .send("hello from the back row", None)
        .await
        .context("guest send failed")?;
    guest
        .send_link("https://example.org/worksheet")
        .await
        .context("guest link failed")?;
    settle().await;

    organizer
        .edit_message(first, "hello (edited by the organizer)")
        .await
        .context("edit failed")?;
    organizer
        .update_settings(SettingsPatch {
            permission_level: Some(PermissionLevel::Authenticated),
            expiry_duration: Some(ExpiryDuration::OneHour),
        })
        .await
        .context("settings update failed")?;
    settle().await;

    match guest.send("am I still here?", None).await {
        Ok(id) => info!(message_id = %id, "guest message accepted"),
        Err(e) => info!(error = %e, "guest message refused"),
    }

    let organizer_view = serde_json::to_string_pretty(&organizer.messages().await)
        .context("failed to render organizer view")?;
    println!("organizer sees:\n{organizer_view}");
    println!("guest sees {} message(s)", guest.messages().await.len());

    organizer.teardown().await;
    guest.teardown().await;
    Ok(())
}

/// Give the feed tasks a moment to apply what the store broadcast.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
