//! Read and write gates.
//!
//! The two gates are asymmetric. The organizer can always read
//! the room, whatever the settings say. Writing goes through the permission
//! level for everyone; only `none` lets the organizer through, and moderation
//! actions are gated separately by role.

use crate::identity::Actor;
use crate::models::{ChatSettings, PermissionLevel};

/// Whether `actor` may see the message list under `settings`.
pub fn can_view(settings: &ChatSettings, actor: &Actor, is_organizer: bool) -> bool {
    if is_organizer {
        return true;
    }
    match settings.permission_level {
        PermissionLevel::All => true,
        PermissionLevel::Authenticated => actor.is_present(),
        PermissionLevel::Unauthenticated => !actor.is_present(),
        PermissionLevel::None => false,
    }
}

/// Whether `actor` may compose a new message under `settings`.
pub fn can_write(settings: &ChatSettings, actor: &Actor, is_organizer: bool) -> bool {
    write_denial(settings, actor, is_organizer).is_none()
}

/// Reason shown to the actor when the write gate is closed, `None` when open.
pub fn write_denial(
    settings: &ChatSettings,
    actor: &Actor,
    is_organizer: bool,
) -> Option<&'static str> {
    match settings.permission_level {
        PermissionLevel::All => None,
        PermissionLevel::None if is_organizer => None,
        PermissionLevel::None => Some("chat is currently closed"),
        PermissionLevel::Authenticated if actor.is_present() => None,
        PermissionLevel::Authenticated => Some("please sign in to send messages"),
        PermissionLevel::Unauthenticated if !actor.is_present() => None,
        PermissionLevel::Unauthenticated => Some("chat is open to guests only right now"),
    }
}
