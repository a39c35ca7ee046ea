use crate::models::message::{MessageId, MessageRow};
use crate::models::settings::SettingsRow;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Table a change notification originates from. Each table is its own channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Messages,
    Settings,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Table::Messages => write!(f, "messages"),
            Table::Settings => write!(f, "settings"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Change notification delivered by the remote store's live feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    MessageInserted { row: MessageRow },
    MessageUpdated { row: MessageRow },
    MessageDeleted { id: MessageId },
    SettingsUpdated { row: SettingsRow },
}

impl ChangeEvent {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::MessageInserted { .. } => ChangeKind::Insert,
            ChangeEvent::MessageUpdated { .. } | ChangeEvent::SettingsUpdated { .. } => {
                ChangeKind::Update
            }
            ChangeEvent::MessageDeleted { .. } => ChangeKind::Delete,
        }
    }

    pub fn table(&self) -> Table {
        match self {
            ChangeEvent::SettingsUpdated { .. } => Table::Settings,
            _ => Table::Messages,
        }
    }

    /// Id of the message this event is about, if it concerns a message.
    pub fn message_id(&self) -> Option<MessageId> {
        match self {
            ChangeEvent::MessageInserted { row } | ChangeEvent::MessageUpdated { row } => {
                Some(row.id)
            }
            ChangeEvent::MessageDeleted { id } => Some(*id),
            ChangeEvent::SettingsUpdated { .. } => None,
        }
    }
}
