use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type MessageId = Uuid;

pub const DISPLAY_NAME_SELF: &str = "You";
pub const DISPLAY_NAME_ANONYMOUS: &str = "Anonymous";
pub const DISPLAY_NAME_ORGANIZER: &str = "Organizer";
pub const DISPLAY_NAME_UNKNOWN: &str = "Unknown";

/// Payload discriminant shared by every message row.
///
/// `File` messages carry a `file_url` pointing at uploaded content; `Link`
/// messages carry the URL itself in `file_url` and mirror it into `content`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    File,
    Link,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::File => "file",
            Self::Link => "link",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public profile joined onto a sender.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SenderProfile {
    pub avatar_url: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl SenderProfile {
    /// `first_name + " " + last_name`, trimmed. Empty when neither is set.
    pub fn full_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("").trim();
        let last = self.last_name.as_deref().unwrap_or("").trim();
        format!("{first} {last}").trim().to_string()
    }
}

/// Message as persisted by the remote store.
///
/// `id` and `created_at` are always assigned by the store; a row never exists
/// locally without both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: MessageId,
    /// `None` for anonymous senders
    pub sender_id: Option<Uuid>,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Bulk-select row: the message plus its joined sender profile, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageWithProfile {
    #[serde(flatten)]
    pub row: MessageRow,
    #[serde(default)]
    pub profile: Option<SenderProfile>,
}

/// Insert payload. The store fills in `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub sender_id: Option<Uuid>,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub file_url: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewMessage {
    pub fn text(sender_id: Option<Uuid>, content: impl Into<String>) -> Self {
        Self {
            sender_id,
            content: content.into(),
            message_type: MessageType::Text,
            file_url: None,
            expires_at: None,
        }
    }

    pub fn file(sender_id: Option<Uuid>, caption: impl Into<String>, file_url: String) -> Self {
        Self {
            sender_id,
            content: caption.into(),
            message_type: MessageType::File,
            file_url: Some(file_url),
            expires_at: None,
        }
    }

    pub fn link(sender_id: Option<Uuid>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            sender_id,
            content: url.clone(),
            message_type: MessageType::Link,
            file_url: Some(url),
            expires_at: None,
        }
    }

    pub fn expiring_at(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }
}

/// Partial update for the organizer-mutable fields of a message.
///
/// `file_url: Some(None)` clears the column; `None` leaves it untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MessagePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub message_type: Option<MessageType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<Option<String>>,
}

impl MessagePatch {
    /// Edit patch: new text, always demoted to a plain text message.
    pub fn demote_to_text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            message_type: Some(MessageType::Text),
            file_url: Some(None),
        }
    }

    pub fn apply_to(&self, row: &mut MessageRow) {
        if let Some(content) = &self.content {
            row.content = content.clone();
        }
        if let Some(message_type) = self.message_type {
            row.message_type = message_type;
        }
        if let Some(file_url) = &self.file_url {
            row.file_url = file_url.clone();
        }
    }
}

/// Binary content attached to a send. Upload mechanics belong to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Message as held in the local list, with sender details resolved at receipt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender_id: Option<Uuid>,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub sender_display_name: String,
    pub sender_profile: Option<SenderProfile>,
}

impl ChatMessage {
    pub fn from_row(row: MessageRow, profile: Option<SenderProfile>, actor_id: Option<Uuid>) -> Self {
        let sender_display_name = resolve_display_name(row.sender_id, actor_id, profile.as_ref());
        Self {
            id: row.id,
            sender_id: row.sender_id,
            content: row.content,
            message_type: row.message_type,
            file_url: row.file_url,
            created_at: row.created_at,
            expires_at: row.expires_at,
            sender_display_name,
            sender_profile: profile,
        }
    }

    /// Copies the fields an organizer may change. Sender and timestamps stay put.
    pub fn apply_update(&mut self, row: &MessageRow) {
        self.content = row.content.clone();
        self.message_type = row.message_type;
        self.file_url = row.file_url.clone();
        self.expires_at = row.expires_at;
    }
}

/// Display name for a sender as seen by `actor_id`.
///
/// Own messages read "You", anonymous ones "Anonymous". Otherwise the joined
/// profile name is used; a profile with an empty name belongs to the organizer
/// account, and a missing profile falls back to "Unknown".
pub fn resolve_display_name(
    sender_id: Option<Uuid>,
    actor_id: Option<Uuid>,
    profile: Option<&SenderProfile>,
) -> String {
    let Some(sender_id) = sender_id else {
        return DISPLAY_NAME_ANONYMOUS.to_string();
    };
    if actor_id == Some(sender_id) {
        return DISPLAY_NAME_SELF.to_string();
    }
    match profile {
        Some(profile) => {
            let name = profile.full_name();
            if name.is_empty() {
                DISPLAY_NAME_ORGANIZER.to_string()
            } else {
                name
            }
        }
        None => DISPLAY_NAME_UNKNOWN.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(first: Option<&str>, last: Option<&str>) -> SenderProfile {
        SenderProfile {
            avatar_url: None,
            first_name: first.map(String::from),
            last_name: last.map(String::from),
        }
    }

    fn row(message_type: MessageType, file_url: Option<&str>) -> MessageRow {
        MessageRow {
            id: Uuid::new_v4(),
            sender_id: Some(Uuid::new_v4()),
            content: "caption".into(),
            message_type,
            file_url: file_url.map(String::from),
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    #[test]
    fn test_display_name_self_wins_over_profile() {
        let me = Uuid::new_v4();
        let p = profile(Some("Ada"), Some("Lovelace"));
        assert_eq!(resolve_display_name(Some(me), Some(me), Some(&p)), "You");
    }

    #[test]
    fn test_display_name_anonymous() {
        assert_eq!(resolve_display_name(None, Some(Uuid::new_v4()), None), "Anonymous");
        assert_eq!(resolve_display_name(None, None, None), "Anonymous");
    }

    #[test]
    fn test_display_name_from_profile_is_trimmed() {
        let p = profile(Some("  Ada "), Some(" Lovelace  "));
        assert_eq!(
            resolve_display_name(Some(Uuid::new_v4()), None, Some(&p)),
            "Ada Lovelace"
        );

        let first_only = profile(Some("Grace"), None);
        assert_eq!(
            resolve_display_name(Some(Uuid::new_v4()), None, Some(&first_only)),
            "Grace"
        );
    }

    #[test]
    fn test_display_name_empty_profile_is_organizer() {
        let p = profile(None, Some("   "));
        assert_eq!(
            resolve_display_name(Some(Uuid::new_v4()), None, Some(&p)),
            "Organizer"
        );
    }

    #[test]
    fn test_display_name_without_profile_is_unknown() {
        assert_eq!(
            resolve_display_name(Some(Uuid::new_v4()), Some(Uuid::new_v4()), None),
            "Unknown"
        );
    }

    #[test]
    fn test_link_mirrors_url_into_content() {
        let msg = NewMessage::link(None, "https://example.org/css");
        assert_eq!(msg.message_type, MessageType::Link);
        assert_eq!(msg.content, "https://example.org/css");
        assert_eq!(msg.file_url.as_deref(), Some("https://example.org/css"));
    }

    #[test]
    fn test_demote_patch_clears_file() {
        let mut r = row(MessageType::File, Some("https://cdn.example.org/a.png"));
        MessagePatch::demote_to_text("new caption").apply_to(&mut r);
        assert_eq!(r.message_type, MessageType::Text);
        assert_eq!(r.file_url, None);
        assert_eq!(r.content, "new caption");
    }

    #[test]
    fn test_empty_patch_leaves_row_untouched() {
        let mut r = row(MessageType::Link, Some("https://example.org"));
        let before = r.clone();
        MessagePatch::default().apply_to(&mut r);
        assert_eq!(r, before);
    }

    #[test]
    fn test_apply_update_keeps_sender_and_created_at() {
        let original = row(MessageType::File, Some("https://cdn.example.org/a.png"));
        let mut msg = ChatMessage::from_row(original.clone(), None, None);

        let mut updated = original.clone();
        updated.sender_id = Some(Uuid::new_v4());
        updated.created_at = original.created_at + chrono::Duration::hours(1);
        updated.content = "edited".into();
        updated.message_type = MessageType::Text;
        updated.file_url = None;

        msg.apply_update(&updated);
        assert_eq!(msg.content, "edited");
        assert_eq!(msg.message_type, MessageType::Text);
        assert_eq!(msg.file_url, None);
        assert_eq!(msg.sender_id, original.sender_id);
        assert_eq!(msg.created_at, original.created_at);
    }

    #[test]
    fn test_row_wire_shape_uses_type_key() {
        let r = row(MessageType::Link, Some("https://example.org"));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["type"], "link");
        assert!(json.get("message_type").is_none());
    }
}
