pub mod events;
pub mod message;
pub mod settings;

pub use events::{ChangeEvent, ChangeKind, Table};
pub use message::{
    ChatMessage, FileUpload, MessageId, MessagePatch, MessageRow, MessageType,
    MessageWithProfile, NewMessage, SenderProfile,
};
pub use settings::{ChatSettings, ExpiryDuration, PermissionLevel, SettingsPatch, SettingsRow};
