//! Singleton chat settings row.
//!
//! One mutable record shared by every client: who may post, and how long new
//! messages live. Created implicitly (defaulted) when absent, mutated only by
//! the organizer, never deleted.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Which class of actors may post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    /// Everyone, signed in or not
    #[default]
    All,
    /// Signed-in actors only
    Authenticated,
    /// Anonymous actors only
    Unauthenticated,
    /// Chat frozen
    None,
}

impl PermissionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Authenticated => "authenticated",
            Self::Unauthenticated => "unauthenticated",
            Self::None => "none",
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "authenticated" => Ok(Self::Authenticated),
            "unauthenticated" => Ok(Self::Unauthenticated),
            "none" => Ok(Self::None),
            other => Err(format!("unknown permission level: {other}")),
        }
    }
}

/// Lifetime assigned to newly sent messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ExpiryDuration {
    #[serde(rename = "never")]
    Never,
    #[serde(rename = "1h")]
    OneHour,
    /// Used when the settings row has not been created yet
    #[default]
    #[serde(rename = "1.5h")]
    NinetyMinutes,
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
}

impl ExpiryDuration {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::OneHour => "1h",
            Self::NinetyMinutes => "1.5h",
            Self::OneDay => "24h",
            Self::SevenDays => "7d",
        }
    }

    /// Time-to-live, or `None` for messages that never expire.
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Self::Never => None,
            Self::OneHour => Some(Duration::hours(1)),
            Self::NinetyMinutes => Some(Duration::minutes(90)),
            Self::OneDay => Some(Duration::hours(24)),
            Self::SevenDays => Some(Duration::days(7)),
        }
    }
}

impl fmt::Display for ExpiryDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpiryDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never" => Ok(Self::Never),
            "1h" => Ok(Self::OneHour),
            "1.5h" => Ok(Self::NinetyMinutes),
            "24h" => Ok(Self::OneDay),
            "7d" => Ok(Self::SevenDays),
            other => Err(format!("unknown expiry duration: {other}")),
        }
    }
}

/// Resolved moderation settings. `Default` is the fallback used whenever the
/// row is missing or unreadable: everyone may post, messages live 1.5h.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatSettings {
    pub permission_level: PermissionLevel,
    pub expiry_duration: ExpiryDuration,
}

impl ChatSettings {
    pub fn new(permission_level: PermissionLevel, expiry_duration: ExpiryDuration) -> Self {
        Self {
            permission_level,
            expiry_duration,
        }
    }
}

/// The persisted singleton row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsRow {
    pub id: Uuid,
    #[serde(flatten)]
    pub settings: ChatSettings,
}

/// Organizer-issued partial update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_level: Option<PermissionLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_duration: Option<ExpiryDuration>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.permission_level.is_none() && self.expiry_duration.is_none()
    }

    pub fn apply_to(&self, settings: &mut ChatSettings) {
        if let Some(level) = self.permission_level {
            settings.permission_level = level;
        }
        if let Some(expiry) = self.expiry_duration {
            settings.expiry_duration = expiry;
        }
    }
}
