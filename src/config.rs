use crate::error::SyncError;
use dotenvy::dotenv;
use std::env;
use std::time::Duration;
use uuid::Uuid;

/// Well-known id of the singleton settings row.
pub const DEFAULT_SETTINGS_ROW_ID: Uuid = Uuid::from_u128(1);

const DEFAULT_SWEEP_SECS: u64 = 30;
const MAX_SWEEP_SECS: u64 = 60;
const DEFAULT_NOTICE_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub struct Config {
    /// Email of the single actor allowed to moderate and change settings
    pub organizer_email: String,
    /// Row id the settings subscription is scoped to
    pub settings_row_id: Uuid,
    /// How often the local list is scanned for expired messages
    pub expiry_sweep_interval: Duration,
    /// Buffered transient notices before slow receivers start lagging
    pub notice_capacity: usize,
}

impl Config {
    pub fn new(organizer_email: impl Into<String>) -> Self {
        Self {
            organizer_email: organizer_email.into(),
            settings_row_id: DEFAULT_SETTINGS_ROW_ID,
            expiry_sweep_interval: Duration::from_secs(DEFAULT_SWEEP_SECS),
            notice_capacity: DEFAULT_NOTICE_CAPACITY,
        }
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.expiry_sweep_interval = interval;
        self
    }

    pub fn from_env() -> Result<Self, SyncError> {
        dotenv().ok();

        let organizer_email = env::var("CHAT_ORGANIZER_EMAIL")
            .map_err(|_| SyncError::Config("CHAT_ORGANIZER_EMAIL missing".into()))?;
        let organizer_email = organizer_email.trim().to_string();
        if organizer_email.is_empty() {
            return Err(SyncError::Config("CHAT_ORGANIZER_EMAIL is empty".into()));
        }

        let settings_row_id = match env::var("CHAT_SETTINGS_ROW_ID") {
            Ok(raw) => Uuid::parse_str(raw.trim()).map_err(|e| {
                SyncError::Config(format!("CHAT_SETTINGS_ROW_ID is not a uuid: {e}"))
            })?,
            Err(_) => DEFAULT_SETTINGS_ROW_ID,
        };

        let sweep_secs = match env::var("CHAT_EXPIRY_SWEEP_SECS") {
            Ok(raw) => Self::parse_sweep_secs(&raw)?,
            Err(_) => DEFAULT_SWEEP_SECS,
        };

        let notice_capacity = env::var("CHAT_NOTICE_CAPACITY")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_NOTICE_CAPACITY);

        Ok(Self {
            organizer_email,
            settings_row_id,
            expiry_sweep_interval: Duration::from_secs(sweep_secs),
            notice_capacity,
        })
    }

    fn parse_sweep_secs(raw: &str) -> Result<u64, SyncError> {
        let secs: u64 = raw.trim().parse().map_err(|_| {
            SyncError::Config(format!("CHAT_EXPIRY_SWEEP_SECS is not a number: {raw}"))
        })?;
        if secs == 0 || secs > MAX_SWEEP_SECS {
            return Err(SyncError::Config(format!(
                "CHAT_EXPIRY_SWEEP_SECS must be between 1 and {MAX_SWEEP_SECS}, got {secs}"
            )));
        }
        Ok(secs)
    }

    pub fn is_organizer_email(&self, email: Option<&str>) -> bool {
        email
            .map(|e| e.trim().eq_ignore_ascii_case(&self.organizer_email))
            .unwrap_or(false)
    }
}
