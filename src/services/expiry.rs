//! Message lifetime.
//!
//! Expiry is stamped once, at send time, from the settings snapshot in effect
//! at that moment. Later settings changes never touch messages already sent.

use crate::models::{ChatMessage, ExpiryDuration, MessageId};
use chrono::{DateTime, Utc};

pub fn compute_expiry(duration: ExpiryDuration, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    duration.ttl().map(|ttl| now + ttl)
}

pub fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    matches!(expires_at, Some(at) if at <= now)
}

/// Ids of local messages due for purging, in list order.
pub fn expired_ids(messages: &[ChatMessage], now: DateTime<Utc>) -> Vec<MessageId> {
    messages
        .iter()
        .filter(|m| is_expired(m.expires_at, now))
        .map(|m| m.id)
        .collect()
}
