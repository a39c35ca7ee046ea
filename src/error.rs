use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

/// Error classes the UI layer reacts to differently.
///
/// - `PermissionDenied`: expected state, shown as a quiet hint ("please sign in")
/// - `Transient`: network/store hiccup, surfaced once and never retried automatically
/// - `NotFound`: single-row lookup came back empty, callers substitute a fallback
/// - `Rejected`: the request itself was refused (validation, role, stale session)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PermissionDenied,
    Transient,
    NotFound,
    Rejected,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("organizer role required")]
    Forbidden,

    #[error("no ready actor session")]
    Unauthenticated,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,

    #[error("store error: {0}")]
    Store(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("session changed while the request was in flight")]
    StaleSession,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            SyncError::Store(_) | SyncError::Network(_) => ErrorKind::Transient,
            SyncError::NotFound => ErrorKind::NotFound,
            SyncError::Config(_)
            | SyncError::Forbidden
            | SyncError::Unauthenticated
            | SyncError::BadRequest(_)
            | SyncError::StaleSession => ErrorKind::Rejected,
        }
    }

    /// Returns whether this error came from the store or the network.
    ///
    /// The subsystem never retries on its own; this only decides whether a
    /// failure is worth a transient notice.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub fn is_permission_denied(&self) -> bool {
        self.kind() == ErrorKind::PermissionDenied
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Store(format!("malformed payload: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            SyncError::PermissionDenied("anon".into()).kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(SyncError::Store("boom".into()).kind(), ErrorKind::Transient);
        assert_eq!(SyncError::Network("reset".into()).kind(), ErrorKind::Transient);
        assert_eq!(SyncError::NotFound.kind(), ErrorKind::NotFound);
        assert_eq!(SyncError::Forbidden.kind(), ErrorKind::Rejected);
        assert_eq!(SyncError::StaleSession.kind(), ErrorKind::Rejected);
    }

    #[test]
    fn test_transient_classification() {
        assert!(SyncError::Network("timeout".into()).is_transient());
        assert!(!SyncError::NotFound.is_transient());
        assert!(!SyncError::PermissionDenied("x".into()).is_transient());
        assert!(SyncError::PermissionDenied("x".into()).is_permission_denied());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::BadRequest("message content cannot be empty".into());
        assert_eq!(err.to_string(), "bad request: message content cannot be empty");
        assert_eq!(SyncError::Forbidden.to_string(), "organizer role required");
    }

    #[test]
    fn test_from_serde_error() {
        let json_err = serde_json::from_str::<String>("not json").unwrap_err();
        let err: SyncError = json_err.into();
        assert!(matches!(err, SyncError::Store(_)));
    }
}
