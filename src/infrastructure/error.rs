use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Credential error: {0}")]
    Credential(String),
    #[error("Calendar provider error: {0}")]
    Provider(String),
    #[error("Change feed error: {0}")]
    ChangeFeed(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("No calendar source available to host a new calendar")]
    NoCalendarSource,
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl InfraError {
    pub fn lock_poisoned(name: &str, error: impl std::fmt::Display) -> Self {
        Self::LockPoisoned(format!("{name} lock poisoned: {error}"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
