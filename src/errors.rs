//! Errors for the radar hub store
use thiserror::Error;

/// Coarse classification of [`RadarHubError`], for callers that map errors
/// onto responses (404, 409, 400, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Unauthorized,
    Forbidden,
    Storage,
    Configuration,
}

#[derive(Error, Debug)]
pub enum RadarHubError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} conflict: {message}")]
    Conflict {
        entity: &'static str,
        message: String,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid MMSI: {0}")]
    InvalidMmsi(String),

    #[error("Invalid HHMM time: {0}")]
    InvalidHhmm(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Blocking store task failed")]
    TaskError(#[from] tokio::task::JoinError),

    #[error("ID sequence {0} is exhausted")]
    SequenceExhausted(&'static str),

    #[error("Database open error")]
    DatabaseOpenError(#[from] redb::DatabaseError),

    #[error("Database transaction error")]
    TransactionError(#[from] redb::TransactionError),

    #[error("Database table error")]
    TableError(#[from] redb::TableError),

    #[error("Database storage error")]
    StorageError(#[from] redb::StorageError),

    #[error("Database commit error")]
    CommitError(#[from] redb::CommitError),

    #[error("Serialization error")]
    SerdeError(#[from] serde_json::Error),

    #[error("IO error")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error")]
    ConfigError(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },
}

impl RadarHubError {
    pub(crate) fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    pub(crate) fn conflict(entity: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            entity,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Validation(_) | Self::InvalidMmsi(_) | Self::InvalidHhmm(_) => {
                ErrorKind::Validation
            }
            Self::InvalidCredentials => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::DatabaseOpenError(_)
            | Self::TransactionError(_)
            | Self::TableError(_)
            | Self::StorageError(_)
            | Self::CommitError(_)
            | Self::SerdeError(_)
            | Self::IoError(_)
            | Self::SequenceExhausted(_)
            | Self::TaskError(_) => ErrorKind::Storage,
            Self::ConfigError(_) | Self::ConfigurationError { .. } => ErrorKind::Configuration,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

pub type Result<T, E = RadarHubError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_tagged_not_parsed() {
        let err = RadarHubError::not_found("vessel", "vessel:9");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "vessel not found: vessel:9");

        let err = RadarHubError::conflict("user", "username already exists");
        assert!(err.is_conflict());
        assert!(!err.is_not_found());

        let err = RadarHubError::InvalidHhmm("2460".to_string());
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn serde_errors_are_storage_failures() {
        let err: RadarHubError = serde_json::from_str::<u64>("not json").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
