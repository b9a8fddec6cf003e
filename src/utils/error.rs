use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Malformed query '{query}': {reason}")]
    MalformedQuery { query: String, reason: String },

    #[error("Unknown place '{key}'")]
    UnknownPlace { key: String },

    #[error("Place key '{key}' is already registered")]
    DuplicateKey { key: String },

    #[error("Could not enumerate place '{place}': {message}")]
    Enumeration { place: String, message: String },

    #[error("Transfer of '{study}' failed: {message}")]
    Transfer { study: String, message: String },

    #[error("Study '{study}' not found")]
    StudyNotFound { study: String },

    #[error("Study '{study}' already exists, not overwriting")]
    StudyAlreadyExists { study: String },

    #[error("Studies cannot be read out of a {kind} place")]
    ReadNotSupported { kind: String },

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field '{field}'")]
    MissingConfigError { field: String },

    #[error("No settings file found at '{path}'")]
    NoSettingsFound { path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Query,
    Configuration,
    Enumeration,
    Transfer,
    Network,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl SyncError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::MalformedQuery { .. } | SyncError::StudyNotFound { .. } => {
                ErrorCategory::Query
            }
            SyncError::UnknownPlace { .. }
            | SyncError::DuplicateKey { .. }
            | SyncError::ConfigError { .. }
            | SyncError::InvalidConfigValueError { .. }
            | SyncError::MissingConfigError { .. }
            | SyncError::NoSettingsFound { .. } => ErrorCategory::Configuration,
            SyncError::Enumeration { .. } => ErrorCategory::Enumeration,
            SyncError::Transfer { .. }
            | SyncError::StudyAlreadyExists { .. }
            | SyncError::ReadNotSupported { .. } => ErrorCategory::Transfer,
            SyncError::ApiError(_) => ErrorCategory::Network,
            SyncError::ZipError(_) | SyncError::IoError(_) | SyncError::SerializationError(_) => {
                ErrorCategory::Storage
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SyncError::StudyAlreadyExists { .. } => ErrorSeverity::Low,
            SyncError::ApiError(_) | SyncError::Transfer { .. } | SyncError::Enumeration { .. } => {
                ErrorSeverity::Medium
            }
            SyncError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// Whether running the same command again could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::ApiError(_) | SyncError::Transfer { .. } | SyncError::Enumeration { .. }
        )
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            SyncError::MalformedQuery { .. } => {
                "Use the format '<place>:<patient>/<study>', '*' matches anything".to_string()
            }
            SyncError::UnknownPlace { .. } => {
                "Run 'dicomsync place list' to see the configured places".to_string()
            }
            SyncError::DuplicateKey { .. } => {
                "Choose another key or remove the existing place first".to_string()
            }
            SyncError::NoSettingsFound { .. } => {
                "Run 'dicomsync init' to create a settings file".to_string()
            }
            SyncError::ReadNotSupported { .. } => {
                "Send from a folder or zip place instead".to_string()
            }
            SyncError::StudyAlreadyExists { .. } => {
                "Nothing to do, the study is already there".to_string()
            }
            SyncError::ApiError(_) | SyncError::Enumeration { .. } | SyncError::Transfer { .. } => {
                "Check the connection and run the same command again; finished studies are skipped"
                    .to_string()
            }
            SyncError::ConfigError { .. }
            | SyncError::InvalidConfigValueError { .. }
            | SyncError::MissingConfigError { .. } => {
                "Check the settings file for the field mentioned above".to_string()
            }
            _ => "Check file permissions and free disk space".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Query => format!("Query problem: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Enumeration => format!("Could not read a place: {}", self),
            ErrorCategory::Transfer => format!("Transfer problem: {}", self),
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Storage => format!("Storage problem: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering_drives_exit_codes() {
        let duplicate = SyncError::DuplicateKey {
            key: "a".to_string(),
        };
        let transfer = SyncError::Transfer {
            study: "p/s".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(duplicate.severity(), ErrorSeverity::High);
        assert_eq!(transfer.severity(), ErrorSeverity::Medium);
        assert!(transfer.is_retryable());
        assert!(!duplicate.is_retryable());
    }

    #[test]
    fn test_user_friendly_message_mentions_category() {
        let err = SyncError::UnknownPlace {
            key: "nowhere".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(err.user_friendly_message().contains("nowhere"));
        assert!(err.recovery_suggestion().contains("place list"));
    }
}
