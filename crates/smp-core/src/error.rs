//! Error types for the SMP registry

use thiserror::Error;

/// Result type alias using SmpError
pub type Result<T> = std::result::Result<T, SmpError>;

/// Errors that can occur while managing registrations
#[derive(Error, Debug)]
pub enum SmpError {
    /// Malformed identifier, scheme, date or certificate activation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Duplicate identifier or violated precondition
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The addressed registration does not exist (anymore)
    #[error("Not found: {0}")]
    NotFound(String),

    /// A call to the locator service (SML) failed
    #[error("Network registration failed: {0}")]
    NetworkRegistration(String),

    /// A call to the directory service failed
    #[error("Directory operation failed: {0}")]
    Directory(String),

    /// Local storage failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Stored credential could not be decrypted or decoded.
    ///
    /// Never retried: either the stored data is corrupt or the master key changed.
    #[error("Security error: {0}")]
    Security(String),

    /// A saga step failed and so did its compensating action
    #[error("{cause}; compensation failed as well: {compensation}")]
    Compensation {
        cause: Box<SmpError>,
        compensation: Box<SmpError>,
    },
}

impl SmpError {
    /// Stable machine readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            SmpError::Validation(_) => "VALIDATION",
            SmpError::Conflict(_) => "CONFLICT",
            SmpError::NotFound(_) => "NOT_FOUND",
            SmpError::NetworkRegistration(_) => "NETWORK_REGISTRATION",
            SmpError::Directory(_) => "DIRECTORY",
            SmpError::Persistence(_) => "PERSISTENCE",
            SmpError::Security(_) => "SECURITY",
            SmpError::Compensation { .. } => "COMPENSATION_FAILED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_error_names_both_causes() {
        let err = SmpError::Compensation {
            cause: Box::new(SmpError::NetworkRegistration("sml down".into())),
            compensation: Box::new(SmpError::Directory("directory down".into())),
        };

        let msg = err.to_string();
        assert!(msg.contains("sml down"));
        assert!(msg.contains("directory down"));
        assert_eq!(err.code(), "COMPENSATION_FAILED");
    }
}
