//! Error types for the network service clients

use smp_core::SmpError;
use thiserror::Error;

/// Failure reported by the locator service (SML)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocatorError {
    /// The service refused the request
    #[error("SML rejected request: {0}")]
    Rejected(String),

    /// The service could not be reached
    #[error("SML unavailable: {0}")]
    Unavailable(String),

    /// The participant or server is not known to the service
    #[error("Not registered in SML: {0}")]
    NotRegistered(String),

    #[error("Already registered in SML: {0}")]
    AlreadyRegistered(String),

    /// The migration code is unknown or does not match
    #[error("Invalid migration code for {0}")]
    InvalidMigrationCode(String),
}

/// Failure reported by the directory service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Directory rejected request: {0}")]
    Rejected(String),

    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

/// Result of a locator call
pub type LocatorResult<T> = std::result::Result<T, LocatorError>;

/// Result of a directory call
pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

impl From<LocatorError> for SmpError {
    fn from(err: LocatorError) -> Self {
        SmpError::NetworkRegistration(err.to_string())
    }
}

impl From<DirectoryError> for SmpError {
    fn from(err: DirectoryError) -> Self {
        SmpError::Directory(err.to_string())
    }
}
