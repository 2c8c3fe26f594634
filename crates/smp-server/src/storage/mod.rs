//! Storage abstraction for the registry
//!
//! A trait-based abstraction over the local state of the server, with an
//! in-memory (default) and a PostgreSQL backend. Storage is the local source
//! of truth; the network services only mirror parts of it.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use smp_core::{AuditRecord, IdScheme, Identifier, Participant, ServerIdentity, SmpError};
use std::fmt::Debug;
use uuid::Uuid;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl From<StorageError> for SmpError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::AlreadyExists(what) => {
                SmpError::Conflict(format!("{} already exists", what))
            }
            StorageError::NotFound(what) => SmpError::NotFound(what),
            other => SmpError::Persistence(other.to_string()),
        }
    }
}

/// The server configuration singleton as stored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerConfigRecord {
    /// Identity announced to the locator service
    pub identity: ServerIdentity,
    /// Whether the server itself is registered in the SML
    pub registered_in_sml: bool,
    /// Encrypted active key pair
    pub current_key_pair: Option<Vec<u8>>,
    /// Encrypted key pair waiting for its activation date
    pub next_key_pair: Option<Vec<u8>>,
    /// When `next_key_pair` becomes active
    pub activation_date: Option<DateTime<Utc>>,
}

impl ServerConfigRecord {
    /// Whether a pending key pair is due at `now`
    pub fn has_due_transition(&self, now: DateTime<Utc>) -> bool {
        matches!(self.activation_date, Some(at) if at <= now)
    }
}

/// Storage backend trait for the registry state
///
/// Implementations must be thread-safe and support concurrent access.
#[async_trait]
pub trait RegistryStore: Send + Sync + Debug {
    // =========================================================================
    // Identifier Schemes
    // =========================================================================

    async fn add_scheme(&self, scheme: IdScheme) -> Result<(), StorageError>;

    async fn get_scheme(&self, scheme_id: &str) -> Result<Option<IdScheme>, StorageError>;

    async fn list_schemes(&self) -> Result<Vec<IdScheme>, StorageError>;

    // =========================================================================
    // Participants
    // =========================================================================

    /// Store a new participant, `AlreadyExists` if the identifier is taken
    async fn insert_participant(&self, participant: Participant) -> Result<(), StorageError>;

    /// Replace the stored row with the same `oid`
    async fn update_participant(&self, participant: Participant) -> Result<(), StorageError>;

    /// Remove a participant, returns whether a row was removed
    async fn delete_participant(&self, oid: Uuid) -> Result<bool, StorageError>;

    async fn get_participant(&self, oid: Uuid) -> Result<Option<Participant>, StorageError>;

    async fn find_participant_by_id(&self, id: &Identifier) -> Result<Option<Participant>, StorageError>;

    async fn find_participants_by_additional_id(
        &self,
        id: &Identifier,
    ) -> Result<Vec<Participant>, StorageError>;

    /// Participants matching the given flags, `None` matches either value
    async fn find_participants_by_registration_state(
        &self,
        registered: Option<bool>,
        published: Option<bool>,
    ) -> Result<Vec<Participant>, StorageError>;

    /// Case-insensitive prefix search on the business name
    async fn find_participants_by_name_prefix(&self, prefix: &str) -> Result<Vec<Participant>, StorageError>;

    async fn any_published_in_directory(&self) -> Result<bool, StorageError>;

    /// Mark every participant unregistered and drop migration codes
    async fn unregister_all_from_sml(&self) -> Result<u64, StorageError>;

    // =========================================================================
    // Server Configuration
    // =========================================================================

    /// Load the singleton, a default record if it was never saved
    async fn load_server_config(&self) -> Result<ServerConfigRecord, StorageError>;

    async fn save_server_config(&self, config: ServerConfigRecord) -> Result<(), StorageError>;

    /// Promote the pending key pair to current, if the stored activation date
    /// still equals `expected_activation`.
    ///
    /// Returns whether this call performed the promotion.
    async fn promote_pending_credential(
        &self,
        expected_activation: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    // =========================================================================
    // Audit Log
    // =========================================================================

    async fn append_audit(&self, record: AuditRecord) -> Result<(), StorageError>;

    /// Most recent records first
    async fn list_audit(&self, limit: usize) -> Result<Vec<AuditRecord>, StorageError>;

    /// Remove records older than `cutoff`, returns the number removed
    async fn purge_audit_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError>;
}

/// Whether `participant` matches the optional flag filters
pub(crate) fn matches_state(
    participant: &Participant,
    registered: Option<bool>,
    published: Option<bool>,
) -> bool {
    registered.map_or(true, |r| participant.registered_in_sml == r)
        && published.map_or(true, |p| participant.published_in_directory == p)
}
