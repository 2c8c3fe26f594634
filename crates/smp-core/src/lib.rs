//! SMP Core - domain types for the SMP registry server
//!
//! This crate holds the pure parts of the registry:
//!
//! - **Identifiers**: scheme-aware identifiers with canonical string form
//! - **Participants**: registration flags and directory business data
//! - **Server credential**: Ed25519 key pair with a certificate validity window
//! - **Encryption at rest**: AES-256-GCM for stored key pairs
//! - **Migration codes**: one-time secrets for transferring a participant
//! - **Audit records**: what gets written after a successful action
//!
//! Nothing in here performs I/O.

pub mod audit;
pub mod credential;
pub mod encryption;
pub mod error;
pub mod identifier;
pub mod migration;
pub mod participant;
pub mod server;

pub use audit::{actions, Actor, AuditRecord, SERVER_SUBJECT};
pub use credential::{ServerCertificate, ServerKeyPair};
pub use encryption::DataEncryptor;
pub use error::{Result, SmpError};
pub use identifier::{IdScheme, Identifier, NO_PROCESS};
pub use migration::{generate_migration_code, MIGRATION_CODE_LENGTH, MIGRATION_SYMBOLS};
pub use participant::{Contact, Participant, TemplateRef};
pub use server::{CertificateUpdate, NetworkServicesInfo, ServerIdentity, ServerMetadata};
