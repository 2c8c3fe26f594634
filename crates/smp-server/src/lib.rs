//! SMP Registry Server
//!
//! Keeps the local registry of participants served by this SMP and keeps the
//! network in step with it:
//! - registers participants in the SML (locator service) and migrates them
//!   between servers
//! - publishes participant business data in the directory
//! - deletes participants with compensation when the network rejects a step
//! - manages the server key pair, including scheduled certificate rotation
//!
//! Every modifying operation is recorded in the audit log.
//!
//! ## API Endpoints
//!
//! - `GET /health` - Liveness check
//! - `POST /v1/participants`, `GET /v1/participants` - Add and search participants
//! - `GET|PUT|DELETE /v1/participants/{oid}` - Read, update and delete a participant
//! - `POST|DELETE /v1/participants/{oid}/templates/{template}` - Bind and unbind templates
//! - `POST|DELETE /v1/participants/{oid}/sml` - Register in and remove from the SML
//! - `POST|DELETE /v1/participants/{oid}/sml/migration` - Prepare and cancel a migration
//! - `POST /v1/participants/{oid}/sml/migrate` - Take over a participant from another server
//! - `POST|DELETE /v1/participants/{oid}/directory` - Publish in and remove from the directory
//! - `GET|PUT /v1/server/metadata` - Server identity
//! - `POST|DELETE /v1/server/sml` - Server registration in the SML
//! - `POST|DELETE /v1/server/certificate` - Server key pair
//! - `GET /v1/server/network` - Available network services
//! - `POST|GET /v1/schemes` - Managed identifier schemes
//! - `GET /v1/audit` - Recent audit records
//!
//! Modifying requests carry the acting user in the `x-smp-user` header.

pub mod admin;
pub mod api;
pub mod audit;
pub mod config;
pub mod orchestrator;
pub mod registry;
pub mod storage;

pub use admin::ServerAdmin;
pub use api::create_router;
pub use api::handlers::AppState;
pub use audit::{AuditSink, MemoryAuditSink, StoreAuditSink};
pub use config::{ConfigError, DevNetworkSettings, ServerSettings};
pub use orchestrator::RegistrationOrchestrator;
pub use registry::ParticipantRegistry;
pub use storage::{MemoryStore, RegistryStore, ServerConfigRecord, StorageError};
#[cfg(feature = "postgres")]
pub use storage::PostgresStore;
