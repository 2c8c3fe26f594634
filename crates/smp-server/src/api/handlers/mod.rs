//! API request handlers

pub mod network;
pub mod participants;
pub mod server;

use crate::admin::ServerAdmin;
use crate::orchestrator::RegistrationOrchestrator;

/// Shared state of the API handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub orchestrator: RegistrationOrchestrator,
    pub admin: ServerAdmin,
}

pub use network::{
    cancel_migration, migrate_participant, prepare_migration, publish_in_directory, register_in_sml,
    remove_from_directory, remove_from_sml, MigrateRequest, MigrationCodeResponse, PrepareMigrationRequest,
};
pub use participants::{
    bind_template, create_participant, delete_participant, get_participant, list_participants,
    unbind_template, update_participant, ListParticipantsResponse, ParticipantQuery,
    ParticipantRequest, ParticipantResponse,
};
pub use server::{
    add_scheme, get_metadata, list_audit, list_schemes, network_info, register_certificate,
    register_server, remove_certificate, remove_server, update_metadata, AuditQuery, CertificateRequest,
    SchemeRequest,
};
