//! Network Registration Handlers
//!
//! Registration of participants in the SML, migration between servers and
//! publication in the directory.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::handlers::{AppState, ParticipantResponse};
use crate::api::ActingUser;

/// Request to prepare a migration to another server
#[derive(Debug, Default, Deserialize)]
pub struct PrepareMigrationRequest {
    /// Code to use; a fresh code is generated when absent
    #[serde(default)]
    pub code: Option<String>,
}

/// The migration code to hand to the receiving server
#[derive(Debug, Serialize, Deserialize)]
pub struct MigrationCodeResponse {
    pub code: String,
}

/// Request to take over a participant from another server
#[derive(Debug, Deserialize)]
pub struct MigrateRequest {
    pub code: String,
}

/// POST /v1/participants/{oid}/sml
pub async fn register_in_sml(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path(oid): Path<Uuid>,
) -> Result<Json<ParticipantResponse>, ApiError> {
    Ok(Json(state.orchestrator.register_in_sml(&actor, oid).await?.into()))
}

/// DELETE /v1/participants/{oid}/sml
pub async fn remove_from_sml(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path(oid): Path<Uuid>,
) -> Result<Json<ParticipantResponse>, ApiError> {
    Ok(Json(state.orchestrator.remove_from_sml(&actor, oid).await?.into()))
}

/// Prepare the move of a participant to another server
///
/// POST /v1/participants/{oid}/sml/migration
pub async fn prepare_migration(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path(oid): Path<Uuid>,
    Json(request): Json<PrepareMigrationRequest>,
) -> Result<Json<MigrationCodeResponse>, ApiError> {
    let code = state
        .orchestrator
        .prepare_for_sml_migration(&actor, oid, request.code)
        .await?;
    Ok(Json(MigrationCodeResponse { code }))
}

/// DELETE /v1/participants/{oid}/sml/migration
pub async fn cancel_migration(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path(oid): Path<Uuid>,
) -> Result<Json<ParticipantResponse>, ApiError> {
    Ok(Json(state.orchestrator.cancel_sml_migration(&actor, oid).await?.into()))
}

/// Complete a migration prepared by the previous server
///
/// POST /v1/participants/{oid}/sml/migrate
pub async fn migrate_participant(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path(oid): Path<Uuid>,
    Json(request): Json<MigrateRequest>,
) -> Result<Json<ParticipantResponse>, ApiError> {
    let migrated = state
        .orchestrator
        .migrate_in_sml(&actor, oid, &request.code)
        .await?;
    Ok(Json(migrated.into()))
}

/// POST /v1/participants/{oid}/directory
pub async fn publish_in_directory(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path(oid): Path<Uuid>,
) -> Result<Json<ParticipantResponse>, ApiError> {
    Ok(Json(state.orchestrator.publish_in_directory(&actor, oid).await?.into()))
}

/// DELETE /v1/participants/{oid}/directory
pub async fn remove_from_directory(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path(oid): Path<Uuid>,
) -> Result<Json<ParticipantResponse>, ApiError> {
    Ok(Json(state.orchestrator.remove_from_directory(&actor, oid).await?.into()))
}
