//! Participant Handlers
//!
//! CRUD on the participants served by this registry and binding of service
//! metadata templates.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use smp_core::{Contact, Participant, TemplateRef};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::handlers::AppState;
use crate::api::ActingUser;
use crate::registry::ParticipantRegistry;

/// Participant data as submitted by an administrator
#[derive(Debug, Deserialize)]
pub struct ParticipantRequest {
    /// Identifier as `schemeId::value`, or a bare value
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub registration_country: Option<String>,

    #[serde(default)]
    pub first_registration_date: Option<NaiveDate>,

    #[serde(default)]
    pub location_info: Option<String>,

    #[serde(default)]
    pub websites: Vec<String>,

    #[serde(default)]
    pub contacts: Vec<Contact>,

    /// Additional identifiers as `schemeId::value`
    #[serde(default)]
    pub additional_ids: Vec<String>,

    /// Templates bound on creation; ignored on update
    #[serde(default)]
    pub bound_templates: Vec<String>,
}

impl ParticipantRequest {
    async fn into_participant(self, registry: &ParticipantRegistry, oid: Option<Uuid>) -> Result<Participant, ApiError> {
        let mut participant = Participant::new(registry.parse_identifier(&self.id).await?);
        match oid {
            Some(oid) => participant.oid = oid,
            None => participant.bound_templates = self.bound_templates.into_iter().map(TemplateRef::new).collect(),
        }
        for id in &self.additional_ids {
            participant.additional_ids.push(registry.parse_identifier(id).await?);
        }
        participant.name = self.name;
        participant.registration_country = self.registration_country;
        participant.first_registration_date = self.first_registration_date;
        participant.location_info = self.location_info;
        participant.websites = self.websites;
        participant.contacts = self.contacts;
        Ok(participant)
    }
}

/// Participant as shown to administrators
#[derive(Debug, Serialize, Deserialize)]
pub struct ParticipantResponse {
    pub oid: Uuid,
    /// Canonical identifier
    pub id: String,
    pub name: Option<String>,
    pub registration_country: Option<String>,
    pub first_registration_date: Option<NaiveDate>,
    pub location_info: Option<String>,
    pub websites: Vec<String>,
    pub contacts: Vec<Contact>,
    pub additional_ids: Vec<String>,
    pub bound_templates: Vec<String>,
    pub registered_in_sml: bool,
    /// Whether a migration to another server has been prepared
    pub migration_pending: bool,
    pub published_in_directory: bool,
}

impl From<Participant> for ParticipantResponse {
    fn from(p: Participant) -> Self {
        Self {
            oid: p.oid,
            id: p.id.canonical_string(),
            migration_pending: p.is_pending_migration(),
            name: p.name,
            registration_country: p.registration_country,
            first_registration_date: p.first_registration_date,
            location_info: p.location_info,
            websites: p.websites,
            contacts: p.contacts,
            additional_ids: p.additional_ids.iter().map(|id| id.canonical_string()).collect(),
            bound_templates: p.bound_templates.into_iter().map(|t| t.0).collect(),
            registered_in_sml: p.registered_in_sml,
            published_in_directory: p.published_in_directory,
        }
    }
}

/// Filters for listing participants; at most one kind is applied
#[derive(Debug, Default, Deserialize)]
pub struct ParticipantQuery {
    /// Exact identifier, matched on the main and additional identifiers
    pub id: Option<String>,
    /// Business name prefix
    pub name: Option<String>,
    pub registered: Option<bool>,
    pub published: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListParticipantsResponse {
    pub participants: Vec<ParticipantResponse>,
    pub count: usize,
}

/// Add a participant
///
/// POST /v1/participants
pub async fn create_participant(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Json(request): Json<ParticipantRequest>,
) -> Result<(StatusCode, Json<ParticipantResponse>), ApiError> {
    let participant = request
        .into_participant(state.orchestrator.registry(), None)
        .await?;
    let created = state.orchestrator.add_participant(&actor, participant).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// List participants
///
/// GET /v1/participants
pub async fn list_participants(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ParticipantQuery>,
) -> Result<Json<ListParticipantsResponse>, ApiError> {
    let registry = state.orchestrator.registry();
    let found = if let Some(id) = &query.id {
        let id = registry.parse_identifier(id).await?;
        let mut found: Vec<Participant> = registry.find_by_id(&id).await?.into_iter().collect();
        for p in registry.find_by_additional_id(&id).await? {
            if !found.iter().any(|f| f.oid == p.oid) {
                found.push(p);
            }
        }
        found
    } else if let Some(prefix) = &query.name {
        registry.find_by_name(prefix).await?
    } else {
        registry
            .find_by_registration_state(query.registered, query.published)
            .await?
    };

    let participants: Vec<ParticipantResponse> = found.into_iter().map(Into::into).collect();
    let count = participants.len();
    Ok(Json(ListParticipantsResponse { participants, count }))
}

/// GET /v1/participants/{oid}
pub async fn get_participant(
    State(state): State<Arc<AppState>>,
    Path(oid): Path<Uuid>,
) -> Result<Json<ParticipantResponse>, ApiError> {
    Ok(Json(state.orchestrator.get_participant(oid).await?.into()))
}

/// Replace the business data of a participant
///
/// PUT /v1/participants/{oid}
///
/// Registration flags are managed through the network endpoints and are
/// never taken from the request.
pub async fn update_participant(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path(oid): Path<Uuid>,
    Json(request): Json<ParticipantRequest>,
) -> Result<Json<ParticipantResponse>, ApiError> {
    let participant = request
        .into_participant(state.orchestrator.registry(), Some(oid))
        .await?;
    let updated = state.orchestrator.update_participant(&actor, participant).await?;
    Ok(Json(updated.into()))
}

/// Delete a participant and its network registrations
///
/// DELETE /v1/participants/{oid}
pub async fn delete_participant(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path(oid): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.orchestrator.delete_participant(&actor, oid).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/participants/{oid}/templates/{template}
pub async fn bind_template(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path((oid, template)): Path<(Uuid, String)>,
) -> Result<Json<ParticipantResponse>, ApiError> {
    let updated = state
        .orchestrator
        .bind_template(&actor, oid, TemplateRef::new(template))
        .await?;
    Ok(Json(updated.into()))
}

/// DELETE /v1/participants/{oid}/templates/{template}
pub async fn unbind_template(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path((oid, template)): Path<(Uuid, String)>,
) -> Result<Json<ParticipantResponse>, ApiError> {
    let updated = state
        .orchestrator
        .unbind_template(&actor, oid, &TemplateRef::new(template))
        .await?;
    Ok(Json(updated.into()))
}
