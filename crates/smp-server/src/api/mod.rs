//! Admin API of the SMP registry server

pub mod error;
pub mod handlers;

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use smp_core::Actor;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use error::ApiError;
use handlers::AppState;

/// Header carrying the name of the acting user
pub const ACTOR_HEADER: &str = "x-smp-user";

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// The acting user of a modifying request, taken from [`ACTOR_HEADER`]
#[derive(Debug, Clone)]
pub struct ActingUser(pub Actor);

impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ACTOR_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("Missing {} header", ACTOR_HEADER)))?;
        let name = value
            .to_str()
            .map_err(|_| ApiError::Unauthorized(format!("Invalid {} header", ACTOR_HEADER)))?;
        let actor = Actor::new(name)
            .map_err(|_| ApiError::Unauthorized(format!("Empty {} header", ACTOR_HEADER)))?;
        Ok(ActingUser(actor))
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        // Participants
        .route(
            "/v1/participants",
            post(handlers::create_participant).get(handlers::list_participants),
        )
        .route(
            "/v1/participants/{oid}",
            get(handlers::get_participant)
                .put(handlers::update_participant)
                .delete(handlers::delete_participant),
        )
        .route(
            "/v1/participants/{oid}/templates/{template}",
            post(handlers::bind_template).delete(handlers::unbind_template),
        )
        // Network registrations of participants
        .route(
            "/v1/participants/{oid}/sml",
            post(handlers::register_in_sml).delete(handlers::remove_from_sml),
        )
        .route(
            "/v1/participants/{oid}/sml/migration",
            post(handlers::prepare_migration).delete(handlers::cancel_migration),
        )
        .route("/v1/participants/{oid}/sml/migrate", post(handlers::migrate_participant))
        .route(
            "/v1/participants/{oid}/directory",
            post(handlers::publish_in_directory).delete(handlers::remove_from_directory),
        )
        // Server administration
        .route(
            "/v1/server/metadata",
            get(handlers::get_metadata).put(handlers::update_metadata),
        )
        .route(
            "/v1/server/sml",
            post(handlers::register_server).delete(handlers::remove_server),
        )
        .route(
            "/v1/server/certificate",
            post(handlers::register_certificate).delete(handlers::remove_certificate),
        )
        .route("/v1/server/network", get(handlers::network_info))
        .route("/v1/schemes", post(handlers::add_scheme).get(handlers::list_schemes))
        .route("/v1/audit", get(handlers::list_audit))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
