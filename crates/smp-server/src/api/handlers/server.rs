//! Server Administration Handlers
//!
//! Metadata and SML registration of the server itself, its certificate,
//! identifier schemes and the audit trail.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use ed25519_dalek::SigningKey;
use serde::Deserialize;
use smp_core::{AuditRecord, IdScheme, NetworkServicesInfo, ServerCertificate, ServerIdentity, ServerKeyPair, ServerMetadata};
use std::sync::Arc;
use tracing::info;
use zeroize::Zeroizing;

use crate::api::error::ApiError;
use crate::api::handlers::AppState;
use crate::api::ActingUser;

/// Upload of a server key pair
#[derive(Debug, Deserialize)]
pub struct CertificateRequest {
    /// Base64-encoded Ed25519 secret key (32 bytes)
    pub secret_key: String,

    pub subject: String,

    pub issuer: String,

    pub serial_number: String,

    pub not_before: DateTime<Utc>,

    pub not_after: DateTime<Utc>,

    /// When the key pair becomes active, immediately when absent
    #[serde(default)]
    pub activation: Option<DateTime<Utc>>,
}

impl CertificateRequest {
    fn key_pair(&self) -> Result<ServerKeyPair, ApiError> {
        let bytes = Zeroizing::new(STANDARD.decode(&self.secret_key)?);
        let secret: &[u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            ApiError::BadRequest(format!(
                "Invalid key length: expected 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        let signing_key = SigningKey::from_bytes(secret);
        let certificate = ServerCertificate {
            subject: self.subject.clone(),
            issuer: self.issuer.clone(),
            serial_number: self.serial_number.clone(),
            public_key: STANDARD.encode(signing_key.verifying_key().to_bytes()),
            not_before: self.not_before,
            not_after: self.not_after,
        };
        Ok(ServerKeyPair::new(signing_key, certificate)?)
    }
}

/// Request to manage an identifier scheme
#[derive(Debug, Deserialize)]
pub struct SchemeRequest {
    pub scheme_id: String,

    #[serde(default)]
    pub case_sensitive: bool,

    #[serde(default)]
    pub agency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    /// Maximum number of records, 100 when absent
    pub limit: Option<usize>,
}

/// GET /v1/server/metadata
pub async fn get_metadata(State(state): State<Arc<AppState>>) -> Result<Json<ServerMetadata>, ApiError> {
    Ok(Json(state.admin.get_server_metadata().await?))
}

/// PUT /v1/server/metadata
pub async fn update_metadata(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Json(identity): Json<ServerIdentity>,
) -> Result<Json<ServerMetadata>, ApiError> {
    Ok(Json(state.admin.update_server_metadata(&actor, identity).await?))
}

/// Register this server in the SML
///
/// POST /v1/server/sml
pub async fn register_server(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
) -> Result<Json<ServerMetadata>, ApiError> {
    state.admin.register_server_in_sml(&actor).await?;
    Ok(Json(state.admin.get_server_metadata().await?))
}

/// DELETE /v1/server/sml
pub async fn remove_server(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
) -> Result<Json<ServerMetadata>, ApiError> {
    state.admin.remove_server_from_sml(&actor).await?;
    Ok(Json(state.admin.get_server_metadata().await?))
}

/// Install a new server key pair, now or at a later activation date
///
/// POST /v1/server/certificate
pub async fn register_certificate(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Json(request): Json<CertificateRequest>,
) -> Result<Json<ServerMetadata>, ApiError> {
    let key_pair = request.key_pair()?;
    info!(serial = %request.serial_number, activation = ?request.activation, "Received server certificate");
    state
        .admin
        .register_certificate(&actor, key_pair, request.activation)
        .await?;
    Ok(Json(state.admin.get_server_metadata().await?))
}

/// DELETE /v1/server/certificate
pub async fn remove_certificate(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
) -> Result<StatusCode, ApiError> {
    state.admin.remove_certificate(&actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/server/network
pub async fn network_info(State(state): State<Arc<AppState>>) -> Json<NetworkServicesInfo> {
    Json(state.admin.get_network_services_info())
}

/// POST /v1/schemes
pub async fn add_scheme(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Json(request): Json<SchemeRequest>,
) -> Result<(StatusCode, Json<IdScheme>), ApiError> {
    let mut scheme = IdScheme::new(request.scheme_id, request.case_sensitive)?;
    if let Some(agency) = request.agency {
        scheme = scheme.with_agency(agency);
    }
    state.orchestrator.add_scheme(&actor, scheme.clone()).await?;
    Ok((StatusCode::CREATED, Json(scheme)))
}

/// GET /v1/schemes
pub async fn list_schemes(State(state): State<Arc<AppState>>) -> Result<Json<Vec<IdScheme>>, ApiError> {
    Ok(Json(state.orchestrator.registry().schemes().await?))
}

/// GET /v1/audit
pub async fn list_audit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditRecord>>, ApiError> {
    let limit = query.limit.unwrap_or(100);
    Ok(Json(state.admin.audit_trail(limit).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request(secret_key: String) -> CertificateRequest {
        let now = Utc::now();
        CertificateRequest {
            secret_key,
            subject: "CN=SMP01".into(),
            issuer: "CN=Test CA".into(),
            serial_number: "01".into(),
            not_before: now - Duration::days(1),
            not_after: now + Duration::days(365),
            activation: None,
        }
    }

    #[test]
    fn test_key_pair_from_upload() {
        let secret = STANDARD.encode([7u8; 32]);
        let key_pair = request(secret).key_pair().unwrap();
        let expected = SigningKey::from_bytes(&[7u8; 32]).verifying_key();
        assert_eq!(key_pair.verifying_key(), expected);
    }

    #[test]
    fn test_short_secret_rejected() {
        let secret = STANDARD.encode([7u8; 16]);
        assert!(matches!(request(secret).key_pair(), Err(ApiError::BadRequest(_))));
        assert!(matches!(request("not base64!".into()).key_pair(), Err(ApiError::BadRequest(_))));
    }
}
