//! Client interface of the locator service (SML)

use async_trait::async_trait;
use smp_core::{CertificateUpdate, Identifier, ServerIdentity};

use crate::error::LocatorResult;

/// Operations of the network locator service.
///
/// The locator maps participant identifiers to the server answering for
/// them. Implementations own their transport, timeouts and retries; callers
/// make exactly one attempt per call.
#[async_trait]
pub trait LocatorClient: Send + Sync {
    /// Display name of the service
    fn name(&self) -> &str;

    /// Whether the server must be registered before participants can be
    fn requires_smp_registration(&self) -> bool;

    /// Whether certificate changes must be announced to the service
    fn requires_smp_cert_registration(&self) -> bool;

    async fn register_smp_server(&self, server: &ServerIdentity) -> LocatorResult<()>;

    async fn update_smp_server(&self, server: &ServerIdentity) -> LocatorResult<()>;

    /// Announce a (future) certificate of the server
    async fn update_smp_certificate(&self, smp_id: &str, update: &CertificateUpdate) -> LocatorResult<()>;

    async fn deregister_smp_server(&self, smp_id: &str) -> LocatorResult<()>;

    async fn register_participant(&self, participant: &Identifier) -> LocatorResult<()>;

    async fn deregister_participant(&self, participant: &Identifier) -> LocatorResult<()>;

    async fn is_registered(&self, participant: &Identifier) -> LocatorResult<bool>;

    /// Register the code another server can use to take over the participant
    async fn register_migration_code(&self, participant: &Identifier, code: &str) -> LocatorResult<()>;

    /// Move the participant to this server using a registered migration code
    async fn migrate_participant(&self, participant: &Identifier, code: &str) -> LocatorResult<()>;
}
