//! Registration Orchestrator
//!
//! Keeps the local registration state of participants consistent with the
//! locator service (SML) and the directory.
//!
//! Single-system operations call the external service first and persist the
//! local change only after it succeeded, so a failing call leaves no trace.
//! If the external call succeeds but the local write fails, the error is
//! logged as needing reconciliation and returned as a persistence error.
//!
//! Deleting a participant touches both services and runs as a saga, see
//! [`saga`]. Every successful state change emits exactly one audit record.

pub mod saga;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use smp_core::migration::is_plausible_migration_code;
use smp_core::{
    actions, generate_migration_code, Actor, AuditRecord, IdScheme, Identifier, Participant, Result,
    SmpError, TemplateRef,
};
use smp_network::{DirectoryClient, LocatorClient, NetworkServices};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::AuditSink;
use crate::registry::ParticipantRegistry;
use crate::storage::RegistryStore;

use self::saga::{Fallback, SagaAction, SagaExecutor, SagaPlan, Undo};

/// Drives participant registration, migration and publication
#[derive(Clone)]
pub struct RegistrationOrchestrator {
    registry: ParticipantRegistry,
    store: Arc<dyn RegistryStore>,
    network: NetworkServices,
    audit: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for RegistrationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationOrchestrator")
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

impl RegistrationOrchestrator {
    pub fn new(store: Arc<dyn RegistryStore>, network: NetworkServices, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            registry: ParticipantRegistry::new(store.clone()),
            store,
            network,
            audit,
        }
    }

    pub fn registry(&self) -> &ParticipantRegistry {
        &self.registry
    }

    // =========================================================================
    // Availability
    // =========================================================================

    /// Locator configured and, if it requires so, the server registered in it
    pub async fn is_sml_registration_available(&self) -> Result<bool> {
        let Some(locator) = self.network.locator() else {
            return Ok(false);
        };
        if !locator.requires_smp_registration() {
            return Ok(true);
        }
        Ok(self.store.load_server_config().await?.registered_in_sml)
    }

    /// Directory configured and, if it requires the SML, SML registration available
    pub async fn is_directory_publication_available(&self) -> Result<bool> {
        let Some(directory) = self.network.directory() else {
            return Ok(false);
        };
        if !directory.is_sml_registration_required() {
            return Ok(true);
        }
        self.is_sml_registration_available().await
    }

    async fn available_locator(&self, participant: &Participant) -> Result<&Arc<dyn LocatorClient>> {
        let available = self.is_sml_registration_available().await?;
        match self.network.locator() {
            Some(locator) if available => Ok(locator),
            _ => {
                warn!(participant = %participant.id, "SML registration not available");
                Err(SmpError::Conflict("SML registration is not available".into()))
            }
        }
    }

    async fn available_directory(&self, participant: &Participant) -> Result<&Arc<dyn DirectoryClient>> {
        let available = self.is_directory_publication_available().await?;
        match self.network.directory() {
            Some(directory) if available => Ok(directory),
            _ => {
                warn!(participant = %participant.id, "Directory publication not available");
                Err(SmpError::Conflict("Directory publication is not available".into()))
            }
        }
    }

    fn directory_requires_sml(&self) -> bool {
        self.network
            .directory()
            .map_or(false, |d| d.is_sml_registration_required())
    }

    // =========================================================================
    // Participant Management
    // =========================================================================

    /// Register a new participant, unregistered and unpublished
    pub async fn add_participant(&self, actor: &Actor, mut participant: Participant) -> Result<Participant> {
        participant.normalise();
        participant.validate_registration_data(Utc::now().date_naive())?;
        participant.registered_in_sml = false;
        participant.sml_migration_code = None;
        participant.published_in_directory = false;

        self.registry.add(&participant).await?;
        self.audit.log(
            AuditRecord::new(actor, actions::ADD_PARTICIPANT, participant.id.to_string())
                .with_details(participant.audit_details()),
        );
        Ok(participant)
    }

    /// Update business data, refreshing the directory when published.
    ///
    /// Registration flags and bound templates are taken from the stored row,
    /// templates change only through binding and unbinding. A failing directory
    /// refresh is returned but does not undo the local update.
    pub async fn update_participant(&self, actor: &Actor, mut participant: Participant) -> Result<Participant> {
        participant.normalise();
        participant.validate_registration_data(Utc::now().date_naive())?;

        let stored = self.registry.get(participant.oid).await?;
        participant.registered_in_sml = stored.registered_in_sml;
        participant.sml_migration_code = stored.sml_migration_code.clone();
        participant.published_in_directory = stored.published_in_directory;
        participant.bound_templates = stored.bound_templates.clone();

        self.registry.update(&participant).await?;
        self.audit.log(
            AuditRecord::new(actor, actions::UPDATE_PARTICIPANT, participant.id.to_string())
                .with_details(participant.audit_details()),
        );

        if participant.published_in_directory {
            let Some(directory) = self.network.directory() else {
                warn!(participant = %participant.id, "Published participant but no directory configured");
                return Ok(participant);
            };
            if let Err(e) = directory.publish_participant_info(&participant).await {
                error!(participant = %participant.id, error = %e, "Failed to refresh directory publication");
                return Err(e.into());
            }
            debug!(participant = %participant.id, "Refreshed directory publication");
        }
        Ok(participant)
    }

    /// Remove a participant from the directory, the SML and local storage
    pub async fn delete_participant(&self, actor: &Actor, oid: Uuid) -> Result<()> {
        let mut participant = self.registry.get(oid).await?;
        let plan = SagaPlan::for_deletion(&participant);

        if plan.contains(SagaAction::RemoveFromDirectory) && self.network.directory().is_none() {
            return Err(SmpError::Conflict(format!(
                "Participant {} is published but no directory is configured",
                participant.id
            )));
        }
        if plan.contains(SagaAction::DeregisterFromSml) && self.network.locator().is_none() {
            return Err(SmpError::Conflict(format!(
                "Participant {} is registered but no SML is configured",
                participant.id
            )));
        }

        saga::run(&plan, self, &mut participant).await?;

        info!(participant = %participant.id, "Participant deleted");
        self.audit
            .log(AuditRecord::new(actor, actions::DELETE_PARTICIPANT, participant.id.to_string()));
        Ok(())
    }

    pub async fn get_participant(&self, oid: Uuid) -> Result<Participant> {
        self.registry.get(oid).await
    }

    pub async fn find_participant(&self, id: &Identifier) -> Result<Option<Participant>> {
        self.registry.find_by_id(id).await
    }

    // =========================================================================
    // Identifier Schemes
    // =========================================================================

    /// Manage participant identifiers in `scheme`
    pub async fn add_scheme(&self, actor: &Actor, scheme: IdScheme) -> Result<()> {
        self.registry.add_scheme(scheme.clone()).await?;
        info!(scheme = %scheme.scheme_id, case_sensitive = scheme.case_sensitive, "Added identifier scheme");
        self.audit.log(
            AuditRecord::new(actor, actions::ADD_SCHEME, scheme.scheme_id.as_str())
                .with_details(format!("Case sensitive : {}", scheme.case_sensitive)),
        );
        Ok(())
    }

    // =========================================================================
    // Templates
    // =========================================================================

    pub async fn bind_template(&self, actor: &Actor, oid: Uuid, template: TemplateRef) -> Result<Participant> {
        let mut participant = self.registry.get(oid).await?;
        if participant.bound_templates.contains(&template) {
            return Ok(participant);
        }
        participant.bound_templates.insert(template.clone());
        self.registry.update(&participant).await?;
        self.audit.log(
            AuditRecord::new(actor, actions::ADD_SERVICE, participant.id.to_string())
                .with_details(format!("Template : {}", template.as_str())),
        );
        Ok(participant)
    }

    pub async fn unbind_template(&self, actor: &Actor, oid: Uuid, template: &TemplateRef) -> Result<Participant> {
        let mut participant = self.registry.get(oid).await?;
        if !participant.bound_templates.remove(template) {
            return Ok(participant);
        }
        self.registry.update(&participant).await?;
        self.audit.log(
            AuditRecord::new(actor, actions::REMOVE_SERVICE, participant.id.to_string())
                .with_details(format!("Template : {}", template.as_str())),
        );
        Ok(participant)
    }

    // =========================================================================
    // SML
    // =========================================================================

    pub async fn register_in_sml(&self, actor: &Actor, oid: Uuid) -> Result<Participant> {
        let mut participant = self.registry.get(oid).await?;
        if participant.registered_in_sml {
            debug!(participant = %participant.id, "Already registered in SML");
            return Ok(participant);
        }
        let locator = self.available_locator(&participant).await?;

        if let Err(e) = locator.register_participant(&participant.id).await {
            error!(participant = %participant.id, error = %e, "Failed to register participant in SML");
            return Err(e.into());
        }
        participant.registered_in_sml = true;
        self.persist_after_remote(&participant, "register in SML").await?;

        info!(participant = %participant.id, "Registered participant in SML");
        self.audit
            .log(AuditRecord::new(actor, actions::REGISTER_IN_SML, participant.id.to_string()));
        Ok(participant)
    }

    pub async fn remove_from_sml(&self, actor: &Actor, oid: Uuid) -> Result<Participant> {
        let mut participant = self.registry.get(oid).await?;
        if !participant.registered_in_sml {
            debug!(participant = %participant.id, "Not registered in SML");
            return Ok(participant);
        }
        if participant.published_in_directory && self.directory_requires_sml() {
            warn!(participant = %participant.id, "Cannot remove published participant from SML");
            return Err(SmpError::Conflict(format!(
                "Participant {} must be removed from the directory first",
                participant.id
            )));
        }
        let Some(locator) = self.network.locator() else {
            return Err(SmpError::Conflict("SML registration is not available".into()));
        };

        if let Err(e) = locator.deregister_participant(&participant.id).await {
            error!(participant = %participant.id, error = %e, "Failed to remove participant from SML");
            return Err(e.into());
        }
        participant.registered_in_sml = false;
        participant.sml_migration_code = None;
        self.persist_after_remote(&participant, "remove from SML").await?;

        info!(participant = %participant.id, "Removed participant from SML");
        self.audit
            .log(AuditRecord::new(actor, actions::REMOVE_FROM_SML, participant.id.to_string()));
        Ok(participant)
    }

    /// Register a migration code allowing another server to take over the
    /// participant. A code is generated when none is supplied.
    pub async fn prepare_for_sml_migration(&self, actor: &Actor, oid: Uuid, code: Option<String>) -> Result<String> {
        let mut participant = self.registry.get(oid).await?;
        if !participant.registered_in_sml {
            warn!(participant = %participant.id, "Cannot migrate participant that is not registered in SML");
            return Err(SmpError::Conflict(format!(
                "Participant {} is not registered in SML",
                participant.id
            )));
        }
        let code = match code {
            Some(code) if !is_plausible_migration_code(&code) => {
                return Err(SmpError::Validation("Migration code must not be empty or contain whitespace".into()))
            }
            Some(code) => code,
            None => generate_migration_code(),
        };
        let locator = self.available_locator(&participant).await?;

        if let Err(e) = locator.register_migration_code(&participant.id, &code).await {
            error!(participant = %participant.id, error = %e, "Failed to register migration code in SML");
            return Err(e.into());
        }
        participant.sml_migration_code = Some(code.clone());
        self.persist_after_remote(&participant, "prepare SML migration").await?;

        info!(participant = %participant.id, "Prepared participant for SML migration");
        self.audit.log(
            AuditRecord::new(actor, actions::PREPARE_MIGRATION, participant.id.to_string())
                .with_details(format!("Used migration code : {}", code)),
        );
        Ok(code)
    }

    /// Withdraw a prepared migration by migrating the participant to this server
    pub async fn cancel_sml_migration(&self, actor: &Actor, oid: Uuid) -> Result<Participant> {
        let mut participant = self.registry.get(oid).await?;
        let Some(code) = participant.sml_migration_code.clone() else {
            debug!(participant = %participant.id, "No migration to cancel");
            return Ok(participant);
        };
        let locator = self.available_locator(&participant).await?;

        if let Err(e) = locator.migrate_participant(&participant.id, &code).await {
            error!(participant = %participant.id, error = %e, "Failed to cancel SML migration");
            return Err(e.into());
        }
        participant.sml_migration_code = None;
        self.persist_after_remote(&participant, "cancel SML migration").await?;

        info!(participant = %participant.id, "Cancelled SML migration");
        self.audit
            .log(AuditRecord::new(actor, actions::CANCEL_MIGRATION, participant.id.to_string()));
        Ok(participant)
    }

    /// Take over a participant from another server using its migration code
    pub async fn migrate_in_sml(&self, actor: &Actor, oid: Uuid, code: &str) -> Result<Participant> {
        if !is_plausible_migration_code(code) {
            return Err(SmpError::Validation("Migration code must not be empty or contain whitespace".into()));
        }
        let mut participant = self.registry.get(oid).await?;
        if participant.registered_in_sml && !participant.is_pending_migration() {
            warn!(participant = %participant.id, "Participant already registered in SML");
            return Err(SmpError::Conflict(format!(
                "Participant {} is already registered in SML",
                participant.id
            )));
        }
        let locator = self.available_locator(&participant).await?;

        if let Err(e) = locator.migrate_participant(&participant.id, code).await {
            error!(participant = %participant.id, error = %e, "Failed to migrate participant in SML");
            return Err(e.into());
        }
        participant.registered_in_sml = true;
        participant.sml_migration_code = None;
        self.persist_after_remote(&participant, "migrate in SML").await?;

        info!(participant = %participant.id, "Migrated participant to this server");
        self.audit.log(
            AuditRecord::new(actor, actions::MIGRATE_IN_SML, participant.id.to_string())
                .with_details(format!("Used migration code : {}", code)),
        );
        Ok(participant)
    }

    // =========================================================================
    // Directory
    // =========================================================================

    pub async fn publish_in_directory(&self, actor: &Actor, oid: Uuid) -> Result<Participant> {
        let mut participant = self.registry.get(oid).await?;
        if participant.published_in_directory {
            debug!(participant = %participant.id, "Already published in directory");
            return Ok(participant);
        }
        let directory = self.available_directory(&participant).await?;
        if directory.is_sml_registration_required() && !participant.registered_in_sml {
            warn!(participant = %participant.id, "Directory requires SML registration");
            return Err(SmpError::Conflict(format!(
                "Participant {} must be registered in SML before publication",
                participant.id
            )));
        }

        if let Err(e) = directory.publish_participant_info(&participant).await {
            error!(participant = %participant.id, error = %e, "Failed to publish participant in directory");
            return Err(e.into());
        }
        participant.published_in_directory = true;
        self.persist_after_remote(&participant, "publish in directory").await?;

        info!(participant = %participant.id, "Published participant in directory");
        self.audit
            .log(AuditRecord::new(actor, actions::PUBLISH_IN_DIRECTORY, participant.id.to_string()));
        Ok(participant)
    }

    pub async fn remove_from_directory(&self, actor: &Actor, oid: Uuid) -> Result<Participant> {
        let mut participant = self.registry.get(oid).await?;
        if !participant.published_in_directory {
            debug!(participant = %participant.id, "Not published in directory");
            return Ok(participant);
        }
        let Some(directory) = self.network.directory() else {
            return Err(SmpError::Conflict("Directory publication is not available".into()));
        };

        if let Err(e) = directory.remove_participant_info(&participant).await {
            error!(participant = %participant.id, error = %e, "Failed to remove participant from directory");
            return Err(e.into());
        }
        participant.published_in_directory = false;
        self.persist_after_remote(&participant, "remove from directory").await?;

        info!(participant = %participant.id, "Removed participant from directory");
        self.audit
            .log(AuditRecord::new(actor, actions::REMOVE_FROM_DIRECTORY, participant.id.to_string()));
        Ok(participant)
    }

    /// Persist a change the network already applied
    async fn persist_after_remote(&self, participant: &Participant, operation: &str) -> Result<()> {
        self.registry.update(participant).await.map_err(|e| {
            error!(
                participant = %participant.id,
                operation,
                error = %e,
                "Network updated but local state could not be saved, reconciliation needed"
            );
            match e {
                SmpError::Persistence(_) => e,
                other => SmpError::Persistence(other.to_string()),
            }
        })
    }
}

#[async_trait]
impl SagaExecutor for RegistrationOrchestrator {
    async fn perform(&self, action: SagaAction, participant: &mut Participant) -> Result<()> {
        match action {
            SagaAction::RemoveFromDirectory => {
                let directory = self
                    .network
                    .directory()
                    .ok_or_else(|| SmpError::Conflict("Directory publication is not available".into()))?;
                directory.remove_participant_info(participant).await.map_err(|e| {
                    error!(participant = %participant.id, error = %e, "Failed to remove participant from directory");
                    SmpError::from(e)
                })?;
                participant.published_in_directory = false;
            }
            SagaAction::DeregisterFromSml => {
                let locator = self
                    .network
                    .locator()
                    .ok_or_else(|| SmpError::Conflict("SML registration is not available".into()))?;
                locator.deregister_participant(&participant.id).await.map_err(|e| {
                    error!(participant = %participant.id, error = %e, "Failed to remove participant from SML");
                    SmpError::from(e)
                })?;
                participant.registered_in_sml = false;
            }
            SagaAction::DeleteLocal => {
                self.registry.delete(participant).await.map_err(|e| {
                    error!(
                        participant = %participant.id,
                        error = %e,
                        "Network registrations removed but participant could not be deleted, reconciliation needed"
                    );
                    e
                })?;
            }
        }
        Ok(())
    }

    async fn undo(&self, undo: Undo, participant: &mut Participant) -> Result<()> {
        match undo {
            Undo::Republish => {
                let directory = self
                    .network
                    .directory()
                    .ok_or_else(|| SmpError::Directory("Directory not configured".into()))?;
                directory.publish_participant_info(participant).await?;
                participant.published_in_directory = true;
                info!(participant = %participant.id, "Republished participant after failed deletion");
            }
        }
        Ok(())
    }

    async fn fallback(&self, fallback: Fallback, participant: &mut Participant) -> Result<()> {
        match fallback {
            Fallback::MarkUnpublished => {
                let mut stored = self.registry.get(participant.oid).await?;
                stored.published_in_directory = false;
                self.registry.update(&stored).await?;
                participant.published_in_directory = false;
                warn!(
                    participant = %participant.id,
                    "Participant marked unpublished, directory state may differ"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::storage::MemoryStore;
    use smp_core::IdScheme;
    use smp_network::{MockDirectory, MockLocator};

    #[tokio::test]
    async fn test_availability_follows_policies() {
        let store: Arc<dyn RegistryStore> = Arc::new(MemoryStore::new());
        let audit = Arc::new(MemoryAuditSink::new());

        let none = RegistrationOrchestrator::new(store.clone(), NetworkServices::none(), audit.clone());
        assert!(!none.is_sml_registration_available().await.unwrap());
        assert!(!none.is_directory_publication_available().await.unwrap());

        let network = NetworkServices::none()
            .with_locator(Arc::new(MockLocator::new().requiring_smp_registration(true)))
            .with_directory(Arc::new(MockDirectory::new().requiring_sml_registration(true)));
        let orchestrator = RegistrationOrchestrator::new(store.clone(), network, audit);
        assert!(!orchestrator.is_sml_registration_available().await.unwrap());
        assert!(!orchestrator.is_directory_publication_available().await.unwrap());

        let mut config = store.load_server_config().await.unwrap();
        config.registered_in_sml = true;
        store.save_server_config(config).await.unwrap();
        assert!(orchestrator.is_sml_registration_available().await.unwrap());
        assert!(orchestrator.is_directory_publication_available().await.unwrap());
    }

    #[tokio::test]
    async fn test_register_without_locator_is_conflict() {
        let store: Arc<dyn RegistryStore> = Arc::new(MemoryStore::new());
        let scheme = IdScheme::new("iso6523-actorid-upis", false).unwrap();
        store.add_scheme(scheme.clone()).await.unwrap();
        let audit = Arc::new(MemoryAuditSink::new());
        let orchestrator = RegistrationOrchestrator::new(store, NetworkServices::none(), audit.clone());
        let actor = Actor::new("admin").unwrap();

        let p = orchestrator
            .add_participant(&actor, Participant::new(Identifier::with_scheme(scheme, "9999:x").unwrap()))
            .await
            .unwrap();
        let result = orchestrator.register_in_sml(&actor, p.oid).await;

        assert!(matches!(result, Err(SmpError::Conflict(_))));
        assert_eq!(audit.actions(), vec![actions::ADD_PARTICIPANT]);
    }
}
