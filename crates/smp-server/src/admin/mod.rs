//! Server administration
//!
//! Owns the server configuration singleton: identity, SML registration of
//! the server itself and its credentials (see [`certificates`]).

pub mod certificates;

use std::sync::Arc;

use smp_core::{
    actions, Actor, AuditRecord, CertificateUpdate, DataEncryptor, NetworkServicesInfo, Result,
    ServerIdentity, ServerMetadata, SmpError, SERVER_SUBJECT,
};
use smp_network::NetworkServices;
use tracing::{debug, error, info, warn};

use crate::audit::AuditSink;
use crate::storage::{RegistryStore, ServerConfigRecord};

/// Administration of the server configuration
#[derive(Clone)]
pub struct ServerAdmin {
    store: Arc<dyn RegistryStore>,
    network: NetworkServices,
    audit: Arc<dyn AuditSink>,
    encryptor: DataEncryptor,
}

impl std::fmt::Debug for ServerAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerAdmin")
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

impl ServerAdmin {
    pub fn new(
        store: Arc<dyn RegistryStore>,
        network: NetworkServices,
        audit: Arc<dyn AuditSink>,
        encryptor: DataEncryptor,
    ) -> Self {
        Self {
            store,
            network,
            audit,
            encryptor,
        }
    }

    /// Metadata including active and pending certificates
    pub async fn get_server_metadata(&self) -> Result<ServerMetadata> {
        let config = self.get_config().await?;
        let certificate = match &config.current_key_pair {
            Some(blob) => Some(self.encryptor.open_key_pair(blob)?.certificate().clone()),
            None => None,
        };
        let pending_update = match &config.next_key_pair {
            Some(blob) => Some(CertificateUpdate {
                certificate: self.encryptor.open_key_pair(blob)?.certificate().clone(),
                activation: config.activation_date,
            }),
            None => None,
        };
        Ok(ServerMetadata {
            identity: config.identity,
            registered_in_sml: config.registered_in_sml,
            certificate,
            pending_update,
        })
    }

    /// Change the identity of the server.
    ///
    /// The SMP id is fixed while registered in the SML; other changes are
    /// pushed to the SML before they are saved.
    pub async fn update_server_metadata(&self, actor: &Actor, identity: ServerIdentity) -> Result<ServerMetadata> {
        identity.validate()?;
        let mut config = self.get_config().await?;

        if config.registered_in_sml {
            if config.identity.smp_id != identity.smp_id {
                warn!(smp_id = %config.identity.smp_id, "Attempt to change SMP id while registered in SML");
                return Err(SmpError::Conflict(
                    "SMP id cannot be changed while registered in SML".into(),
                ));
            }
            let locator = self
                .network
                .locator()
                .ok_or_else(|| SmpError::Conflict("SML integration not available".into()))?;
            if let Err(e) = locator.update_smp_server(&identity).await {
                error!(smp_id = %identity.smp_id, error = %e, "Failed to update SML registration");
                return Err(e.into());
            }
        }

        config.identity = identity;
        self.store.save_server_config(config.clone()).await?;

        info!(smp_id = %config.identity.smp_id, "Updated server metadata");
        self.audit.log(
            AuditRecord::new(actor, actions::UPDATE_METADATA, SERVER_SUBJECT)
                .with_details(config.identity.audit_details()),
        );
        self.get_server_metadata().await
    }

    pub async fn is_registered_in_sml(&self) -> Result<bool> {
        Ok(self.get_config().await?.registered_in_sml)
    }

    pub async fn register_server_in_sml(&self, actor: &Actor) -> Result<()> {
        let Some(locator) = self.network.locator() else {
            warn!("Request to register server in SML, but no SML integration available");
            return Err(SmpError::Conflict("SML integration not available".into()));
        };
        let mut config = self.get_config().await?;
        if config.registered_in_sml {
            debug!("Server already registered in SML");
            return Ok(());
        }
        config.identity.validate()?;

        if let Err(e) = locator.register_smp_server(&config.identity).await {
            error!(smp_id = %config.identity.smp_id, error = %e, "Failed to register server in SML");
            return Err(e.into());
        }
        config.registered_in_sml = true;
        self.save_after_remote(config.clone(), "register server in SML").await?;

        info!(smp_id = %config.identity.smp_id, "Registered server in SML");
        self.audit.log(
            AuditRecord::new(actor, actions::REGISTER_IN_SML, SERVER_SUBJECT)
                .with_details(config.identity.audit_details()),
        );
        Ok(())
    }

    /// Deregister the server; all participants become unregistered locally
    pub async fn remove_server_from_sml(&self, actor: &Actor) -> Result<()> {
        let mut config = self.get_config().await?;
        if !config.registered_in_sml {
            debug!("Server already removed from SML");
            return Ok(());
        }
        let directory_requires_sml = self
            .network
            .directory()
            .map_or(false, |d| d.is_sml_registration_required());
        if directory_requires_sml && self.store.any_published_in_directory().await? {
            warn!("Cannot remove server from SML while participants are published");
            return Err(SmpError::Conflict(
                "Cannot remove server from SML as there still exist published participants".into(),
            ));
        }
        let Some(locator) = self.network.locator() else {
            error!("Cannot remove server from SML, SML integration not available any more");
            return Err(SmpError::Conflict("SML integration not available".into()));
        };

        if let Err(e) = locator.deregister_smp_server(&config.identity.smp_id).await {
            error!(smp_id = %config.identity.smp_id, error = %e, "Failed to remove server from SML");
            return Err(e.into());
        }
        config.registered_in_sml = false;
        self.save_after_remote(config.clone(), "remove server from SML").await?;
        let unregistered = self.store.unregister_all_from_sml().await.map_err(|e| {
            error!(error = %e, "Server removed from SML but participants still marked registered, reconciliation needed");
            SmpError::from(e)
        })?;

        info!(smp_id = %config.identity.smp_id, unregistered, "Removed server from SML");
        self.audit
            .log(AuditRecord::new(actor, actions::REMOVE_FROM_SML, SERVER_SUBJECT));
        Ok(())
    }

    pub fn get_network_services_info(&self) -> NetworkServicesInfo {
        let locator = self.network.locator();
        let directory = self.network.directory();
        NetworkServicesInfo {
            sml_available: locator.is_some(),
            sml_name: locator.map(|l| l.name().to_string()),
            sml_requires_smp_registration: locator.map_or(false, |l| l.requires_smp_registration()),
            sml_requires_certificate_registration: locator.map_or(false, |l| l.requires_smp_cert_registration()),
            directory_available: directory.is_some(),
            directory_name: directory.map(|d| d.name().to_string()),
            directory_requires_sml_registration: directory.map_or(false, |d| d.is_sml_registration_required()),
        }
    }

    /// Most recent audit records first
    pub async fn audit_trail(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        Ok(self.store.list_audit(limit).await?)
    }

    async fn save_after_remote(&self, config: ServerConfigRecord, operation: &str) -> Result<()> {
        self.store.save_server_config(config).await.map_err(|e| {
            error!(operation, error = %e, "SML updated but server config could not be saved, reconciliation needed");
            SmpError::Persistence(e.to_string())
        })
    }
}
