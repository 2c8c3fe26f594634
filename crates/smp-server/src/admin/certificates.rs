//! Certificate Rotation Manager
//!
//! The server holds at most one active and one pending key pair. A pending
//! key pair becomes active once its activation date has passed; the
//! promotion is an explicit, idempotent step run on every configuration read
//! and from a periodic task. It is a compare-and-set on the stored activation
//! date, so concurrent callers promote at most once.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use smp_core::{actions, Actor, AuditRecord, CertificateUpdate, Result, ServerKeyPair, SmpError, SERVER_SUBJECT};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::ServerAdmin;
use crate::storage::ServerConfigRecord;

impl ServerAdmin {
    /// Promote the pending key pair if its activation date is not after `now`.
    ///
    /// Returns whether this call performed the promotion.
    pub async fn apply_due_transitions(&self, now: DateTime<Utc>) -> Result<bool> {
        let config = self.store.load_server_config().await?;
        if !config.has_due_transition(now) {
            return Ok(false);
        }
        let Some(activation) = config.activation_date else {
            return Ok(false);
        };
        let promoted = self.store.promote_pending_credential(activation).await?;
        if promoted {
            info!(activation = %activation, "Activated pending server certificate");
        } else {
            debug!(activation = %activation, "Pending certificate already applied");
        }
        Ok(promoted)
    }

    /// Current configuration with due transitions applied
    pub async fn get_config(&self) -> Result<ServerConfigRecord> {
        self.get_config_at(Utc::now()).await
    }

    pub async fn get_config_at(&self, now: DateTime<Utc>) -> Result<ServerConfigRecord> {
        self.apply_due_transitions(now).await?;
        Ok(self.store.load_server_config().await?)
    }

    /// The decrypted active key pair
    pub async fn active_key_pair(&self) -> Result<Option<ServerKeyPair>> {
        let config = self.get_config().await?;
        config
            .current_key_pair
            .as_deref()
            .map(|blob| self.encryptor.open_key_pair(blob))
            .transpose()
    }

    /// Install a key pair, now or at `activation`
    pub async fn register_certificate(
        &self,
        actor: &Actor,
        key_pair: ServerKeyPair,
        activation: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.register_certificate_at(actor, key_pair, activation, Utc::now())
            .await
    }

    /// Install a key pair relative to the reference instant `now`.
    ///
    /// The activation instant (default `now`) must lie within the validity
    /// window of the certificate. An activation not after `now` installs the
    /// key pair as current and drops any pending one; a later activation
    /// replaces the pending key pair.
    pub async fn register_certificate_at(
        &self,
        actor: &Actor,
        key_pair: ServerKeyPair,
        activation: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let certificate = key_pair.certificate().clone();
        let start = activation.unwrap_or(now);
        if !certificate.is_valid_at(start) {
            warn!(
                activation = %start,
                not_before = %certificate.not_before,
                not_after = %certificate.not_after,
                "Requested activation is outside of certificate validity period"
            );
            return Err(SmpError::Validation(
                "Requested activation date is outside of certificate validity period".into(),
            ));
        }
        let scheduled = activation.filter(|at| *at > now);

        let mut config = self.get_config_at(now).await?;
        let sealed = self.encryptor.seal_key_pair(&key_pair)?;

        let announce = config.registered_in_sml
            && self
                .network
                .locator()
                .map_or(false, |l| l.requires_smp_cert_registration());
        if announce {
            if let Some(locator) = self.network.locator() {
                let update = CertificateUpdate {
                    certificate: certificate.clone(),
                    activation: scheduled,
                };
                if let Err(e) = locator
                    .update_smp_certificate(&config.identity.smp_id, &update)
                    .await
                {
                    error!(smp_id = %config.identity.smp_id, error = %e, "Failed to register new server certificate in SML");
                    return Err(e.into());
                }
            }
        }

        match scheduled {
            None => {
                config.current_key_pair = Some(sealed);
                config.next_key_pair = None;
                config.activation_date = None;
            }
            Some(at) => {
                config.next_key_pair = Some(sealed);
                config.activation_date = Some(at);
            }
        }
        if announce {
            self.save_after_remote(config, "register certificate").await?;
        } else {
            self.store.save_server_config(config).await?;
        }

        match scheduled {
            Some(at) => info!(serial = %certificate.serial_number, activation = %at, "Scheduled server certificate update"),
            None => info!(serial = %certificate.serial_number, "Updated server certificate"),
        }
        self.audit.log(
            AuditRecord::new(actor, actions::UPDATE_CERTIFICATE, SERVER_SUBJECT)
                .with_details(certificate.audit_details()),
        );
        Ok(())
    }

    /// Remove all key pairs of the server
    pub async fn remove_certificate(&self, actor: &Actor) -> Result<()> {
        let mut config = self.get_config().await?;
        if config.current_key_pair.is_none() {
            debug!("No server certificate configured");
            return Ok(());
        }
        let requires_cert = self
            .network
            .locator()
            .map_or(false, |l| l.requires_smp_cert_registration());
        if config.registered_in_sml && requires_cert {
            warn!("Attempt to remove server certificate while registered in SML");
            return Err(SmpError::Conflict(
                "Cannot remove certificate while registered in SML".into(),
            ));
        }

        config.current_key_pair = None;
        config.next_key_pair = None;
        config.activation_date = None;
        self.store.save_server_config(config).await?;

        info!("Removed server certificate");
        self.audit
            .log(AuditRecord::new(actor, actions::REMOVE_CERTIFICATE, SERVER_SUBJECT));
        Ok(())
    }
}

/// Apply due certificate transitions every `period`
pub fn spawn_rotation_task(admin: ServerAdmin, period: StdDuration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if let Err(e) = admin.apply_due_transitions(Utc::now()).await {
                error!(error = %e, "Failed to apply due certificate transitions");
            }
        }
    })
}
