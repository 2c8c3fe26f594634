//! Participant Registry
//!
//! Local source of truth for participant identity and registration flags.
//! Every write checks the row invariants first; callers that change state
//! re-load the stored row instead of trusting the copy they were handed.

use std::sync::Arc;

use smp_core::identifier::split_canonical;
use smp_core::{IdScheme, Identifier, Participant, Result, SmpError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::storage::RegistryStore;

/// Persistence of participants and identifier schemes
#[derive(Debug, Clone)]
pub struct ParticipantRegistry {
    store: Arc<dyn RegistryStore>,
}

impl ParticipantRegistry {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self { store }
    }

    // =========================================================================
    // Identifier Schemes
    // =========================================================================

    pub async fn add_scheme(&self, scheme: IdScheme) -> Result<()> {
        Ok(self.store.add_scheme(scheme).await?)
    }

    pub async fn schemes(&self) -> Result<Vec<IdScheme>> {
        Ok(self.store.list_schemes().await?)
    }

    /// Build an identifier in a scheme managed by this server
    pub async fn resolve_identifier(&self, scheme_id: Option<&str>, value: &str) -> Result<Identifier> {
        match scheme_id {
            None => Identifier::unscoped(value),
            Some(scheme_id) => {
                let scheme = self.store.get_scheme(scheme_id).await?.ok_or_else(|| {
                    SmpError::Validation(format!("Identifier scheme '{}' is not managed by this server", scheme_id))
                })?;
                Identifier::with_scheme(scheme, value)
            }
        }
    }

    /// Parse `schemeId::value` (or a bare value) into a managed identifier
    pub async fn parse_identifier(&self, s: &str) -> Result<Identifier> {
        let (scheme_id, value) = split_canonical(s);
        self.resolve_identifier(scheme_id, value).await
    }

    async fn check_scheme_managed(&self, id: &Identifier) -> Result<()> {
        let Some(scheme) = &id.scheme else {
            return Ok(());
        };
        match self.store.get_scheme(&scheme.scheme_id).await? {
            Some(managed) if managed.case_sensitive == scheme.case_sensitive => Ok(()),
            Some(_) => Err(SmpError::Validation(format!(
                "Identifier scheme '{}' does not match the managed scheme",
                scheme.scheme_id
            ))),
            None => Err(SmpError::Validation(format!(
                "Identifier scheme '{}' is not managed by this server",
                scheme.scheme_id
            ))),
        }
    }

    // =========================================================================
    // Participants
    // =========================================================================

    /// Store a new participant
    pub async fn add(&self, participant: &Participant) -> Result<()> {
        participant.check_invariants()?;
        self.check_scheme_managed(&participant.id).await?;
        for id in &participant.additional_ids {
            self.check_scheme_managed(id).await?;
        }
        self.store.insert_participant(participant.clone()).await?;
        info!(participant = %participant.id, oid = %participant.oid, "Added participant");
        Ok(())
    }

    /// Replace a stored participant.
    ///
    /// The identifier and bound templates cannot change while the stored row
    /// is registered in the SML.
    pub async fn update(&self, participant: &Participant) -> Result<()> {
        participant.check_invariants()?;
        let stored = self.get(participant.oid).await?;
        if stored.registered_in_sml {
            if stored.id != participant.id {
                warn!(participant = %stored.id, "Rejected identifier change while registered in SML");
                return Err(SmpError::Conflict(format!(
                    "Identifier of {} cannot change while registered in SML",
                    stored.id
                )));
            }
            if stored.bound_templates != participant.bound_templates {
                warn!(participant = %stored.id, "Rejected template change while registered in SML");
                return Err(SmpError::Conflict(format!(
                    "Bound templates of {} cannot change while registered in SML",
                    stored.id
                )));
            }
        }
        if stored.id != participant.id {
            self.check_scheme_managed(&participant.id).await?;
        }
        self.store.update_participant(participant.clone()).await?;
        Ok(())
    }

    /// Remove a participant whose network registrations have been cleaned up
    pub async fn delete(&self, participant: &Participant) -> Result<()> {
        if participant.published_in_directory {
            return Err(SmpError::Conflict(format!(
                "Participant {} is still published in the directory",
                participant.id
            )));
        }
        if participant.registered_in_sml && !participant.is_pending_migration() {
            return Err(SmpError::Conflict(format!(
                "Participant {} is still registered in SML",
                participant.id
            )));
        }
        if !self.store.delete_participant(participant.oid).await? {
            return Err(SmpError::NotFound(format!("Participant {}", participant.id)));
        }
        info!(participant = %participant.id, oid = %participant.oid, "Deleted participant");
        Ok(())
    }

    /// Load a participant by storage key
    pub async fn get(&self, oid: Uuid) -> Result<Participant> {
        self.store
            .get_participant(oid)
            .await?
            .ok_or_else(|| SmpError::NotFound(format!("Participant {}", oid)))
    }

    pub async fn find_by_id(&self, id: &Identifier) -> Result<Option<Participant>> {
        Ok(self.store.find_participant_by_id(id).await?)
    }

    pub async fn find_by_additional_id(&self, id: &Identifier) -> Result<Vec<Participant>> {
        Ok(self.store.find_participants_by_additional_id(id).await?)
    }

    pub async fn find_by_registration_state(
        &self,
        registered: Option<bool>,
        published: Option<bool>,
    ) -> Result<Vec<Participant>> {
        Ok(self
            .store
            .find_participants_by_registration_state(registered, published)
            .await?)
    }

    pub async fn find_by_name(&self, prefix: &str) -> Result<Vec<Participant>> {
        Ok(self.store.find_participants_by_name_prefix(prefix).await?)
    }
}
