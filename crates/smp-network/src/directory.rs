//! Client interface of the participant directory

use async_trait::async_trait;
use smp_core::Participant;

use crate::error::DirectoryResult;

/// Operations of the network directory service
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    fn name(&self) -> &str;

    /// Whether participants must be registered in the SML before publication
    fn is_sml_registration_required(&self) -> bool;

    /// Publish (or refresh) the business data of a participant
    async fn publish_participant_info(&self, participant: &Participant) -> DirectoryResult<()>;

    async fn remove_participant_info(&self, participant: &Participant) -> DirectoryResult<()>;
}
