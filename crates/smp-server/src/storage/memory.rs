//! In-memory storage backend
//!
//! Default storage implementation using in-memory maps.
//! Suitable for development and tests. Data is lost on restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use smp_core::{AuditRecord, IdScheme, Identifier, Participant};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use super::{matches_state, RegistryStore, ServerConfigRecord, StorageError};

/// In-memory registry store
#[derive(Debug, Default)]
pub struct MemoryStore {
    schemes: RwLock<HashMap<String, IdScheme>>,
    participants: RwLock<HashMap<Uuid, Participant>>,
    server_config: RwLock<Option<ServerConfigRecord>>,
    audit: RwLock<Vec<AuditRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted(mut participants: Vec<Participant>) -> Vec<Participant> {
    participants.sort_by_key(|p| p.id.canonical_string());
    participants
}

#[async_trait]
impl RegistryStore for MemoryStore {
    // =========================================================================
    // Identifier Schemes
    // =========================================================================

    async fn add_scheme(&self, scheme: IdScheme) -> Result<(), StorageError> {
        let mut schemes = self.schemes.write();
        if schemes.contains_key(&scheme.scheme_id) {
            return Err(StorageError::AlreadyExists(format!("Scheme {}", scheme.scheme_id)));
        }
        info!(scheme = %scheme.scheme_id, case_sensitive = scheme.case_sensitive, "Added identifier scheme");
        schemes.insert(scheme.scheme_id.clone(), scheme);
        Ok(())
    }

    async fn get_scheme(&self, scheme_id: &str) -> Result<Option<IdScheme>, StorageError> {
        Ok(self.schemes.read().get(scheme_id).cloned())
    }

    async fn list_schemes(&self) -> Result<Vec<IdScheme>, StorageError> {
        let mut schemes: Vec<IdScheme> = self.schemes.read().values().cloned().collect();
        schemes.sort_by(|a, b| a.scheme_id.cmp(&b.scheme_id));
        Ok(schemes)
    }

    // =========================================================================
    // Participants
    // =========================================================================

    async fn insert_participant(&self, participant: Participant) -> Result<(), StorageError> {
        let mut participants = self.participants.write();
        if participants.contains_key(&participant.oid)
            || participants.values().any(|p| p.id == participant.id)
        {
            return Err(StorageError::AlreadyExists(format!("Participant {}", participant.id)));
        }
        participants.insert(participant.oid, participant);
        Ok(())
    }

    async fn update_participant(&self, participant: Participant) -> Result<(), StorageError> {
        let mut participants = self.participants.write();
        if !participants.contains_key(&participant.oid) {
            return Err(StorageError::NotFound(format!("Participant {}", participant.id)));
        }
        if participants
            .values()
            .any(|p| p.oid != participant.oid && p.id == participant.id)
        {
            return Err(StorageError::AlreadyExists(format!("Participant {}", participant.id)));
        }
        participants.insert(participant.oid, participant);
        Ok(())
    }

    async fn delete_participant(&self, oid: Uuid) -> Result<bool, StorageError> {
        Ok(self.participants.write().remove(&oid).is_some())
    }

    async fn get_participant(&self, oid: Uuid) -> Result<Option<Participant>, StorageError> {
        Ok(self.participants.read().get(&oid).cloned())
    }

    async fn find_participant_by_id(&self, id: &Identifier) -> Result<Option<Participant>, StorageError> {
        Ok(self.participants.read().values().find(|p| &p.id == id).cloned())
    }

    async fn find_participants_by_additional_id(
        &self,
        id: &Identifier,
    ) -> Result<Vec<Participant>, StorageError> {
        let found = self
            .participants
            .read()
            .values()
            .filter(|p| p.additional_ids.contains(id))
            .cloned()
            .collect();
        Ok(sorted(found))
    }

    async fn find_participants_by_registration_state(
        &self,
        registered: Option<bool>,
        published: Option<bool>,
    ) -> Result<Vec<Participant>, StorageError> {
        let found = self
            .participants
            .read()
            .values()
            .filter(|p| matches_state(p, registered, published))
            .cloned()
            .collect();
        Ok(sorted(found))
    }

    async fn find_participants_by_name_prefix(&self, prefix: &str) -> Result<Vec<Participant>, StorageError> {
        let prefix = prefix.to_lowercase();
        let found = self
            .participants
            .read()
            .values()
            .filter(|p| {
                p.name
                    .as_deref()
                    .map_or(false, |n| n.to_lowercase().starts_with(&prefix))
            })
            .cloned()
            .collect();
        Ok(sorted(found))
    }

    async fn any_published_in_directory(&self) -> Result<bool, StorageError> {
        Ok(self.participants.read().values().any(|p| p.published_in_directory))
    }

    async fn unregister_all_from_sml(&self) -> Result<u64, StorageError> {
        let mut participants = self.participants.write();
        let mut count = 0;
        for p in participants.values_mut().filter(|p| p.registered_in_sml) {
            p.registered_in_sml = false;
            p.sml_migration_code = None;
            count += 1;
        }
        Ok(count)
    }

    // =========================================================================
    // Server Configuration
    // =========================================================================

    async fn load_server_config(&self) -> Result<ServerConfigRecord, StorageError> {
        Ok(self.server_config.read().clone().unwrap_or_default())
    }

    async fn save_server_config(&self, config: ServerConfigRecord) -> Result<(), StorageError> {
        *self.server_config.write() = Some(config);
        Ok(())
    }

    async fn promote_pending_credential(
        &self,
        expected_activation: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut guard = self.server_config.write();
        let Some(config) = guard.as_mut() else {
            return Ok(false);
        };
        if config.activation_date != Some(expected_activation) || config.next_key_pair.is_none() {
            return Ok(false);
        }
        config.current_key_pair = config.next_key_pair.take();
        config.activation_date = None;
        Ok(true)
    }

    // =========================================================================
    // Audit Log
    // =========================================================================

    async fn append_audit(&self, record: AuditRecord) -> Result<(), StorageError> {
        self.audit.write().push(record);
        Ok(())
    }

    async fn list_audit(&self, limit: usize) -> Result<Vec<AuditRecord>, StorageError> {
        let audit = self.audit.read();
        let mut records: Vec<AuditRecord> = audit.iter().cloned().collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(limit);
        Ok(records)
    }

    async fn purge_audit_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut audit = self.audit.write();
        let before = audit.len();
        audit.retain(|r| r.timestamp >= cutoff);
        Ok((before - audit.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use smp_core::Actor;

    fn scheme() -> IdScheme {
        IdScheme::new("iso6523-actorid-upis", false).unwrap()
    }

    fn participant(value: &str) -> Participant {
        Participant::new(Identifier::with_scheme(scheme(), value).unwrap())
    }

    #[tokio::test]
    async fn test_duplicate_identifier_rejected() {
        let store = MemoryStore::new();
        store.insert_participant(participant("9999:test1")).await.unwrap();

        let result = store.insert_participant(participant("9999:TEST1")).await;
        assert!(matches!(result, Err(StorageError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_find_by_state_and_name() {
        let store = MemoryStore::new();
        let mut a = participant("9999:a").with_name("Acme Corp");
        a.registered_in_sml = true;
        let b = participant("9999:b").with_name("Beta");
        store.insert_participant(a.clone()).await.unwrap();
        store.insert_participant(b).await.unwrap();

        let registered = store
            .find_participants_by_registration_state(Some(true), None)
            .await
            .unwrap();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].oid, a.oid);

        let named = store.find_participants_by_name_prefix("acm").await.unwrap();
        assert_eq!(named.len(), 1);
        assert_eq!(
            store.find_participants_by_registration_state(None, None).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_unregister_all() {
        let store = MemoryStore::new();
        let mut p = participant("9999:a");
        p.registered_in_sml = true;
        p.sml_migration_code = Some("code".into());
        store.insert_participant(p.clone()).await.unwrap();

        assert_eq!(store.unregister_all_from_sml().await.unwrap(), 1);
        let stored = store.get_participant(p.oid).await.unwrap().unwrap();
        assert!(!stored.registered_in_sml);
        assert!(stored.sml_migration_code.is_none());
    }

    #[tokio::test]
    async fn test_promotion_is_compare_and_set() {
        let store = MemoryStore::new();
        let at = Utc::now();
        store
            .save_server_config(ServerConfigRecord {
                current_key_pair: Some(vec![1]),
                next_key_pair: Some(vec![2]),
                activation_date: Some(at),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(!store.promote_pending_credential(at + Duration::seconds(1)).await.unwrap());
        assert!(store.promote_pending_credential(at).await.unwrap());
        assert!(!store.promote_pending_credential(at).await.unwrap());

        let config = store.load_server_config().await.unwrap();
        assert_eq!(config.current_key_pair, Some(vec![2]));
        assert!(config.next_key_pair.is_none());
        assert!(config.activation_date.is_none());
    }

    #[tokio::test]
    async fn test_audit_purge() {
        let store = MemoryStore::new();
        let actor = Actor::new("admin").unwrap();
        let now = Utc::now();
        store
            .append_audit(AuditRecord::at(now - Duration::days(40), &actor, "Old", "x"))
            .await
            .unwrap();
        store
            .append_audit(AuditRecord::at(now, &actor, "New", "x"))
            .await
            .unwrap();

        assert_eq!(store.purge_audit_before(now - Duration::days(30)).await.unwrap(), 1);
        let left = store.list_audit(10).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].action, "New");
    }
}
