//! Integration Tests for the Registration Orchestrator
//!
//! These tests drive the orchestrator against the in-memory store and the
//! in-memory network services:
//! - SML registration, removal and migration of participants
//! - Directory publication and its SML precondition
//! - The deletion saga and its compensation
//! - Audit records of successful operations

use std::sync::Arc;

use chrono::{Duration, Utc};
use smp_core::{
    actions, Actor, IdScheme, Identifier, Participant, SmpError, TemplateRef, MIGRATION_CODE_LENGTH,
};
use smp_network::{DirectoryError, LocatorError, MockDirectory, MockLocator, NetworkServices};
use smp_server::{MemoryAuditSink, MemoryStore, RegistrationOrchestrator, RegistryStore};

// =============================================================================
// Test Helpers
// =============================================================================

struct Harness {
    orchestrator: RegistrationOrchestrator,
    locator: Arc<MockLocator>,
    directory: Arc<MockDirectory>,
    audit: Arc<MemoryAuditSink>,
    scheme: IdScheme,
    actor: Actor,
}

impl Harness {
    async fn new() -> Self {
        Self::with_services(MockLocator::new(), MockDirectory::new()).await
    }

    async fn with_services(locator: MockLocator, directory: MockDirectory) -> Self {
        let store: Arc<dyn RegistryStore> = Arc::new(MemoryStore::new());
        let scheme = IdScheme::new("iso6523-actorid-upis", false).unwrap();
        store.add_scheme(scheme.clone()).await.unwrap();

        let locator = Arc::new(locator);
        let directory = Arc::new(directory);
        let audit = Arc::new(MemoryAuditSink::new());
        let network = NetworkServices::none()
            .with_locator(locator.clone())
            .with_directory(directory.clone());

        Self {
            orchestrator: RegistrationOrchestrator::new(store, network, audit.clone()),
            locator,
            directory,
            audit,
            scheme,
            actor: Actor::new("admin").unwrap(),
        }
    }

    fn id(&self, value: &str) -> Identifier {
        Identifier::with_scheme(self.scheme.clone(), value).unwrap()
    }

    async fn add(&self, value: &str) -> Participant {
        let participant = Participant::new(self.id(value)).with_name("ACME Corp").with_country("nl");
        self.orchestrator
            .add_participant(&self.actor, participant)
            .await
            .expect("Failed to add participant")
    }

    /// Participant registered in the SML and published in the directory
    async fn add_published(&self, value: &str) -> Participant {
        let p = self.add(value).await;
        self.orchestrator.register_in_sml(&self.actor, p.oid).await.unwrap();
        self.orchestrator.publish_in_directory(&self.actor, p.oid).await.unwrap()
    }

    async fn stored(&self, p: &Participant) -> Participant {
        self.orchestrator.get_participant(p.oid).await.unwrap()
    }
}

// =============================================================================
// Participant Management
// =============================================================================

#[tokio::test]
async fn test_add_normalises_and_resets_flags() {
    let h = Harness::new().await;
    let mut participant = Participant::new(h.id("9999:test1")).with_country("nl");
    participant.registered_in_sml = true;
    participant.published_in_directory = true;

    let added = h.orchestrator.add_participant(&h.actor, participant).await.unwrap();

    assert_eq!(added.registration_country.as_deref(), Some("NL"));
    assert!(!added.registered_in_sml);
    assert!(!added.published_in_directory);
    assert_eq!(h.audit.actions(), vec![actions::ADD_PARTICIPANT]);
}

#[tokio::test]
async fn test_add_rejects_invalid_registration_data() {
    let h = Harness::new().await;

    let bad_country = Participant::new(h.id("9999:test1")).with_country("NLD");
    assert!(matches!(
        h.orchestrator.add_participant(&h.actor, bad_country).await,
        Err(SmpError::Validation(_))
    ));

    let mut future = Participant::new(h.id("9999:test1"));
    future.first_registration_date = Some((Utc::now() + Duration::days(2)).date_naive());
    assert!(matches!(
        h.orchestrator.add_participant(&h.actor, future).await,
        Err(SmpError::Validation(_))
    ));

    assert!(h.audit.records().is_empty());
}

#[tokio::test]
async fn test_duplicate_identifier_ignores_case() {
    let h = Harness::new().await;
    h.add("9999:test1").await;

    let duplicate = Participant::new(h.id("9999:TEST1"));
    assert!(matches!(
        h.orchestrator.add_participant(&h.actor, duplicate).await,
        Err(SmpError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_update_refreshes_directory() {
    let h = Harness::new().await;
    let p = h.add_published("9999:test1").await;

    let mut changed = p.clone();
    changed.name = Some("ACME Holding".into());
    h.orchestrator.update_participant(&h.actor, changed).await.unwrap();

    let published = h.directory.published_info(&p.id).unwrap();
    assert_eq!(published.name.as_deref(), Some("ACME Holding"));
}

#[tokio::test]
async fn test_failed_directory_refresh_keeps_local_update() {
    let h = Harness::new().await;
    let p = h.add_published("9999:test1").await;
    h.directory
        .reject_next_with(DirectoryError::Unavailable("down".into()));

    let mut changed = p.clone();
    changed.name = Some("ACME Holding".into());
    let result = h.orchestrator.update_participant(&h.actor, changed).await;

    assert!(matches!(result, Err(SmpError::Directory(_))));
    assert_eq!(h.stored(&p).await.name.as_deref(), Some("ACME Holding"));
    assert_eq!(
        h.directory.published_info(&p.id).unwrap().name.as_deref(),
        Some("ACME Corp")
    );
}

#[tokio::test]
async fn test_update_cannot_set_registration_flags() {
    let h = Harness::new().await;
    let p = h.add("9999:test1").await;

    let mut changed = p.clone();
    changed.registered_in_sml = true;
    let updated = h.orchestrator.update_participant(&h.actor, changed).await.unwrap();

    assert!(!updated.registered_in_sml);
    assert!(!h.stored(&p).await.registered_in_sml);
}

#[tokio::test]
async fn test_update_keeps_bound_templates() {
    let h = Harness::new().await;
    let p = h.add("9999:test1").await;
    h.orchestrator
        .bind_template(&h.actor, p.oid, TemplateRef::new("invoice"))
        .await
        .unwrap();

    let mut changed = Participant::new(h.id("9999:test1")).with_name("ACME Holding");
    changed.oid = p.oid;
    let updated = h.orchestrator.update_participant(&h.actor, changed).await.unwrap();

    assert!(updated.bound_templates.contains(&TemplateRef::new("invoice")));
    let stored = h.stored(&p).await;
    assert_eq!(stored.name.as_deref(), Some("ACME Holding"));
    assert!(stored.bound_templates.contains(&TemplateRef::new("invoice")));
}

#[tokio::test]
async fn test_update_of_registered_participant_ignores_templates() {
    let h = Harness::new().await;
    let p = h.add("9999:test1").await;
    h.orchestrator
        .bind_template(&h.actor, p.oid, TemplateRef::new("invoice"))
        .await
        .unwrap();
    h.orchestrator.register_in_sml(&h.actor, p.oid).await.unwrap();

    let mut changed = h.stored(&p).await;
    changed.name = Some("ACME Holding".into());
    changed.bound_templates.clear();
    changed.bound_templates.insert(TemplateRef::new("order"));
    let updated = h.orchestrator.update_participant(&h.actor, changed).await.unwrap();

    assert_eq!(updated.bound_templates.len(), 1);
    assert!(updated.bound_templates.contains(&TemplateRef::new("invoice")));
    assert_eq!(h.stored(&p).await.name.as_deref(), Some("ACME Holding"));
}

#[tokio::test]
async fn test_templates_frozen_while_registered() {
    let h = Harness::new().await;
    let p = h.add("9999:test1").await;

    let bound = h
        .orchestrator
        .bind_template(&h.actor, p.oid, TemplateRef::new("invoice"))
        .await
        .unwrap();
    assert!(bound.bound_templates.contains(&TemplateRef::new("invoice")));
    assert_eq!(h.audit.actions().last().map(String::as_str), Some(actions::ADD_SERVICE));

    h.orchestrator.register_in_sml(&h.actor, p.oid).await.unwrap();
    assert!(matches!(
        h.orchestrator.bind_template(&h.actor, p.oid, TemplateRef::new("order")).await,
        Err(SmpError::Conflict(_))
    ));
    assert!(matches!(
        h.orchestrator.unbind_template(&h.actor, p.oid, &TemplateRef::new("invoice")).await,
        Err(SmpError::Conflict(_))
    ));
}

// =============================================================================
// SML Registration
// =============================================================================

#[tokio::test]
async fn test_register_and_remove_in_sml() {
    let h = Harness::new().await;
    let p = h.add("9999:test1").await;

    let registered = h.orchestrator.register_in_sml(&h.actor, p.oid).await.unwrap();
    assert!(registered.registered_in_sml);
    assert!(h.stored(&p).await.registered_in_sml);
    assert!(h.locator.has_participant(&h.id("9999:TEST1")));

    let removed = h.orchestrator.remove_from_sml(&h.actor, p.oid).await.unwrap();
    assert!(!removed.registered_in_sml);
    assert!(!h.stored(&p).await.registered_in_sml);
    assert!(!h.locator.has_participant(&p.id));

    assert_eq!(
        h.audit.actions(),
        vec![actions::ADD_PARTICIPANT, actions::REGISTER_IN_SML, actions::REMOVE_FROM_SML]
    );
}

#[tokio::test]
async fn test_failed_registration_changes_nothing() {
    let h = Harness::new().await;
    let p = h.add("9999:test1").await;
    h.locator
        .reject_next_with(LocatorError::Unavailable("timeout".into()));

    let result = h.orchestrator.register_in_sml(&h.actor, p.oid).await;

    assert!(matches!(result, Err(SmpError::NetworkRegistration(_))));
    assert!(!h.stored(&p).await.registered_in_sml);
    assert_eq!(h.audit.actions(), vec![actions::ADD_PARTICIPANT]);
}

#[tokio::test]
async fn test_register_twice_is_noop() {
    let h = Harness::new().await;
    let p = h.add("9999:test1").await;
    h.orchestrator.register_in_sml(&h.actor, p.oid).await.unwrap();
    let calls = h.locator.call_count();

    h.orchestrator.register_in_sml(&h.actor, p.oid).await.unwrap();

    assert_eq!(h.locator.call_count(), calls);
    assert_eq!(
        h.audit.actions(),
        vec![actions::ADD_PARTICIPANT, actions::REGISTER_IN_SML]
    );
}

#[tokio::test]
async fn test_sml_requires_registered_server() {
    let h = Harness::with_services(MockLocator::new().requiring_smp_registration(true), MockDirectory::new()).await;
    let p = h.add("9999:test1").await;

    let result = h.orchestrator.register_in_sml(&h.actor, p.oid).await;

    assert!(matches!(result, Err(SmpError::Conflict(_))));
    assert_eq!(h.locator.call_count(), 0);
}

// =============================================================================
// Migration
// =============================================================================

#[tokio::test]
async fn test_prepare_migration_requires_registration() {
    let h = Harness::new().await;
    let p = h.add("9999:test1").await;

    let result = h.orchestrator.prepare_for_sml_migration(&h.actor, p.oid, None).await;

    assert!(matches!(result, Err(SmpError::Conflict(_))));
    assert_eq!(h.stored(&p).await, p);
    assert_eq!(h.locator.call_count(), 0);
    assert_eq!(h.audit.actions(), vec![actions::ADD_PARTICIPANT]);
}

#[tokio::test]
async fn test_prepare_and_cancel_migration() {
    let h = Harness::new().await;
    let p = h.add("9999:test1").await;
    h.orchestrator.register_in_sml(&h.actor, p.oid).await.unwrap();

    let code = h
        .orchestrator
        .prepare_for_sml_migration(&h.actor, p.oid, None)
        .await
        .unwrap();
    assert_eq!(code.chars().count(), MIGRATION_CODE_LENGTH);
    assert_eq!(h.locator.migration_code(&p.id), Some(code.clone()));
    assert_eq!(h.stored(&p).await.sml_migration_code, Some(code.clone()));

    let records = h.audit.records();
    let prepared = records.last().unwrap();
    assert_eq!(prepared.action, actions::PREPARE_MIGRATION);
    assert_eq!(prepared.details, Some(format!("Used migration code : {}", code)));

    let cancelled = h.orchestrator.cancel_sml_migration(&h.actor, p.oid).await.unwrap();
    assert_eq!(cancelled.sml_migration_code, None);
    assert!(cancelled.registered_in_sml);
    assert_eq!(h.locator.migration_code(&p.id), None);
    assert!(h.locator.has_participant(&p.id));
    assert_eq!(h.audit.actions().last().map(String::as_str), Some(actions::CANCEL_MIGRATION));
}

#[tokio::test]
async fn test_prepare_with_supplied_code() {
    let h = Harness::new().await;
    let p = h.add("9999:test1").await;
    h.orchestrator.register_in_sml(&h.actor, p.oid).await.unwrap();

    let blank = h
        .orchestrator
        .prepare_for_sml_migration(&h.actor, p.oid, Some("with space".into()))
        .await;
    assert!(matches!(blank, Err(SmpError::Validation(_))));

    let code = h
        .orchestrator
        .prepare_for_sml_migration(&h.actor, p.oid, Some("Mig#2024-ab".into()))
        .await
        .unwrap();
    assert_eq!(code, "Mig#2024-ab");
}

#[tokio::test]
async fn test_migrate_participant_from_other_server() {
    let h = Harness::new().await;
    let p = h.add("9999:test2").await;
    h.locator.seed_migration(p.id.clone(), "Ab1$Cd2%");

    let wrong = h.orchestrator.migrate_in_sml(&h.actor, p.oid, "Zz9!Zz9!").await;
    assert!(matches!(wrong, Err(SmpError::NetworkRegistration(_))));
    assert!(!h.stored(&p).await.registered_in_sml);

    let migrated = h.orchestrator.migrate_in_sml(&h.actor, p.oid, "Ab1$Cd2%").await.unwrap();
    assert!(migrated.registered_in_sml);
    assert_eq!(migrated.sml_migration_code, None);
    assert!(h.locator.has_participant(&p.id));

    let records = h.audit.records();
    let last = records.last().unwrap();
    assert_eq!(last.action, actions::MIGRATE_IN_SML);
    assert_eq!(last.details.as_deref(), Some("Used migration code : Ab1$Cd2%"));
}

#[tokio::test]
async fn test_migrate_rejects_bad_input() {
    let h = Harness::new().await;
    let p = h.add("9999:test1").await;

    assert!(matches!(
        h.orchestrator.migrate_in_sml(&h.actor, p.oid, "  ").await,
        Err(SmpError::Validation(_))
    ));

    h.orchestrator.register_in_sml(&h.actor, p.oid).await.unwrap();
    assert!(matches!(
        h.orchestrator.migrate_in_sml(&h.actor, p.oid, "Ab1$Cd2%").await,
        Err(SmpError::Conflict(_))
    ));
}

// =============================================================================
// Directory
// =============================================================================

#[tokio::test]
async fn test_directory_requiring_sml_registration() {
    let h = Harness::with_services(MockLocator::new(), MockDirectory::new().requiring_sml_registration(true)).await;
    let p = h.add("9999:test1").await;

    assert!(matches!(
        h.orchestrator.publish_in_directory(&h.actor, p.oid).await,
        Err(SmpError::Conflict(_))
    ));
    assert!(!h.directory.is_published(&p.id));

    h.orchestrator.register_in_sml(&h.actor, p.oid).await.unwrap();
    let published = h.orchestrator.publish_in_directory(&h.actor, p.oid).await.unwrap();
    assert!(published.published_in_directory);
    assert!(h.directory.is_published(&p.id));

    assert!(matches!(
        h.orchestrator.remove_from_sml(&h.actor, p.oid).await,
        Err(SmpError::Conflict(_))
    ));

    h.orchestrator.remove_from_directory(&h.actor, p.oid).await.unwrap();
    h.orchestrator.remove_from_sml(&h.actor, p.oid).await.unwrap();
    assert!(!h.directory.is_published(&p.id));
    assert!(!h.locator.has_participant(&p.id));
}

// =============================================================================
// Deletion Saga
// =============================================================================

#[tokio::test]
async fn test_delete_removes_everywhere() {
    let h = Harness::new().await;
    let p = h.add_published("9999:test1").await;

    h.orchestrator.delete_participant(&h.actor, p.oid).await.unwrap();

    assert!(matches!(
        h.orchestrator.get_participant(p.oid).await,
        Err(SmpError::NotFound(_))
    ));
    assert!(!h.locator.has_participant(&p.id));
    assert!(!h.directory.is_published(&p.id));
    assert_eq!(h.audit.actions().last().map(String::as_str), Some(actions::DELETE_PARTICIPANT));
}

#[tokio::test]
async fn test_delete_fails_when_directory_removal_fails() {
    let h = Harness::new().await;
    let p = h.add_published("9999:test1").await;
    h.directory
        .reject_next_with(DirectoryError::Unavailable("down".into()));

    let result = h.orchestrator.delete_participant(&h.actor, p.oid).await;

    assert!(matches!(result, Err(SmpError::Directory(_))));
    let stored = h.stored(&p).await;
    assert!(stored.registered_in_sml);
    assert!(stored.published_in_directory);
    assert!(h.locator.has_participant(&p.id));
}

#[tokio::test]
async fn test_delete_compensated_by_republish() {
    let h = Harness::new().await;
    let p = h.add_published("9999:test1").await;
    let audited = h.audit.records().len();
    h.locator
        .reject_next_with(LocatorError::Unavailable("timeout".into()));

    let result = h.orchestrator.delete_participant(&h.actor, p.oid).await;

    assert!(matches!(result, Err(SmpError::NetworkRegistration(_))));
    let stored = h.stored(&p).await;
    assert!(stored.registered_in_sml);
    assert!(stored.published_in_directory);
    assert!(h.directory.is_published(&p.id));
    assert_eq!(h.audit.records().len(), audited);
}

#[tokio::test]
async fn test_delete_with_failed_compensation_marks_unpublished() {
    let h = Harness::new().await;
    let p = h.add_published("9999:test1").await;
    let audited = h.audit.records().len();
    h.locator
        .reject_next_with(LocatorError::Unavailable("timeout".into()));
    h.directory
        .reject_calls_after(1, 1, DirectoryError::Unavailable("down".into()));

    let result = h.orchestrator.delete_participant(&h.actor, p.oid).await;

    match result {
        Err(SmpError::Compensation { cause, compensation }) => {
            assert!(matches!(*cause, SmpError::NetworkRegistration(_)));
            assert!(matches!(*compensation, SmpError::Directory(_)));
        }
        other => panic!("Expected combined error, got {:?}", other),
    }
    let stored = h.stored(&p).await;
    assert!(stored.registered_in_sml);
    assert!(!stored.published_in_directory);
    assert!(!h.directory.is_published(&p.id));
    assert_eq!(h.audit.records().len(), audited);
}

#[tokio::test]
async fn test_delete_during_migration_keeps_sml_registration() {
    let h = Harness::new().await;
    let p = h.add("9999:test1").await;
    h.orchestrator.register_in_sml(&h.actor, p.oid).await.unwrap();
    let code = h
        .orchestrator
        .prepare_for_sml_migration(&h.actor, p.oid, None)
        .await
        .unwrap();

    h.orchestrator.delete_participant(&h.actor, p.oid).await.unwrap();

    assert!(h.orchestrator.get_participant(p.oid).await.is_err());
    assert!(h.locator.has_participant(&p.id));
    assert_eq!(h.locator.migration_code(&p.id), Some(code));
}

#[tokio::test]
async fn test_delete_requires_configured_services() {
    let store: Arc<dyn RegistryStore> = Arc::new(MemoryStore::new());
    let scheme = IdScheme::new("iso6523-actorid-upis", false).unwrap();
    store.add_scheme(scheme.clone()).await.unwrap();
    let mut p = Participant::new(Identifier::with_scheme(scheme, "9999:test1").unwrap());
    p.registered_in_sml = true;
    store.insert_participant(p.clone()).await.unwrap();

    let audit = Arc::new(MemoryAuditSink::new());
    let orchestrator = RegistrationOrchestrator::new(store, NetworkServices::none(), audit);
    let actor = Actor::new("admin").unwrap();

    assert!(matches!(
        orchestrator.delete_participant(&actor, p.oid).await,
        Err(SmpError::Conflict(_))
    ));
    assert!(orchestrator.get_participant(p.oid).await.is_ok());
}
