//! In-memory network services
//!
//! Used by the test suites and by the development network mode of the
//! server. Both services can be told to fail the next call(s).

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use smp_core::{CertificateUpdate, Identifier, Participant, ServerIdentity};
use tracing::debug;

use crate::directory::DirectoryClient;
use crate::error::{DirectoryError, DirectoryResult, LocatorError, LocatorResult};
use crate::locator::LocatorClient;

#[derive(Default)]
struct LocatorState {
    server: Option<ServerIdentity>,
    certificates: Vec<CertificateUpdate>,
    participants: HashSet<Identifier>,
    migrations: HashMap<Identifier, String>,
    rejection: Option<LocatorError>,
    calls: usize,
}

impl LocatorState {
    fn check_rejection(&mut self) -> LocatorResult<()> {
        self.calls += 1;
        match self.rejection.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Locator service kept in memory
pub struct MockLocator {
    name: String,
    requires_smp_registration: bool,
    requires_cert_registration: bool,
    state: Mutex<LocatorState>,
}

impl MockLocator {
    pub fn new() -> Self {
        Self {
            name: "Dev-Test SML".to_string(),
            requires_smp_registration: false,
            requires_cert_registration: false,
            state: Mutex::new(LocatorState::default()),
        }
    }

    pub fn requiring_smp_registration(mut self, required: bool) -> Self {
        self.requires_smp_registration = required;
        self
    }

    pub fn requiring_cert_registration(mut self, required: bool) -> Self {
        self.requires_cert_registration = required;
        self
    }

    /// Fail the next call with `err`. The rejection is used up by that call.
    pub fn reject_next_with(&self, err: LocatorError) {
        self.state.lock().rejection = Some(err);
    }

    /// Pretend another server prepared a migration of `participant` with `code`
    pub fn seed_migration(&self, participant: Identifier, code: impl Into<String>) {
        let mut state = self.state.lock();
        state.participants.insert(participant.clone());
        state.migrations.insert(participant, code.into());
    }

    pub fn has_participant(&self, participant: &Identifier) -> bool {
        self.state.lock().participants.contains(participant)
    }

    pub fn migration_code(&self, participant: &Identifier) -> Option<String> {
        self.state.lock().migrations.get(participant).cloned()
    }

    pub fn registered_server(&self) -> Option<ServerIdentity> {
        self.state.lock().server.clone()
    }

    /// Certificate announcements received, oldest first
    pub fn certificate_updates(&self) -> Vec<CertificateUpdate> {
        self.state.lock().certificates.clone()
    }

    /// Number of calls made, rejected ones included
    pub fn call_count(&self) -> usize {
        self.state.lock().calls
    }
}

impl Default for MockLocator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocatorClient for MockLocator {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires_smp_registration(&self) -> bool {
        self.requires_smp_registration
    }

    fn requires_smp_cert_registration(&self) -> bool {
        self.requires_cert_registration
    }

    async fn register_smp_server(&self, server: &ServerIdentity) -> LocatorResult<()> {
        let mut state = self.state.lock();
        state.check_rejection()?;
        state.server = Some(server.clone());
        Ok(())
    }

    async fn update_smp_server(&self, server: &ServerIdentity) -> LocatorResult<()> {
        let mut state = self.state.lock();
        state.check_rejection()?;
        state.server = Some(server.clone());
        Ok(())
    }

    async fn update_smp_certificate(&self, smp_id: &str, update: &CertificateUpdate) -> LocatorResult<()> {
        let mut state = self.state.lock();
        state.check_rejection()?;
        debug!(smp_id, serial = %update.certificate.serial_number, "Certificate announced");
        state.certificates.push(update.clone());
        Ok(())
    }

    async fn deregister_smp_server(&self, smp_id: &str) -> LocatorResult<()> {
        let mut state = self.state.lock();
        state.check_rejection()?;
        match &state.server {
            Some(server) if server.smp_id == smp_id => {
                state.server = None;
                Ok(())
            }
            _ => Err(LocatorError::NotRegistered(format!("SMP {}", smp_id))),
        }
    }

    async fn register_participant(&self, participant: &Identifier) -> LocatorResult<()> {
        let mut state = self.state.lock();
        state.check_rejection()?;
        if !state.participants.insert(participant.clone()) {
            return Err(LocatorError::AlreadyRegistered(participant.to_string()));
        }
        Ok(())
    }

    async fn deregister_participant(&self, participant: &Identifier) -> LocatorResult<()> {
        let mut state = self.state.lock();
        state.check_rejection()?;
        state.participants.remove(participant);
        state.migrations.remove(participant);
        Ok(())
    }

    async fn is_registered(&self, participant: &Identifier) -> LocatorResult<bool> {
        let mut state = self.state.lock();
        state.check_rejection()?;
        Ok(state.participants.contains(participant))
    }

    async fn register_migration_code(&self, participant: &Identifier, code: &str) -> LocatorResult<()> {
        let mut state = self.state.lock();
        state.check_rejection()?;
        if !state.participants.contains(participant) {
            return Err(LocatorError::NotRegistered(participant.to_string()));
        }
        state.migrations.insert(participant.clone(), code.to_string());
        Ok(())
    }

    async fn migrate_participant(&self, participant: &Identifier, code: &str) -> LocatorResult<()> {
        let mut state = self.state.lock();
        state.check_rejection()?;
        match state.migrations.get(participant) {
            Some(expected) if expected == code => {
                state.migrations.remove(participant);
                state.participants.insert(participant.clone());
                Ok(())
            }
            _ => Err(LocatorError::InvalidMigrationCode(participant.to_string())),
        }
    }
}

#[derive(Default)]
struct DirectoryState {
    published: HashMap<Identifier, Participant>,
    rejection: Option<DirectoryError>,
    reject_remaining: usize,
    pass_remaining: usize,
}

impl DirectoryState {
    fn check_rejection(&mut self) -> DirectoryResult<()> {
        if self.reject_remaining == 0 {
            return Ok(());
        }
        if self.pass_remaining > 0 {
            self.pass_remaining -= 1;
            return Ok(());
        }
        self.reject_remaining -= 1;
        let err = self
            .rejection
            .clone()
            .unwrap_or_else(|| DirectoryError::Rejected("rejected".into()));
        if self.reject_remaining == 0 {
            self.rejection = None;
        }
        Err(err)
    }
}

/// Directory service kept in memory
pub struct MockDirectory {
    name: String,
    requires_sml_registration: bool,
    state: Mutex<DirectoryState>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self {
            name: "Dev-Test Directory".to_string(),
            requires_sml_registration: false,
            state: Mutex::new(DirectoryState::default()),
        }
    }

    pub fn requiring_sml_registration(mut self, required: bool) -> Self {
        self.requires_sml_registration = required;
        self
    }

    /// Fail the next call with `err`
    pub fn reject_next_with(&self, err: DirectoryError) {
        self.reject_next_calls(1, err);
    }

    /// Fail the next `count` calls with `err`
    pub fn reject_next_calls(&self, count: usize, err: DirectoryError) {
        self.reject_calls_after(0, count, err);
    }

    /// Let `passing` calls through, then fail `count` calls with `err`
    pub fn reject_calls_after(&self, passing: usize, count: usize, err: DirectoryError) {
        let mut state = self.state.lock();
        state.rejection = Some(err);
        state.reject_remaining = count;
        state.pass_remaining = passing;
    }

    pub fn is_published(&self, participant: &Identifier) -> bool {
        self.state.lock().published.contains_key(participant)
    }

    /// Last published data of a participant
    pub fn published_info(&self, participant: &Identifier) -> Option<Participant> {
        self.state.lock().published.get(participant).cloned()
    }
}

impl Default for MockDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryClient for MockDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_sml_registration_required(&self) -> bool {
        self.requires_sml_registration
    }

    async fn publish_participant_info(&self, participant: &Participant) -> DirectoryResult<()> {
        let mut state = self.state.lock();
        state.check_rejection()?;
        state.published.insert(participant.id.clone(), participant.clone());
        Ok(())
    }

    async fn remove_participant_info(&self, participant: &Participant) -> DirectoryResult<()> {
        let mut state = self.state.lock();
        state.check_rejection()?;
        state.published.remove(&participant.id);
        Ok(())
    }
}
