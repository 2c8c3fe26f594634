//! Audit records of completed administrative actions

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SmpError};

/// Subject used for actions on the server itself
pub const SERVER_SUBJECT: &str = "Server";

/// The user on whose behalf an action is performed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Actor(String);

impl Actor {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(SmpError::Validation("Acting user must not be empty".into()));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Action names recorded in the audit log
pub mod actions {
    pub const ADD_PARTICIPANT: &str = "Add Participant";
    pub const UPDATE_PARTICIPANT: &str = "Update Participant";
    pub const DELETE_PARTICIPANT: &str = "Delete Participant";
    pub const ADD_SERVICE: &str = "Add Service to Participant";
    pub const REMOVE_SERVICE: &str = "Remove Service from Participant";
    pub const REGISTER_IN_SML: &str = "Register in SML";
    pub const REMOVE_FROM_SML: &str = "Remove from SML";
    pub const PREPARE_MIGRATION: &str = "Prepare SML migration";
    pub const CANCEL_MIGRATION: &str = "Cancel SML migration";
    pub const MIGRATE_IN_SML: &str = "Migrate in SML";
    pub const PUBLISH_IN_DIRECTORY: &str = "Publish in directory";
    pub const REMOVE_FROM_DIRECTORY: &str = "Remove from directory";
    pub const UPDATE_METADATA: &str = "Update metadata";
    pub const UPDATE_CERTIFICATE: &str = "Update certificate";
    pub const REMOVE_CERTIFICATE: &str = "Remove certificate";
    pub const ADD_SCHEME: &str = "Add identifier scheme";
}

/// One audit log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub subject: Option<String>,
    pub details: Option<String>,
}

impl AuditRecord {
    /// Record stamped with the current time
    pub fn new(actor: &Actor, action: &str, subject: impl Into<String>) -> Self {
        Self::at(Utc::now(), actor, action, subject)
    }

    pub fn at(timestamp: DateTime<Utc>, actor: &Actor, action: &str, subject: impl Into<String>) -> Self {
        Self {
            timestamp,
            actor: actor.as_str().to_string(),
            action: action.trim().to_string(),
            subject: non_blank(subject.into()),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = non_blank(details.into());
        self
    }
}

fn non_blank(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
