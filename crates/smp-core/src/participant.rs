//! Participant model and its local invariants

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SmpError};
use crate::identifier::Identifier;

/// Reference to a service metadata template bound to a participant
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateRef(pub String);

impl TemplateRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Contact published in the directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub telephone: Option<String>,
}

/// A network participant served by this registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Storage key, assigned on creation
    pub oid: Uuid,
    /// Network identifier
    pub id: Identifier,
    /// Business name
    #[serde(default)]
    pub name: Option<String>,
    /// ISO 3166 alpha-2 country code
    #[serde(default)]
    pub registration_country: Option<String>,
    #[serde(default)]
    pub first_registration_date: Option<NaiveDate>,
    /// Free text location (address, region)
    #[serde(default)]
    pub location_info: Option<String>,
    #[serde(default)]
    pub websites: Vec<String>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    /// Other identifiers the participant is known by
    #[serde(default)]
    pub additional_ids: Vec<Identifier>,
    /// Service metadata templates bound to this participant
    #[serde(default)]
    pub bound_templates: BTreeSet<TemplateRef>,
    /// Whether the locator service points at this server for the participant
    #[serde(default)]
    pub registered_in_sml: bool,
    /// Pending migration code, only while registered
    #[serde(default)]
    pub sml_migration_code: Option<String>,
    /// Whether the business data is published in the directory
    #[serde(default)]
    pub published_in_directory: bool,
}

impl Participant {
    /// New unregistered, unpublished participant with a fresh storage key
    pub fn new(id: Identifier) -> Self {
        Self {
            oid: Uuid::new_v4(),
            id,
            name: None,
            registration_country: None,
            first_registration_date: None,
            location_info: None,
            websites: Vec::new(),
            contacts: Vec::new(),
            additional_ids: Vec::new(),
            bound_templates: BTreeSet::new(),
            registered_in_sml: false,
            sml_migration_code: None,
            published_in_directory: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.registration_country = Some(country.into());
        self
    }

    /// Whether an outbound migration is in progress
    pub fn is_pending_migration(&self) -> bool {
        self.sml_migration_code.is_some()
    }

    /// Check the flag invariants of a row before it is written
    pub fn check_invariants(&self) -> Result<()> {
        if self.sml_migration_code.is_some() && !self.registered_in_sml {
            return Err(SmpError::Conflict(format!(
                "Participant {} has a migration code but is not registered in SML",
                self.id
            )));
        }
        Ok(())
    }

    /// Validate the business data published to the directory.
    ///
    /// `today` is the reference date for the first registration date check.
    pub fn validate_registration_data(&self, today: NaiveDate) -> Result<()> {
        if let Some(country) = &self.registration_country {
            if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(SmpError::Validation(format!(
                    "Registration country '{}' is not a two letter country code",
                    country
                )));
            }
        }
        if let Some(date) = self.first_registration_date {
            if date > today {
                return Err(SmpError::Validation(format!(
                    "First registration date {} lies in the future",
                    date
                )));
            }
        }
        for site in &self.websites {
            if !(site.starts_with("http://") || site.starts_with("https://")) {
                return Err(SmpError::Validation(format!(
                    "Website '{}' is not an http(s) URL",
                    site
                )));
            }
        }
        Ok(())
    }

    /// Normalise user entered data (upper-case country, trimmed strings)
    pub fn normalise(&mut self) {
        self.registration_country = self
            .registration_country
            .take()
            .map(|c| c.trim().to_ascii_uppercase())
            .filter(|c| !c.is_empty());
        self.name = self.name.take().map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        self.location_info = self
            .location_info
            .take()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        self.websites.retain(|w| !w.trim().is_empty());
    }

    /// Summary used as audit details
    pub fn audit_details(&self) -> String {
        let mut details = format!("Name : {}", self.name.as_deref().unwrap_or("-"));
        if let Some(country) = &self.registration_country {
            details.push_str(&format!("\nCountry : {}", country));
        }
        if !self.additional_ids.is_empty() {
            let ids: Vec<String> = self.additional_ids.iter().map(|i| i.to_string()).collect();
            details.push_str(&format!("\nAdditional ids : {}", ids.join(", ")));
        }
        details
    }
}
