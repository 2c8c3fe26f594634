//! Typed identifiers for participants, documents and processes.
//!
//! An identifier is a value optionally qualified by a scheme. Schemes decide
//! whether the value is compared case-sensitively. Equality and hashing both
//! go through the canonical string form so they always agree.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SmpError};

/// Canonical value of the "no process" identifier
pub const NO_PROCESS: &str = "hb2b:no-process";

/// Separator between scheme id and value in the canonical form
pub const SCHEME_SEPARATOR: &str = "::";

/// An identifier scheme
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdScheme {
    /// Scheme id, e.g. `iso6523-actorid-upis`
    pub scheme_id: String,
    /// Whether values in this scheme are compared case-sensitively
    pub case_sensitive: bool,
    /// Optional agency name, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency: Option<String>,
}

impl IdScheme {
    /// Create a scheme, rejecting blank scheme ids
    pub fn new(scheme_id: impl Into<String>, case_sensitive: bool) -> Result<Self> {
        let scheme_id = scheme_id.into().trim().to_string();
        if scheme_id.is_empty() {
            return Err(SmpError::Validation("Scheme id must not be empty".into()));
        }
        if scheme_id.contains(SCHEME_SEPARATOR) {
            return Err(SmpError::Validation(format!(
                "Scheme id '{}' must not contain '{}'",
                scheme_id, SCHEME_SEPARATOR
            )));
        }
        Ok(Self {
            scheme_id,
            case_sensitive,
            agency: None,
        })
    }

    pub fn with_agency(mut self, agency: impl Into<String>) -> Self {
        self.agency = Some(agency.into());
        self
    }
}

/// A (possibly scheme-less) identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<IdScheme>,
    pub value: String,
}

impl Identifier {
    /// Create an identifier, rejecting blank values
    pub fn new(scheme: Option<IdScheme>, value: impl Into<String>) -> Result<Self> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            return Err(SmpError::Validation("Identifier value must not be empty".into()));
        }
        Ok(Self { scheme, value })
    }

    /// Identifier in the given scheme
    pub fn with_scheme(scheme: IdScheme, value: impl Into<String>) -> Result<Self> {
        Self::new(Some(scheme), value)
    }

    /// Identifier without scheme
    pub fn unscoped(value: impl Into<String>) -> Result<Self> {
        Self::new(None, value)
    }

    /// The "no process" identifier
    pub fn no_process() -> Self {
        Self {
            scheme: None,
            value: NO_PROCESS.to_string(),
        }
    }

    /// Whether this identifier denotes "no process", whatever its scheme
    pub fn is_no_process(&self) -> bool {
        self.value.eq_ignore_ascii_case(NO_PROCESS)
    }

    pub fn scheme_id(&self) -> Option<&str> {
        self.scheme.as_ref().map(|s| s.scheme_id.as_str())
    }

    /// Canonical string form.
    ///
    /// `value` lowercased when there is no scheme, otherwise
    /// `schemeId::value` with the value lowercased unless the scheme is
    /// case-sensitive. All no-process identifiers share one canonical form.
    pub fn canonical_string(&self) -> String {
        if self.is_no_process() {
            return NO_PROCESS.to_string();
        }
        match &self.scheme {
            None => self.value.to_lowercase(),
            Some(scheme) if scheme.case_sensitive => {
                format!("{}{}{}", scheme.scheme_id, SCHEME_SEPARATOR, self.value)
            }
            Some(scheme) => format!(
                "{}{}{}",
                scheme.scheme_id,
                SCHEME_SEPARATOR,
                self.value.to_lowercase()
            ),
        }
    }
}

/// A scheme-less identifier never equals a scheme-qualified one, even when the
/// values match ignoring case. This keeps equality transitive and in line with `Hash`.
impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        if self.is_no_process() && other.is_no_process() {
            return true;
        }
        match (&self.scheme, &other.scheme) {
            (None, None) => self.value.to_lowercase() == other.value.to_lowercase(),
            (Some(a), Some(b)) => {
                // Schemes are immutable once in use, a differing flag means a different scheme.
                if a.scheme_id != b.scheme_id || a.case_sensitive != b.case_sensitive {
                    return false;
                }
                if a.case_sensitive {
                    self.value == other.value
                } else {
                    self.value.to_lowercase() == other.value.to_lowercase()
                }
            }
            // A scheme-less identifier never equals a scheme-qualified one,
            // their canonical forms differ.
            _ => false,
        }
    }
}

impl Eq for Identifier {}

impl Hash for Identifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_string().hash(state);
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_string())
    }
}

/// Split a `schemeId::value` string into its parts.
///
/// Strings without separator yield no scheme id.
pub fn split_canonical(s: &str) -> (Option<&str>, &str) {
    match s.split_once(SCHEME_SEPARATOR) {
        Some((scheme, value)) if !scheme.is_empty() => (Some(scheme), value),
        _ => (None, s),
    }
}
