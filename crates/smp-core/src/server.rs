//! Server identity and network service value types

use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credential::ServerCertificate;
use crate::error::{Result, SmpError};

/// Identity of this server as announced to the locator service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerIdentity {
    /// Id under which the server is known in the locator service
    pub smp_id: String,
    /// Public base URL of the query interface
    pub base_url: String,
    #[serde(default)]
    pub ipv4_address: Option<String>,
    #[serde(default)]
    pub ipv6_address: Option<String>,
}

impl ServerIdentity {
    pub fn new(smp_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            smp_id: smp_id.into(),
            base_url: base_url.into(),
            ipv4_address: None,
            ipv6_address: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.smp_id.trim().is_empty() {
            return Err(SmpError::Validation("SMP id must not be empty".into()));
        }
        let rest = self
            .base_url
            .strip_prefix("https://")
            .or_else(|| self.base_url.strip_prefix("http://"))
            .ok_or_else(|| {
                SmpError::Validation(format!(
                    "Base URL '{}' must be an absolute http(s) URL",
                    self.base_url
                ))
            })?;
        if rest.split('/').next().map_or(true, str::is_empty) {
            return Err(SmpError::Validation(format!(
                "Base URL '{}' has no host",
                self.base_url
            )));
        }
        if let Some(ip) = &self.ipv4_address {
            ip.parse::<Ipv4Addr>()
                .map_err(|_| SmpError::Validation(format!("Invalid IPv4 address '{}'", ip)))?;
        }
        if let Some(ip) = &self.ipv6_address {
            ip.parse::<Ipv6Addr>()
                .map_err(|_| SmpError::Validation(format!("Invalid IPv6 address '{}'", ip)))?;
        }
        Ok(())
    }

    /// Audit details for a metadata update
    pub fn audit_details(&self) -> String {
        format!(
            "SMP id : {}\nBase URL : {}\nIPv4 : {}\nIPv6 : {}",
            self.smp_id,
            self.base_url,
            self.ipv4_address.as_deref().unwrap_or("-"),
            self.ipv6_address.as_deref().unwrap_or("-")
        )
    }
}

/// Certificate announced ahead of its activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateUpdate {
    pub certificate: ServerCertificate,
    /// Instant the certificate becomes active, `None` for immediately
    pub activation: Option<DateTime<Utc>>,
}

/// Server metadata as shown to administrators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMetadata {
    #[serde(flatten)]
    pub identity: ServerIdentity,
    pub registered_in_sml: bool,
    /// Currently active certificate
    pub certificate: Option<ServerCertificate>,
    /// Scheduled certificate change
    pub pending_update: Option<CertificateUpdate>,
}

/// Availability and policies of the network services
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkServicesInfo {
    pub sml_available: bool,
    pub sml_name: Option<String>,
    pub sml_requires_smp_registration: bool,
    pub sml_requires_certificate_registration: bool,
    pub directory_available: bool,
    pub directory_name: Option<String>,
    pub directory_requires_sml_registration: bool,
}
