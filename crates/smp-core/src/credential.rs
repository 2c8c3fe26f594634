//! Server credential used to authenticate to the network.
//!
//! A `ServerKeyPair` is an Ed25519 signing key plus the certificate
//! describing it. Only the validity window of the certificate matters to the
//! rotation logic; the other fields are carried for display and auditing.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::{Result, SmpError};

/// Certificate for a server key pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCertificate {
    /// Subject distinguished name
    pub subject: String,
    /// Issuer distinguished name
    pub issuer: String,
    /// Serial number as issued
    pub serial_number: String,
    /// Base64-encoded Ed25519 public key
    pub public_key: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl ServerCertificate {
    /// Whether `instant` lies within `[not_before, not_after]`
    pub fn is_valid_at(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.not_before && instant <= self.not_after
    }

    /// Decode the certified public key
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        let bytes = STANDARD
            .decode(&self.public_key)
            .map_err(|e| SmpError::Validation(format!("Invalid certificate public key: {}", e)))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SmpError::Validation("Invalid certificate public key length".into()))?;
        VerifyingKey::from_bytes(&bytes)
            .map_err(|e| SmpError::Validation(format!("Invalid certificate public key: {}", e)))
    }

    /// Audit details in the format used for certificate updates
    pub fn audit_details(&self) -> String {
        format!(
            "Subject : {}\nIssuer : {}\nSerialNo : {}\nNotBefore : {}\nNotAfter : {}",
            self.subject,
            self.issuer,
            self.serial_number,
            self.not_before.to_rfc3339(),
            self.not_after.to_rfc3339()
        )
    }
}

/// Ed25519 key pair plus its certificate
#[derive(Clone)]
pub struct ServerKeyPair {
    signing_key: SigningKey,
    certificate: ServerCertificate,
}

impl std::fmt::Debug for ServerKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerKeyPair")
            .field("subject", &self.certificate.subject)
            .field("serial_number", &self.certificate.serial_number)
            .field("signing_key", &"[redacted]")
            .finish()
    }
}

/// Serialized form, only ever stored encrypted
#[derive(Serialize, Deserialize)]
struct StoredKeyPair {
    secret_key: String,
    certificate: ServerCertificate,
}

impl ServerKeyPair {
    /// Combine a signing key with its certificate.
    ///
    /// Fails if the certificate does not certify the key or its window is inverted.
    pub fn new(signing_key: SigningKey, certificate: ServerCertificate) -> Result<Self> {
        if certificate.not_after < certificate.not_before {
            return Err(SmpError::Validation(format!(
                "Certificate {} expires before it becomes valid",
                certificate.serial_number
            )));
        }
        if certificate.verifying_key()? != signing_key.verifying_key() {
            return Err(SmpError::Validation(format!(
                "Certificate {} does not match the signing key",
                certificate.serial_number
            )));
        }
        Ok(Self {
            signing_key,
            certificate,
        })
    }

    /// Generate a fresh key pair with a self-describing certificate
    pub fn generate(
        subject: impl Into<String>,
        issuer: impl Into<String>,
        serial_number: impl Into<String>,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
    ) -> Result<Self> {
        let signing_key = SigningKey::generate(&mut OsRng);
        let certificate = ServerCertificate {
            subject: subject.into(),
            issuer: issuer.into(),
            serial_number: serial_number.into(),
            public_key: STANDARD.encode(signing_key.verifying_key().to_bytes()),
            not_before,
            not_after,
        };
        Self::new(signing_key, certificate)
    }

    pub fn certificate(&self) -> &ServerCertificate {
        &self.certificate
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Sign data with the server key
    pub fn sign(&self, data: &[u8]) -> Signature {
        self.signing_key.sign(data)
    }

    /// Verify a signature made with this key pair
    pub fn verify(&self, data: &[u8], signature: &Signature) -> bool {
        self.verifying_key().verify(data, signature).is_ok()
    }

    /// Serialize for encryption. The result holds secret material.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut secret = self.signing_key.to_bytes();
        let stored = StoredKeyPair {
            secret_key: STANDARD.encode(secret),
            certificate: self.certificate.clone(),
        };
        secret.zeroize();
        serde_json::to_vec(&stored)
            .map_err(|e| SmpError::Security(format!("Failed to encode key pair: {}", e)))
    }

    /// Decode a previously serialized key pair
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let stored: StoredKeyPair = serde_json::from_slice(bytes)
            .map_err(|e| SmpError::Security(format!("Failed to decode key pair: {}", e)))?;
        let mut secret = STANDARD
            .decode(&stored.secret_key)
            .map_err(|e| SmpError::Security(format!("Failed to decode signing key: {}", e)))?;
        let key_bytes: [u8; 32] = secret
            .as_slice()
            .try_into()
            .map_err(|_| SmpError::Security("Invalid signing key length".into()))?;
        secret.zeroize();
        let signing_key = SigningKey::from_bytes(&key_bytes);
        Self::new(signing_key, stored.certificate)
            .map_err(|e| SmpError::Security(format!("Stored key pair is inconsistent: {}", e)))
    }
}
