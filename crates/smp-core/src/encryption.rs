//! Encryption at rest for stored key pairs.
//!
//! AES-256-GCM with a key derived from the master secret via HKDF-SHA256.
//! Blobs are laid out as `nonce (12 bytes) || ciphertext`.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::credential::ServerKeyPair;
use crate::error::{Result, SmpError};

const NONCE_LEN: usize = 12;
const KDF_SALT: &[u8] = b"smp-registry/v1";
const KDF_INFO: &[u8] = b"server-keypair-encryption";

/// Encrypts and decrypts secret material stored by the server
#[derive(Clone)]
pub struct DataEncryptor {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for DataEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataEncryptor").finish_non_exhaustive()
    }
}

impl DataEncryptor {
    /// Derive the data key from the master secret
    pub fn new(master_secret: &[u8]) -> Result<Self> {
        if master_secret.is_empty() {
            return Err(SmpError::Validation("Master secret must not be empty".into()));
        }
        let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), master_secret);
        let mut okm = [0u8; 32];
        hk.expand(KDF_INFO, &mut okm)
            .map_err(|e| SmpError::Security(format!("Key derivation failed: {}", e)))?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&okm));
        okm.zeroize();
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| SmpError::Security("Encryption failed".into()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypt a blob produced by [`DataEncryptor::encrypt`].
    ///
    /// Any failure means the data is corrupt or the master key changed.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>> {
        if blob.len() <= NONCE_LEN {
            return Err(SmpError::Security("Encrypted data is truncated".into()));
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| {
                SmpError::Security(
                    "Stored data could not be decrypted; data corrupt or master key changed".into(),
                )
            })
    }

    pub fn seal_key_pair(&self, key_pair: &ServerKeyPair) -> Result<Vec<u8>> {
        let mut plain = key_pair.to_bytes()?;
        let sealed = self.encrypt(&plain);
        plain.zeroize();
        sealed
    }

    pub fn open_key_pair(&self, blob: &[u8]) -> Result<ServerKeyPair> {
        let mut plain = self.decrypt(blob)?;
        let key_pair = ServerKeyPair::from_bytes(&plain);
        plain.zeroize();
        key_pair
    }
}
