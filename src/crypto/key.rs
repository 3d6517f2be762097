use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::crypto::error::ConfigurationError;

/// Length of the derived AES-256 key in bytes
pub const KEY_LEN: usize = 32;

/// Salt length fed to PBKDF2
pub const SALT_LEN: usize = 16;

/// PBKDF2-HMAC-SHA256 rounds. Changing this changes every derived key.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Required length of the configured master secret, in characters
pub const MASTER_SECRET_LEN: usize = 32;

/// Working key derived from the master secret.
///
/// Built once at startup and shared read-only (usually behind an `Arc`).
/// The key bytes are zeroized on drop and never appear in `Debug` output.
pub struct KeyMaterial {
    key: Zeroizing<[u8; KEY_LEN]>,
    fingerprint: String,
}

impl KeyMaterial {
    /// Validate the master secret and run the key derivation.
    pub fn derive(master_secret: &str) -> Result<Self, ConfigurationError> {
        if master_secret.is_empty() {
            return Err(ConfigurationError::MissingSecret);
        }

        let got = master_secret.chars().count();
        if got != MASTER_SECRET_LEN {
            return Err(ConfigurationError::InvalidSecretLength {
                expected: MASTER_SECRET_LEN,
                got,
            });
        }

        let salt = derive_salt(master_secret.as_bytes());
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        pbkdf2_hmac::<Sha256>(master_secret.as_bytes(), &salt, PBKDF2_ITERATIONS, key.as_mut());

        let fingerprint = fingerprint_of(&key);
        Ok(Self { key, fingerprint })
    }

    /// Short public identifier of the derived key.
    ///
    /// Stable for a given master secret, so it can be pinned in configuration
    /// to catch a deployment that starts with the wrong secret.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Fail unless the derived key matches a previously recorded fingerprint
    pub fn verify_fingerprint(&self, expected: &str) -> Result<(), ConfigurationError> {
        if self.fingerprint.eq_ignore_ascii_case(expected.trim()) {
            Ok(())
        } else {
            Err(ConfigurationError::FingerprintMismatch {
                expected: expected.trim().to_string(),
                actual: self.fingerprint.clone(),
            })
        }
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyMaterial(fingerprint: {}, key: [REDACTED])", self.fingerprint)
    }
}

/// Derive the working key for a master secret.
pub fn derive_key(master_secret: &str) -> Result<KeyMaterial, ConfigurationError> {
    KeyMaterial::derive(master_secret)
}

/// Salt is derived from the secret itself so the same secret always yields the same key
fn derive_salt(secret: &[u8]) -> [u8; SALT_LEN] {
    let digest = Sha256::digest(secret);
    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&digest[..SALT_LEN]);
    salt
}

fn fingerprint_of(key: &[u8; KEY_LEN]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"field-vault:fingerprint:");
    hasher.update(key);
    let digest = hasher.finalize();

    digest[..8].iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-key-32-chars-long-example12";

    #[test]
    fn test_rejects_wrong_length() {
        let err = KeyMaterial::derive("too-short").unwrap_err();
        assert_eq!(err, ConfigurationError::InvalidSecretLength { expected: 32, got: 9 });
    }

    #[test]
    fn test_rejects_empty_secret() {
        assert_eq!(KeyMaterial::derive("").unwrap_err(), ConfigurationError::MissingSecret);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let a = KeyMaterial::derive(SECRET).unwrap();
        let b = KeyMaterial::derive(SECRET).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
    }

    #[test]
    fn test_fingerprint_verification() {
        let key = KeyMaterial::derive(SECRET).unwrap();
        let fingerprint = key.fingerprint().to_uppercase();
        assert!(key.verify_fingerprint(&fingerprint).is_ok());
        assert!(matches!(
            key.verify_fingerprint("0000000000000000"),
            Err(ConfigurationError::FingerprintMismatch { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = KeyMaterial::derive(SECRET).unwrap();
        let debug = format!("{:?}", key);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains(SECRET));
    }
}
