//! Authenticated payload format for sensitive field values.
//!
//! A payload is the padded URL-safe base64 encoding of
//!
//! ```text
//! version (1) | issued_at, big-endian u64 seconds (8) | nonce (12) | AES-256-GCM ciphertext + tag
//! ```
//!
//! The version byte and timestamp are bound into the tag as associated data, so
//! neither can be altered without failing decryption.

use std::sync::Arc;
use std::time::Duration;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::crypto::error::{DecryptionError, EncodingError, EncryptionError};
use crate::crypto::key::KeyMaterial;

pub const VERSION: u8 = 0x80;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

const TIMESTAMP_LEN: usize = 8;
const AAD_LEN: usize = 1 + TIMESTAMP_LEN;
const HEADER_LEN: usize = AAD_LEN + NONCE_LEN;

/// Smallest decoded token that can carry at least one plaintext byte
pub const MIN_TOKEN_LEN: usize = HEADER_LEN + TAG_LEN + 1;

/// Smallest encoded payload, in characters
pub const MIN_PAYLOAD_LEN: usize = MIN_TOKEN_LEN.div_ceil(3) * 4;

/// Allowed forward drift of a payload timestamp when a TTL is enforced
const MAX_CLOCK_SKEW_SECS: u64 = 60;

/// Encrypt a plaintext value under the working key.
///
/// Every call draws a fresh nonce, so encrypting the same value twice yields
/// two different payloads.
pub fn encrypt(plaintext: &str, key: &KeyMaterial) -> Result<String, EncryptionError> {
    encrypt_at(plaintext, key, now_secs())
}

fn encrypt_at(plaintext: &str, key: &KeyMaterial, issued_at: u64) -> Result<String, EncryptionError> {
    if plaintext.is_empty() {
        return Err(EncryptionError::EmptyPlaintext);
    }

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let mut token = Vec::with_capacity(HEADER_LEN + plaintext.len() + TAG_LEN);
    token.push(VERSION);
    token.extend_from_slice(&issued_at.to_be_bytes());
    token.extend_from_slice(&nonce);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| EncryptionError::Cipher(e.to_string()))?;
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext.as_bytes(),
                aad: &token[..AAD_LEN],
            },
        )
        .map_err(|e| EncryptionError::Cipher(e.to_string()))?;

    token.extend_from_slice(&sealed);
    Ok(URL_SAFE.encode(token))
}

/// Decrypt a payload without any validity window.
pub fn decrypt(payload: &str, key: &KeyMaterial) -> Result<String, DecryptionError> {
    decrypt_with_ttl(payload, key, None)
}

/// Decrypt a payload, rejecting it when older than `ttl`.
///
/// The timestamp is only trusted after the integrity check passes.
pub fn decrypt_with_ttl(
    payload: &str,
    key: &KeyMaterial,
    ttl: Option<Duration>,
) -> Result<String, DecryptionError> {
    let token = URL_SAFE
        .decode(payload.trim())
        .map_err(EncodingError::from)?;

    if token.len() < MIN_TOKEN_LEN {
        return Err(DecryptionError::Malformed("payload too short"));
    }
    if token[0] != VERSION {
        return Err(DecryptionError::UnsupportedVersion(token[0]));
    }

    let (aad, rest) = token.split_at(AAD_LEN);
    let (nonce, sealed) = rest.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|_| DecryptionError::Malformed("invalid key length"))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: sealed, aad })
        .map_err(|_| DecryptionError::IntegrityCheckFailed)?;

    if let Some(ttl) = ttl {
        let mut ts = [0u8; TIMESTAMP_LEN];
        ts.copy_from_slice(&aad[1..]);
        check_window(u64::from_be_bytes(ts), ttl, now_secs())?;
    }

    String::from_utf8(plaintext).map_err(|_| DecryptionError::InvalidUtf8)
}

fn check_window(issued_at: u64, ttl: Duration, now: u64) -> Result<(), DecryptionError> {
    if issued_at > now.saturating_add(MAX_CLOCK_SKEW_SECS) {
        return Err(DecryptionError::NotYetValid { issued_at });
    }
    if now.saturating_sub(issued_at) > ttl.as_secs() {
        return Err(DecryptionError::Expired {
            issued_at,
            ttl_secs: ttl.as_secs(),
        });
    }
    Ok(())
}

/// Structural check for "this string is a payload produced by [`encrypt`]".
///
/// Never fails and never touches key material. Anything that does not clear
/// every check is treated as plaintext, so a false negative is the only
/// possible mistake on well-formed payloads.
pub fn looks_encrypted(value: &str) -> bool {
    if value.len() < MIN_PAYLOAD_LEN || value.len() % 4 != 0 {
        return false;
    }

    let alphabet_ok = value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'=');
    if !alphabet_ok {
        return false;
    }

    match URL_SAFE.decode(value) {
        Ok(token) => token.len() >= MIN_TOKEN_LEN && token[0] == VERSION,
        Err(_) => false,
    }
}

fn now_secs() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}

/// Cipher seam used by the transparency layer, the hook pipeline and the repair tooling
pub trait FieldCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError>;

    fn decrypt(&self, payload: &str) -> Result<String, DecryptionError>;

    fn looks_encrypted(&self, value: &str) -> bool {
        looks_encrypted(value)
    }
}

/// Production cipher: shared key material plus an optional validity window
#[derive(Debug, Clone)]
pub struct Codec {
    key: Arc<KeyMaterial>,
    ttl: Option<Duration>,
}

impl Codec {
    pub fn new(key: Arc<KeyMaterial>) -> Self {
        Self { key, ttl: None }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn key(&self) -> &KeyMaterial {
        &self.key
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }
}

impl FieldCipher for Codec {
    fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError> {
        encrypt(plaintext, &self.key)
    }

    fn decrypt(&self, payload: &str) -> Result<String, DecryptionError> {
        decrypt_with_ttl(payload, &self.key, self.ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::key::derive_key;
    use std::sync::OnceLock;

    fn key() -> &'static KeyMaterial {
        static KEY: OnceLock<KeyMaterial> = OnceLock::new();
        KEY.get_or_init(|| derive_key("test-key-32-chars-long-example12").unwrap())
    }

    #[test]
    fn test_min_payload_len() {
        assert_eq!(MIN_TOKEN_LEN, 38);
        assert_eq!(MIN_PAYLOAD_LEN, 52);
    }

    #[test]
    fn test_single_char_payload_is_recognized() {
        let payload = encrypt("x", key()).unwrap();
        assert_eq!(payload.len(), MIN_PAYLOAD_LEN);
        assert!(looks_encrypted(&payload));
        assert_eq!(decrypt(&payload, key()).unwrap(), "x");
    }

    #[test]
    fn test_empty_plaintext_rejected() {
        assert_eq!(encrypt("", key()).unwrap_err(), EncryptionError::EmptyPlaintext);
    }

    #[test]
    fn test_version_byte_tampering() {
        let payload = encrypt("hello", key()).unwrap();
        let mut token = URL_SAFE.decode(&payload).unwrap();
        token[0] = 0x81;
        let tampered = URL_SAFE.encode(&token);
        assert_eq!(
            decrypt(&tampered, key()).unwrap_err(),
            DecryptionError::UnsupportedVersion(0x81)
        );
        assert!(!looks_encrypted(&tampered));
    }

    #[test]
    fn test_timestamp_is_authenticated() {
        let payload = encrypt("hello", key()).unwrap();
        let mut token = URL_SAFE.decode(&payload).unwrap();
        token[AAD_LEN - 1] ^= 0x01;
        let tampered = URL_SAFE.encode(&token);
        assert_eq!(
            decrypt(&tampered, key()).unwrap_err(),
            DecryptionError::IntegrityCheckFailed
        );
    }

    #[test]
    fn test_truncated_payload() {
        let payload = encrypt("hello", key()).unwrap();
        let mut token = URL_SAFE.decode(&payload).unwrap();
        token.truncate(MIN_TOKEN_LEN - 1);
        let truncated = URL_SAFE.encode(&token);
        assert_eq!(
            decrypt(&truncated, key()).unwrap_err(),
            DecryptionError::Malformed("payload too short")
        );
    }

    #[test]
    fn test_bad_encoding_is_encoding_error() {
        assert!(matches!(
            decrypt("not base64 at all!", key()).unwrap_err(),
            DecryptionError::Encoding(_)
        ));
    }

    #[test]
    fn test_ttl_window() {
        let now = 1_700_000_000;
        let ttl = Duration::from_secs(3600);
        assert!(check_window(now - 10, ttl, now).is_ok());
        assert!(matches!(
            check_window(now - 7200, ttl, now),
            Err(DecryptionError::Expired { .. })
        ));
        assert!(matches!(
            check_window(now + 3600, ttl, now),
            Err(DecryptionError::NotYetValid { .. })
        ));
    }

    #[test]
    fn test_expired_payload_rejected_only_with_ttl() {
        let issued_at = now_secs() - 7200;
        let payload = encrypt_at("old value", key(), issued_at).unwrap();

        assert_eq!(decrypt(&payload, key()).unwrap(), "old value");
        assert!(matches!(
            decrypt_with_ttl(&payload, key(), Some(Duration::from_secs(60))),
            Err(DecryptionError::Expired { .. })
        ));
    }

    #[test]
    fn test_plaintext_shapes_are_not_encrypted() {
        for value in [
            "",
            "+1-555-123-4567",
            "123 Main St, Springfield",
            "Loves Rust and long walks.",
            "aGVsbG8gd29ybGQgdGhpcyBpcyBqdXN0IGJhc2U2NCBwbGFpbnRleHQ=",
            &"A".repeat(200),
        ] {
            assert!(!looks_encrypted(value), "{value:?} misclassified");
        }
    }
}
