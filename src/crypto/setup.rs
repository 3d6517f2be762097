use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;

use crate::config::EncryptionConfig;
use crate::crypto::codec::{Codec, FieldCipher};
use crate::crypto::key::MASTER_SECRET_LEN;

const SELF_TEST_PLAINTEXT: &str = "field-vault self test +1-555-000-0000";

/// Outcome of an encryption setup check, printed by `vault crypto check`
#[derive(Debug, Clone, Default, Serialize)]
pub struct SetupReport {
    pub encryption_enabled: bool,
    pub key_configured: bool,
    pub using_default_key: bool,
    pub fingerprint: Option<String>,
    pub fingerprint_pinned: bool,
    pub roundtrip_test: bool,
    pub ttl_secs: Option<u64>,
    pub error: Option<String>,
    pub recommendations: Vec<String>,
}

impl SetupReport {
    pub fn is_healthy(&self) -> bool {
        self.key_configured && self.roundtrip_test && self.error.is_none()
    }
}

/// Derive the configured key and run a self test against it
pub fn validate_setup(config: &EncryptionConfig) -> SetupReport {
    let mut report = SetupReport {
        key_configured: config.master_secret.is_some(),
        using_default_key: config.using_default_key,
        fingerprint_pinned: config.fingerprint.is_some(),
        ttl_secs: config.ttl_secs,
        ..Default::default()
    };

    match config.codec() {
        Ok(codec) => {
            report.encryption_enabled = true;
            report.fingerprint = Some(codec.key().fingerprint().to_string());
            match self_test(&codec) {
                Ok(()) => report.roundtrip_test = true,
                Err(reason) => report.error = Some(reason),
            }
        }
        Err(e) => report.error = Some(e.to_string()),
    }

    if !report.key_configured {
        report
            .recommendations
            .push("Set ENCRYPTION_KEY to a 32-character secret (see `vault crypto generate-key`)".to_string());
    }
    if report.using_default_key {
        report
            .recommendations
            .push("Replace the development default key before storing real data".to_string());
    }
    if report.encryption_enabled && !report.fingerprint_pinned {
        report
            .recommendations
            .push("Pin ENCRYPTION_KEY_FINGERPRINT so a wrong key fails at startup".to_string());
    }
    if report.key_configured && !report.roundtrip_test {
        report
            .recommendations
            .push("Encryption self test failed; check ENCRYPTION_KEY and ENCRYPTION_TTL_SECS".to_string());
    }

    report
}

fn self_test(codec: &Codec) -> Result<(), String> {
    let first = codec.encrypt(SELF_TEST_PLAINTEXT).map_err(|e| e.to_string())?;
    let second = codec.encrypt(SELF_TEST_PLAINTEXT).map_err(|e| e.to_string())?;

    if first == second {
        return Err("encryption is deterministic".to_string());
    }
    if !codec.looks_encrypted(&first) || codec.looks_encrypted(SELF_TEST_PLAINTEXT) {
        return Err("classifier self test failed".to_string());
    }

    let plaintext = codec.decrypt(&first).map_err(|e| e.to_string())?;
    if plaintext != SELF_TEST_PLAINTEXT {
        return Err("round trip returned a different value".to_string());
    }
    Ok(())
}

/// Fresh random master secret of the required length, URL-safe characters only
pub fn generate_master_secret() -> String {
    let mut bytes = [0u8; MASTER_SECRET_LEN * 3 / 4];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
