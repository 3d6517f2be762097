mod common;

use anyhow::Result;
use proptest::prelude::*;

use field_vault::crypto::{decrypt, derive_key, encrypt, looks_encrypted, ConfigurationError, DecryptionError, FieldCipher};

#[test]
fn scenario_phone_number_round_trip() -> Result<()> {
    let key = derive_key(common::TEST_SECRET)?;
    let payload = encrypt("+1-555-123-4567", &key)?;

    assert_ne!(payload, "+1-555-123-4567");
    assert!(looks_encrypted(&payload));
    assert!(!looks_encrypted("+1-555-123-4567"));
    assert_eq!(decrypt(&payload, &key)?, "+1-555-123-4567");
    Ok(())
}

#[test]
fn encryption_is_not_deterministic() -> Result<()> {
    let key = common::test_key();
    let first = encrypt("123 Main St, Springfield", &key)?;
    let second = encrypt("123 Main St, Springfield", &key)?;

    assert_ne!(first, second);
    assert_eq!(decrypt(&first, &key)?, decrypt(&second, &key)?);
    Ok(())
}

#[test]
fn wrong_key_fails_integrity_check() -> Result<()> {
    let payload = encrypt("Jane", &common::test_key())?;
    let err = decrypt(&payload, &common::other_key()).unwrap_err();
    assert_eq!(err, DecryptionError::IntegrityCheckFailed);
    Ok(())
}

#[test]
fn same_secret_derives_same_key() -> Result<()> {
    let again = derive_key(common::TEST_SECRET)?;
    assert_eq!(again.fingerprint(), common::test_key().fingerprint());
    assert_ne!(again.fingerprint(), common::other_key().fingerprint());

    let payload = encrypt("Doe", &common::test_key())?;
    assert_eq!(decrypt(&payload, &again)?, "Doe");
    Ok(())
}

#[test]
fn short_secret_is_a_configuration_error() {
    let err = derive_key("too-short").unwrap_err();
    assert_eq!(
        err,
        ConfigurationError::InvalidSecretLength {
            expected: 32,
            got: 9
        }
    );
}

#[test]
fn classification_is_idempotent() -> Result<()> {
    let codec = common::codec();
    let payload = codec.encrypt("Senior Rust engineer, 10 years")?;

    for _ in 0..3 {
        assert!(codec.looks_encrypted(&payload));
        assert!(!codec.looks_encrypted("Senior Rust engineer, 10 years"));
    }
    Ok(())
}

#[test]
fn ordinary_plaintext_is_never_classified_as_payload() {
    let samples = [
        "",
        "Jane",
        "+1-555-123-4567",
        "jane.doe@example.com",
        "742 Evergreen Terrace, Springfield, OR 97403, United States of America",
        "aGVsbG8gd29ybGQgdGhpcyBpcyBwbGFpbiBiYXNlNjQgdGV4dCBub3QgYSBwYXlsb2Fk",
        "https://example.com/profile/jane-doe?ref=search&utm_source=newsletter",
    ];
    for sample in samples {
        assert!(!looks_encrypted(sample), "misclassified {:?}", sample);
    }
}

#[test]
fn truncated_payload_is_rejected_without_panicking() -> Result<()> {
    let payload = encrypt("+1-555-123-4567", &common::test_key())?;
    for cut in [4, 20, 52, payload.len() - 4] {
        let truncated = &payload[..cut];
        assert!(decrypt(truncated, &common::test_key()).is_err());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn round_trip_any_text(plaintext in "\\PC{1,200}") {
        let key = common::test_key();
        let payload = encrypt(&plaintext, &key).unwrap();
        prop_assert!(looks_encrypted(&payload));
        prop_assert_eq!(decrypt(&payload, &key).unwrap(), plaintext);
    }
}
