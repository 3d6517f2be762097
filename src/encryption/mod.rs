//! Transparent encryption of declared sensitive fields.
//!
//! Writes go through [`on_field_write`] (or [`seal_changed_fields`] from the save
//! pipeline) and always leave either an empty value, an existing payload, or a
//! fresh single-layer payload in the record. Reads go through [`EncryptedRecord`].

pub mod record;

pub use record::EncryptedRecord;

use serde_json::Value;
use tracing::debug;

use crate::crypto::codec::FieldCipher;
use crate::crypto::error::EncryptionError;
use crate::database::record::Record;
use crate::database::schema::SensitiveSchema;

/// What a write did to a sensitive field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWrite {
    /// None or empty: stored as-is
    Empty,
    /// Already a payload: copied unchanged, never wrapped again
    AlreadyEncrypted,
    /// Plaintext: replaced by a fresh payload
    Encrypted,
    /// Not a sensitive field: stored verbatim
    Passthrough,
}

/// Store `raw_value` into a sensitive field, encrypting it unless it is empty or
/// already ciphertext.
pub fn on_field_write(
    record: &mut Record,
    field: &str,
    raw_value: Option<&str>,
    cipher: &dyn FieldCipher,
) -> Result<FieldWrite, EncryptionError> {
    match raw_value {
        None => {
            record.set(field, Value::Null);
            Ok(FieldWrite::Empty)
        }
        Some("") => {
            record.set(field, "");
            Ok(FieldWrite::Empty)
        }
        Some(value) if cipher.looks_encrypted(value) => {
            record.set(field, value);
            Ok(FieldWrite::AlreadyEncrypted)
        }
        Some(value) => {
            let payload = cipher.encrypt(value)?;
            record.set(field, payload);
            Ok(FieldWrite::Encrypted)
        }
    }
}

/// Run the write hook over every declared field written since load.
///
/// Returns how many fields were freshly encrypted. Untouched legacy plaintext is
/// left alone here; the repair tooling's migrate pass handles it in bulk.
pub fn seal_changed_fields(
    record: &mut Record,
    schema: &SensitiveSchema,
    cipher: &dyn FieldCipher,
) -> Result<usize, EncryptionError> {
    let mut encrypted = 0;

    for field in schema.fields() {
        if !record.written(field) {
            continue;
        }

        let raw = match record.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(EncryptionError::NonTextValue(field.clone())),
        };

        let outcome = on_field_write(record, field, raw.as_deref(), cipher)?;
        debug!("Field write {}.{}: {:?}", schema.name(), field, outcome);
        if outcome == FieldWrite::Encrypted {
            encrypted += 1;
        }
    }

    Ok(encrypted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::codec::Codec;
    use crate::crypto::key::derive_key;
    use serde_json::json;
    use std::sync::{Arc, OnceLock};

    fn codec() -> &'static Codec {
        static CODEC: OnceLock<Codec> = OnceLock::new();
        CODEC.get_or_init(|| Codec::new(Arc::new(derive_key("test-key-32-chars-long-example12").unwrap())))
    }

    fn schema() -> SensitiveSchema {
        SensitiveSchema::new("user_profile", ["phone_number", "address", "bio"])
    }

    #[test]
    fn test_write_states() {
        let mut record = Record::new();

        assert_eq!(on_field_write(&mut record, "bio", None, codec()).unwrap(), FieldWrite::Empty);
        assert_eq!(record.get("bio"), Some(&Value::Null));

        assert_eq!(on_field_write(&mut record, "bio", Some(""), codec()).unwrap(), FieldWrite::Empty);
        assert_eq!(record.get_str("bio"), Some(""));

        assert_eq!(
            on_field_write(&mut record, "bio", Some("hello"), codec()).unwrap(),
            FieldWrite::Encrypted
        );
        let payload = record.get_str("bio").unwrap().to_string();
        assert_ne!(payload, "hello");

        assert_eq!(
            on_field_write(&mut record, "bio", Some(payload.as_str()), codec()).unwrap(),
            FieldWrite::AlreadyEncrypted
        );
        assert_eq!(record.get_str("bio"), Some(payload.as_str()));
    }

    #[test]
    fn test_seal_only_touches_changed_sensitive_fields() {
        let mut record = Record::from_sql_data(
            [
                ("phone_number".to_string(), json!("+1-555-000-1111")),
                ("address".to_string(), json!("old street")),
                ("headline".to_string(), json!("Engineer")),
            ]
            .into_iter()
            .collect(),
        );
        record.set("address", "new street");
        record.set("headline", "Senior Engineer");

        let encrypted = seal_changed_fields(&mut record, &schema(), codec()).unwrap();
        assert_eq!(encrypted, 1);
        assert!(codec().looks_encrypted(record.get_str("address").unwrap()));
        assert_eq!(record.get_str("phone_number"), Some("+1-555-000-1111"));
        assert_eq!(record.get_str("headline"), Some("Senior Engineer"));
    }

    #[test]
    fn test_seal_skips_fields_missing_from_partial_update() {
        let mut changes = Record::from_json(json!({"bio": "new bio"})).unwrap();
        changes.inject(
            [
                ("bio".to_string(), json!("old bio")),
                ("address".to_string(), json!("kept street")),
            ]
            .into_iter()
            .collect(),
        );

        let encrypted = seal_changed_fields(&mut changes, &schema(), codec()).unwrap();
        assert_eq!(encrypted, 1);
        assert!(changes.get("address").is_none());
        assert!(!changes.changed_fields().contains_key("address"));
    }

    #[test]
    fn test_seal_encrypts_legacy_value_written_back_unchanged() {
        let mut record = Record::from_sql_data([("bio".to_string(), json!("legacy bio"))].into_iter().collect());
        record.set("bio", "legacy bio");

        assert_eq!(seal_changed_fields(&mut record, &schema(), codec()).unwrap(), 1);
        let stored = record.get_str("bio").unwrap();
        assert!(codec().looks_encrypted(stored));
        assert_eq!(codec().decrypt(stored).unwrap(), "legacy bio");
        assert!(record.changed_fields().contains_key("bio"));
    }

    #[test]
    fn test_seal_rejects_non_text() {
        let mut record = Record::from_json(json!({"bio": 42})).unwrap();
        assert_eq!(
            seal_changed_fields(&mut record, &schema(), codec()).unwrap_err(),
            EncryptionError::NonTextValue("bio".to_string())
        );
    }
}
