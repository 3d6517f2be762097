use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::crypto::codec::FieldCipher;
use crate::crypto::error::EncryptionError;
use crate::database::record::{Record, RowData};
use crate::database::schema::SensitiveSchema;
use crate::encryption::{on_field_write, seal_changed_fields, FieldWrite};

/// A loaded record whose declared sensitive fields decrypt transparently.
///
/// The underlying [`Record`] always holds the stored (encrypted) form. Plaintext
/// lives only in the per-instance cache, which is dropped whenever the record is
/// refreshed from the store.
pub struct EncryptedRecord {
    record: Record,
    schema: Arc<SensitiveSchema>,
    cipher: Arc<dyn FieldCipher>,
    cache: HashMap<String, String>,
}

impl EncryptedRecord {
    pub fn new(record: Record, schema: Arc<SensitiveSchema>, cipher: Arc<dyn FieldCipher>) -> Self {
        Self {
            record,
            schema,
            cipher,
            cache: HashMap::new(),
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        self.record.id()
    }

    pub fn schema(&self) -> &SensitiveSchema {
        &self.schema
    }

    /// Stored form of the record
    pub fn record(&self) -> &Record {
        &self.record
    }

    pub(crate) fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    pub fn into_record(self) -> Record {
        self.record
    }

    /// Write hook for a single field; non-sensitive fields are stored verbatim.
    pub fn on_field_write(&mut self, field: &str, raw_value: Option<&str>) -> Result<FieldWrite, EncryptionError> {
        self.cache.remove(field);

        if !self.schema.is_sensitive(field) {
            return Ok(match raw_value {
                None | Some("") => {
                    self.record.set(field, raw_value.map_or(Value::Null, Value::from));
                    FieldWrite::Empty
                }
                Some(value) => {
                    self.record.set(field, value);
                    FieldWrite::Passthrough
                }
            });
        }

        on_field_write(&mut self.record, field, raw_value, self.cipher.as_ref())
    }

    /// Assign a plaintext value. Sensitive values are encrypted when the record is
    /// saved; until then reads return the new plaintext.
    pub fn set_plain(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.cache.remove(field);
        self.record.set(field, value);
        self
    }

    /// Encrypt every changed sensitive field in place (the pre-save step)
    pub fn seal(&mut self) -> Result<usize, EncryptionError> {
        let sealed = seal_changed_fields(&mut self.record, &self.schema, self.cipher.as_ref())?;
        self.cache.clear();
        Ok(sealed)
    }

    /// Read hook: plaintext for sensitive fields, raw text for everything else.
    ///
    /// A value that cannot be decrypted is logged and returned as stored. That
    /// fallback is not cached, so a later read retries.
    pub fn on_field_read(&mut self, field: &str) -> String {
        if let Some(plaintext) = self.cache.get(field) {
            return plaintext.clone();
        }

        let raw = match self.record.get(field) {
            None | Some(Value::Null) => return String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        if raw.is_empty() || !self.schema.is_sensitive(field) {
            return raw;
        }

        if !self.cipher.looks_encrypted(&raw) {
            debug!("Legacy plaintext in {}.{} ({:?})", self.schema.name(), field, self.id());
            self.cache.insert(field.to_string(), raw.clone());
            return raw;
        }

        match self.cipher.decrypt(&raw) {
            Ok(plaintext) => {
                self.cache.insert(field.to_string(), plaintext.clone());
                plaintext
            }
            Err(e) => {
                warn!(
                    "Failed to decrypt {}.{} for record {:?}: {} - returning stored value",
                    self.schema.name(),
                    field,
                    self.id(),
                    e
                );
                raw
            }
        }
    }

    pub fn get_decrypted(&mut self, field: &str) -> String {
        self.on_field_read(field)
    }

    /// Plaintext of every declared sensitive field
    pub fn get_all_decrypted(&mut self) -> BTreeMap<String, String> {
        let fields: Vec<String> = self.schema.fields().to_vec();
        fields
            .into_iter()
            .map(|field| {
                let plaintext = self.on_field_read(&field);
                (field, plaintext)
            })
            .collect()
    }

    pub fn is_cached(&self, field: &str) -> bool {
        self.cache.contains_key(field)
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Replace the record with freshly stored data and drop cached plaintext
    pub fn refresh(&mut self, data: RowData) {
        self.record.refresh(data);
        self.clear_cache();
    }

    /// Stored row plus a `decrypted` object holding plaintext of the sensitive fields
    pub fn to_api_output(&mut self) -> Value {
        let decrypted: Map<String, Value> = self
            .get_all_decrypted()
            .into_iter()
            .map(|(field, plaintext)| (field, Value::String(plaintext)))
            .collect();

        let mut output = self.record.to_map();
        output.insert("decrypted".to_string(), Value::Object(decrypted));
        Value::Object(output)
    }
}

impl std::fmt::Debug for EncryptedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedRecord")
            .field("schema", &self.schema.name())
            .field("id", &self.id())
            .field("cached_fields", &self.cache.len())
            .finish()
    }
}
