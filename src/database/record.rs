use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Raw column map as it comes out of (and goes into) a `RecordStore`
pub type RowData = HashMap<String, Value>;

/// System fields that can only be set by observers and stores, not by API input
pub const SYSTEM_FIELDS: &[&str] = &["id", "created_at", "updated_at"];

/// Errors that can occur during Record operations
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("System field '{0}' cannot be set via API input")]
    SystemFieldNotAllowed(String),
    #[error("Invalid JSON format: {0}")]
    InvalidJson(String),
    #[error("Sensitive field '{field}' must be a string or null, got {found}")]
    InvalidFieldType { field: String, found: &'static str },
}

/// A dynamic record that can represent any database row with change tracking
#[derive(Debug, Clone, Default)]
pub struct Record {
    /// Original state from the store (None for records that were never persisted)
    original: Option<RowData>,
    /// Current field values, as they will be persisted
    fields: RowData,
    /// Fields written since original: set through `set`, or present in update input
    modified_fields: HashSet<String>,
}

impl Record {
    /// Create a new empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Create record from API input JSON, rejecting system fields
    pub fn from_json(json: Value) -> Result<Self, RecordError> {
        let mut record = Self::new();

        match json {
            Value::Object(map) => {
                for (key, value) in map {
                    if SYSTEM_FIELDS.contains(&key.as_str()) {
                        return Err(RecordError::SystemFieldNotAllowed(key));
                    }
                    record.fields.insert(key, value);
                }
                Ok(record)
            }
            _ => Err(RecordError::InvalidJson("Expected JSON object".to_string())),
        }
    }

    /// Create record from stored row data (allows system fields)
    pub fn from_sql_data(data: RowData) -> Self {
        Self {
            original: Some(data.clone()),
            fields: data,
            modified_fields: HashSet::new(),
        }
    }

    /// Inject original data from the loader (for tracking changes).
    ///
    /// Every non-system field already present came from the caller's input and
    /// counts as written, even when its value matches the stored one.
    pub fn inject(&mut self, original_data: RowData) -> &mut Self {
        let written = self
            .fields
            .keys()
            .filter(|key| !SYSTEM_FIELDS.contains(&key.as_str()))
            .cloned();
        self.modified_fields.extend(written);
        self.original = Some(original_data);
        self
    }

    /// Replace both original and current state with a freshly stored row
    pub fn refresh(&mut self, data: RowData) -> &mut Self {
        self.original = Some(data.clone());
        self.fields = data;
        self.modified_fields.clear();
        self
    }

    /// Get field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get field value when it is a JSON string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Set field value with automatic change tracking
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let key = key.into();

        // Observers use set_system_field for these
        if SYSTEM_FIELDS.contains(&key.as_str()) {
            tracing::warn!("Attempted to set system field '{}' - ignoring", key);
            return self;
        }

        if self.original.is_some() {
            self.modified_fields.insert(key.clone());
        }

        self.fields.insert(key, value.into());
        self
    }

    /// Set system field (for observers and stores only)
    pub fn set_system_field(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let key = key.into();

        if self.original.is_some() {
            self.modified_fields.insert(key.clone());
        }

        self.fields.insert(key, value.into());
        self
    }

    /// Remove field and return its value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if self.original.is_some() {
            self.modified_fields.insert(key.to_string());
        }
        self.fields.remove(key)
    }

    /// Get record ID
    pub fn id(&self) -> Option<Uuid> {
        self.get("id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok())
    }

    /// Set record ID (system field)
    pub fn set_id(&mut self, id: Uuid) -> &mut Self {
        self.set_system_field("id", Value::String(id.to_string()))
    }

    // ========================================
    // Change tracking
    // ========================================

    /// Check if a specific field has been changed
    pub fn changed(&self, key: &str) -> bool {
        match (&self.original, self.fields.get(key)) {
            (Some(original), Some(current)) => original.get(key) != Some(current),
            // Absent from a partial update is unchanged; only an explicit remove counts
            (Some(original), None) => self.modified_fields.contains(key) && original.contains_key(key),
            (None, Some(_)) => true, // New field on create
            (None, None) => false,
        }
    }

    /// Check if a field was written by the caller, whether or not its value differs
    pub fn written(&self, key: &str) -> bool {
        self.changed(key) || (self.modified_fields.contains(key) && self.fields.contains_key(key))
    }

    /// Check if record has any changes
    pub fn has_changes(&self) -> bool {
        self.original.is_none() || self.fields.keys().any(|key| self.changed(key))
    }

    /// Current values of every changed field, system fields excluded
    pub fn changed_fields(&self) -> RowData {
        self.fields
            .iter()
            .filter(|(key, _)| !SYSTEM_FIELDS.contains(&key.as_str()) && self.changed(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Names of fields touched through `set` since the original was loaded
    pub fn modified_fields(&self) -> &HashSet<String> {
        &self.modified_fields
    }

    /// Get original data (before changes)
    pub fn original(&self) -> Option<&RowData> {
        self.original.as_ref()
    }

    // ========================================
    // Serialization
    // ========================================

    /// Convert to JSON Value (all fields)
    pub fn to_json(&self) -> Value {
        Value::Object(self.to_map())
    }

    /// Convert to HashMap
    pub fn to_hashmap(&self) -> RowData {
        self.fields.clone()
    }

    /// Convert to serde_json::Map
    pub fn to_map(&self) -> Map<String, Value> {
        self.fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl From<RowData> for Record {
    fn from(map: RowData) -> Self {
        Self::from_sql_data(map)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_sql_data(map.into_iter().collect())
    }
}

impl From<Record> for RowData {
    fn from(record: Record) -> Self {
        record.fields
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Record(id: {:?}, fields: {}, changed: {})",
            self.id(),
            self.fields.len(),
            self.has_changes()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_rejects_system_fields() {
        let err = Record::from_json(json!({"id": "x", "bio": "hi"})).unwrap_err();
        assert!(matches!(err, RecordError::SystemFieldNotAllowed(field) if field == "id"));
        assert!(Record::from_json(json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn test_change_tracking_after_inject() {
        let mut record = Record::from_json(json!({"bio": "new"})).unwrap();
        record.inject(
            [
                ("id".to_string(), json!("00000000-0000-0000-0000-000000000001")),
                ("bio".to_string(), json!("old")),
                ("address".to_string(), json!("kept")),
            ]
            .into_iter()
            .collect(),
        );

        assert!(record.changed("bio"));
        assert!(!record.changed("address"));
        let changes = record.changed_fields();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes["bio"], json!("new"));
    }

    #[test]
    fn test_refresh_resets_tracking() {
        let mut record = Record::from_sql_data(RowData::new());
        record.set("bio", "draft");
        assert!(record.has_changes());
        assert!(record.modified_fields().contains("bio"));

        record.refresh([("bio".to_string(), json!("stored"))].into_iter().collect());
        assert!(!record.has_changes());
        assert!(record.modified_fields().is_empty());
        assert_eq!(record.get_str("bio"), Some("stored"));
    }

    #[test]
    fn test_same_value_write_counts_as_written() {
        let mut record = Record::from_sql_data([("bio".to_string(), json!("same"))].into_iter().collect());
        record.set("bio", "same");
        assert!(!record.changed("bio"));
        assert!(record.written("bio"));
        assert!(!record.written("address"));

        let mut update = Record::from_json(json!({"bio": "same"})).unwrap();
        update.set_id(Uuid::new_v4());
        update.inject(
            [
                ("bio".to_string(), json!("same")),
                ("address".to_string(), json!("kept")),
            ]
            .into_iter()
            .collect(),
        );
        assert!(update.written("bio"));
        assert!(!update.written("address"));
        assert!(!update.modified_fields().contains("id"));
    }

    #[test]
    fn test_remove_counts_as_change() {
        let mut record = Record::from_sql_data([("bio".to_string(), json!("old"))].into_iter().collect());
        assert!(!record.changed("bio"));
        record.remove("bio");
        assert!(record.changed("bio"));
    }

    #[test]
    fn test_set_ignores_system_fields() {
        let mut record = Record::new();
        record.set("id", "nope");
        assert!(record.id().is_none());

        let id = Uuid::new_v4();
        record.set_id(id);
        assert_eq!(record.id(), Some(id));
    }
}
