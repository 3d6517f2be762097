use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::crypto::error::ConfigurationError;

/// Record type plus the names of its fields that are encrypted at rest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensitiveSchema {
    name: String,
    fields: Vec<String>,
}

impl SensitiveSchema {
    pub fn new<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let fields: Vec<String> = fields
            .into_iter()
            .map(Into::into)
            .filter(|field: &String| seen.insert(field.clone()))
            .collect();
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn is_sensitive(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

/// Which record types carry encrypted fields, keyed by record type name
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Arc<SensitiveSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The job-board record types that hold personal data
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(SensitiveSchema::new(
            "user_profile",
            ["phone_number", "address", "bio"],
        ));
        registry.register(SensitiveSchema::new(
            "user",
            ["first_name", "last_name", "full_name", "phone_number", "address"],
        ));
        registry
    }

    /// Parse `type:field,field;type:field` declarations
    pub fn parse(declarations: &str) -> Result<Self, ConfigurationError> {
        let invalid = || ConfigurationError::InvalidValue {
            var: "VAULT_SCHEMAS",
            value: declarations.to_string(),
        };

        let mut registry = Self::new();
        for entry in declarations.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, fields) = entry.split_once(':').ok_or_else(invalid)?;
            let name = name.trim();
            let fields: Vec<&str> = fields
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .collect();

            if !is_valid_identifier(name) || fields.is_empty() {
                return Err(invalid());
            }
            if !fields.iter().all(|f| is_valid_identifier(f)) {
                return Err(invalid());
            }

            registry.register(SensitiveSchema::new(name, fields));
        }

        if registry.schemas.is_empty() {
            return Err(invalid());
        }
        Ok(registry)
    }

    pub fn register(&mut self, schema: SensitiveSchema) -> &mut Self {
        self.schemas.insert(schema.name().to_string(), Arc::new(schema));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<SensitiveSchema>> {
        self.schemas.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SensitiveSchema>> {
        self.schemas.values()
    }
}

/// Table and column names: lowercase ascii, digits and underscores, starting with a letter
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
