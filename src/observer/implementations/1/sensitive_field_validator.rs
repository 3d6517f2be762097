// Ring 1: Sensitive Field Validator
use async_trait::async_trait;
use serde_json::Value;

use crate::database::record::RecordError;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{InputValidationObserver, Observer, ObserverRing, Operation};

/// Sensitive fields hold text. Numbers, arrays and objects are rejected here,
/// before the encryptor could stringify them.
#[derive(Default)]
pub struct SensitiveFieldValidator;

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Observer for SensitiveFieldValidator {
    fn name(&self) -> &'static str {
        "SensitiveFieldValidator"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::InputValidation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }
}

#[async_trait]
impl InputValidationObserver for SensitiveFieldValidator {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let mut failures = Vec::new();

        for record in &ctx.records {
            for field in ctx.schema.fields() {
                match record.get(field) {
                    None | Some(Value::Null) | Some(Value::String(_)) => {}
                    Some(other) => failures.push(RecordError::InvalidFieldType {
                        field: field.clone(),
                        found: json_kind(other),
                    }),
                }
            }
        }

        for failure in failures {
            ctx.add_error(ObserverError::ValidationError(failure.to_string()));
        }
        Ok(())
    }
}
