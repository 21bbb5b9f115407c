//! JSON-Schema validation for collection entities.

use crate::error::StoreError;
use serde_json::Value;

/// A compiled collection schema.
pub struct SchemaValidator {
    schema: Value,
    validator: jsonschema::Validator,
}

impl SchemaValidator {
    pub fn new(schema: Value) -> Result<Self, StoreError> {
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| StoreError::InvalidSchema(e.to_string()))?;
        Ok(Self { schema, validator })
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Every violation, joined into one `Validation` error.
    pub fn validate(&self, entity: &Value) -> Result<(), StoreError> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(entity)
            .map(|e| e.to_string())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Validation(errors.join("; ")))
        }
    }
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator").field("schema", &self.schema).finish()
    }
}
