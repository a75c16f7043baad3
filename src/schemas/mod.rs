//! JSON schema validation of OCPP payloads
//!
//! Schemas are addressed by `<set>/<file>` names such as
//! `ocpp16/HeartbeatResponse.json`, relative to a schema root directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use jsonschema::{validator_for, Validator};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("schema {0} not found")]
    NotFound(String),

    #[error("reading schema {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("compiling schema {name}: {message}")]
    Compile { name: String, message: String },

    #[error("payload does not match {name}: {}", .errors.join("; "))]
    Invalid { name: String, errors: Vec<String> },
}

impl SchemaError {
    /// True when the payload itself is at fault rather than the schema.
    pub fn is_violation(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }
}

/// Validates a payload against a named schema.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, payload: &Value, schema: &str) -> Result<(), SchemaError>;
}

/// Loads schemas from a directory tree and caches the compiled validators.
pub struct FsSchemaValidator {
    root: PathBuf,
    compiled: DashMap<String, Arc<Validator>>,
}

impl FsSchemaValidator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            compiled: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn load(&self, schema: &str) -> Result<Arc<Validator>, SchemaError> {
        if let Some(found) = self.compiled.get(schema) {
            return Ok(found.clone());
        }

        if schema.split('/').any(|part| part == ".." || part.is_empty()) {
            return Err(SchemaError::NotFound(schema.to_string()));
        }

        let path = self.root.join(schema);
        let text = std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SchemaError::NotFound(schema.to_string())
            } else {
                SchemaError::Io {
                    name: schema.to_string(),
                    source,
                }
            }
        })?;
        let document: Value = serde_json::from_str(&text).map_err(|e| SchemaError::Compile {
            name: schema.to_string(),
            message: e.to_string(),
        })?;
        let validator = validator_for(&document).map_err(|e| SchemaError::Compile {
            name: schema.to_string(),
            message: e.to_string(),
        })?;

        debug!(schema, path = %path.display(), "compiled schema");
        let validator = Arc::new(validator);
        let entry = self
            .compiled
            .entry(schema.to_string())
            .or_insert_with(|| validator.clone());
        Ok(entry.clone())
    }
}

impl SchemaValidator for FsSchemaValidator {
    fn validate(&self, payload: &Value, schema: &str) -> Result<(), SchemaError> {
        let validator = self.load(schema)?;
        let errors: Vec<String> = validator
            .iter_errors(payload)
            .map(|e| e.to_string())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::Invalid {
                name: schema.to_string(),
                errors,
            })
        }
    }
}

/// Directory of the schema files shipped with the crate.
pub fn bundled_schema_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("schemas")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> FsSchemaValidator {
        FsSchemaValidator::new(bundled_schema_dir())
    }

    #[test]
    fn accepts_valid_payload() {
        let v = validator();
        v.validate(
            &json!({"currentTime": "2023-06-15T15:05:00+01:00"}),
            "ocpp16/HeartbeatResponse.json",
        )
        .unwrap();
    }

    #[test]
    fn reports_violations() {
        let v = validator();
        let err = v
            .validate(&json!({"currentTime": 5}), "ocpp16/HeartbeatResponse.json")
            .unwrap_err();
        assert!(err.is_violation());
    }

    #[test]
    fn missing_schema_is_not_a_violation() {
        let v = validator();
        let err = v.validate(&json!({}), "ocpp16/Nope.json").unwrap_err();
        assert!(matches!(err, SchemaError::NotFound(_)));
        assert!(!err.is_violation());
    }

    #[test]
    fn rejects_path_traversal() {
        let v = validator();
        let err = v.validate(&json!({}), "../Cargo.toml").unwrap_err();
        assert!(matches!(err, SchemaError::NotFound(_)));
    }
}
