// crates/linkpack-core/src/manifest.rs
// ============================================================================
// Module: Linkpack Package Manifest
// Description: Typed accessors over a package manifest JSON document.
// Purpose: Mutate dependency, files, scripts, and package-manager fields safely.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`Manifest`] wraps a parsed package manifest while preserving every field
//! it does not understand, in its original key order. Accessors cover only the
//! fields the pipeline rewrites.
//! Invariants:
//! - The document root is always a JSON object.
//! - Serialization is deterministic: two-space indentation, trailing newline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Manifest field holding the package name.
const NAME_FIELD: &str = "name";
/// Manifest field holding runtime dependencies.
const DEPENDENCIES_FIELD: &str = "dependencies";
/// Manifest field listing published files.
const FILES_FIELD: &str = "files";
/// Manifest field holding scripts.
const SCRIPTS_FIELD: &str = "scripts";
/// Manifest field declaring the package manager.
const PACKAGE_MANAGER_FIELD: &str = "packageManager";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while parsing or mutating a manifest.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManifestError {
    /// The document is not valid JSON.
    #[error("invalid manifest json: {0}")]
    Json(String),
    /// The document root is not a JSON object.
    #[error("manifest root must be a json object")]
    NotAnObject,
    /// The manifest has no string `name` field.
    #[error("manifest is missing a string name field")]
    MissingName,
    /// A field the pipeline rewrites has an unexpected JSON type.
    #[error("manifest field {field} must be {expected}")]
    FieldType {
        /// Offending field name.
        field: &'static str,
        /// Expected JSON type description.
        expected: &'static str,
    },
}

// ============================================================================
// SECTION: Manifest
// ============================================================================

/// Parsed package manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Full manifest document.
    document: Map<String, Value>,
}

impl Manifest {
    /// Parses a manifest from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] when the bytes are not a JSON object.
    pub fn parse(bytes: &[u8]) -> Result<Self, ManifestError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|err| ManifestError::Json(err.to_string()))?;
        Self::from_value(value)
    }

    /// Wraps an already-parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::NotAnObject`] when the value is not an object.
    pub fn from_value(value: Value) -> Result<Self, ManifestError> {
        match value {
            Value::Object(document) => Ok(Self {
                document,
            }),
            _ => Err(ManifestError::NotAnObject),
        }
    }

    /// Returns the declared package name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.document.get(NAME_FIELD).and_then(Value::as_str)
    }

    /// Returns the declared package name or an error when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::MissingName`] when `name` is missing or not a string.
    pub fn require_name(&self) -> Result<&str, ManifestError> {
        self.name().ok_or(ManifestError::MissingName)
    }

    /// Returns the specifier for a runtime dependency.
    #[must_use]
    pub fn dependency(&self, name: &str) -> Option<&Value> {
        self.document.get(DEPENDENCIES_FIELD).and_then(Value::as_object)?.get(name)
    }

    /// Returns the names of all runtime dependencies in declaration order.
    #[must_use]
    pub fn dependency_names(&self) -> Vec<String> {
        self.document
            .get(DEPENDENCIES_FIELD)
            .and_then(Value::as_object)
            .map(|deps| deps.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Replaces the specifier of an existing dependency.
    ///
    /// Returns `false` (and changes nothing) when the dependency is not declared.
    pub fn replace_dependency(&mut self, name: &str, specifier: impl Into<String>) -> bool {
        let Some(entry) = self
            .document
            .get_mut(DEPENDENCIES_FIELD)
            .and_then(Value::as_object_mut)
            .and_then(|deps| deps.get_mut(name))
        else {
            return false;
        };
        *entry = Value::String(specifier.into());
        true
    }

    /// Sets a dependency specifier, creating the dependencies object if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::FieldType`] when `dependencies` is not an object.
    pub fn set_dependency(
        &mut self,
        name: impl Into<String>,
        specifier: impl Into<String>,
    ) -> Result<(), ManifestError> {
        let deps = self
            .document
            .entry(DEPENDENCIES_FIELD)
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or(ManifestError::FieldType {
                field: DEPENDENCIES_FIELD,
                expected: "an object",
            })?;
        deps.insert(name.into(), Value::String(specifier.into()));
        Ok(())
    }

    /// Returns the published file entries that are strings.
    #[must_use]
    pub fn files(&self) -> Vec<&str> {
        self.document
            .get(FILES_FIELD)
            .and_then(Value::as_array)
            .map(|files| files.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Appends a published file entry unless it is already listed.
    ///
    /// Returns `true` when the entry was added.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::FieldType`] when `files` is not an array.
    pub fn ensure_file(&mut self, entry: &str) -> Result<bool, ManifestError> {
        let files = self
            .document
            .entry(FILES_FIELD)
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .ok_or(ManifestError::FieldType {
                field: FILES_FIELD,
                expected: "an array",
            })?;
        if files.iter().any(|existing| existing.as_str() == Some(entry)) {
            return Ok(false);
        }
        files.push(Value::String(entry.to_string()));
        Ok(true)
    }

    /// Returns a script command by name.
    #[must_use]
    pub fn script(&self, name: &str) -> Option<&str> {
        self.document.get(SCRIPTS_FIELD).and_then(Value::as_object)?.get(name)?.as_str()
    }

    /// Adds or overwrites a script command.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::FieldType`] when `scripts` is not an object.
    pub fn set_script(
        &mut self,
        name: impl Into<String>,
        command: impl Into<String>,
    ) -> Result<(), ManifestError> {
        let scripts = self
            .document
            .entry(SCRIPTS_FIELD)
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or(ManifestError::FieldType {
                field: SCRIPTS_FIELD,
                expected: "an object",
            })?;
        scripts.insert(name.into(), Value::String(command.into()));
        Ok(())
    }

    /// Returns the declared package manager.
    #[must_use]
    pub fn package_manager(&self) -> Option<&str> {
        self.document.get(PACKAGE_MANAGER_FIELD).and_then(Value::as_str)
    }

    /// Sets the declared package manager.
    pub fn set_package_manager(&mut self, value: impl Into<String>) {
        self.document.insert(PACKAGE_MANAGER_FIELD.to_string(), Value::String(value.into()));
    }

    /// Returns the underlying JSON document.
    #[must_use]
    pub const fn document(&self) -> &Map<String, Value> {
        &self.document
    }

    /// Serializes the manifest as two-space indented JSON with a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Json`] when serialization fails.
    pub fn to_pretty_bytes(&self) -> Result<Vec<u8>, ManifestError> {
        let mut bytes = serde_json::to_vec_pretty(&self.document)
            .map_err(|err| ManifestError::Json(err.to_string()))?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}
