//! Validated store for loading and saving JSON configuration files.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use super::schema::Schema;
use crate::error::{DeployError, Result};

/// A JSON file at a known path, validated against `T`'s schema.
#[derive(Debug, Clone)]
pub struct ValidatedStore<T> {
    path: PathBuf,
    _schema: PhantomData<T>,
}

impl<T: Schema> ValidatedStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _schema: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, or `None` when the file does not exist.
    pub fn load(&self) -> Result<Option<T>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %self.path.display(), "loading {}", T::LABEL);
        decode(&content, &self.path.display().to_string()).map(Some)
    }

    /// Load the document, treating a missing file as empty.
    pub fn load_or_default(&self) -> Result<T> {
        Ok(self.load()?.unwrap_or_default())
    }

    /// Validate and write the document.
    pub fn save(&self, document: &T) -> Result<()> {
        let value = serde_json::to_value(document)?;
        ensure_valid(&value, &self.path.display().to_string(), T::validate)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&value)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Parse, validate and decode a document.
///
/// Syntax errors and schema violations are both fatal; no partially
/// valid document is ever returned.
pub fn decode<T: Schema>(content: &str, label: &str) -> Result<T> {
    let value: Value = serde_json::from_str(content)
        .map_err(|err| DeployError::config(format!("Invalid JSON in {} file: {}", label, err)))?;
    ensure_valid(&value, label, T::validate)?;
    Ok(serde_json::from_value(value)?)
}

fn ensure_valid(
    value: &Value,
    label: &str,
    validate: fn(&Value) -> Vec<super::validate::Violation>,
) -> Result<()> {
    let violations = validate(value);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(DeployError::Schema {
            path: label.to_string(),
            violations,
        })
    }
}
