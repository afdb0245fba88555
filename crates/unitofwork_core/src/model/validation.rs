//! Validation findings attached to entities and type tokens.
//!
//! # Responsibility
//! - Hold the error-code → message map written by pre-action handlers.
//! - Provide a standalone holder for targets that are not entities.
//!
//! # Invariants
//! - The map is never cleared by the core; only the owner replaces it.
//! - Strict `add` rejects duplicate codes within one map.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while recording validation findings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("validation code `{0}` was already recorded")]
    DuplicateKey(String),
}

/// Ordered mapping from validation code to human-readable message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationResults {
    entries: BTreeMap<String, String>,
}

impl ValidationResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one finding, failing when `code` is already present.
    pub fn add(
        &mut self,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let code = code.into();
        if self.entries.contains_key(code.as_str()) {
            return Err(ValidationError::DuplicateKey(code));
        }
        self.entries.insert(code, message.into());
        Ok(())
    }

    /// Records one finding, replacing any previous message for `code`.
    pub fn set(&mut self, code: impl Into<String>, message: impl Into<String>) {
        self.entries.insert(code.into(), message.into());
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.entries.get(code).map(String::as_str)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.entries.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(code, message)| (code.as_str(), message.as_str()))
    }

    /// Comma-separated codes, used in log lines.
    pub fn codes(&self) -> String {
        self.entries
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Access to the validation map carried by a pre-action target.
pub trait Validatable {
    fn validation_results(&self) -> &ValidationResults;
    fn validation_results_mut(&mut self) -> &mut ValidationResults;
}

/// Standalone findings holder used when the target is a bare type token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub validation_results: ValidationResults,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Validatable for ValidationResult {
    fn validation_results(&self) -> &ValidationResults {
        &self.validation_results
    }

    fn validation_results_mut(&mut self) -> &mut ValidationResults {
        &mut self.validation_results
    }
}
