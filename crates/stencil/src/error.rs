//! Error types for template registration and rendering.
//!
//! This module provides [`Error`], the single error type returned by every
//! fallible operation in the crate. Engine failures are carried through
//! unchanged so callers can inspect the original error.

use thiserror::Error;

/// Errors that can occur while registering or rendering templates.
#[derive(Debug, Error)]
pub enum Error {
    /// A template record failed validation.
    ///
    /// `value` is the JSON rendering of the offending value so the message is
    /// useful without access to the source.
    #[error("{method}: expected `{field}` to be valid, got {value}")]
    Validation {
        method: &'static str,
        field: &'static str,
        value: String,
    },

    /// No engine is registered for the resolved extension.
    #[error("no engine registered for \"{ext}\" (template \"{template}\")")]
    EngineNotFound { ext: String, template: String },

    /// The selected engine does not implement the requested operation.
    #[error("engine \"{engine}\" does not support `{method}`")]
    EngineCapability {
        engine: String,
        method: &'static str,
    },

    /// A MiniJinja compile or render error, passed through untouched.
    #[error(transparent)]
    Template(#[from] minijinja::Error),

    /// An error reported by an engine without a typed error of its own.
    #[error("engine error: {0}")]
    Engine(String),

    /// The named collection has not been created.
    #[error("collection not found: \"{name}\"")]
    CollectionNotFound { name: String },

    /// JSON conversion failed.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML front matter or settings could not be parsed.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Builds a validation error, rendering `value` as JSON.
    pub fn validation(
        method: &'static str,
        field: &'static str,
        value: &serde_json::Value,
    ) -> Self {
        Self::Validation {
            method,
            field,
            value: value.to_string(),
        }
    }

    /// Builds a capability error for an engine that lacks `method`.
    pub fn capability(engine: impl Into<String>, method: &'static str) -> Self {
        Self::EngineCapability {
            engine: engine.into(),
            method,
        }
    }
}

/// Result type for stencil operations.
pub type Result<T> = std::result::Result<T, Error>;
