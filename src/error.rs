//! Error types for schema-forge
//!
//! This module defines the custom error type used throughout the engine.
//! `EngineError` covers every failure mode described by the error-handling
//! design: configuration, parsing, reflection, statement application,
//! connectivity, and user cancellation. It is serializable so the CLI can
//! emit `--display json` diagnostics the same way the engine's callers see
//! them internally.

use serde::Serializer;
use thiserror::Error;

/// The engine's error type.
///
/// Every variant carries a one-line message; variants that can name a SQL
/// statement or a file/table context carry those too, per the error-handling
/// design. No error is ever translated into silent success.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The configuration record is missing required fields, or points at a
    /// file that cannot be read. Fatal: no target is touched.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A declaration or seed file is malformed. Non-fatal: the offending
    /// file is skipped with a warning; other files continue.
    #[error("parse error in {file}: {message}")]
    Parse { file: String, message: String },

    /// A catalog read failed. The affected table is skipped (treated as
    /// unknown); the caller is warned.
    #[error("reflection error for table {table}: {message}")]
    Reflection { table: String, message: String },

    /// Application of one statement failed. Recorded in the result list;
    /// subsequent statements for the same target continue.
    #[error("statement error: {message} (sql: {sql})")]
    Statement { sql: String, message: String },

    /// The executor port reported a hard failure. The current target is
    /// aborted; the orchestrator moves on to the next target.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// Interactive confirmation was declined. The current target is
    /// aborted cleanly, leaving any already-applied statements in place.
    #[error("user cancelled: {0}")]
    UserCancel(String),
}

impl EngineError {
    /// Short machine-readable discriminant, used by the `Serialize` impl
    /// and by callers that branch on error kind without matching variants.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Configuration(_) => "configuration",
            EngineError::Parse { .. } => "parse",
            EngineError::Reflection { .. } => "reflection",
            EngineError::Statement { .. } => "statement",
            EngineError::Connectivity(_) => "connectivity",
            EngineError::UserCancel(_) => "user_cancel",
        }
    }
}

impl serde::Serialize for EngineError {
    /// Serialize the error as `{"kind": "...", "message": "..."}`, mirroring
    /// the structured-diagnostic shape callers expect from a CLI tool.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("EngineError", 2)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let error = EngineError::Connectivity("timeout".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"kind\":\"connectivity\""));
        assert!(json.contains("\"message\":"));
    }

    #[test]
    fn test_statement_error_display() {
        let error = EngineError::Statement {
            sql: "ALTER TABLE \"t\" ADD COLUMN \"c\" TEXT".to_string(),
            message: "relation does not exist".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "statement error: relation does not exist (sql: ALTER TABLE \"t\" ADD COLUMN \"c\" TEXT)"
        );
    }
}
