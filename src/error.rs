use std::time::Duration;

use thiserror::Error;

use crate::parse::SyntaxError;
use crate::AssetError;

/// Unified error type for validating and evaluating filter expressions.
///
/// Every failure surfaces to the caller; nothing is retried. Runtimes that
/// failed during construction are never pooled.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("failed to load assets for key '{key}': {source}")]
    AssetLoad { key: String, source: AssetError },

    #[error("error evaluating {name}: {message}")]
    ScriptEvaluation { name: String, message: String },

    #[error("cannot bind parameter '{name}': {reason}")]
    Binding { name: String, reason: String },

    #[error("expression failed: {message}")]
    Execution { message: String },

    #[error("execution exceeded its budget of {budget:?}")]
    Timeout { budget: Duration },

    #[error("failed to create runtime: {message}")]
    Runtime { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_evaluation_message() {
        let err = FilterError::ScriptEvaluation {
            name: "helpers.js".into(),
            message: "ReferenceError: nope is not defined".into(),
        };
        assert_eq!(
            err.to_string(),
            "error evaluating helpers.js: ReferenceError: nope is not defined"
        );
    }

    #[test]
    fn binding_message() {
        let err = FilterError::Binding {
            name: "Math".into(),
            reason: "would shadow an existing global".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot bind parameter 'Math': would shadow an existing global"
        );
    }

    #[test]
    fn asset_load_message_and_source() {
        let err = FilterError::AssetLoad {
            key: "bundle".into(),
            source: AssetError::new("not found"),
        };
        assert_eq!(
            err.to_string(),
            "failed to load assets for key 'bundle': not found"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn timeout_message() {
        let err = FilterError::Timeout {
            budget: Duration::from_millis(20),
        };
        assert_eq!(err.to_string(), "execution exceeded its budget of 20ms");
    }

    #[test]
    fn syntax_is_transparent() {
        let err = FilterError::from(SyntaxError::new(Some(2), "unexpected token"));
        assert_eq!(
            err.to_string(),
            "syntax error in expression 2: unexpected token"
        );
    }
}
