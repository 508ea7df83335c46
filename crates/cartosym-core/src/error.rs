use thiserror::Error;

/// Failure to evaluate a data-defined property. Always recoverable: callers
/// fall back to the static value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Field '{0}' does not exist")]
    MissingField(String),

    #[error("No feature available for evaluation")]
    NoFeature,

    #[error("No expression engine configured")]
    NoEngine,

    #[error("Expression parse error: {0}")]
    Parse(String),

    #[error("Expected a {expected} value, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Expression evaluation failed: {0}")]
    Engine(String),
}
