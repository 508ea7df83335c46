use thiserror::Error;

use crate::symbol::SymbolType;

/// Usage errors raised by symbol operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SymbolError {
    #[error("Symbol layer index {index} out of range (symbol has {count} layers)")]
    LayerIndexOutOfRange { index: usize, count: usize },

    #[error("Operation requires a {expected:?} symbol, but this is a {found:?} symbol")]
    SymbolTypeMismatch {
        expected: SymbolType,
        found: SymbolType,
    },
}

/// Failure of an external coordinate transform.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Point ({x}, {y}) cannot be transformed: {message}")]
    Failed { x: f64, y: f64, message: String },
}
