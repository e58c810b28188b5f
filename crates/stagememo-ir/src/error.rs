//! Error types for the stagememo IR.

/// Errors that can occur when constructing or querying IR.
#[derive(Debug, thiserror::Error)]
pub enum IrError {
    /// A handle index is out of bounds for its arena.
    #[error("handle index {index} out of bounds (arena size: {size})")]
    BadHandle { index: usize, size: usize },

    /// No stage definition exists under the given name.
    #[error("unknown stage '{0}'")]
    UnknownFunction(String),

    /// No parameter exists under the given name.
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),
}
