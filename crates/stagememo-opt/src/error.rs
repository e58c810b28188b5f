//! Error types for the pass pipeline.

use std::fmt;

use stagememo_ir::IrError;

/// Why a dependency cannot be serialized into a cache key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnsupportedKind {
    /// A whole buffer rather than a scalar.
    Buffer,
    /// An opaque handle whose pointee is unknown.
    Handle,
}

impl fmt::Display for UnsupportedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Buffer => "buffer",
            Self::Handle => "handle",
        })
    }
}

/// Errors raised while synthesizing caching for a stage.
///
/// All of them are fatal: the stage cannot be cached without risking a
/// key that does not identify its inputs.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A buffer- or handle-typed value is reachable as a dependency.
    #[error(
        "cannot cache stage '{stage}': it depends on {kind} parameter '{name}', \
         which cannot be part of a cache key"
    )]
    UnsupportedDependencyType {
        stage: String,
        name: String,
        kind: UnsupportedKind,
    },

    /// `memoize_tag` was called with other than one argument.
    #[error("stage '{stage}': memoize_tag takes exactly one argument, found {arity}")]
    MalformedOpacityBracket { stage: String, arity: usize },

    /// An extern stage argument slot was never filled in.
    #[error("extern stage '{stage}': unrecognized argument at position {index}")]
    UnrecognizedExternArgument { stage: String, index: usize },

    /// The key would not fit the 32-bit sizes used on the wire.
    #[error("stage '{stage}': cache key exceeds {max} bytes", max = i32::MAX)]
    KeyTooLarge { stage: String },

    #[error(transparent)]
    Ir(#[from] IrError),
}

/// Errors returned by [`Pass::run`](crate::Pass::run).
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error(transparent)]
    Caching(#[from] CacheError),
}
