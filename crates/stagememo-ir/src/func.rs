//! Stage definitions: the pure, update and extern parts of a pipeline stage.

use crate::arena::Handle;
use crate::expr::Expression;
use crate::param::Parameter;
use crate::types::Scalar;

/// One variable of a reduction domain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReductionVariable {
    pub name: String,
    pub min: Handle<Expression>,
    pub extent: Handle<Expression>,
}

/// The iteration domain of an update definition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReductionDomain {
    pub variables: Vec<ReductionVariable>,
}

/// An update (reduction) definition: `stage(args) = values`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateDefinition {
    pub values: Vec<Handle<Expression>>,
    pub args: Vec<Handle<Expression>>,
    pub domain: Option<ReductionDomain>,
}

/// A buffer passed by name to an extern stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferRef {
    pub name: String,
    pub ty: Scalar,
}

/// An argument to an extern stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExternArgument {
    /// Another stage, passed by its realized buffer.
    Stage(Handle<Function>),
    /// A scalar expression.
    Expr(Handle<Expression>),
    /// A concrete buffer.
    Buffer(BufferRef),
    /// An input image parameter.
    ImageParam(Handle<Parameter>),
    /// An argument slot that was never filled in.
    Undefined,
}

/// A stage computed by an external function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternDefinition {
    pub name: String,
    pub args: Vec<ExternArgument>,
    pub dimensions: usize,
}

/// Scheduling directives relevant to this crate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Schedule {
    /// Memoize the stage's result across pipeline invocations.
    pub cached: bool,
}

/// A named pipeline stage definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    /// Pure argument names, one per dimension.
    pub args: Vec<String>,
    /// Pure definition values; empty when the stage has no pure definition.
    pub values: Vec<Handle<Expression>>,
    pub updates: Vec<UpdateDefinition>,
    pub extern_definition: Option<ExternDefinition>,
    /// Output buffer parameters, carrying per-dimension constraints.
    pub output_buffers: Vec<Handle<Parameter>>,
    pub schedule: Schedule,
}

impl Function {
    /// Creates an empty stage with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            values: Vec::new(),
            updates: Vec::new(),
            extern_definition: None,
            output_buffers: Vec::new(),
            schedule: Schedule::default(),
        }
    }

    /// Returns `true` if the stage has a pure definition.
    pub fn has_pure_definition(&self) -> bool {
        !self.values.is_empty()
    }

    /// Returns `true` if the stage is computed by an external function.
    pub fn has_extern_definition(&self) -> bool {
        self.extern_definition.is_some()
    }

    /// Dimensionality of the stage's output.
    pub fn dimensions(&self) -> usize {
        match &self.extern_definition {
            Some(ext) => ext.dimensions,
            None => self.args.len(),
        }
    }
}
