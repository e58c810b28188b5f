//! Pipeline parameters: named external inputs.

use crate::arena::Handle;
use crate::expr::Expression;
use crate::types::Scalar;

/// Optional per-dimension constraints on a buffer parameter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DimensionConstraint {
    pub min: Option<Handle<Expression>>,
    pub stride: Option<Handle<Expression>>,
    pub extent: Option<Handle<Expression>>,
}

/// Whether a parameter is a single scalar or a whole buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParameterKind {
    /// A scalar value passed by the caller.
    Scalar,
    /// A buffer of `ty` elements with the given dimensionality.
    Buffer {
        dimensions: usize,
        constraints: Vec<DimensionConstraint>,
    },
}

/// A named external input to the pipeline.
///
/// For buffer parameters, `ty` is the element type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub ty: Scalar,
    pub kind: ParameterKind,
}

impl Parameter {
    /// Creates a scalar parameter.
    pub fn scalar(name: impl Into<String>, ty: Scalar) -> Self {
        Self {
            name: name.into(),
            ty,
            kind: ParameterKind::Scalar,
        }
    }

    /// Creates an unconstrained buffer parameter.
    pub fn buffer(name: impl Into<String>, ty: Scalar, dimensions: usize) -> Self {
        Self {
            name: name.into(),
            ty,
            kind: ParameterKind::Buffer {
                dimensions,
                constraints: vec![DimensionConstraint::default(); dimensions],
            },
        }
    }

    /// Returns `true` if this parameter names a buffer.
    pub fn is_buffer(&self) -> bool {
        matches!(self.kind, ParameterKind::Buffer { .. })
    }

    /// Constraints for dimension `dim`, if this is a buffer with that many dimensions.
    pub fn constraint(&self, dim: usize) -> Option<&DimensionConstraint> {
        match &self.kind {
            ParameterKind::Scalar => None,
            ParameterKind::Buffer { constraints, .. } => constraints.get(dim),
        }
    }

    /// Mutable access to the constraints for dimension `dim`.
    pub fn constraint_mut(&mut self, dim: usize) -> Option<&mut DimensionConstraint> {
        match &mut self.kind {
            ParameterKind::Scalar => None,
            ParameterKind::Buffer { constraints, .. } => constraints.get_mut(dim),
        }
    }
}
