//! stagememo intermediate representation.
//!
//! An arena-based IR for staged pipelines: scalar expressions are shared
//! nodes in a module-wide arena (a DAG), statements form an owned tree,
//! and stage definitions describe how each stage's values are computed.

pub mod arena;
mod display;
mod error;
mod expr;
mod func;
pub mod mutate;
mod param;
mod stmt;
mod types;

use std::collections::BTreeMap;

pub use arena::{Arena, Handle};
pub use display::{dump_module, format_expr};
pub use error::IrError;
pub use expr::{BinaryOp, CallKind, Expression, Intrinsic, Literal, UnaryOp};
pub use func::{
    BufferRef, ExternArgument, ExternDefinition, Function, ReductionDomain, ReductionVariable,
    Schedule, UpdateDefinition,
};
pub use mutate::{StmtMutator, walk_statement};
pub use param::{DimensionConstraint, Parameter, ParameterKind};
pub use stmt::Statement;
pub use types::{Bytes, Scalar, ScalarKind};

/// Map from stage name to its definition.
///
/// Ordered so that anything iterating it does so deterministically.
pub type Environment = BTreeMap<String, Handle<Function>>;

/// A lowered pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct Module {
    /// Pipeline parameters.
    pub parameters: Arena<Parameter>,
    /// Every expression node of the pipeline.
    pub expressions: Arena<Expression>,
    /// Stage definitions.
    pub functions: Arena<Function>,
    /// The program tree.
    pub body: Statement,
}

impl Default for Module {
    fn default() -> Self {
        Self {
            parameters: Arena::new(),
            expressions: Arena::new(),
            functions: Arena::new(),
            body: Statement::no_op(),
        }
    }
}

impl Module {
    /// Builds the name → definition map. Later definitions shadow earlier
    /// ones with the same name.
    pub fn environment(&self) -> Environment {
        self.functions
            .iter()
            .map(|(handle, f)| (f.name.clone(), handle))
            .collect()
    }

    /// Looks up a stage definition by name.
    pub fn function_by_name(&self, name: &str) -> Result<Handle<Function>, IrError> {
        self.functions
            .iter()
            .filter(|(_, f)| f.name == name)
            .map(|(handle, _)| handle)
            .last()
            .ok_or_else(|| IrError::UnknownFunction(name.to_string()))
    }

    /// Looks up a parameter by name.
    pub fn parameter_by_name(&self, name: &str) -> Result<Handle<Parameter>, IrError> {
        self.parameters
            .iter()
            .find(|(_, p)| p.name == name)
            .map(|(handle, _)| handle)
            .ok_or_else(|| IrError::UnknownParameter(name.to_string()))
    }

    /// Appends an expression node.
    pub fn append(&mut self, expr: Expression) -> Handle<Expression> {
        self.expressions.append(expr)
    }

    /// Appends a literal.
    pub fn literal(&mut self, lit: Literal) -> Handle<Expression> {
        self.append(Expression::Literal(lit))
    }

    /// Adds a parameter.
    pub fn add_parameter(&mut self, param: Parameter) -> Handle<Parameter> {
        self.parameters.append(param)
    }

    /// Adds a stage definition.
    pub fn add_function(&mut self, function: Function) -> Handle<Function> {
        self.functions.append(function)
    }

    /// Appends a variable that reads the scalar value of `param`.
    ///
    /// For buffer parameters the variable is handle-typed and names the buffer.
    pub fn param_ref(&mut self, param: Handle<Parameter>) -> Handle<Expression> {
        let p = &self.parameters[param];
        let ty = if p.is_buffer() { Scalar::HANDLE } else { p.ty };
        let name = p.name.clone();
        self.append(Expression::Variable {
            name,
            ty,
            param: Some(param),
        })
    }

    /// Returns the scalar type of an expression.
    pub fn expr_type(&self, handle: Handle<Expression>) -> Scalar {
        match &self.expressions[handle] {
            Expression::Literal(lit) => lit.scalar(),
            Expression::StringImm(_) => Scalar::HANDLE,
            Expression::Variable { ty, .. }
            | Expression::Load { ty, .. }
            | Expression::Cast { ty, .. }
            | Expression::Call { ty, .. } => *ty,
            Expression::Unary {
                op: UnaryOp::LogicalNot,
                ..
            } => Scalar::BOOL,
            Expression::Unary { expr, .. } => self.expr_type(*expr),
            Expression::Binary { op, left, .. } => {
                if op.is_predicate() {
                    Scalar::BOOL
                } else {
                    self.expr_type(*left)
                }
            }
            Expression::Select { accept, .. } => self.expr_type(*accept),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_maps_names_to_definitions() {
        let mut module = Module::default();
        let f = module.add_function(Function::new("f"));
        let g = module.add_function(Function::new("g"));
        let env = module.environment();
        assert_eq!(env.get("f"), Some(&f));
        assert_eq!(env.get("g"), Some(&g));
        assert_eq!(module.function_by_name("g").ok(), Some(g));
        assert!(matches!(
            module.function_by_name("h"),
            Err(IrError::UnknownFunction(name)) if name == "h"
        ));
    }

    #[test]
    fn expr_types() {
        let mut module = Module::default();
        let radius = module.add_parameter(Parameter::scalar("radius", Scalar::I16));
        let r = module.param_ref(radius);
        let one = module.literal(Literal::I32(1));
        let sum = module.append(Expression::Binary {
            op: BinaryOp::Add,
            left: r,
            right: one,
        });
        let less = module.append(Expression::Binary {
            op: BinaryOp::Less,
            left: r,
            right: one,
        });
        assert_eq!(module.expr_type(sum), Scalar::I16);
        assert_eq!(module.expr_type(less), Scalar::BOOL);
    }

    #[test]
    fn buffer_param_ref_is_handle_typed() {
        let mut module = Module::default();
        let input = module.add_parameter(Parameter::buffer("input", Scalar::F32, 2));
        let r = module.param_ref(input);
        assert_eq!(module.expr_type(r), Scalar::HANDLE);
        assert_eq!(module.parameter_by_name("input").ok(), Some(input));
    }
}
