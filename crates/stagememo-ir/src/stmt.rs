//! Statements: operations with side effects and control flow.

use crate::arena::Handle;
use crate::expr::Expression;
use crate::types::Scalar;

/// A statement in the IR.
///
/// Statements form an owned tree; the expressions they operate on are
/// referenced by handle.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// Write `value` at byte offset `index` of `buffer`. The store may be unaligned.
    Store {
        buffer: String,
        index: Handle<Expression>,
        value: Handle<Expression>,
    },
    /// Evaluate an expression for its side effects.
    Evaluate(Handle<Expression>),
    /// Run statements in order.
    Block(Vec<Statement>),
    /// Conditional.
    If {
        condition: Handle<Expression>,
        accept: Box<Statement>,
        reject: Option<Box<Statement>>,
    },
    /// Bind `name` to `value` within `body`.
    Let {
        name: String,
        value: Handle<Expression>,
        body: Box<Statement>,
    },
    /// Scoped allocation, released when `body` exits.
    Allocate {
        name: String,
        ty: Scalar,
        extents: Vec<Handle<Expression>>,
        body: Box<Statement>,
    },
    /// Serial loop over `[min, min + extent)`.
    For {
        name: String,
        min: Handle<Expression>,
        extent: Handle<Expression>,
        body: Box<Statement>,
    },
    /// Realization of a pipeline stage with up to three phases.
    Stage {
        name: String,
        produce: Option<Box<Statement>>,
        update: Option<Box<Statement>>,
        consume: Option<Box<Statement>>,
    },
}

impl Statement {
    /// An empty block.
    pub fn no_op() -> Self {
        Self::Block(Vec::new())
    }

    /// Returns `true` for an empty block.
    pub fn is_no_op(&self) -> bool {
        matches!(self, Self::Block(stmts) if stmts.is_empty())
    }

    /// The symbol this statement binds for its body, if any.
    pub fn bound_name(&self) -> Option<&str> {
        match self {
            Self::Let { name, .. }
            | Self::Allocate { name, .. }
            | Self::For { name, .. }
            | Self::Stage { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::expr::Literal;

    #[test]
    fn build_if_statement() {
        let mut exprs = Arena::new();
        let cond = exprs.append(Expression::Literal(Literal::Bool(true)));
        let stmt = Statement::If {
            condition: cond,
            accept: Box::new(Statement::Evaluate(cond)),
            reject: None,
        };
        if let Statement::If { accept, reject, .. } = &stmt {
            assert_eq!(**accept, Statement::Evaluate(cond));
            assert!(reject.is_none());
        } else {
            panic!("expected If");
        }
    }

    #[test]
    fn no_op_is_empty_block() {
        assert!(Statement::no_op().is_no_op());
        assert!(!Statement::Block(vec![Statement::no_op()]).is_no_op());
    }

    #[test]
    fn stage_binds_its_name() {
        let stage = Statement::Stage {
            name: "blur".into(),
            produce: None,
            update: None,
            consume: None,
        };
        assert_eq!(stage.bound_name(), Some("blur"));
        assert_eq!(Statement::no_op().bound_name(), None);
    }
}
