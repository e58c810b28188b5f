//! Structure-preserving statement rewriting.
//!
//! Implementors override [`StmtMutator::mutate`] for the statements they
//! care about and call [`walk_statement`] for everything else, which
//! rebuilds the node with each child statement passed back through
//! `mutate`. Expression handles are carried over unchanged.

use crate::stmt::Statement;

/// A fallible rewrite over a statement tree.
pub trait StmtMutator {
    type Error;

    /// Rewrites one statement. The default recurses structurally.
    fn mutate(&mut self, stmt: Statement) -> Result<Statement, Self::Error> {
        walk_statement(self, stmt)
    }
}

/// Rebuilds `stmt` with every child statement rewritten by `mutator`.
pub fn walk_statement<M: StmtMutator + ?Sized>(
    mutator: &mut M,
    stmt: Statement,
) -> Result<Statement, M::Error> {
    Ok(match stmt {
        Statement::Store { .. } | Statement::Evaluate(_) => stmt,
        Statement::Block(stmts) => Statement::Block(
            stmts
                .into_iter()
                .map(|s| mutator.mutate(s))
                .collect::<Result<_, _>>()?,
        ),
        Statement::If {
            condition,
            accept,
            reject,
        } => Statement::If {
            condition,
            accept: mutate_boxed(mutator, accept)?,
            reject: mutate_optional(mutator, reject)?,
        },
        Statement::Let { name, value, body } => Statement::Let {
            name,
            value,
            body: mutate_boxed(mutator, body)?,
        },
        Statement::Allocate {
            name,
            ty,
            extents,
            body,
        } => Statement::Allocate {
            name,
            ty,
            extents,
            body: mutate_boxed(mutator, body)?,
        },
        Statement::For {
            name,
            min,
            extent,
            body,
        } => Statement::For {
            name,
            min,
            extent,
            body: mutate_boxed(mutator, body)?,
        },
        Statement::Stage {
            name,
            produce,
            update,
            consume,
        } => Statement::Stage {
            name,
            produce: mutate_optional(mutator, produce)?,
            update: mutate_optional(mutator, update)?,
            consume: mutate_optional(mutator, consume)?,
        },
    })
}

/// Rewrites a boxed child.
pub fn mutate_boxed<M: StmtMutator + ?Sized>(
    mutator: &mut M,
    stmt: Box<Statement>,
) -> Result<Box<Statement>, M::Error> {
    mutator.mutate(*stmt).map(Box::new)
}

/// Rewrites an optional boxed child; an absent child stays absent.
pub fn mutate_optional<M: StmtMutator + ?Sized>(
    mutator: &mut M,
    stmt: Option<Box<Statement>>,
) -> Result<Option<Box<Statement>>, M::Error> {
    stmt.map(|s| mutate_boxed(mutator, s)).transpose()
}
