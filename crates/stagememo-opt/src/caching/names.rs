//! Collision-free names for symbols the pass introduces.

use std::collections::HashSet;

use stagememo_ir::{Expression, Module, Statement};

/// Hands out names that are not yet bound anywhere in a module.
///
/// Seeded with every name the module already uses; each name it returns is
/// reserved, so two requests for the same base never collide either.
#[derive(Clone, Debug, Default)]
pub struct NameAllocator {
    taken: HashSet<String>,
}

impl NameAllocator {
    /// Creates an allocator that avoids every name used in `module`.
    pub fn for_module(module: &Module) -> Self {
        let mut names = Self::default();
        for (_, param) in module.parameters.iter() {
            names.reserve(&param.name);
        }
        for (_, function) in module.functions.iter() {
            names.reserve(&function.name);
        }
        for (_, expr) in module.expressions.iter() {
            match expr {
                Expression::Variable { name, .. } => names.reserve(name),
                Expression::Load { buffer, .. } => names.reserve(buffer),
                _ => {}
            }
        }
        names.reserve_statement(&module.body);
        names
    }

    /// Marks `name` as used.
    pub fn reserve(&mut self, name: &str) {
        self.taken.insert(name.to_string());
    }

    /// Returns `true` if `name` is already used.
    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    /// Returns `base` if it is free, otherwise `base$N` for the smallest free `N`.
    pub fn fresh(&mut self, base: &str) -> String {
        let mut candidate = base.to_string();
        let mut suffix = 0;
        while self.taken.contains(&candidate) {
            suffix += 1;
            candidate = format!("{base}${suffix}");
        }
        self.taken.insert(candidate.clone());
        candidate
    }

    /// Name for the key buffer of `stage`.
    pub fn cache_key(&mut self, stage: &str) -> String {
        self.fresh(&format!("{stage}.cache_key"))
    }

    /// Name for the lookup result of `stage`.
    pub fn cache_miss(&mut self, stage: &str) -> String {
        self.fresh(&format!("{stage}.cache_miss"))
    }

    fn reserve_statement(&mut self, stmt: &Statement) {
        if let Some(name) = stmt.bound_name() {
            self.reserve(name);
        }
        match stmt {
            Statement::Store { buffer, .. } => self.reserve(buffer),
            Statement::Evaluate(_) => {}
            Statement::Block(stmts) => {
                for s in stmts {
                    self.reserve_statement(s);
                }
            }
            Statement::If { accept, reject, .. } => {
                self.reserve_statement(accept);
                if let Some(reject) = reject {
                    self.reserve_statement(reject);
                }
            }
            Statement::Let { body, .. }
            | Statement::Allocate { body, .. }
            | Statement::For { body, .. } => self.reserve_statement(body),
            Statement::Stage {
                produce,
                update,
                consume,
                ..
            } => {
                for phase in [produce, update, consume].into_iter().flatten() {
                    self.reserve_statement(phase);
                }
            }
        }
    }
}

/// The buffer a stage's realized values live in.
pub fn result_buffer_name(stage: &str) -> String {
    format!("{stage}.buffer")
}
