//! IR validation pass.
//!
//! Checks structural invariants of the IR module and logs warnings for
//! problems found. This pass never modifies the module.

use stagememo_ir::{CallKind, Environment, Expression, ExternArgument, Handle, Module, Statement};

use crate::{Pass, PassError};

/// Validates IR structural invariants. Returns `Ok(false)` (never modifies the module).
#[derive(Debug)]
pub struct IrValidation;

impl Pass for IrValidation {
    fn name(&self) -> &str {
        "ir-validation"
    }

    fn run(&self, module: &mut Module) -> Result<bool, PassError> {
        validate_module(module);
        Ok(false)
    }
}

/// Logs every structural problem in `module` and returns how many were found.
pub fn validate_module(module: &Module) -> usize {
    let mut v = Validator {
        module,
        env: module.environment(),
        findings: 0,
    };

    for (handle, expr) in module.expressions.iter() {
        for operand in expr.operands() {
            v.check_expr(operand, &format!("expression {handle:?}"));
        }
        if let Some(param) = expr.param().filter(|&p| !module.parameters.contains(p)) {
            v.warn(format!(
                "expression {handle:?} references out-of-bounds parameter {param:?}"
            ));
        }
        match expr {
            Expression::Call {
                kind: CallKind::Stage(callee),
                ..
            } if !module.functions.contains(*callee) => {
                v.warn(format!(
                    "expression {handle:?} calls out-of-bounds stage {callee:?}"
                ));
            }
            _ => {}
        }
    }

    for (handle, param) in module.parameters.iter() {
        let context = format!("parameter '{}' ({handle:?})", param.name);
        let mut dim = 0;
        while let Some(constraint) = param.constraint(dim) {
            for bound in [constraint.min, constraint.stride, constraint.extent]
                .into_iter()
                .flatten()
            {
                v.check_expr(bound, &context);
            }
            dim += 1;
        }
    }

    for (handle, func) in module.functions.iter() {
        let context = format!("stage '{}' ({handle:?})", func.name);
        for &value in &func.values {
            v.check_expr(value, &context);
        }
        for update in &func.updates {
            for &expr in update.values.iter().chain(&update.args) {
                v.check_expr(expr, &context);
            }
            for rvar in update.domain.iter().flat_map(|d| &d.variables) {
                v.check_expr(rvar.min, &context);
                v.check_expr(rvar.extent, &context);
            }
        }
        if let Some(ext) = &func.extern_definition {
            for arg in &ext.args {
                match arg {
                    ExternArgument::Expr(expr) => v.check_expr(*expr, &context),
                    ExternArgument::Stage(callee) if !module.functions.contains(*callee) => {
                        v.warn(format!("{context}: extern argument names out-of-bounds stage {callee:?}"));
                    }
                    ExternArgument::ImageParam(param) if !module.parameters.contains(*param) => {
                        v.warn(format!("{context}: extern argument names out-of-bounds parameter {param:?}"));
                    }
                    _ => {}
                }
            }
        }
        for &output in &func.output_buffers {
            if !module.parameters.contains(output) {
                v.warn(format!("{context}: out-of-bounds output buffer {output:?}"));
            }
        }
    }

    v.check_statement(&module.body);
    v.findings
}

struct Validator<'m> {
    module: &'m Module,
    env: Environment,
    findings: usize,
}

impl Validator<'_> {
    fn warn(&mut self, message: String) {
        log::warn!("{message}");
        self.findings += 1;
    }

    fn check_expr(&mut self, handle: Handle<Expression>, context: &str) {
        let len = self.module.expressions.len();
        if handle.index() >= len {
            self.warn(format!(
                "{context} references out-of-bounds expression {handle:?} (arena size {len})"
            ));
        }
    }

    fn check_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Store { buffer, index, value } => {
                let context = format!("store to '{buffer}'");
                self.check_expr(*index, &context);
                self.check_expr(*value, &context);
            }
            Statement::Evaluate(expr) => self.check_expr(*expr, "evaluate"),
            Statement::Block(stmts) => {
                for s in stmts {
                    self.check_statement(s);
                }
            }
            Statement::If {
                condition,
                accept,
                reject,
            } => {
                self.check_expr(*condition, "if condition");
                self.check_statement(accept);
                if let Some(reject) = reject {
                    self.check_statement(reject);
                }
            }
            Statement::Let { name, value, body } => {
                self.check_expr(*value, &format!("let '{name}'"));
                self.check_statement(body);
            }
            Statement::Allocate {
                name,
                extents,
                body,
                ..
            } => {
                for &extent in extents {
                    self.check_expr(extent, &format!("allocate '{name}'"));
                }
                self.check_statement(body);
            }
            Statement::For {
                name,
                min,
                extent,
                body,
            } => {
                let context = format!("loop '{name}'");
                self.check_expr(*min, &context);
                self.check_expr(*extent, &context);
                self.check_statement(body);
            }
            Statement::Stage {
                name,
                produce,
                update,
                consume,
            } => {
                if !self.env.contains_key(name) {
                    self.warn(format!("stage node '{name}' has no definition"));
                }
                for phase in [produce, update, consume].into_iter().flatten() {
                    self.check_statement(phase);
                }
            }
        }
    }
}
