//! Discovery of the external scalar values a stage's result depends on.
//!
//! The walk covers everything that defines a stage: pure values, update
//! values, arguments and reduction bounds, extern arguments, and the
//! constraints on its output buffers. Calls into other stages are followed
//! transitively. Expression nodes are shared, so the walk tracks visited
//! handles and never processes a node twice.

use std::collections::{BTreeMap, HashSet};

use stagememo_ir::{
    CallKind, Expression, ExternArgument, Function, Handle, Intrinsic, IrError, Module, Parameter,
    Scalar,
};

use crate::error::{CacheError, UnsupportedKind};

/// Prefix of the synthetic names given to `memoize_tag` operands.
pub const MEMOIZE_TAG_PREFIX: &str = "memoize_tag.";

/// Output-buffer constraints are only examined for this many dimensions.
const MAX_CONSTRAINED_DIMENSIONS: usize = 4;

/// Ordering key for one dependency.
///
/// Orders by byte size first and then by name, so smaller fields are laid
/// out first. The resulting byte order is part of the cache key format.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct DependencyKey {
    pub size: u32,
    pub name: String,
}

/// Where a dependency's value comes from when the key is generated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DependencyValue {
    /// The scalar value of a pipeline parameter.
    Parameter(Handle<Parameter>),
    /// The value of a `memoize_tag` operand.
    Expression(Handle<Expression>),
}

/// Payload for one dependency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyInfo {
    pub ty: Scalar,
    pub size: u32,
    pub value: DependencyValue,
}

/// Deduplicated dependencies in key order.
pub type DependencySet = BTreeMap<DependencyKey, DependencyInfo>;

/// Collects the dependency set of one stage.
pub struct DependencyCollector<'m> {
    module: &'m Module,
    /// The stage being cached; named in error messages.
    stage: String,
    visited_expressions: HashSet<Handle<Expression>>,
    visited_functions: HashSet<Handle<Function>>,
    dependencies: DependencySet,
}

impl<'m> DependencyCollector<'m> {
    /// Creates an empty collector reporting errors against `stage`.
    pub fn new(module: &'m Module, stage: impl Into<String>) -> Self {
        Self {
            module,
            stage: stage.into(),
            visited_expressions: HashSet::new(),
            visited_functions: HashSet::new(),
            dependencies: DependencySet::new(),
        }
    }

    /// Collects every dependency of `function`.
    pub fn collect(
        module: &'m Module,
        function: Handle<Function>,
    ) -> Result<DependencySet, CacheError> {
        let name = &lookup(&module.functions, function)?.name;
        let mut collector = Self::new(module, name.clone());
        collector.visit_function(function)?;
        Ok(collector.finish())
    }

    /// Returns the collected set.
    pub fn finish(self) -> DependencySet {
        self.dependencies
    }

    /// Walks everything that defines `handle`. Each stage is walked at most once.
    pub fn visit_function(&mut self, handle: Handle<Function>) -> Result<(), CacheError> {
        if !self.visited_functions.insert(handle) {
            return Ok(());
        }
        let module = self.module;
        let function = lookup(&module.functions, handle)?;

        for &value in &function.values {
            self.visit_expression(value)?;
        }

        for update in &function.updates {
            for &expr in update.values.iter().chain(&update.args) {
                self.visit_expression(expr)?;
            }
            if let Some(domain) = &update.domain {
                for rvar in &domain.variables {
                    self.visit_expression(rvar.min)?;
                    self.visit_expression(rvar.extent)?;
                }
            }
        }

        if let Some(ext) = &function.extern_definition {
            for (index, arg) in ext.args.iter().enumerate() {
                match arg {
                    ExternArgument::Stage(callee) => self.visit_function(*callee)?,
                    ExternArgument::Expr(expr) => self.visit_expression(*expr)?,
                    ExternArgument::Buffer(buffer) => {
                        return Err(self.unsupported(&buffer.name, UnsupportedKind::Buffer));
                    }
                    ExternArgument::ImageParam(param) => self.record_parameter(*param)?,
                    ExternArgument::Undefined => {
                        return Err(CacheError::UnrecognizedExternArgument {
                            stage: function.name.clone(),
                            index,
                        });
                    }
                }
            }
        }

        let dimensions = function.dimensions().min(MAX_CONSTRAINED_DIMENSIONS);
        for &output in &function.output_buffers {
            let param = lookup(&module.parameters, output)?;
            for dim in 0..dimensions {
                let Some(constraint) = param.constraint(dim) else {
                    continue;
                };
                for bound in [constraint.min, constraint.stride, constraint.extent]
                    .into_iter()
                    .flatten()
                {
                    self.visit_expression(bound)?;
                }
            }
        }

        Ok(())
    }

    /// Walks the expression DAG rooted at `root`.
    pub fn visit_expression(&mut self, root: Handle<Expression>) -> Result<(), CacheError> {
        let module = self.module;
        let mut worklist = vec![root];

        while let Some(handle) = worklist.pop() {
            if !self.visited_expressions.insert(handle) {
                continue;
            }
            let expr = lookup(&module.expressions, handle)?;

            if let Some(param) = expr.param() {
                self.record_parameter(param)?;
            }

            match expr {
                Expression::Call {
                    kind: CallKind::Intrinsic(Intrinsic::MemoizeTag),
                    args,
                    ..
                } => {
                    let [tagged] = args.as_slice() else {
                        return Err(CacheError::MalformedOpacityBracket {
                            stage: self.stage.clone(),
                            arity: args.len(),
                        });
                    };
                    // The bracketed expression is one opaque value.
                    self.record_expression(*tagged)?;
                    continue;
                }
                Expression::Call {
                    kind: CallKind::Stage(callee),
                    ..
                } => self.visit_function(*callee)?,
                _ => {}
            }

            // Reversed so operands are processed left to right.
            worklist.extend(expr.operands().into_iter().rev());
        }

        Ok(())
    }

    fn record_parameter(&mut self, handle: Handle<Parameter>) -> Result<(), CacheError> {
        let param = lookup(&self.module.parameters, handle)?;
        if param.is_buffer() {
            return Err(self.unsupported(&param.name, UnsupportedKind::Buffer));
        }
        if param.ty.is_handle() {
            return Err(self.unsupported(&param.name, UnsupportedKind::Handle));
        }
        self.insert(
            param.name.clone(),
            param.ty,
            DependencyValue::Parameter(handle),
        );
        Ok(())
    }

    fn record_expression(&mut self, handle: Handle<Expression>) -> Result<(), CacheError> {
        lookup(&self.module.expressions, handle)?;
        let name = format!("{MEMOIZE_TAG_PREFIX}{}", handle.index());
        let ty = self.module.expr_type(handle);
        if ty.is_handle() {
            return Err(self.unsupported(&name, UnsupportedKind::Handle));
        }
        self.insert(name, ty, DependencyValue::Expression(handle));
        Ok(())
    }

    fn insert(&mut self, name: String, ty: Scalar, value: DependencyValue) {
        let size = ty.bytes();
        log::trace!("stage '{}': dependency {name}: {ty}", self.stage);
        self.dependencies
            .insert(DependencyKey { size, name }, DependencyInfo { ty, size, value });
    }

    fn unsupported(&self, name: &str, kind: UnsupportedKind) -> CacheError {
        CacheError::UnsupportedDependencyType {
            stage: self.stage.clone(),
            name: name.to_string(),
            kind,
        }
    }
}

fn lookup<T>(arena: &stagememo_ir::Arena<T>, handle: Handle<T>) -> Result<&T, IrError> {
    arena.try_get(handle).ok_or(IrError::BadHandle {
        index: handle.index(),
        size: arena.len(),
    })
}
