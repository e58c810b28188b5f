//! Lowering pass: `PipelineDesc` → `stagememo_ir::Module`.

use std::collections::HashMap;

use stagememo_ir::{
    BinaryOp, BufferRef, CallKind, DimensionConstraint, Expression, ExternArgument,
    ExternDefinition, Function, Handle, Intrinsic, Literal, Module, Parameter, ReductionDomain,
    ReductionVariable, Scalar, Statement, UnaryOp, UpdateDefinition,
};

use crate::ParseError;
use crate::desc::{
    BinaryOpDesc, ConstraintDesc, ExprDesc, ExternArgDesc, ParamDesc, PipelineDesc, StageDesc,
    UnaryOpDesc,
};

/// Largest dimensionality accepted for buffers and extern stages.
pub const MAX_DIMENSIONS: usize = 16;

fn check_dimensions(owner: &str, dimensions: usize) -> Result<usize, ParseError> {
    if dimensions > MAX_DIMENSIONS {
        return Err(ParseError::Lowering(format!(
            "'{owner}' has {dimensions} dimensions (at most {MAX_DIMENSIONS} allowed)"
        )));
    }
    Ok(dimensions)
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Lowering context. Parameter and variable references are interned so each
/// name lowers to one shared node.
struct LowerCtx {
    module: Module,
    param_refs: HashMap<String, Handle<Expression>>,
    var_refs: HashMap<String, Handle<Expression>>,
    /// Result type of each lowered stage, for typing calls to it.
    stage_types: HashMap<String, Scalar>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn lower_pipeline(desc: &PipelineDesc) -> Result<Module, ParseError> {
    let mut ctx = LowerCtx {
        module: Module::default(),
        param_refs: HashMap::new(),
        var_refs: HashMap::new(),
        stage_types: HashMap::new(),
    };

    for param in &desc.params {
        ctx.lower_parameter(param)?;
    }
    let mut handles = Vec::with_capacity(desc.stages.len());
    for stage in &desc.stages {
        handles.push(ctx.lower_stage(stage)?);
    }
    ctx.module.body = ctx.build_body(&handles);

    log::debug!(
        "lowered pipeline '{}': {} parameters, {} stages, {} expressions",
        desc.name,
        ctx.module.parameters.len(),
        ctx.module.functions.len(),
        ctx.module.expressions.len()
    );
    Ok(ctx.module)
}

// ---------------------------------------------------------------------------
// Parameters and stages
// ---------------------------------------------------------------------------

impl LowerCtx {
    fn lower_parameter(&mut self, desc: &ParamDesc) -> Result<(), ParseError> {
        if self.module.parameter_by_name(&desc.name).is_ok() {
            return Err(ParseError::Lowering(format!(
                "parameter '{}' declared twice",
                desc.name
            )));
        }
        let ty = lower_type(&desc.ty)?;
        let param = match &desc.buffer {
            None => Parameter::scalar(&desc.name, ty),
            Some(shape) => {
                let dimensions = check_dimensions(&desc.name, shape.dimensions)?;
                let mut param = Parameter::buffer(&desc.name, ty, dimensions);
                self.lower_constraints(&mut param, &shape.constraints)?;
                param
            }
        };
        self.module.add_parameter(param);
        Ok(())
    }

    fn lower_constraints(
        &mut self,
        param: &mut Parameter,
        constraints: &[ConstraintDesc],
    ) -> Result<(), ParseError> {
        let name = param.name.clone();
        for (dim, desc) in constraints.iter().enumerate() {
            let min = self.lower_optional(desc.min.as_ref())?;
            let stride = self.lower_optional(desc.stride.as_ref())?;
            let extent = self.lower_optional(desc.extent.as_ref())?;
            let slot = param.constraint_mut(dim).ok_or_else(|| {
                ParseError::Lowering(format!(
                    "'{name}': constraint for dimension {dim} exceeds its dimensionality"
                ))
            })?;
            *slot = DimensionConstraint {
                min,
                stride,
                extent,
            };
        }
        Ok(())
    }

    fn lower_stage(&mut self, desc: &StageDesc) -> Result<Handle<Function>, ParseError> {
        if self.stage_types.contains_key(&desc.name) {
            return Err(ParseError::Lowering(format!(
                "stage '{}' declared twice",
                desc.name
            )));
        }

        let mut function = Function::new(&desc.name);
        function.args = desc.args.clone();
        function.schedule.cached = desc.cached;
        function.values = self.lower_all(&desc.values)?;

        for update in &desc.updates {
            let values = self.lower_all(&update.values)?;
            let args = self.lower_all(&update.args)?;
            let domain = match &update.domain {
                None => None,
                Some(vars) => {
                    let mut variables = Vec::with_capacity(vars.len());
                    for var in vars {
                        variables.push(ReductionVariable {
                            name: var.name.clone(),
                            min: self.lower_expr(&var.min)?,
                            extent: self.lower_expr(&var.extent)?,
                        });
                    }
                    Some(ReductionDomain { variables })
                }
            };
            function.updates.push(UpdateDefinition {
                values,
                args,
                domain,
            });
        }

        if let Some(ext) = &desc.extern_definition {
            let mut args = Vec::with_capacity(ext.args.len());
            for arg in &ext.args {
                args.push(self.lower_extern_arg(arg)?);
            }
            function.extern_definition = Some(ExternDefinition {
                name: ext.name.clone(),
                args,
                dimensions: check_dimensions(&desc.name, ext.dimensions)?,
            });
        }

        let dimensions = check_dimensions(&desc.name, function.dimensions())?;
        for output in &desc.outputs {
            let mut param = Parameter::buffer(&output.name, lower_type(&output.ty)?, dimensions);
            self.lower_constraints(&mut param, &output.constraints)?;
            function.output_buffers.push(self.module.add_parameter(param));
        }

        let ty = match (&desc.ty, function.values.first()) {
            (Some(ty), _) => lower_type(ty)?,
            (None, Some(&value)) => self.module.expr_type(value),
            (None, None) => {
                return Err(ParseError::Lowering(format!(
                    "stage '{}' has no pure value; give it a \"type\"",
                    desc.name
                )));
            }
        };
        self.stage_types.insert(desc.name.clone(), ty);
        Ok(self.module.add_function(function))
    }

    fn lower_extern_arg(&mut self, arg: &ExternArgDesc) -> Result<ExternArgument, ParseError> {
        Ok(match arg {
            ExternArgDesc::Stage(name) => ExternArgument::Stage(self.declared_stage(name)?),
            ExternArgDesc::Expr(expr) => ExternArgument::Expr(self.lower_expr(expr)?),
            ExternArgDesc::Buffer { name, ty } => ExternArgument::Buffer(BufferRef {
                name: name.clone(),
                ty: lower_type(ty)?,
            }),
            ExternArgDesc::Image(name) => {
                ExternArgument::ImageParam(self.module.parameter_by_name(name)?)
            }
            ExternArgDesc::Undefined => ExternArgument::Undefined,
        })
    }

    fn declared_stage(&self, name: &str) -> Result<Handle<Function>, ParseError> {
        if !self.stage_types.contains_key(name) {
            return Err(ParseError::Lowering(format!(
                "stage '{name}' used before it is declared"
            )));
        }
        Ok(self.module.function_by_name(name)?)
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn lower_all(&mut self, exprs: &[ExprDesc]) -> Result<Vec<Handle<Expression>>, ParseError> {
        exprs.iter().map(|e| self.lower_expr(e)).collect()
    }

    fn lower_optional(
        &mut self,
        expr: Option<&ExprDesc>,
    ) -> Result<Option<Handle<Expression>>, ParseError> {
        expr.map(|e| self.lower_expr(e)).transpose()
    }

    fn lower_expr(&mut self, desc: &ExprDesc) -> Result<Handle<Expression>, ParseError> {
        let expr = match desc {
            ExprDesc::Int(v) => Expression::Literal(Literal::I32(*v)),
            ExprDesc::Float(v) => Expression::Literal(Literal::F32(*v)),
            ExprDesc::Bool(v) => Expression::Literal(Literal::Bool(*v)),
            ExprDesc::Param(name) => return self.param_ref(name),
            ExprDesc::Var(name) => return Ok(self.var_ref(name)),
            ExprDesc::Load { buffer, index } => {
                let param = self.module.parameter_by_name(buffer)?;
                let p = &self.module.parameters[param];
                if !p.is_buffer() {
                    return Err(ParseError::Lowering(format!(
                        "load from scalar parameter '{buffer}'"
                    )));
                }
                let ty = p.ty;
                let index = self.lower_expr(index)?;
                Expression::Load {
                    ty,
                    buffer: buffer.clone(),
                    index,
                    param: Some(param),
                }
            }
            ExprDesc::Unary { op, expr } => Expression::Unary {
                op: lower_unary(*op),
                expr: self.lower_expr(expr)?,
            },
            ExprDesc::Binary { op, left, right } => Expression::Binary {
                op: lower_binary(*op),
                left: self.lower_expr(left)?,
                right: self.lower_expr(right)?,
            },
            ExprDesc::Select {
                condition,
                accept,
                reject,
            } => Expression::Select {
                condition: self.lower_expr(condition)?,
                accept: self.lower_expr(accept)?,
                reject: self.lower_expr(reject)?,
            },
            ExprDesc::Cast { ty, expr } => Expression::Cast {
                ty: lower_type(ty)?,
                expr: self.lower_expr(expr)?,
            },
            ExprDesc::Call { stage, args } => {
                let callee = self.declared_stage(stage)?;
                let ty = self.stage_types[stage.as_str()];
                Expression::Call {
                    ty,
                    kind: CallKind::Stage(callee),
                    args: self.lower_all(args)?,
                    param: None,
                }
            }
            ExprDesc::Extern { name, ty, args } => Expression::Call {
                ty: lower_type(ty)?,
                kind: CallKind::Extern(name.clone()),
                args: self.lower_all(args)?,
                param: None,
            },
            ExprDesc::Memoize(inner) => {
                let inner = self.lower_expr(inner)?;
                Expression::Call {
                    ty: self.module.expr_type(inner),
                    kind: CallKind::Intrinsic(Intrinsic::MemoizeTag),
                    args: vec![inner],
                    param: None,
                }
            }
        };
        Ok(self.module.append(expr))
    }

    fn param_ref(&mut self, name: &str) -> Result<Handle<Expression>, ParseError> {
        if let Some(&handle) = self.param_refs.get(name) {
            return Ok(handle);
        }
        let param = self.module.parameter_by_name(name)?;
        let handle = self.module.param_ref(param);
        self.param_refs.insert(name.to_string(), handle);
        Ok(handle)
    }

    fn var_ref(&mut self, name: &str) -> Handle<Expression> {
        if let Some(&handle) = self.var_refs.get(name) {
            return handle;
        }
        let handle = self.module.append(Expression::Variable {
            name: name.to_string(),
            ty: Scalar::I32,
            param: None,
        });
        self.var_refs.insert(name.to_string(), handle);
        handle
    }

    // -----------------------------------------------------------------------
    // Program body
    // -----------------------------------------------------------------------

    /// Nests the stages in declaration order: each stage's consume phase
    /// realizes the next one.
    fn build_body(&mut self, stages: &[Handle<Function>]) -> Statement {
        let mut body: Option<Statement> = None;
        for &handle in stages.iter().rev() {
            let function = self.module.functions[handle].clone();
            let produce = self.produce(&function);
            let update = (!function.updates.is_empty()).then(|| {
                let stores = function
                    .updates
                    .iter()
                    .flat_map(|u| u.values.iter().copied())
                    .collect::<Vec<_>>();
                self.stores(&function.name, &stores)
            });
            body = Some(Statement::Stage {
                name: function.name,
                produce: Some(Box::new(produce)),
                update: update.map(Box::new),
                consume: body.map(Box::new),
            });
        }
        body.unwrap_or_else(Statement::no_op)
    }

    fn produce(&mut self, function: &Function) -> Statement {
        match &function.extern_definition {
            Some(ext) => {
                let args = ext
                    .args
                    .iter()
                    .filter_map(|arg| match arg {
                        ExternArgument::Expr(expr) => Some(*expr),
                        _ => None,
                    })
                    .collect();
                let call = self.module.append(Expression::Call {
                    ty: Scalar::I32,
                    kind: CallKind::Extern(ext.name.clone()),
                    args,
                    param: None,
                });
                Statement::Evaluate(call)
            }
            None => self.stores(&function.name, &function.values),
        }
    }

    fn stores(&mut self, buffer: &str, values: &[Handle<Expression>]) -> Statement {
        let mut stmts = Vec::with_capacity(values.len());
        for (i, &value) in values.iter().enumerate() {
            let index = self.module.literal(Literal::I32(i as i32));
            stmts.push(Statement::Store {
                buffer: buffer.to_string(),
                index,
                value,
            });
        }
        Statement::Block(stmts)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn lower_type(name: &str) -> Result<Scalar, ParseError> {
    Scalar::from_name(name).ok_or_else(|| ParseError::Lowering(format!("unknown type '{name}'")))
}

fn lower_unary(op: UnaryOpDesc) -> UnaryOp {
    match op {
        UnaryOpDesc::Neg => UnaryOp::Negate,
        UnaryOpDesc::Not => UnaryOp::LogicalNot,
        UnaryOpDesc::BitNot => UnaryOp::BitwiseNot,
    }
}

fn lower_binary(op: BinaryOpDesc) -> BinaryOp {
    match op {
        BinaryOpDesc::Add => BinaryOp::Add,
        BinaryOpDesc::Sub => BinaryOp::Subtract,
        BinaryOpDesc::Mul => BinaryOp::Multiply,
        BinaryOpDesc::Div => BinaryOp::Divide,
        BinaryOpDesc::Mod => BinaryOp::Modulo,
        BinaryOpDesc::Min => BinaryOp::Min,
        BinaryOpDesc::Max => BinaryOp::Max,
        BinaryOpDesc::Eq => BinaryOp::Equal,
        BinaryOpDesc::Ne => BinaryOp::NotEqual,
        BinaryOpDesc::Lt => BinaryOp::Less,
        BinaryOpDesc::Le => BinaryOp::LessEqual,
        BinaryOpDesc::Gt => BinaryOp::Greater,
        BinaryOpDesc::Ge => BinaryOp::GreaterEqual,
        BinaryOpDesc::And => BinaryOp::LogicalAnd,
        BinaryOpDesc::Or => BinaryOp::LogicalOr,
    }
}
