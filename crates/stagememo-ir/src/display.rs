//! Display implementations and text dump for debugging.

use std::fmt;

use crate::Module;
use crate::arena::Handle;
use crate::expr::{BinaryOp, CallKind, Expression, Intrinsic, Literal, UnaryOp};
use crate::func::{ExternArgument, Function};
use crate::param::{Parameter, ParameterKind};
use crate::stmt::Statement;
use crate::types::{Scalar, ScalarKind};

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Sint => write!(f, "sint"),
            Self::Uint => write!(f, "uint"),
            Self::Float => write!(f, "float"),
            Self::Handle => write!(f, "handle"),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ScalarKind::Bool => write!(f, "bool"),
            ScalarKind::Sint => write!(f, "i{}", self.width * 8),
            ScalarKind::Uint => write!(f, "u{}", self.width * 8),
            ScalarKind::Float => write!(f, "f{}", self.width * 8),
            ScalarKind::Handle => write!(f, "handle"),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}i"),
            Self::I64(v) => write!(f, "{v}l"),
            Self::U8(v) => write!(f, "{v}u8"),
            Self::U32(v) => write!(f, "{v}u"),
            Self::F32(v) => write!(f, "{v}f"),
            Self::F64(v) => write!(f, "{v}lf"),
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Negate => write!(f, "-"),
            Self::LogicalNot => write!(f, "!"),
            Self::BitwiseNot => write!(f, "~"),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Min => "min",
            Self::Max => "max",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::LogicalAnd => "&&",
            Self::LogicalOr => "||",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Intrinsic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Formats a single expression node; operands are shown as handles.
pub fn format_expr(handle: Handle<Expression>, module: &Module) -> String {
    let Some(expr) = module.expressions.try_get(handle) else {
        return format!("<invalid {handle:?}>");
    };
    match expr {
        Expression::Literal(lit) => format!("{lit}"),
        Expression::StringImm(s) => format!("{s:?}"),
        Expression::Variable { name, ty, param } => match param {
            Some(p) => format!("{name}: {ty} (param {p:?})"),
            None => format!("{name}: {ty}"),
        },
        Expression::Load {
            ty,
            buffer,
            index,
            param,
        } => match param {
            Some(p) => format!("Load<{ty}>({buffer}[{index:?}], param {p:?})"),
            None => format!("Load<{ty}>({buffer}[{index:?}])"),
        },
        Expression::Unary { op, expr } => format!("{op}{expr:?}"),
        Expression::Binary { op, left, right } => match op {
            BinaryOp::Min | BinaryOp::Max => format!("{op}({left:?}, {right:?})"),
            _ => format!("{left:?} {op} {right:?}"),
        },
        Expression::Select {
            condition,
            accept,
            reject,
        } => format!("Select({condition:?}, {accept:?}, {reject:?})"),
        Expression::Cast { ty, expr } => format!("Cast<{ty}>({expr:?})"),
        Expression::Call {
            ty,
            kind,
            args,
            param,
        } => {
            let args: Vec<_> = args.iter().map(|h| format!("{h:?}")).collect();
            let callee = match kind {
                CallKind::Intrinsic(i) => format!("{i}"),
                CallKind::Stage(f) => match module.functions.try_get(*f) {
                    Some(func) => format!("stage {}", func.name),
                    None => format!("stage {f:?}"),
                },
                CallKind::Extern(name) => format!("extern {name}"),
            };
            let param = match param {
                Some(p) => format!(", param {p:?}"),
                None => String::new(),
            };
            format!("Call<{ty}>({callee}({}){param})", args.join(", "))
        }
    }
}

fn write_stmt(out: &mut String, stmt: &Statement, indent: usize) {
    let pad = " ".repeat(indent);
    match stmt {
        Statement::Store {
            buffer,
            index,
            value,
        } => {
            out.push_str(&format!("{pad}Store {buffer}[{index:?}] = {value:?}\n"));
        }
        Statement::Evaluate(expr) => {
            out.push_str(&format!("{pad}Evaluate {expr:?}\n"));
        }
        Statement::Block(stmts) => {
            out.push_str(&format!("{pad}Block {{\n"));
            for s in stmts {
                write_stmt(out, s, indent + 4);
            }
            out.push_str(&format!("{pad}}}\n"));
        }
        Statement::If {
            condition,
            accept,
            reject,
        } => {
            out.push_str(&format!("{pad}If ({condition:?}) {{\n"));
            write_stmt(out, accept, indent + 4);
            if let Some(reject) = reject {
                out.push_str(&format!("{pad}}} else {{\n"));
                write_stmt(out, reject, indent + 4);
            }
            out.push_str(&format!("{pad}}}\n"));
        }
        Statement::Let { name, value, body } => {
            out.push_str(&format!("{pad}Let {name} = {value:?} in\n"));
            write_stmt(out, body, indent + 4);
        }
        Statement::Allocate {
            name,
            ty,
            extents,
            body,
        } => {
            let extents: Vec<_> = extents.iter().map(|h| format!("{h:?}")).collect();
            out.push_str(&format!(
                "{pad}Allocate {name}: {ty}[{}] in\n",
                extents.join(", ")
            ));
            write_stmt(out, body, indent + 4);
        }
        Statement::For {
            name,
            min,
            extent,
            body,
        } => {
            out.push_str(&format!("{pad}For {name} in [{min:?}, +{extent:?}) {{\n"));
            write_stmt(out, body, indent + 4);
            out.push_str(&format!("{pad}}}\n"));
        }
        Statement::Stage {
            name,
            produce,
            update,
            consume,
        } => {
            out.push_str(&format!("{pad}Stage {name} {{\n"));
            for (label, phase) in [("Produce", produce), ("Update", update), ("Consume", consume)] {
                if let Some(phase) = phase {
                    out.push_str(&format!("{pad}  {label}:\n"));
                    write_stmt(out, phase, indent + 4);
                }
            }
            out.push_str(&format!("{pad}}}\n"));
        }
    }
}

fn format_parameter(param: &Parameter) -> String {
    match &param.kind {
        ParameterKind::Scalar => format!("{}: {}", param.name, param.ty),
        ParameterKind::Buffer {
            dimensions,
            constraints,
        } => {
            let mut s = format!("{}: buffer<{}, {dimensions}>", param.name, param.ty);
            for (dim, c) in constraints.iter().enumerate() {
                for (label, bound) in [("min", c.min), ("stride", c.stride), ("extent", c.extent)] {
                    if let Some(h) = bound {
                        s += &format!(" {label}{dim}={h:?}");
                    }
                }
            }
            s
        }
    }
}

fn dump_function(out: &mut String, handle: Handle<Function>, func: &Function, module: &Module) {
    let cached = if func.schedule.cached { " cached" } else { "" };
    out.push_str(&format!(
        "  stage {}({}) [{handle:?}]{cached} {{\n",
        func.name,
        func.args.join(", ")
    ));

    if func.has_pure_definition() {
        let values: Vec<_> = func.values.iter().map(|h| format!("{h:?}")).collect();
        out.push_str(&format!("    = ({})\n", values.join(", ")));
    }

    for (i, update) in func.updates.iter().enumerate() {
        let args: Vec<_> = update.args.iter().map(|h| format!("{h:?}")).collect();
        let values: Vec<_> = update.values.iter().map(|h| format!("{h:?}")).collect();
        out.push_str(&format!(
            "    update {i}: ({}) = ({})\n",
            args.join(", "),
            values.join(", ")
        ));
        if let Some(domain) = &update.domain {
            for rv in &domain.variables {
                out.push_str(&format!(
                    "      rvar {} in [{:?}, +{:?})\n",
                    rv.name, rv.min, rv.extent
                ));
            }
        }
    }

    if let Some(ext) = &func.extern_definition {
        let args: Vec<_> = ext
            .args
            .iter()
            .map(|arg| match arg {
                ExternArgument::Stage(f) => match module.functions.try_get(*f) {
                    Some(callee) => format!("stage {}", callee.name),
                    None => format!("stage {f:?}"),
                },
                ExternArgument::Expr(h) => format!("{h:?}"),
                ExternArgument::Buffer(b) => format!("buffer {}: {}", b.name, b.ty),
                ExternArgument::ImageParam(p) => format!("image {p:?}"),
                ExternArgument::Undefined => "<undefined>".to_string(),
            })
            .collect();
        out.push_str(&format!(
            "    extern {}({}) -> {}d\n",
            ext.name,
            args.join(", "),
            ext.dimensions
        ));
    }

    if !func.output_buffers.is_empty() {
        let outputs: Vec<_> = func.output_buffers.iter().map(|h| format!("{h:?}")).collect();
        out.push_str(&format!("    outputs ({})\n", outputs.join(", ")));
    }

    out.push_str("  }\n");
}

/// Produces a human-readable text dump of a [`Module`] for debugging.
///
/// The output depends only on the module's contents, so two structurally
/// identical modules dump to identical text.
pub fn dump_module(module: &Module) -> String {
    let mut out = String::new();

    out.push_str("Parameters:\n");
    for (handle, param) in module.parameters.iter() {
        out.push_str(&format!("  {handle:?} {}\n", format_parameter(param)));
    }

    if !module.expressions.is_empty() {
        out.push_str("\nExpressions:\n");
        for (handle, _) in module.expressions.iter() {
            let formatted = format_expr(handle, module);
            out.push_str(&format!("  {handle:?} {formatted}\n"));
        }
    }

    if !module.functions.is_empty() {
        out.push_str("\nStages:\n");
        for (handle, func) in module.functions.iter() {
            dump_function(&mut out, handle, func, module);
        }
    }

    out.push_str("\nBody:\n");
    write_stmt(&mut out, &module.body, 2);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::func::Function;

    #[test]
    fn display_scalar() {
        assert_eq!(format!("{}", Scalar::F32), "f32");
        assert_eq!(format!("{}", Scalar::I32), "i32");
        assert_eq!(format!("{}", Scalar::U8), "u8");
        assert_eq!(format!("{}", Scalar::BOOL), "bool");
        assert_eq!(format!("{}", Scalar::HANDLE), "handle");
    }

    #[test]
    fn display_literal() {
        assert_eq!(format!("{}", Literal::F32(3.125)), "3.125f");
        assert_eq!(format!("{}", Literal::U32(42)), "42u");
        assert_eq!(format!("{}", Literal::U8(0)), "0u8");
        assert_eq!(format!("{}", Literal::Bool(true)), "true");
    }

    #[test]
    fn display_binary_op() {
        assert_eq!(format!("{}", BinaryOp::Add), "+");
        assert_eq!(format!("{}", BinaryOp::Equal), "==");
        assert_eq!(format!("{}", BinaryOp::Max), "max");
    }

    #[test]
    fn format_intrinsic_call() {
        let mut module = Module::default();
        let x = module.append(Expression::Variable {
            name: "x".into(),
            ty: Scalar::I32,
            param: None,
        });
        let tag = module.append(Expression::Call {
            ty: Scalar::I32,
            kind: CallKind::Intrinsic(Intrinsic::MemoizeTag),
            args: vec![x],
            param: None,
        });
        assert_eq!(format_expr(tag, &module), "Call<i32>(memoize_tag([0]))");
    }

    #[test]
    fn dump_empty_module() {
        let module = Module::default();
        let dump = dump_module(&module);
        assert!(dump.contains("Parameters:"));
        assert!(dump.contains("Body:\n  Block {\n  }\n"));
    }

    #[test]
    fn dump_stage_node() {
        let mut module = Module::default();
        let mut f = Function::new("blur");
        f.schedule.cached = true;
        module.add_function(f);
        module.body = Statement::Stage {
            name: "blur".into(),
            produce: Some(Box::new(Statement::no_op())),
            update: None,
            consume: None,
        };
        let dump = dump_module(&module);
        assert!(dump.contains("stage blur() [[0]] cached {"));
        assert!(dump.contains("Stage blur {\n    Produce:\n"));
        assert!(!dump.contains("Update:"));
    }
}
