//! Expressions: immutable typed scalar computations.

use crate::arena::Handle;
use crate::func::Function;
use crate::param::Parameter;
use crate::types::Scalar;

/// A literal constant value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Literal {
    Bool(bool),
    I32(i32),
    I64(i64),
    U8(u8),
    U32(u32),
    F32(f32),
    F64(f64),
}

impl Literal {
    /// Returns the scalar type of this literal.
    pub fn scalar(&self) -> Scalar {
        match *self {
            Self::Bool(_) => Scalar::BOOL,
            Self::I32(_) => Scalar::I32,
            Self::I64(_) => Scalar::I64,
            Self::U8(_) => Scalar::U8,
            Self::U32(_) => Scalar::U32,
            Self::F32(_) => Scalar::F32,
            Self::F64(_) => Scalar::F64,
        }
    }
}

/// A unary operator.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum UnaryOp {
    Negate,
    LogicalNot,
    BitwiseNot,
}

/// A binary operator.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Min,
    Max,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    /// Returns `true` if the operator yields a boolean regardless of operand types.
    pub fn is_predicate(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::Less
                | Self::LessEqual
                | Self::Greater
                | Self::GreaterEqual
                | Self::LogicalAnd
                | Self::LogicalOr
        )
    }
}

/// A compiler-known intrinsic.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Intrinsic {
    /// Opacity bracket: the single argument is treated as one atomic
    /// cache-key dependency and is not searched for free parameters.
    MemoizeTag,
    /// Address of the element loaded by the single argument.
    AddressOf,
    /// `copy_memory(dest, src, size)`: unaligned raw byte copy.
    CopyMemory,
}

impl Intrinsic {
    /// The intrinsic's symbol name.
    pub fn name(self) -> &'static str {
        match self {
            Self::MemoizeTag => "memoize_tag",
            Self::AddressOf => "address_of",
            Self::CopyMemory => "copy_memory",
        }
    }
}

/// What a [`Expression::Call`] calls.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CallKind {
    /// A compiler intrinsic.
    Intrinsic(Intrinsic),
    /// A value of another pipeline stage.
    Stage(Handle<Function>),
    /// An external runtime symbol.
    Extern(String),
}

/// A pure scalar value in the IR.
///
/// Expressions are stored in the module-wide expression arena and are
/// referenced by [`Handle<Expression>`]. A handle may be shared by any number
/// of parents.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    /// A literal constant.
    Literal(Literal),
    /// A string constant, typed as a handle to its bytes.
    StringImm(String),
    /// A named scalar. `param` is set when the name refers to a pipeline parameter.
    Variable {
        name: String,
        ty: Scalar,
        param: Option<Handle<Parameter>>,
    },
    /// Read one element of a buffer. `param` is set for input buffers.
    Load {
        ty: Scalar,
        buffer: String,
        index: Handle<Expression>,
        param: Option<Handle<Parameter>>,
    },
    /// Apply a unary operator.
    Unary {
        op: UnaryOp,
        expr: Handle<Expression>,
    },
    /// Apply a binary operator.
    Binary {
        op: BinaryOp,
        left: Handle<Expression>,
        right: Handle<Expression>,
    },
    /// Select between two values based on a condition.
    Select {
        condition: Handle<Expression>,
        accept: Handle<Expression>,
        reject: Handle<Expression>,
    },
    /// Numeric conversion.
    Cast {
        ty: Scalar,
        expr: Handle<Expression>,
    },
    /// Call an intrinsic, another stage, or an external symbol.
    Call {
        ty: Scalar,
        kind: CallKind,
        args: Vec<Handle<Expression>>,
        param: Option<Handle<Parameter>>,
    },
}

impl Expression {
    /// Returns all expression handles directly referenced by this expression.
    pub fn operands(&self) -> Vec<Handle<Expression>> {
        match self {
            Self::Literal(_) | Self::StringImm(_) | Self::Variable { .. } => vec![],
            Self::Load { index, .. } => vec![*index],
            Self::Unary { expr, .. } => vec![*expr],
            Self::Cast { expr, .. } => vec![*expr],
            Self::Binary { left, right, .. } => vec![*left, *right],
            Self::Select {
                condition,
                accept,
                reject,
            } => vec![*condition, *accept, *reject],
            Self::Call { args, .. } => args.clone(),
        }
    }

    /// The parameter this node refers to directly, if any.
    pub fn param(&self) -> Option<Handle<Parameter>> {
        match self {
            Self::Variable { param, .. } | Self::Load { param, .. } | Self::Call { param, .. } => {
                *param
            }
            _ => None,
        }
    }
}
