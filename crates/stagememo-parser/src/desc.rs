//! Serde model of the JSON pipeline description.
//!
//! ```json
//! {
//!   "name": "pipe",
//!   "params": [{ "name": "radius", "type": "i32" }],
//!   "stages": [{
//!     "name": "blur",
//!     "args": ["x"],
//!     "values": [{ "binary": { "op": "mul", "left": { "param": "radius" }, "right": { "var": "x" } } }],
//!     "cached": true
//!   }]
//! }
//! ```

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineDesc {
    /// Pipeline-level name; the first field of every cache key.
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamDesc>,
    #[serde(default)]
    pub stages: Vec<StageDesc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamDesc {
    pub name: String,
    /// Scalar type, or element type for buffers.
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub buffer: Option<BufferShapeDesc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BufferShapeDesc {
    pub dimensions: usize,
    #[serde(default)]
    pub constraints: Vec<ConstraintDesc>,
}

/// Constraints on one buffer dimension.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConstraintDesc {
    pub min: Option<ExprDesc>,
    pub stride: Option<ExprDesc>,
    pub extent: Option<ExprDesc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageDesc {
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Result type when it cannot be taken from the first pure value.
    #[serde(default, rename = "type")]
    pub ty: Option<String>,
    #[serde(default)]
    pub values: Vec<ExprDesc>,
    #[serde(default)]
    pub updates: Vec<UpdateDesc>,
    #[serde(default, rename = "extern")]
    pub extern_definition: Option<ExternDesc>,
    #[serde(default)]
    pub outputs: Vec<OutputDesc>,
    #[serde(default)]
    pub cached: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateDesc {
    pub values: Vec<ExprDesc>,
    #[serde(default)]
    pub args: Vec<ExprDesc>,
    #[serde(default)]
    pub domain: Option<Vec<ReductionVarDesc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReductionVarDesc {
    pub name: String,
    pub min: ExprDesc,
    pub extent: ExprDesc,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternDesc {
    pub name: String,
    pub dimensions: usize,
    #[serde(default)]
    pub args: Vec<ExternArgDesc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternArgDesc {
    Stage(String),
    Expr(ExprDesc),
    Buffer {
        name: String,
        #[serde(rename = "type")]
        ty: String,
    },
    Image(String),
    Undefined,
}

/// An output buffer of a stage.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputDesc {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub constraints: Vec<ConstraintDesc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprDesc {
    Int(i32),
    Float(f32),
    Bool(bool),
    /// Reference to a declared parameter.
    Param(String),
    /// A free `i32` variable, such as a stage argument.
    Var(String),
    Load {
        buffer: String,
        index: Box<ExprDesc>,
    },
    Unary {
        op: UnaryOpDesc,
        expr: Box<ExprDesc>,
    },
    Binary {
        op: BinaryOpDesc,
        left: Box<ExprDesc>,
        right: Box<ExprDesc>,
    },
    Select {
        condition: Box<ExprDesc>,
        accept: Box<ExprDesc>,
        reject: Box<ExprDesc>,
    },
    Cast {
        #[serde(rename = "type")]
        ty: String,
        expr: Box<ExprDesc>,
    },
    /// Value of another stage.
    Call {
        stage: String,
        #[serde(default)]
        args: Vec<ExprDesc>,
    },
    /// Call to a runtime symbol.
    Extern {
        name: String,
        #[serde(rename = "type")]
        ty: String,
        #[serde(default)]
        args: Vec<ExprDesc>,
    },
    /// Treat the wrapped expression as one opaque cache-key input.
    Memoize(Box<ExprDesc>),
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOpDesc {
    Neg,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOpDesc {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Min,
    Max,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}
