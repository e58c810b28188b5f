//! JSON pipeline-description parser for stagememo.
//!
//! Deserializes a pipeline description with [serde_json](https://crates.io/crates/serde_json)
//! and lowers it to a [`stagememo_ir::Module`]: parameters, stage
//! definitions, and a program body that realizes the stages in
//! declaration order.

mod desc;
mod lower;

pub use desc::PipelineDesc;
pub use lower::MAX_DIMENSIONS;

/// Parse a JSON pipeline description into a stagememo IR module.
pub fn parse(source: &str) -> Result<stagememo_ir::Module, ParseError> {
    let desc: PipelineDesc = serde_json::from_str(source)?;
    lower::lower_pipeline(&desc)
}

/// Parse a description and also return the pipeline name it declares.
pub fn parse_named(source: &str) -> Result<(String, stagememo_ir::Module), ParseError> {
    let desc: PipelineDesc = serde_json::from_str(source)?;
    let module = lower::lower_pipeline(&desc)?;
    Ok((desc.name, module))
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("lowering: {0}")]
    Lowering(String),
    #[error(transparent)]
    Ir(#[from] stagememo_ir::IrError),
}
