//! IR passes for stagememo.
//!
//! Provides a [`Pass`] trait, a [`PassManager`] that runs passes in order,
//! structural validation, and the caching injection pass that wraps cached
//! stages in runtime cache lookups.

pub mod caching;
mod error;
mod validation;

pub use caching::{CacheConfig, CacheKeyPlanner, InjectCaching, inject_caching};
pub use error::{CacheError, PassError, UnsupportedKind};
pub use validation::{IrValidation, validate_module};

use std::fmt::Debug;

use stagememo_ir::Module;

/// A pass that transforms an IR module.
pub trait Pass: Debug {
    /// Human-readable name of the pass.
    fn name(&self) -> &str;

    /// Run the pass on a module. Returns `true` if anything was modified.
    fn run(&self, module: &mut Module) -> Result<bool, PassError>;
}

/// Runs passes once each, in registration order.
#[derive(Debug)]
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PassManager {
    /// Creates an empty pass manager with no passes.
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// Validation followed by caching injection for `pipeline_name`.
    pub fn standard(pipeline_name: &str, config: CacheConfig) -> Self {
        let mut pm = Self::new();
        pm.add_pass(Box::new(IrValidation));
        pm.add_pass(Box::new(InjectCaching::new(pipeline_name).with_config(config)));
        pm
    }

    /// Adds a pass to the pipeline.
    pub fn add_pass(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    /// Names of the registered passes, in order.
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Runs every pass once, stopping at the first error.
    ///
    /// Returns `true` if any pass modified the module.
    pub fn run(&self, module: &mut Module) -> Result<bool, PassError> {
        let mut changed = false;
        for pass in &self.passes {
            match pass.run(module) {
                Ok(c) => {
                    log::debug!("pass '{}': changed = {c}", pass.name());
                    changed |= c;
                }
                Err(err) => {
                    log::error!("pass '{}' failed: {err}", pass.name());
                    return Err(err);
                }
            }
        }
        Ok(changed)
    }
}
