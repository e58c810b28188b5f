//! Caching injection.
//!
//! Wraps every stage scheduled as cached in code that serializes a key from
//! the stage's scalar inputs, asks the runtime cache for a stored result,
//! and only computes (and stores back) on a miss:
//!
//! ```text
//! allocate f.cache_key: u8[key_size]
//!   <key writes>
//!   let f.cache_miss = cache_lookup(__user_context, f.cache_key, key_size, f.buffer)
//!     stage f
//!       produce: if f.cache_miss { <produce> }
//!       update:  if f.cache_miss { <update> }
//!       consume: if f.cache_miss { cache_store(...) }; <consume>
//! ```

mod dependencies;
mod key;
mod names;

pub use dependencies::{
    DependencyCollector, DependencyInfo, DependencyKey, DependencySet, DependencyValue,
    MEMOIZE_TAG_PREFIX,
};
pub use key::{CacheKeyPlanner, KeyField, KeyLayout, PlacedField};
pub use names::{NameAllocator, result_buffer_name};

use std::mem;

use stagememo_ir::{
    Environment, Expression, Function, Handle, Module, Scalar, Statement, StmtMutator,
    walk_statement,
};

use crate::Pass;
use crate::error::{CacheError, PassError};

/// Runtime symbols the generated code calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// `bool lookup(context, key, key_size, result)`; `true` on a miss.
    pub lookup_symbol: String,
    /// `bool store(context, key, key_size, result)`.
    pub store_symbol: String,
    /// Opaque context passed first to both calls.
    pub context_symbol: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lookup_symbol: "cache_lookup".into(),
            store_symbol: "cache_store".into(),
            context_symbol: "__user_context".into(),
        }
    }
}

/// Injects cache lookups around cached stages.
#[derive(Debug)]
pub struct InjectCaching {
    pipeline_name: String,
    config: CacheConfig,
}

impl InjectCaching {
    pub fn new(pipeline_name: impl Into<String>) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            config: CacheConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }
}

impl Pass for InjectCaching {
    fn name(&self) -> &str {
        "inject-caching"
    }

    fn run(&self, module: &mut Module) -> Result<bool, PassError> {
        let env = module.environment();
        Ok(inject_caching(
            module,
            &env,
            &self.pipeline_name,
            &self.config,
        )?)
    }
}

/// Rewrites every cached stage node in `module.body`.
///
/// Returns `true` if any stage was rewritten. On error the module is left
/// exactly as it was.
pub fn inject_caching(
    module: &mut Module,
    env: &Environment,
    pipeline_name: &str,
    config: &CacheConfig,
) -> Result<bool, CacheError> {
    let checkpoint = module.expressions.len();
    let names = NameAllocator::for_module(module);
    let original = mem::replace(&mut module.body, Statement::no_op());

    let mut injector = CacheInjector {
        module: &mut *module,
        env,
        names,
        pipeline_name,
        config,
        rewritten: 0,
    };
    let result = injector.mutate(original.clone());
    let rewritten = injector.rewritten;

    match result {
        Ok(body) => {
            module.body = body;
            Ok(rewritten > 0)
        }
        Err(err) => {
            module.body = original;
            module.expressions.truncate(checkpoint);
            Err(err)
        }
    }
}

struct CacheInjector<'a> {
    module: &'a mut Module,
    env: &'a Environment,
    names: NameAllocator,
    pipeline_name: &'a str,
    config: &'a CacheConfig,
    rewritten: usize,
}

impl StmtMutator for CacheInjector<'_> {
    type Error = CacheError;

    fn mutate(&mut self, stmt: Statement) -> Result<Statement, CacheError> {
        match walk_statement(self, stmt)? {
            Statement::Stage {
                name,
                produce,
                update,
                consume,
            } => match self.cached_definition(&name) {
                Some(function) => self.cache_stage(function, name, produce, update, consume),
                None => Ok(Statement::Stage {
                    name,
                    produce,
                    update,
                    consume,
                }),
            },
            other => Ok(other),
        }
    }
}

impl CacheInjector<'_> {
    fn cached_definition(&self, name: &str) -> Option<Handle<Function>> {
        let &handle = self.env.get(name)?;
        let function = self.module.functions.try_get(handle)?;
        function.schedule.cached.then_some(handle)
    }

    fn cache_stage(
        &mut self,
        function: Handle<Function>,
        name: String,
        produce: Option<Box<Statement>>,
        update: Option<Box<Statement>>,
        consume: Option<Box<Statement>>,
    ) -> Result<Statement, CacheError> {
        let planner = CacheKeyPlanner::new(self.module, function, self.pipeline_name)?
            .with_config(self.config.clone());
        let module = &mut *self.module;

        let key_buffer = self.names.cache_key(&name);
        let miss_name = self.names.cache_miss(&name);
        let result_buffer = result_buffer_name(&name);

        let key_writes = planner.generate_key(module, &key_buffer);
        let lookup = planner.generate_lookup(module, &key_buffer, &result_buffer);
        let miss = module.append(Expression::Variable {
            name: miss_name.clone(),
            ty: Scalar::BOOL,
            param: None,
        });
        let on_miss = |body: Statement| Statement::If {
            condition: miss,
            accept: Box::new(body),
            reject: None,
        };

        let store_back = on_miss(planner.store_computation(module, &key_buffer, &result_buffer));
        let consume = match consume {
            Some(consume) => Statement::Block(vec![store_back, *consume]),
            None => store_back,
        };
        let stage = Statement::Stage {
            name: name.clone(),
            produce: produce.map(|p| Box::new(on_miss(*p))),
            update: update.map(|u| Box::new(on_miss(*u))),
            consume: Some(Box::new(consume)),
        };

        let size = planner.key_size_expr(module);
        log::info!(
            "caching stage '{name}': {}-byte key, {} dependencies",
            planner.key_size(),
            planner.dependencies().len()
        );
        self.rewritten += 1;

        Ok(Statement::Allocate {
            name: key_buffer,
            ty: Scalar::U8,
            extents: vec![size],
            body: Box::new(Statement::Block(vec![
                key_writes,
                Statement::Let {
                    name: miss_name,
                    value: lookup,
                    body: Box::new(stage),
                },
            ])),
        })
    }
}
