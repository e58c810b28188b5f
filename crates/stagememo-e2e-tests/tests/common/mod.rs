#[allow(unused_imports)]
use stagememo_ir::{Module, Statement};
use stagememo_opt::{CacheConfig, PassError, PassManager};

/// Install a test logger so pass logs show up with `--nocapture`.
#[allow(dead_code)]
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Parse a description and run the standard passes over it.
#[allow(dead_code)]
pub fn compile_json(source: &str) -> Module {
    try_compile_json(source).expect("caching injection failed")
}

/// Like `compile_json` but returns the pass error instead of panicking.
#[allow(dead_code)]
pub fn try_compile_json(source: &str) -> Result<Module, PassError> {
    let (name, mut module) = stagememo_parser::parse_named(source).expect("description parse failed");
    PassManager::standard(&name, CacheConfig::default()).run(&mut module)?;
    Ok(module)
}

/// Load a demo description by name (without extension).
#[allow(dead_code)]
pub fn load_demo(name: &str) -> String {
    let path = format!("{}/../../demos/{name}.json", env!("CARGO_MANIFEST_DIR"));
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to load {path}: {e}"))
}

/// Every statement in the tree, pre-order.
#[allow(dead_code)]
pub fn flatten(stmt: &Statement) -> Vec<&Statement> {
    let mut out = Vec::new();
    let mut stack = vec![stmt];
    while let Some(s) = stack.pop() {
        out.push(s);
        let mut children: Vec<&Statement> = Vec::new();
        match s {
            Statement::Store { .. } | Statement::Evaluate(_) => {}
            Statement::Block(stmts) => children.extend(stmts),
            Statement::If { accept, reject, .. } => {
                children.push(accept);
                children.extend(reject.as_deref());
            }
            Statement::Let { body, .. }
            | Statement::Allocate { body, .. }
            | Statement::For { body, .. } => children.push(body),
            Statement::Stage {
                produce,
                update,
                consume,
                ..
            } => {
                for phase in [produce, update, consume].into_iter().flatten() {
                    children.push(phase);
                }
            }
        }
        stack.extend(children.into_iter().rev());
    }
    out
}
