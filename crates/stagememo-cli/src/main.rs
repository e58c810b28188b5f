use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::{Context, IntoDiagnostic};

use stagememo_ir::Module;
use stagememo_opt::{CacheConfig, CacheKeyPlanner, PassManager, inject_caching};

/// stagememo: inject result caching into staged pipelines
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Input pipeline description (JSON)
    input: PathBuf,

    /// Pipeline name used in cache keys (default: the description's `name`)
    #[arg(long)]
    pipeline_name: Option<String>,

    /// Output path for the rewritten IR dump (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Dump the IR to stderr before caching is injected
    #[arg(long)]
    emit_ir: bool,

    /// Print the key layout of every cached stage to stderr
    #[arg(long)]
    emit_layout: bool,

    /// Skip structural validation
    #[arg(long)]
    no_validate: bool,

    /// Run the passes without producing output
    #[arg(long)]
    dry_run: bool,

    /// Runtime symbol for cache lookups
    #[arg(long, default_value = "cache_lookup")]
    lookup_symbol: String,

    /// Runtime symbol for cache stores
    #[arg(long, default_value = "cache_store")]
    store_symbol: String,

    /// Context argument passed first to both runtime calls
    #[arg(long, default_value = "__user_context")]
    context_symbol: String,
}

impl Cli {
    fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            lookup_symbol: self.lookup_symbol.clone(),
            store_symbol: self.store_symbol.clone(),
            context_symbol: self.context_symbol.clone(),
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    // 1. Read source file.
    let source = std::fs::read_to_string(&cli.input)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", cli.input.display()))?;

    // 2. Parse the description to IR.
    let (declared_name, mut module) = stagememo_parser::parse_named(&source)
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err("pipeline description parse failed")?;
    let pipeline_name = cli.pipeline_name.clone().unwrap_or(declared_name);

    // 3. Optionally dump IR to stderr.
    if cli.emit_ir {
        eprintln!("{}", stagememo_ir::dump_module(&module));
    }

    // 4. Optionally print key layouts.
    if cli.emit_layout {
        eprint!("{}", layout_report(&module, &pipeline_name)?);
    }

    // 5. Validate and inject caching.
    let config = cli.cache_config();
    if cli.no_validate {
        let env = module.environment();
        inject_caching(&mut module, &env, &pipeline_name, &config)
            .map_err(|e| miette::miette!("{e}"))
            .wrap_err("caching injection failed")?;
    } else {
        PassManager::standard(&pipeline_name, config)
            .run(&mut module)
            .map_err(|e| miette::miette!("{e}"))
            .wrap_err("caching injection failed")?;
    }

    // 6. Dry-run: stop here.
    if cli.dry_run {
        return Ok(());
    }

    // 7. Write output.
    let dump = stagememo_ir::dump_module(&module);
    match &cli.output {
        Some(path) => std::fs::write(path, dump)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to write {}", path.display()))?,
        None => print!("{dump}"),
    }

    Ok(())
}

/// Key layout of every cached stage, one block per stage.
fn layout_report(module: &Module, pipeline_name: &str) -> miette::Result<String> {
    let mut report = String::new();
    for (handle, function) in module.functions.iter() {
        if !function.schedule.cached {
            continue;
        }
        let planner = CacheKeyPlanner::new(module, handle, pipeline_name)
            .map_err(|e| miette::miette!("{e}"))
            .wrap_err_with(|| format!("cannot lay out key for '{}'", function.name))?;
        report.push_str(&format!("{}: {}", function.name, planner.layout()));
    }
    Ok(report)
}
