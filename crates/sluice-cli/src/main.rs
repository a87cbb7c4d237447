//! sluice CLI: validate, explain, optimize and run YAML pipelines.

use clap::{Args, Parser, Subcommand};
use sluice_core::config::OptimizerConfig;
use sluice_core::explain::explain;
use sluice_core::types::sorted;
use sluice_exec::Engine;
use sluice_optimizer::{parse_yaml_pipeline, FunctionRegistry, Optimizer, ParsedPipeline, PipelineConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sluice")]
#[command(about = "sluice: dataflow graph optimizer (fusion, splitting, flatten normalisation)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a pipeline YAML file (syntax, references and types)
    Validate {
        /// Path to the pipeline YAML file
        #[arg(short, long)]
        pipeline: PathBuf,
    },

    /// Print the pipeline graph before and after optimization
    Explain {
        /// Path to the pipeline YAML file
        #[arg(short, long)]
        pipeline: PathBuf,

        #[command(flatten)]
        opts: OptimizerArgs,
    },

    /// Optimize a pipeline and print the optimization report as JSON
    Optimize {
        /// Path to the pipeline YAML file
        #[arg(short, long)]
        pipeline: PathBuf,

        /// Write the report here instead of stdout
        #[arg(long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        opts: OptimizerArgs,
    },

    /// Run the pipeline on its `data:` section, before and after optimization,
    /// and check both produce the same records
    Run {
        /// Path to the pipeline YAML file
        #[arg(short, long)]
        pipeline: PathBuf,

        #[command(flatten)]
        opts: OptimizerArgs,
    },
}

#[derive(Args, Debug, Default, Clone)]
struct OptimizerArgs {
    /// Pass bound for repeated rewrites (overrides config)
    #[arg(long)]
    max_fixpoint_passes: Option<usize>,

    /// Assert repeated rewrites decrease their measure (overrides config)
    #[arg(long)]
    verify_measures: Option<bool>,

    /// Check structural guarantees of the result (overrides config)
    #[arg(long)]
    verify_result: Option<bool>,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { pipeline } => validate_pipeline(&pipeline).map(|outputs| {
            println!("✓ Pipeline is valid ({outputs} outputs)");
        }),
        Commands::Explain { pipeline, opts } => explain_pipeline(&pipeline, &opts),
        Commands::Optimize {
            pipeline,
            report,
            opts,
        } => optimize_pipeline(&pipeline, report.as_deref(), &opts),
        Commands::Run { pipeline, opts } => run_pipeline(&pipeline, &opts),
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path) -> Result<ParsedPipeline, Box<dyn std::error::Error>> {
    let yaml_content = fs::read_to_string(path)?;
    Ok(parse_yaml_pipeline(&yaml_content, &FunctionRegistry::default())?)
}

/// Environment, then the pipeline's `config:` section, then command-line flags.
fn resolve_config(
    pipeline: &PipelineConfig,
    opts: &OptimizerArgs,
) -> Result<OptimizerConfig, Box<dyn std::error::Error>> {
    let mut config = OptimizerConfig::from_env();
    pipeline.apply(&mut config);
    apply_cli_overrides(&mut config, opts);
    config.validate()?;
    tracing::debug!(?config, "resolved optimizer config");
    Ok(config)
}

fn apply_cli_overrides(cfg: &mut OptimizerConfig, opts: &OptimizerArgs) {
    if let Some(n) = opts.max_fixpoint_passes {
        cfg.max_fixpoint_passes = n;
    }
    if let Some(v) = opts.verify_measures {
        cfg.verify_measures = v;
    }
    if let Some(v) = opts.verify_result {
        cfg.verify_result = v;
    }
}

fn validate_pipeline(pipeline_path: &Path) -> Result<usize, Box<dyn std::error::Error>> {
    let parsed = load(pipeline_path)?;
    Ok(parsed.outputs.len())
}

fn explain_pipeline(
    pipeline_path: &Path,
    opts: &OptimizerArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut parsed = load(pipeline_path)?;
    let config = resolve_config(&parsed.config, opts)?;
    let optimized = Optimizer::new(config).optimize(&mut parsed.graph, &parsed.outputs);

    println!("Input graph");
    println!("===========");
    print!("{}", explain(&parsed.graph, &parsed.outputs));
    println!();
    println!("Optimized graph");
    println!("===============");
    print!("{}", explain(&parsed.graph, &optimized));
    Ok(())
}

fn optimize_pipeline(
    pipeline_path: &Path,
    report_path: Option<&Path>,
    opts: &OptimizerArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut parsed = load(pipeline_path)?;
    let config = resolve_config(&parsed.config, opts)?;
    let (_, report) = Optimizer::new(config).optimize_with_report(&mut parsed.graph, &parsed.outputs)?;

    let json = serde_json::to_string_pretty(&report)?;
    match report_path {
        Some(path) => {
            fs::write(path, json)?;
            println!("✓ Pipeline optimized");
            println!(
                "  Nodes: {} -> {}",
                report.input_nodes, report.output_nodes
            );
            println!("  Rule matches: {}", report.total_matches());
            println!("  Report: {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn run_pipeline(
    pipeline_path: &Path,
    opts: &OptimizerArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut parsed = load(pipeline_path)?;
    let config = resolve_config(&parsed.config, opts)?;
    let engine = Engine::new(parsed.data.clone());

    let before = engine.run(&parsed.graph, &parsed.outputs)?;
    let optimized = Optimizer::new(config).optimize(&mut parsed.graph, &parsed.outputs);
    let after = engine.run(&parsed.graph, &optimized)?;

    for (i, (b, a)) in before.outputs.iter().zip(&after.outputs).enumerate() {
        if sorted(b.clone()) != sorted(a.clone()) {
            return Err(format!("output {i} differs after optimization").into());
        }
    }

    println!("✓ Pipeline executed; optimized graph agrees on every output");
    println!(
        "  Nodes evaluated: {} -> {}",
        before.evaluated, after.evaluated
    );
    println!("{}", serde_json::to_string_pretty(&after.outputs)?);
    if !after.sinks.is_empty() {
        println!("{}", serde_json::to_string_pretty(&after.sinks)?);
    }
    Ok(())
}
