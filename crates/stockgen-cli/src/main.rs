mod registry;
mod settings;

use std::path::PathBuf;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use stockgen_core::{CharacteristicRegistry, DependencyGraph, Error as CoreError};
use stockgen_sample::{SampleError, SampleOptions, SamplingEngine};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use registry::{RunContext, init_logging, start_run};
use settings::{SettingsError, load_settings};

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("sampling error: {0}")]
    Sample(#[from] SampleError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Parser, Debug)]
#[command(name = "stockgen", version, about = "Stratified housing stock sampler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sample a synthetic housing stock from a project's tables.
    Sample(SampleArgs),
    /// Load a project's tables and print the generation plan.
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
struct SampleArgs {
    /// Project directory holding the distribution tables.
    #[arg(long)]
    project: PathBuf,
    /// Number of dwellings to sample.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    num_datapoints: u64,
    /// Output CSV path.
    #[arg(long)]
    output: PathBuf,
    /// Base seed; overrides the settings file.
    #[arg(long)]
    seed: Option<u64>,
    /// Worker threads; overrides the settings file.
    #[arg(long)]
    threads: Option<usize>,
    /// Settings file (defaults to <project>/stockgen.toml).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output directory for runs; overrides the settings file.
    #[arg(long)]
    run_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Project directory holding the distribution tables.
    #[arg(long)]
    project: PathBuf,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Sample(args) => run_sample(args),
        Command::Validate(args) => run_validate(args),
    }
}

fn run_sample(args: SampleArgs) -> Result<(), CliError> {
    let SampleArgs {
        project,
        num_datapoints,
        output,
        seed,
        threads,
        config,
        run_dir,
    } = args;

    let settings = load_settings(config.as_deref(), &project)?;
    let seed = seed.unwrap_or(settings.seed);
    let threads = threads.or(settings.threads);
    if threads == Some(0) {
        return Err(CliError::InvalidConfig(
            "threads must be at least 1".to_string(),
        ));
    }
    let rows = usize::try_from(num_datapoints).map_err(|_| {
        CliError::InvalidConfig(format!("num-datapoints {num_datapoints} is too large"))
    })?;

    let ctx = RunContext {
        run_id: Uuid::new_v4().to_string(),
        started_at: Utc::now(),
        project: project.clone(),
        num_datapoints,
        output: output.clone(),
        seed,
        threads,
        run_dir: run_dir.unwrap_or(settings.run_dir),
    };

    let paths = start_run(&ctx)?;
    init_logging(Some(&paths.logs_path))?;

    info!(
        run_id = %ctx.run_id,
        run_root = %paths.root.display(),
        "run registered"
    );

    let options = SampleOptions {
        run_id: Some(ctx.run_id.clone()),
        seed,
        threads,
        report_path: Some(paths.report_path.clone()),
        ..SampleOptions::default()
    };

    let result = SamplingEngine::new(options).run(&project, rows, &output)?;

    println!(
        "run_id={} rows={} sha256={} report={}",
        result.report.run_id,
        result.report.rows_generated,
        result.report.output_sha256.as_deref().unwrap_or(""),
        paths.report_path.display()
    );

    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), CliError> {
    init_logging(None)?;

    let registry = CharacteristicRegistry::load_project(&args.project)?;
    let graph = DependencyGraph::from_registry(&registry)?;
    let summary = graph.summary();

    println!(
        "characteristics={} dependencies={} generations={}",
        summary.nodes, summary.edges, summary.generations
    );
    for generation in graph.generations() {
        println!(
            "generation {}: {}",
            generation.index,
            generation.characteristics.join(", ")
        );
    }
    for name in registry.names() {
        let Some(characteristic) = registry.characteristic(name) else {
            continue;
        };
        let rows = registry
            .distribution(name)
            .map(|distribution| distribution.len())
            .unwrap_or_default();
        println!(
            "{name}: options={} rows={} depends_on=[{}]",
            characteristic.options.len(),
            rows,
            characteristic.dependency_names.join(", ")
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sample_command() {
        let cli = Cli::try_parse_from([
            "stockgen",
            "sample",
            "--project",
            "project_national",
            "--num-datapoints",
            "350000",
            "--output",
            "buildstock.csv",
            "--seed",
            "12",
        ])
        .expect("parse");

        match cli.command {
            Command::Sample(args) => {
                assert_eq!(args.project, PathBuf::from("project_national"));
                assert_eq!(args.num_datapoints, 350_000);
                assert_eq!(args.output, PathBuf::from("buildstock.csv"));
                assert_eq!(args.seed, Some(12));
                assert_eq!(args.threads, None);
                assert_eq!(args.config, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn zero_datapoints_are_rejected() {
        let err = Cli::try_parse_from([
            "stockgen",
            "sample",
            "--project",
            "p",
            "--num-datapoints",
            "0",
            "--output",
            "out.csv",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn sample_requires_output() {
        let err = Cli::try_parse_from([
            "stockgen",
            "sample",
            "--project",
            "p",
            "--num-datapoints",
            "5",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_validate_command() {
        let cli =
            Cli::try_parse_from(["stockgen", "validate", "--project", "p"]).expect("parse");
        assert!(matches!(cli.command, Command::Validate(ValidateArgs { .. })));
    }
}
