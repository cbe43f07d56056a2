//! Wrapp Wiring - command line entry point
//!
//! Plans a JSON catalog and prints the plan to stdout. Diagnostics go to stderr.

use std::{path::PathBuf, process::ExitCode};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use wrapp_config::ConfigProvider;
use wrapp_wiring::{load_catalog_from_path, Environment, WiringPlanner};

/// Log filter, e.g. `WRAPP_LOG=wrapp_wiring=debug`
const LOG_VAR: &str = "WRAPP_LOG";

#[derive(Parser, Debug)]
#[command(name = "wrapp-wiring")]
#[command(about = "Compile a component catalog into a static wiring plan")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Plan a catalog and print the result
    Plan(PlanArgs),
}

#[derive(clap::Args, Debug)]
struct PlanArgs {
    /// JSON catalog of component declarations
    #[arg(long, value_name = "PATH")]
    catalog: PathBuf,

    /// TOML config with planner options and environment facts
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Active profile, replaces the configured profiles
    #[arg(long = "profile", value_name = "NAME")]
    profiles: Vec<String>,

    /// Property as `key=value`, added to the configured properties
    #[arg(long = "property", value_name = "KEY=VALUE", value_parser = parse_property)]
    properties: Vec<(String, String)>,

    /// Presence flag, added to the configured flags
    #[arg(long = "flag", value_name = "NAME")]
    flags: Vec<String>,

    /// Treat every warning as an error
    #[arg(long)]
    strict: bool,

    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Json,
    Dot,
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_VAR).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::Plan(args) => run_plan(args),
    };

    match result {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run_plan(args: PlanArgs) -> anyhow::Result<String> {
    let mut provider = ConfigProvider::initialize();
    if let Some(path) = &args.config {
        provider.load_file(path)?;
    }
    provider.apply_env_overrides()?;
    let mut config = provider.extract()?;

    if !args.profiles.is_empty() {
        config.environment.profiles = args.profiles;
    }
    config.environment.properties.extend(args.properties);
    config.environment.flags.extend(args.flags);
    config.planner.strict |= args.strict;

    let catalog = load_catalog_from_path(&args.catalog)
        .with_context(|| format!("Could not load catalog '{}'", args.catalog.display()))?;
    let environment = Environment::from(&config.environment);

    tracing::info!(
        "Planning {} components with profiles {:?}",
        catalog.len(),
        environment.active_profiles
    );

    let plan = match WiringPlanner::new(config.planner).plan(&catalog, &environment) {
        Ok(plan) => plan,
        Err(error) => bail!(
            "The wiring plan had one or more errors:\n{}",
            error.diagnostics.report()
        ),
    };

    for warning in &plan.diagnostics().warnings {
        eprintln!("warning: {warning}");
    }

    Ok(match args.format {
        Format::Json => plan.to_json().context("Could not render plan as JSON")? + "\n",
        Format::Dot => plan.to_dot(),
    })
}
