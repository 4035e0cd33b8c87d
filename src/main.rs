//! embug - load-order interference harness
//!
//! Main CLI entry point for running probe scenarios against native libraries.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use embug::bindings::executable_dir;
use embug::config::EmbugConfig;
use embug::harness::{
    format_calls, parse_calls, run_matrix, Harness, HarnessOptions, Scenario, Supervisor,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "embug")]
#[command(version)]
#[command(about = "Probe load-order interference between native shared libraries", long_about = None)]
struct Cli {
    /// Config file (default: embug.toml in the current directory or a parent)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ignore config files (used by isolated child runs)
    #[arg(long, global = true, hide = true, conflicts_with = "config")]
    no_config: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scenario and print each call's result
    Run {
        /// Load order: preset name or steps like a-b-em
        #[arg(short, long)]
        scenario: Option<String>,

        /// Call order, e.g. b,a (default: order of a/b in the scenario)
        #[arg(long)]
        calls: Option<String>,

        /// Run the scenario in a child process
        #[arg(long, overrides_with = "no_isolate")]
        isolate: bool,

        /// Run in this process even if the config asks for isolation
        #[arg(long, overrides_with = "isolate")]
        no_isolate: bool,

        #[command(flatten)]
        libs: LibraryArgs,
    },

    /// Run every preset scenario in its own process and compare the results
    Matrix {
        #[command(flatten)]
        libs: LibraryArgs,
    },

    /// List the preset scenarios
    Scenarios,
}

#[derive(Args)]
struct LibraryArgs {
    /// Directory holding lib<name>/ subdirectories (default: executable directory)
    #[arg(long)]
    lib_dir: Option<PathBuf>,

    /// Event-loop library loaded by the `em` step (path or soname)
    #[arg(long)]
    event_loop: Option<PathBuf>,

    /// Skip the `em` step even if the config names an event-loop library
    #[arg(long, hide = true, conflicts_with = "event_loop")]
    no_event_loop: bool,

    /// Name of binding A
    #[arg(long, value_name = "NAME")]
    lib_a: Option<String>,

    /// Name of binding B
    #[arg(long, value_name = "NAME")]
    lib_b: Option<String>,

    /// Probe input (repeatable, default: 5 and -1)
    #[arg(long = "probe", value_name = "N", allow_negative_numbers = true)]
    probes: Vec<i32>,

    /// Make no calls, only perform the loads
    #[arg(long, hide = true, conflicts_with = "probes")]
    no_probes: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = if cli.no_config {
        EmbugConfig::default()
    } else {
        load_config(cli.config.as_deref())?
    };

    match cli.command {
        Commands::Run {
            scenario,
            calls,
            isolate,
            no_isolate,
            libs,
        } => {
            let isolate = isolate || (config.harness.isolate && !no_isolate);
            cmd_run(&config, scenario.as_deref(), calls.as_deref(), isolate, &libs)
        }
        Commands::Matrix { libs } => cmd_matrix(&config, &libs),
        Commands::Scenarios => cmd_scenarios(),
    }
}

fn load_config(path: Option<&Path>) -> Result<EmbugConfig> {
    match path {
        Some(path) => EmbugConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => EmbugConfig::load_from_cwd().context("Failed to load embug.toml"),
    }
}

/// Merge command-line flags over the config file
fn harness_options(config: &EmbugConfig, libs: &LibraryArgs) -> Result<HarnessOptions> {
    let lib_dir = match libs.lib_dir.clone().or_else(|| config.libraries.dir.clone()) {
        Some(dir) => dir,
        None => executable_dir().context("Failed to locate the executable directory")?,
    };

    let mut options = HarnessOptions::new(lib_dir);
    options.names = config.probe_names();
    if let Some(a) = &libs.lib_a {
        options.names.a = a.clone();
    }
    if let Some(b) = &libs.lib_b {
        options.names.b = b.clone();
    }
    options.event_loop = if libs.no_event_loop {
        None
    } else {
        libs.event_loop
            .clone()
            .or_else(|| config.libraries.event_loop.clone())
    };
    options.probes = if libs.no_probes {
        Vec::new()
    } else if libs.probes.is_empty() {
        config.harness.probes.clone()
    } else {
        libs.probes.clone()
    };
    Ok(options)
}

fn cmd_run(
    config: &EmbugConfig,
    scenario: Option<&str>,
    calls: Option<&str>,
    isolate: bool,
    libs: &LibraryArgs,
) -> Result<()> {
    let mut scenario: Scenario = scenario
        .unwrap_or(&config.harness.scenario)
        .parse()
        .context("Invalid scenario")?;
    if let Some(calls) = calls {
        scenario = scenario.with_calls(parse_calls(calls).context("Invalid call order")?);
    }
    let options = harness_options(config, libs)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if isolate {
        let supervisor = Supervisor::current().context("Failed to locate the embug binary")?;
        supervisor
            .run(&scenario, &options, &mut out)?
            .into_result()
            .with_context(|| format!("Scenario {} failed", scenario))?;
    } else {
        Harness::new(options)
            .run(&scenario, &mut out)
            .with_context(|| format!("Scenario {} failed", scenario))?;
    }

    Ok(())
}

fn cmd_matrix(config: &EmbugConfig, libs: &LibraryArgs) -> Result<()> {
    let options = harness_options(config, libs)?;
    let supervisor = Supervisor::current().context("Failed to locate the embug binary")?;

    let report = run_matrix(&supervisor, &Scenario::presets(), &options)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    report.write_summary(&mut out)?;
    out.flush()?;

    if !report.is_consistent() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_scenarios() -> Result<()> {
    for scenario in Scenario::presets() {
        let loads: Vec<String> = scenario.loads().iter().map(|s| s.to_string()).collect();
        println!(
            "{:<8} load {:<10} call {}",
            scenario.name(),
            loads.join(","),
            format_calls(scenario.calls())
        );
    }
    Ok(())
}
