use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use ovs_engine::{persist, run_session, OverlapConfig};
use serde::Deserialize;

use wells::WellsConfig;

mod report;
mod wells;

#[derive(Parser, Debug)]
#[command(name = "ovs-sim", about = "Overlap-sampling free energy CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a full bias search plus production session on the double-well system.
    Run(RunArgs),
    /// Validate and print a persisted bias value.
    Bias(BiasArgs),
}

#[derive(ClapArgs, Debug)]
struct RunArgs {
    /// YAML configuration describing the session and the wells.
    #[arg(long)]
    config: PathBuf,
    /// Output directory for run artifacts, overriding the configuration.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Master seed override.
    #[arg(long)]
    seed: Option<u64>,
    /// Bias persistence file override.
    #[arg(long)]
    bias_file: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct BiasArgs {
    /// Persisted bias file to inspect.
    #[arg(long)]
    file: PathBuf,
}

#[derive(Debug, Deserialize)]
struct SimConfig {
    #[serde(default)]
    overlap: OverlapConfig,
    #[serde(default)]
    system: WellsConfig,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run_command(args),
        Command::Bias(args) => bias_command(args),
    }
}

fn run_command(args: RunArgs) -> Result<(), Box<dyn Error>> {
    let mut sim: SimConfig = serde_yaml::from_str(&fs::read_to_string(&args.config)?)?;
    if let Some(out) = args.out {
        sim.overlap.output.run_directory = Some(out);
    }
    if let Some(seed) = args.seed {
        sim.overlap.seed_policy.master_seed = seed;
    }
    if let Some(path) = args.bias_file {
        sim.overlap.output.bias_file = Some(path);
    }
    sim.system.validate()?;

    let truth = wells::analytic_ratio(
        &sim.system.reference,
        &sim.system.target,
        sim.overlap.temperature,
    );
    println!(
        "analytic ratio {truth:.6e} (delta_f {:.6})",
        -sim.overlap.temperature * truth.ln()
    );

    let (reference, target) = wells::walker_pair(&sim.system, sim.overlap.temperature);
    let report = run_session(&sim.overlap, reference, target, |sample| {
        println!("{}", report::progress_line(sample));
    })?;

    for line in report::search_lines(&report.summary.search) {
        println!("{line}");
    }
    for line in report::final_lines(&report.summary) {
        println!("{line}");
    }
    if let Some(path) = &report.manifest_path {
        println!("manifest {}", path.display());
    }
    Ok(())
}

fn bias_command(args: BiasArgs) -> Result<(), Box<dyn Error>> {
    match persist::load_bias(&args.file)? {
        Some(bias) => println!("{bias}"),
        None => println!("no bias stored at {}", args.file.display()),
    }
    Ok(())
}
