use clap::Parser;
use retireplan::{Mode, Report, Scenario, init_logging};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "retireplan")]
#[command(about = "Retirement projections and Monte Carlo wealth simulation")]
struct Args {
    /// Scenario file (.yaml, .yml or .json)
    scenario: PathBuf,

    /// What to compute
    #[arg(short, long, value_enum, default_value_t = Mode::Both)]
    mode: Mode,

    /// Override the Monte Carlo iteration count
    #[arg(short, long)]
    iterations: Option<usize>,

    /// Override the Monte Carlo seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    init_logging(&args.log_level, args.log_file.as_deref())?;

    let mut scenario = Scenario::load(&args.scenario)?;
    if let Some(section) = scenario.monte_carlo.as_mut() {
        if let Some(iterations) = args.iterations {
            section.iterations = iterations;
        }
        if let Some(seed) = args.seed {
            section.seed = seed;
        }
    }

    let report = Report::generate(&scenario, args.mode)?;
    println!("{}", report.to_json(args.pretty)?);

    tracing::info!("Report written");
    Ok(())
}
