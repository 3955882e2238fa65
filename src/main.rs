//! micro-lob CLI: run the full pipeline and write the analytics artifacts.
//!
//! ```text
//! micro-lob                          # default 1h simulation
//! micro-lob --duration 7200          # 2h simulation
//! micro-lob --output results/ -v     # custom output dir, debug logging
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;

use micro_lob::analytics::{estimate_kyle_lambda, spread_decomposition, stylized_facts};
use micro_lob::report;
use micro_lob::{SimConfig, Simulator};

#[derive(Parser)]
#[command(name = "micro-lob", version, about = "CLOB micro-exchange simulator")]
struct Cli {
    /// Simulated duration in seconds
    #[arg(long, default_value_t = 3600.0)]
    duration: f64,

    /// Symbol to trade
    #[arg(long, default_value = "AAPL")]
    symbol: String,

    /// Output directory for CSVs and the report
    #[arg(long, default_value = "output")]
    output: PathBuf,

    /// PRNG seed for the event stream and agent pool
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .compact()
        .with_max_level(level)
        .init();

    let config = SimConfig {
        symbol: cli.symbol.clone(),
        duration: cli.duration,
        seed: cli.seed,
        ..SimConfig::default()
    };

    info!(
        symbol = %config.symbol,
        duration = config.duration,
        init_mid = config.init_mid,
        agents = config.num_agents,
        seed = config.seed,
        "starting simulation"
    );

    let data = Simulator::new(config).run();

    let spread = spread_decomposition(&data.trade_records, &data.spreads);
    let kyle = estimate_kyle_lambda(&data.trades, &data.event_times, &data.midprices, 5.0);
    let facts = stylized_facts(&data.midprices);

    let rendered = report::render_report(&data, &spread, &kyle, &facts);
    print!("{rendered}");

    if let Err(err) = report::write_all(&cli.output, &data, &spread, &kyle, &facts) {
        error!(%err, "failed to write output artifacts");
        return ExitCode::FAILURE;
    }
    info!(dir = %cli.output.display(), "artifacts written");

    ExitCode::SUCCESS
}
