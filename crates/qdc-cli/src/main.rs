//! QDC Command-Line Interface
//!
//! The main entry point for the `qdc` tool: route request batches over a
//! rack topology and provision topologies sized for a batch.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::{Parser, Subcommand};
use console::style;
use qdc_net::Request;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{provision, route, version};

/// Largest `--headroom` accepted by `qdc provision`.
const MAX_HEADROOM: i64 = 1 << 16;

/// QDC - resource-constrained EPR routing for rack-scale quantum data centers
#[derive(Parser)]
#[command(name = "qdc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Route the requests of a scenario file and commit their slots
    Route {
        /// Scenario file (YAML, or JSON with a .json extension)
        #[arg(short, long)]
        scenario: String,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Also print the channel-preparation program
        #[arg(long)]
        program: bool,
    },

    /// Print a scenario with a pairwise-rack topology sized for the requests
    Provision {
        /// Number of QPUs (named QPU1..QPUn)
        #[arg(short, long)]
        qpus: usize,

        /// Request as FROM:TO; bare numbers name QPU{n}
        #[arg(short, long = "request")]
        requests: Vec<Request>,

        /// Extra slots per kind on every QPU
        #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(0..=MAX_HEADROOM))]
        headroom: u32,

        /// Weight between every pair of distinct QPUs
        #[arg(short, long, default_value = "1.0")]
        weight: f64,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Route {
            scenario,
            format,
            program,
        } => route::execute(&scenario, &format, program),

        Commands::Provision {
            qpus,
            requests,
            headroom,
            weight,
            output,
        } => provision::execute(qpus, requests, headroom, weight, output.as_deref()),

        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
