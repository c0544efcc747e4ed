use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use splitvote::{Election, ElectionConfig, ElectionParams};

const LOG_TARGET: &str = "bin::election_sim";

#[derive(Debug, Parser)]
#[command(name = "election_sim")]
#[command(about = "Simulate an end-to-end verifiable split-value election", long_about = None)]
struct Args {
    /// Number of voters casting ballots
    #[arg(long, short = 'v', default_value_t = 5)]
    voters: usize,

    /// Prime bound on the vote value space (choices are 0..M)
    #[arg(long, default_value_t = 5)]
    choices: u64,

    /// Total mix rounds (2m); half open for consistency, half for the outcome
    #[arg(long, default_value_t = 2)]
    rounds: usize,

    /// Mix-net rows (split-value shares per ballot)
    #[arg(long, default_value_t = 3)]
    rows: usize,

    /// Number of voting tablets
    #[arg(long, default_value_t = 3)]
    tablets: usize,

    /// Seed the RNG to make the run reproducible
    #[arg(long)]
    seed: Option<u64>,

    /// Bulletin-board transcript path
    #[arg(long, default_value = "sbb.txt")]
    sbb_path: PathBuf,

    /// Toggle structured (JSON) tracing output
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = init_tracing(args.json) {
        eprintln!("failed to initialize tracing: {err}");
        return ExitCode::FAILURE;
    }
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(target = LOG_TARGET, error = %err, "election failed");
            eprintln!("election failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let params = ElectionParams::new(args.choices, args.rounds, args.rows)
        .context("invalid election parameters")?;
    let config = ElectionConfig {
        params,
        num_voters: args.voters,
        num_tablets: args.tablets,
        sbb_path: args.sbb_path.clone(),
    };

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    info!(
        target = LOG_TARGET,
        voters = args.voters,
        choices = args.choices,
        rounds = args.rounds,
        rows = args.rows,
        "starting simulated election"
    );

    let report = Election::new(config)
        .run(&mut rng)
        .context("election aborted")?;

    for receipt in &report.receipts {
        println!(
            "voter {:>3}: receipt {} verified (ballot id {}...)",
            receipt.voter_id,
            receipt.receipt_hash,
            &receipt.bid[..16]
        );
    }
    println!("final tally: {{{}}}", report.tally);
    match report.winners.as_slice() {
        [] => println!("no ballots were cast"),
        [winner] => println!("winner: choice {winner}"),
        tied => println!(
            "tie between choices {}",
            tied.iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
    println!(
        "election complete; transcript written to {}",
        args.sbb_path.display()
    );
    Ok(())
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .json()
            .try_init()
            .map_err(|err| anyhow!("failed to initialize tracing subscriber: {err}"))?;
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .try_init()
            .map_err(|err| anyhow!("failed to initialize tracing subscriber: {err}"))?;
    }
    Ok(())
}
