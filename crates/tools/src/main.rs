use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tools::sim::{SimOptions, run};

#[derive(Parser, Debug)]
#[command(author, version, about = "Parking map cache and viewport simulator")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a deterministic pan/zoom session through the caching stack
    Simulate {
        /// Number of synthetic spots to generate
        #[arg(long, default_value_t = 1000)]
        spots: usize,

        /// PRNG seed for the spot set and session script
        #[arg(long, default_value_t = 1)]
        seed: u64,

        /// Number of pan/zoom steps to replay
        #[arg(long, default_value_t = 20)]
        steps: usize,

        /// JSON file with a spot list, instead of generating one
        #[arg(long)]
        spots_file: Option<PathBuf>,

        /// Persist the spatial cache under this directory
        #[arg(long)]
        persist_dir: Option<PathBuf>,

        /// Make every n-th feed fetch fail (0 = never)
        #[arg(long, default_value_t = 0)]
        fail_every: usize,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = real_main() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<(), String> {
    let args = Args::parse();
    match args.command {
        Command::Simulate {
            spots,
            seed,
            steps,
            spots_file,
            persist_dir,
            fail_every,
        } => {
            let options = SimOptions {
                spots,
                seed,
                steps,
                spots_file,
                persist_dir,
                fail_every,
            };
            let report = run(&options)?;

            println!("step  zoom   visible / total");
            for step in &report.steps {
                println!(
                    "{:>4}  {:>5.1}  {:>7} / {}",
                    step.step, step.zoom, step.visible, step.total
                );
            }
            println!();
            println!(
                "fetches: {} ({} failed)",
                report.fetches, report.fetch_failures
            );
            let spatial = report.spatial_stats;
            println!(
                "spatial cache: {} exact, {} partial, {} misses, {} evictions",
                spatial.hits, spatial.partial_hits, spatial.misses, spatial.evictions
            );
            let memo = report.memo_stats;
            println!(
                "feed memo: {} hits, {} misses, {} expirations",
                memo.hits, memo.misses, memo.expirations
            );
            Ok(())
        }
    }
}
