// Parallel Dijkstra over a MultiQueue
//
// Usage:
//   cargo run --release --bin parallel-dijkstra -- <graph_file> <tuning> [--threads 80] [--output output.txt]

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use multiqueue_epoch::dijkstra::{self, SsspConfig};
use multiqueue_epoch::{Graph, Result};

#[derive(Parser, Debug)]
#[command(name = "parallel-dijkstra")]
#[command(about = "Single-source shortest paths with a relaxed concurrent priority queue", long_about = None)]
struct Args {
    /// Graph file: a `<vertices> <edges> <source>` header, then one `<u> <v> <weight>` line per edge
    #[arg(value_name = "GRAPH")]
    graph: PathBuf,

    /// Partitions per thread (c), at least 1
    #[arg(value_name = "TUNING", value_parser = clap::value_parser!(u32).range(1..))]
    tuning: u32,

    /// Number of worker threads (p)
    #[arg(short = 'p', long, default_value_t = 80, value_parser = clap::value_parser!(u32).range(1..))]
    threads: u32,

    /// Where to write one distance per vertex
    #[arg(short, long, default_value = "output.txt")]
    output: PathBuf,

    /// Seed partition sampling for a reproducible schedule
    #[arg(long)]
    seed: Option<u64>,
}

fn run(args: &Args) -> Result<()> {
    let graph = Graph::from_path(&args.graph)?;
    let config = SsspConfig::new(args.tuning as usize, args.threads as usize).seed(args.seed);

    let distances = dijkstra::shortest_paths(&graph, &config)?;

    let file = File::create(&args.output)?;
    dijkstra::write_distances(BufWriter::new(file), &distances)?;
    log::info!("wrote {} distances to {}", distances.len(), args.output.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("parallel-dijkstra: {err}");
            ExitCode::FAILURE
        }
    }
}
