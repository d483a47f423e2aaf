//! Prints the heaviest entries of a JSON pool and the observed distribution of
//! random draws.
//!
//! ```text
//! cargo run --example top_agents -- path/to/user_agent_pool.json --draws 100000
//! cargo run --example top_agents -- --config pool.toml
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use weightpool::{JsonFile, PoolResult, PoolStore, StoreConfig};

const TOP_N: usize = 20;
const DEFAULT_POOL: &str = "user_agent_pool.json";

#[derive(Parser, Debug)]
#[command(name = "top_agents")]
#[command(about = "Show the heaviest pool entries and sample the pool")]
struct Cli {
    /// JSON pool document (overrides the config file's path)
    pool: Option<PathBuf>,

    /// TOML store configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of draws to sample
    #[arg(short, long, default_value_t = 100_000)]
    draws: usize,
}

fn run(cli: Cli) -> PoolResult<()> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::from_file(path)?,
        None => StoreConfig::default(),
    };
    if let Some(pool) = cli.pool {
        config.path = Some(pool);
    }
    config.path.get_or_insert_with(|| PathBuf::from(DEFAULT_POOL));

    let file = JsonFile::from_config(&config)?;
    let store = PoolStore::with_config(file.clone(), file, &config);

    println!("{TOP_N} most used agents:");
    for r in store.top_k(TOP_N)? {
        println!("{:.2}%\t{}", r.effective_weight(), r.key);
    }

    let draws = cli.draws;
    let start = Instant::now();
    let mut hits: HashMap<String, usize> = HashMap::new();
    for _ in 0..draws {
        *hits.entry(store.draw()?.key).or_default() += 1;
    }
    let took = start.elapsed();

    let mut observed: Vec<(f64, String)> = hits
        .into_iter()
        .map(|(key, n)| (100.0 * n as f64 / draws.max(1) as f64, key))
        .collect();
    observed.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    println!("\nObserved distribution ({draws} draws):");
    for (pc, key) in observed.iter().take(TOP_N) {
        println!("{pc:.2}%\t{key}");
    }
    println!("\ntook: {took:?}");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
