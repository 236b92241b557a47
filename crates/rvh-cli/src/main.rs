use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use rvh_core::FingerprintPolicy;
use rvh_sync::{read_snapshot, render_tsv, run_harvest, HarvestConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rvh-cli")]
#[command(about = "Harvest embedded reviews from a business listing page")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch every review page, write the JSON snapshot, print TSV
    Harvest(HarvestArgs),
    /// Print an existing snapshot as TSV without touching the network
    Render { snapshot: PathBuf },
}

#[derive(Debug, Default, Args)]
struct HarvestArgs {
    /// Listing URL to harvest
    #[arg(long)]
    url: Option<String>,
    /// Where the JSON snapshot goes
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long, conflicts_with = "no_cache")]
    cache: bool,
    #[arg(long)]
    no_cache: bool,
    #[arg(long)]
    cache_dir: Option<PathBuf>,
    /// Consecutive pages without new reviews before giving up
    #[arg(long)]
    max_no_new: Option<usize>,
    /// `content` or `content-and-date`
    #[arg(long, value_parser = parse_fingerprint)]
    fingerprint: Option<FingerprintPolicy>,
}

impl HarvestArgs {
    fn apply(self, mut config: HarvestConfig) -> HarvestConfig {
        if let Some(url) = self.url {
            config.target_url = url;
        }
        if let Some(out) = self.out {
            config.out_path = out;
        }
        if self.cache {
            config.cache_enabled = true;
        }
        if self.no_cache {
            config.cache_enabled = false;
        }
        if let Some(dir) = self.cache_dir {
            config.cache_dir = dir;
        }
        if let Some(limit) = self.max_no_new {
            config.max_no_new_reviews = limit;
        }
        if let Some(policy) = self.fingerprint {
            config.fingerprint_policy = policy;
        }
        config
    }
}

fn parse_fingerprint(value: &str) -> Result<FingerprintPolicy, String> {
    FingerprintPolicy::parse(value)
        .ok_or_else(|| format!("unknown fingerprint policy `{value}` (expected content or content-and-date)"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Harvest(HarvestArgs::default())) {
        Commands::Harvest(args) => {
            let config = args.apply(HarvestConfig::from_env());
            let outcome = run_harvest(&config).await?;
            print!("{}", render_tsv(&outcome.reviews));
        }
        Commands::Render { snapshot } => {
            let reviews = read_snapshot(&snapshot).await?;
            print!("{}", render_tsv(&reviews));
        }
    }

    Ok(())
}
