//! Named Location Sync CLI.

use anyhow::Result;
use clap::Parser;
use named_location_sync::{sync, Config, Credentials, InvalidEntryPolicy};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "named-location-sync")]
#[command(about = "Replace an Entra ID named location's IP ranges with a known-threat IP list")]
#[command(version)]
struct Args {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// IP list to upload, overrides input.path
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Named location object ID, overrides named_location.id
    #[arg(long, value_name = "ID")]
    named_location_id: Option<String>,

    /// Handling of invalid lines, overrides input.on_invalid
    #[arg(long, value_enum)]
    on_invalid: Option<InvalidEntryPolicy>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: String,

    /// Print example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and input list, then exit
    #[arg(long)]
    validate: bool,

    /// Print the request body instead of sending it
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --print-config
    if args.print_config {
        println!("{}", Config::example());
        return Ok(());
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration");
            Config::load(path)?
        }
        None => Config::default(),
    };

    if let Some(input) = args.input {
        config.input.path = input;
    }
    if let Some(id) = args.named_location_id {
        config.named_location.id = id;
    }
    if let Some(policy) = args.on_invalid {
        config.input.on_invalid = policy;
    }
    config.validate()?;

    // Handle --validate and --dry-run
    if args.validate || args.dry_run {
        let (list, location) = sync::prepare(&config)?;
        if args.dry_run {
            println!("{}", serde_json::to_string_pretty(&location)?);
        }
        info!(
            entries = list.entries.len(),
            skipped = list.skipped.len(),
            "Input list is valid"
        );
        return Ok(());
    }

    let credentials = Credentials::from_env()?;
    let report = sync::run(&config, &credentials).await?;

    if !sync::print_outcome(&report.outcome, &mut std::io::stdout().lock())? {
        std::process::exit(1);
    }

    Ok(())
}
