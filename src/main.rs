//! `adskip` CLI - inspect providers and replay ad-skipping scenarios

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use adskip::{
    parse_ad_time, run_scenario, AttachDecision, AttachRegistry, NavigationStatus, Provider,
    Scenario, StatsAggregator,
};

#[derive(Parser)]
#[command(name = "adskip")]
#[command(about = "Skip ad breaks on streaming video pages")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported streaming providers
    Providers,

    /// Parse an ad countdown label into seconds
    ParseTime {
        /// Countdown text, e.g. "1:30" or "45"
        text: String,
    },

    /// Show whether a page URL gets a controller and which strategy runs
    Check {
        /// Page URL
        url: String,
    },

    /// Replay a scripted page session through the controller
    Replay {
        /// Scenario TOML file
        scenario: PathBuf,

        /// Fold the resulting statistics into this JSON file
        #[arg(long)]
        stats_file: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match cli.command {
        Commands::Providers => cmd_providers(),
        Commands::ParseTime { text } => {
            println!("{}", parse_ad_time(&text));
        }
        Commands::Check { url } => cmd_check(&url),
        Commands::Replay {
            scenario,
            stats_file,
        } => {
            cmd_replay(&scenario, stats_file.as_deref()).await?;
        }
    }

    Ok(())
}

fn cmd_providers() {
    for provider in Provider::ALL {
        let style = match provider {
            Provider::Netflix => "fast-forward window on ad marker",
            Provider::PrimeVideo => "jump by countdown",
            Provider::Hulu => "accelerate and mute while playhead is in an ad",
            Provider::DisneyPlus => "jump by countdown when badge is shown",
        };
        println!(
            "{:<12} {:<28} {style}",
            provider.name(),
            provider.domains().join(", ")
        );
    }
}

fn cmd_check(url: &str) {
    let mut registry = AttachRegistry::new();
    match registry.should_attach(0, url, NavigationStatus::Complete) {
        AttachDecision::Attach(Some(provider)) => println!("attach: {provider}"),
        AttachDecision::Attach(None) => println!("attach: no strategy (idle)"),
        AttachDecision::AlreadyAttached | AttachDecision::Skip => println!("skip"),
    }
}

async fn cmd_replay(path: &Path, stats_file: Option<&Path>) -> Result<()> {
    let scenario = Scenario::load(path)
        .with_context(|| format!("failed to load scenario {}", path.display()))?;

    let mut aggregator = match stats_file {
        Some(file) => StatsAggregator::with_file(file)
            .with_context(|| format!("failed to read {}", file.display()))?,
        None => StatsAggregator::new(),
    };

    let report = run_scenario(&scenario, &mut aggregator)
        .await
        .context("replay failed")?;

    println!("provider:     {}", report.provider);
    println!("position:     {:.2}s", report.position);
    println!("rate:         {}x", report.playback_rate);
    println!("volume:       {}", report.volume);
    println!("phase:        {:?}", report.phase);
    println!("surfaces:     {}", report.surfaces_tracked);
    println!("ads blocked:  {}", report.statistics.ads_blocked);
    println!("time saved:   {}s", report.statistics.time_saved);

    if let Some(file) = aggregator.path() {
        let totals = aggregator.totals();
        println!(
            "totals:       {} ads, {}s ({})",
            totals.ads_blocked,
            totals.time_saved,
            file.display()
        );
    }

    Ok(())
}
