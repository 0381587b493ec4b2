//! arbiscan - Arbitrage Cycle Scanner
//!
//! Run with: cargo run -- --base usdt --max-path-length 4
//!
//! Offline: cargo run -- --pairs-file pairs.json

use clap::Parser;
use color_eyre::eyre::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arbiscan::cartographer::{PairSource, StaticPairs};
use arbiscan::{Config, ScanReport, Scanner};

#[derive(Debug, Parser)]
#[command(name = "arbiscan", version, about = "Find arbitrage cycles in exchange-rate graphs")]
struct Cli {
    /// Asset every cycle starts and ends at (defaults to BASE_ASSET)
    #[arg(short, long)]
    base: Option<String>,

    /// Maximum nodes per cycle, closing repeat excluded
    #[arg(short = 'l', long)]
    max_path_length: Option<usize>,

    /// CoinGecko exchange id to pull tickers from
    #[arg(short, long)]
    exchange: Option<String>,

    /// Read pairs from a JSON file instead of the live provider
    #[arg(long)]
    pairs_file: Option<PathBuf>,

    /// TOML config file (environment is used otherwise)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Search wall-clock budget in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Search step budget
    #[arg(long)]
    max_steps: Option<u64>,

    /// Print the report as JSON instead of a table
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match self.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::from_env()?,
        };

        if let Some(ref base) = self.base {
            config.base_asset = base.clone();
        }
        if let Some(len) = self.max_path_length {
            config.max_path_length = len;
        }
        if let Some(ref exchange) = self.exchange {
            config.exchange_id = exchange.clone();
        }
        if self.timeout_ms.is_some() {
            config.search_timeout_ms = self.timeout_ms;
        }
        if self.max_steps.is_some() {
            config.max_search_steps = self.max_steps;
        }

        Ok(config)
    }
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" 🔁 ARBISCAN - Arbitrage Cycle Scanner").cyan().bold()
    );
    println!(
        "{}",
        style("    Rate Graph | Bounded DFS | Decimal Precision").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn print_report(report: &ScanReport) {
    println!();
    println!("{}", style("═══ SCAN RESULTS ═══").magenta().bold());
    println!();
    println!(
        "{} {} pairs from {} ({} skipped) → {} nodes, {} edges",
        style("✓").green(),
        report.pairs_fetched,
        report.source,
        report.pairs_skipped,
        report.nodes,
        report.edges
    );
    println!(
        "{} Searched from {} with max path length {} ({} steps)",
        style("✓").green(),
        style(&report.base).cyan(),
        report.max_path_length,
        report.search_steps
    );

    if report.truncated {
        println!(
            "{}",
            style("⚠ Search stopped early (timeout/step budget); results are partial").yellow()
        );
    }

    println!();
    if report.opportunities.is_empty() {
        println!("{}", style("No profitable cycles found.").yellow());
        println!("This is normal - quoted markets are usually consistent.");
        return;
    }

    println!(
        "{}",
        style(format!("Found {} opportunities:", report.opportunities.len()))
            .green()
            .bold()
    );
    println!();

    for (i, opp) in report.opportunities.iter().enumerate() {
        println!(
            "  {:>3}. {:+.4}% | {} hops | {}",
            i + 1,
            opp.profit_percentage,
            opp.hop_count(),
            style(opp.format_path()).cyan()
        );
    }

    if let Some(best) = report.best() {
        println!();
        println!(
            "{} Best: {} ({:+.4}%)",
            style("💰").green(),
            style(best.format_path()).cyan().bold(),
            best.profit_percentage
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("arbiscan=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        return Err(e);
    }

    let source: Arc<dyn PairSource> = match cli.pairs_file {
        Some(ref path) => Arc::new(StaticPairs::from_json_file(path)?),
        None => Arc::new(config.pair_source()?),
    };

    if !cli.json {
        print_banner();
        config.print_summary();
    }

    let scanner = Scanner::from_config(&config, source);

    let spinner = if cli.json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")?
    );
    spinner.set_message(format!("Scanning {}...", scanner.source_name()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = scanner
        .find_arbitrage_opportunities(&config.base_asset, config.max_path_length)
        .await;
    spinner.finish_and_clear();
    let report = result?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
        println!();
    }

    Ok(())
}
