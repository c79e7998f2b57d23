//! Sunrise CLI: run the engine over a synthetic feed, print and validate configs.
//!
//! Commands:
//! - `run`: replay a seeded synthetic feed through the engine and SimBroker
//! - `config`: print the default configuration as TOML
//! - `validate`: load and validate a TOML configuration file

use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use sunrise_core::config::StrategyConfig;
use sunrise_core::engine::{run_backtest, JsonLinesLedger, RunResult, TradeLedger};
use sunrise_core::synthetic::SyntheticFeed;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sunrise",
    about = "Sunrise: bar-driven pullback/breakout execution core"
)]
struct Cli {
    /// Log filter (e.g. "info", "sunrise_core=debug"). Falls back to RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine over a seeded synthetic feed and print a summary.
    Run {
        /// TOML strategy config. Defaults are used when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of synthetic bars to generate.
        #[arg(long, default_value_t = 5_000)]
        bars: usize,

        /// Seed for the synthetic feed.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// First bar date (YYYY-MM-DD). Defaults to 2024-01-01.
        #[arg(long)]
        start: Option<String>,

        /// Write the full run result as JSON to this file.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write closed trades as JSON lines to this file.
        #[arg(long)]
        trades: Option<PathBuf>,
    },
    /// Print the default configuration as TOML.
    Config,
    /// Load and validate a TOML configuration file.
    Validate {
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref())?;

    match cli.command {
        Commands::Run {
            config,
            bars,
            seed,
            start,
            output,
            trades,
        } => run_cmd(config, bars, seed, start, output, trades),
        Commands::Config => {
            print!("{}", StrategyConfig::default().to_toml_string()?);
            Ok(())
        }
        Commands::Validate { config } => validate_cmd(&config),
    }
}

fn init_logging(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid log filter '{directive}'"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<StrategyConfig> {
    match path {
        Some(p) => StrategyConfig::from_path(p)
            .with_context(|| format!("failed to load config {}", p.display())),
        None => Ok(StrategyConfig::default()),
    }
}

fn run_cmd(
    config_path: Option<PathBuf>,
    bars: usize,
    seed: u64,
    start: Option<String>,
    output: Option<PathBuf>,
    trades: Option<PathBuf>,
) -> Result<()> {
    let cfg = load_config(config_path.as_deref())?;

    let mut feed = SyntheticFeed::default();
    if let Some(s) = start.as_deref() {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid --start date '{s}'"))?;
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .context("invalid --start date")?;
        feed = feed.with_start(Utc.from_utc_datetime(&midnight));
    }
    let series = feed.generate(bars, seed);
    info!(bars, seed, "generated synthetic feed");

    let result = run_backtest(&series, &cfg)?;
    print_summary(&result);

    if let Some(path) = output {
        let file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &result)?;
        println!("Result saved to: {}", path.display());
    }

    if let Some(path) = trades {
        let file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut ledger = JsonLinesLedger::new(BufWriter::new(file));
        for trade in &result.trades {
            ledger.record(trade)?;
        }
        let written = ledger.written();
        ledger.into_inner().flush()?;
        println!("{written} trades written to: {}", path.display());
    }
    Ok(())
}

fn validate_cmd(path: &Path) -> Result<()> {
    let cfg = load_config(Some(path))?;
    cfg.validate()
        .with_context(|| format!("{} is not a valid config", path.display()))?;
    println!("{}: ok (hash {})", path.display(), cfg.config_hash()?);
    Ok(())
}

fn print_summary(result: &RunResult) {
    let s = &result.summary;
    let d = &result.diagnostics;

    println!();
    println!("=== {} ===", result.strategy);
    println!("Config hash:     {}", result.config_hash);
    println!("Bars:            {} ({} processed)", result.bar_count, d.bars_processed);
    println!();
    println!("--- Trades ---");
    println!("Closed trades:   {}", s.trade_count);
    println!("Win rate:        {:.2}%", s.win_rate * 100.0);
    match s.profit_factor {
        Some(pf) => println!("Profit factor:   {pf:.2}"),
        None => println!("Profit factor:   n/a"),
    }
    println!("Gross PnL:       {:.2}", s.gross_pnl);
    println!("Costs:           {:.2}", s.total_costs);
    println!("Net PnL:         {:.2}", s.net_pnl);
    println!("Avg bars held:   {:.1}", s.avg_bars_held);
    println!("Final equity:    {:.2}", result.final_equity);
    for (reason, count) in &s.exit_reasons {
        println!("  {:<16} {count}", reason.to_string());
    }
    if let Some(pos) = &result.open_position {
        println!(
            "Open position:   {} @ {:.5} (stop {:.5})",
            pos.size, pos.entry_price, pos.stop_level
        );
    }
    println!();
    println!("--- Signals ---");
    println!("Armed:           {}", d.armed);
    println!("Windows opened:  {}", d.windows_opened);
    println!("Entries fired:   {}", d.entries_fired);
    println!("Filter rejects:  {}", d.filters.total());
    for (reason, count) in &d.skips {
        println!("  skipped {reason:?}: {count}");
    }
    if d.reconciliation_conflicts > 0 {
        println!("Conflicts:       {}", d.reconciliation_conflicts);
    }
}
