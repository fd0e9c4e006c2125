//! Backtest command implementation

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use inside_day_breakout::config::PatternSelection;
use inside_day_breakout::data::{self, CsvDataSource};
use inside_day_breakout::ledger::CsvTradeSink;
use inside_day_breakout::{strategies, BatchRunner, BatchSummary, Config};
use tracing::{debug, info};

use super::parse_date_arg;

pub fn run(
    config_path: String,
    pattern_overrides: Vec<String>,
    start_override: Option<String>,
    end_override: Option<String>,
    sequential: bool,
) -> Result<()> {
    info!("Starting backtest");

    let mut config = Config::from_file(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path))?;
    info!("Loaded configuration from: {}", config_path);

    if !pattern_overrides.is_empty() {
        info!("Overriding patterns to: {:?}", pattern_overrides);
        config.scan.patterns = pattern_overrides
            .into_iter()
            .map(PatternSelection::Preset)
            .collect();
    }
    if let Some(start) = parse_date_arg("start", start_override)? {
        config.data.start_date = Some(start);
    }
    if let Some(end) = parse_date_arg("end", end_override)? {
        config.data.end_date = Some(end);
    }
    let sequential = sequential || config.scan.sequential;

    let patterns = config.patterns()?;
    let symbols = config.symbols();
    debug!("Symbols: {:?}", symbols);

    let missing = data::find_missing_data(&config.data.data_dir, &symbols);
    if !missing.is_empty() {
        println!("\n{}", "=".repeat(60));
        println!("MISSING DATA");
        println!("{}", "=".repeat(60));
        println!("  Missing files: {}", missing.len());
        for symbol in &missing {
            println!("    - {}.csv", symbol);
        }
        println!("  These symbols will be recorded with zero trades.");
        println!("  Run `inside-day-breakout download` to fetch them.");
        println!("{}\n", "=".repeat(60));
    }

    let source = CsvDataSource::new(&config.data.data_dir);
    let sink = CsvTradeSink::new(&config.output.results_dir);

    println!("\n{}", "=".repeat(60));
    println!("INSIDE-DAY BREAKOUT BACKTEST");
    println!("{}", "=".repeat(60));
    println!("  Symbols:  {}", symbols.len());
    println!(
        "  Patterns: {:?}",
        patterns.iter().map(|p| p.name.as_str()).collect::<Vec<_>>()
    );
    println!(
        "  Range:    {} to {}",
        config.data.start_date.map_or("start".to_string(), |d| d.to_string()),
        config.data.end_date.map_or("end".to_string(), |d| d.to_string())
    );
    println!(
        "  Mode:     {}",
        if sequential { "sequential" } else { "parallel" }
    );
    println!("{}\n", "=".repeat(60));

    for pattern in patterns {
        let scanner = strategies::create_scanner(&pattern)?;

        let pb = if sequential {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new(symbols.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("⚡ {percent:>3}%|{bar:40}| {pos}/{len} [{elapsed}<{eta}] {msg}")
                    .context("Invalid progress bar template")?
                    .progress_chars("█░ "),
            );
            pb.set_message(pattern.name.clone());
            pb.tick();
            pb
        };

        let runner = BatchRunner::new(scanner, symbols.clone())
            .with_date_range(config.data.start_date, config.data.end_date)
            .sequential(sequential)
            .with_progress(pb.clone());

        let summary = runner.run(&source, &sink)?;
        pb.finish_and_clear();

        print_summary(&summary, sink.results_dir());
    }

    info!("Backtest completed successfully");

    Ok(())
}

fn print_summary(summary: &BatchSummary, results_dir: &std::path::Path) {
    println!("\n{}", "=".repeat(60));
    println!("RESULTS: {}", summary.pattern);
    println!("{}", "=".repeat(60));
    println!(
        "  {:<16} {:>6} {:>7} {:>7} {:>7} {:>8}",
        "Symbol", "Bars", "Trades", "Wins", "Losses", "Win %"
    );
    println!("{}", "-".repeat(60));

    for report in &summary.reports {
        let win = report
            .stats
            .win_percentage
            .map_or("-".to_string(), |w| format!("{:.2}", w));
        let marker = if report.data_error.is_some() { " ⚠" } else { "" };
        println!(
            "  {:<16} {:>6} {:>7} {:>7} {:>7} {:>8}{}",
            report.symbol.as_str(),
            report.bars,
            report.stats.total_trades,
            report.stats.profitable_trades,
            report.stats.loss_trades,
            win,
            marker
        );
    }

    println!("{}", "-".repeat(60));
    println!("Total Trades:       {}", summary.totals.total_trades);
    println!("Profitable Trades:  {}", summary.totals.profitable_trades);
    println!("Loss Trades:        {}", summary.totals.loss_trades);
    match summary.totals.win_percentage {
        Some(w) => println!("Win Percentage:     {:.2}%", w),
        None => println!("Win Percentage:     n/a"),
    }
    if let Some(line) = missing_data_line(summary) {
        println!("{}", line);
    }
    println!(
        "Ledgers:            {}",
        results_dir.join(&summary.pattern).display()
    );
    println!("{}", "=".repeat(60));
}

/// Names of the symbols that were scanned as empty, if any
fn missing_data_line(summary: &BatchSummary) -> Option<String> {
    let failed: Vec<&str> = summary.failed_symbols().map(|s| s.as_str()).collect();
    if failed.is_empty() {
        return None;
    }
    Some(format!(
        "⚠ No data ({}): {}",
        failed.len(),
        failed.join(", ")
    ))
}
