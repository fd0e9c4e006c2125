//! Download command - fetch daily history from Yahoo Finance

use anyhow::{Context, Result};
use inside_day_breakout::data::YahooDataFetcher;
use inside_day_breakout::yahoo::{ClientConfig, YahooClient};
use inside_day_breakout::{Config, Symbol};
use tracing::info;

use super::parse_date_arg;

pub fn run(
    config_path: String,
    symbols_override: Option<String>,
    start_override: Option<String>,
    end_override: Option<String>,
    output_override: Option<String>,
) -> Result<()> {
    let config = Config::from_file(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path))?;

    let symbols: Vec<Symbol> = match symbols_override {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Symbol::new)
            .collect(),
        None => config.symbols(),
    };
    let start = parse_date_arg("start", start_override)?.or(config.data.start_date);
    let end = parse_date_arg("end", end_override)?.or(config.data.end_date);
    let output = output_override.unwrap_or_else(|| config.data.data_dir.clone());

    info!("Starting data download from Yahoo Finance");

    // Create a tokio runtime for async operations
    let rt = tokio::runtime::Runtime::new()?;

    let client =
        YahooClient::with_config(ClientConfig::default().with_max_retries(config.data.max_retries))?;
    let fetcher = YahooDataFetcher::with_client(client, &output);

    println!("\n{}", "=".repeat(60));
    println!("DOWNLOADING DAILY HISTORY FROM YAHOO FINANCE");
    println!("{}", "=".repeat(60));
    println!("  Symbols: {}", symbols.len());
    println!(
        "  Range:   {} to {}",
        start.map_or("listing".to_string(), |d| d.to_string()),
        end.map_or("today".to_string(), |d| d.to_string())
    );
    println!("  Output:  {}", output);
    println!("{}\n", "=".repeat(60));

    let mut success_count = 0;

    for symbol in &symbols {
        print!("  Downloading {}... ", symbol);

        match rt.block_on(fetcher.download_symbol(symbol, start, end)) {
            Ok(filepath) => {
                println!("✓ {}", filepath.display());
                success_count += 1;
            }
            Err(e) => {
                println!("✗ Error: {:#}", e);
            }
        }
    }

    println!("\n{}", "=".repeat(60));
    println!("DOWNLOAD COMPLETE");
    println!("{}", "=".repeat(60));
    println!("  Successful: {}/{}", success_count, symbols.len());
    println!("{}", "=".repeat(60));

    Ok(())
}
