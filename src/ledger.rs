//! Trade ledger output
//!
//! One CSV per security and pattern, one row per trade, each row carrying
//! the running counters as they stood right after that trade.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::strategies::inside_day::PatternConfig;
use crate::{LedgerEntry, ScanResult, Symbol};

/// Receives the scan result for each security
pub trait TradeSink: Send + Sync {
    fn write(&self, symbol: &Symbol, pattern: &PatternConfig, result: &ScanResult)
        -> Result<PathBuf>;
}

/// Writes `<results_dir>/<pattern>/<SYMBOL>_trades.csv`
#[derive(Debug, Clone)]
pub struct CsvTradeSink {
    results_dir: PathBuf,
}

impl CsvTradeSink {
    pub fn new(results_dir: impl AsRef<Path>) -> Self {
        Self {
            results_dir: results_dir.as_ref().to_path_buf(),
        }
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn ledger_path(&self, symbol: &Symbol, pattern: &PatternConfig) -> PathBuf {
        self.results_dir
            .join(&pattern.name)
            .join(format!("{}_trades.csv", symbol.as_str()))
    }
}

/// Column names for a pattern's ledger
pub fn ledger_header(pattern: &PatternConfig) -> Vec<String> {
    let mut header: Vec<String> = [
        "Entry_Date",
        "Entry",
        "Stop_Loss",
        "Target",
        pattern.evaluation_label(),
        "Direction",
        "Trade_Result",
        "Profit_or_Loss_Amount",
        "Total Trades",
        "Profitable Trades",
        "Loss Trades",
        "Win Percentage",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    if pattern.report_insider_days {
        header.push("Insider Days".to_string());
    }
    header
}

fn ledger_row(entry: &LedgerEntry, pattern: &PatternConfig) -> Vec<String> {
    let trade = &entry.trade;
    let stats = &entry.stats;

    let mut row = vec![
        trade.entry_date.format("%Y-%m-%d").to_string(),
        trade.entry_price.to_string(),
        trade.stop_loss.to_string(),
        trade.target.to_string(),
        trade.evaluation_close.to_string(),
        trade.direction.to_string(),
        trade.outcome.to_string(),
        trade.profit_or_loss.to_string(),
        stats.total_trades.to_string(),
        stats.profitable_trades.to_string(),
        stats.loss_trades.to_string(),
        stats
            .win_percentage
            .map(|w| format!("{:.2}", w))
            .unwrap_or_default(),
    ];

    if pattern.report_insider_days {
        row.push(trade.insider_days.map(|d| d.to_string()).unwrap_or_default());
    }
    row
}

impl TradeSink for CsvTradeSink {
    fn write(
        &self,
        symbol: &Symbol,
        pattern: &PatternConfig,
        result: &ScanResult,
    ) -> Result<PathBuf> {
        let path = self.ledger_path(symbol, pattern);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create results directory {}", parent.display()))?;
        }

        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create ledger {}", path.display()))?;

        writer.write_record(ledger_header(pattern))?;
        for entry in &result.entries {
            writer.write_record(ledger_row(entry, pattern))?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write ledger {}", path.display()))?;

        info!(
            "Trades data for {} ({} trades) saved to {}",
            symbol,
            result.len(),
            path.display()
        );
        Ok(path)
    }
}
