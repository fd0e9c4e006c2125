//! Inside-Day Breakout Backtester
//!
//! Scans daily OHLC series for an inside-day consolidation followed by a
//! close outside the reference range, simulates a trade from the breakout
//! close, and reads the outcome a fixed number of bars later. Results are
//! written as one trade ledger per security and pattern.
//!
//! # Market Data
//!
//! Series are read from CSV files; the **Yahoo Finance** chart client fills
//! the data directory (public endpoint, no API key required).
//!
//! ## Scanning a Series
//! ```no_run
//! use inside_day_breakout::data::load_csv;
//! use inside_day_breakout::strategies::inside_day::{scan, PatternConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let bars = load_csv("data/RELIANCE.NS.csv")?;
//!     let result = scan(&bars, &PatternConfig::dynamic());
//!     println!("{} trades, win rate {:?}", result.len(), result.stats.win_percentage);
//!     Ok(())
//! }
//! ```
//!
//! ## Yahoo Finance Example
//! ```no_run
//! use inside_day_breakout::yahoo::YahooClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = YahooClient::new()?;
//!     let bars = client.get_daily_bars("TCS.NS", None, None).await?;
//!     println!("Fetched {} bars", bars.len());
//!     Ok(())
//! }
//! ```

pub mod backtest;
pub mod config;
pub mod data;
pub mod ledger;
pub mod strategies;
pub mod types;
pub mod yahoo;

pub use backtest::{BatchRunner, BatchSummary, SymbolReport};
pub use config::Config;
pub use strategies::PatternScanner;
pub use types::*;
