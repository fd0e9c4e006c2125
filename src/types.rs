//! Core data types used across the backtester

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Consistency problems in a daily bar
///
/// These are diagnostics only. The scanner never rejects a bar, so a series
/// that violates them is still scanned as-is.
#[derive(Debug, Error, PartialEq)]
pub enum BarValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange { open: f64, low: f64, high: f64 },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange { close: f64, low: f64, high: f64 },

    #[error("prices must be positive: open={open}, high={high}, low={low}, close={close}")]
    NonPositivePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

/// One trading day of OHLC data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Bar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume: 0.0,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    /// Check the OHLC invariant (high >= max(open, close), low <= min(open, close))
    pub fn validate(&self) -> Result<(), BarValidationError> {
        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(BarValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(BarValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.open < self.low || self.open > self.high {
            return Err(BarValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if self.close < self.low || self.close > self.high {
            return Err(BarValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// True when this bar trades entirely within `[low, high]` (bounds inclusive)
    #[inline]
    pub fn is_inside(&self, low: f64, high: f64) -> bool {
        self.high <= high && self.low >= low
    }
}

/// Security identifier, e.g. `RELIANCE.NS`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Symbol(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Side of the reference range the breakout close landed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Close above the range high
    Up,
    /// Close below the range low
    Down,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "Up"),
            Direction::Down => write!(f, "Down"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeOutcome {
    Profit,
    Loss,
}

impl std::fmt::Display for TradeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeOutcome::Profit => write!(f, "Profit"),
            TradeOutcome::Loss => write!(f, "Loss"),
        }
    }
}

/// A simulated position opened on a breakout day and read off `horizon` bars later
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub target: f64,
    /// Close of the evaluation bar
    pub evaluation_close: f64,
    pub direction: Direction,
    /// `evaluation_close - entry_price`, regardless of direction
    pub profit_or_loss: f64,
    pub outcome: TradeOutcome,
    /// Bars the range held before the breakout (only for patterns that report it)
    pub insider_days: Option<usize>,
}

/// Running win/loss counters for one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub total_trades: usize,
    pub profitable_trades: usize,
    pub loss_trades: usize,
    /// `None` until the first trade is recorded
    pub win_percentage: Option<f64>,
}

impl RunStatistics {
    pub fn record(&mut self, outcome: TradeOutcome) {
        self.total_trades += 1;
        match outcome {
            TradeOutcome::Profit => self.profitable_trades += 1,
            TradeOutcome::Loss => self.loss_trades += 1,
        }
        self.win_percentage =
            Some(self.profitable_trades as f64 / self.total_trades as f64 * 100.0);
    }

    /// Combine counters from independent scans
    pub fn merge(&self, other: &RunStatistics) -> RunStatistics {
        let total_trades = self.total_trades + other.total_trades;
        let profitable_trades = self.profitable_trades + other.profitable_trades;
        RunStatistics {
            total_trades,
            profitable_trades,
            loss_trades: self.loss_trades + other.loss_trades,
            win_percentage: (total_trades > 0)
                .then(|| profitable_trades as f64 / total_trades as f64 * 100.0),
        }
    }
}

/// A trade together with the counters as they stood right after it was recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub trade: Trade,
    pub stats: RunStatistics,
}

/// Output of scanning one series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub entries: Vec<LedgerEntry>,
    pub stats: RunStatistics,
}

impl ScanResult {
    pub fn trades(&self) -> impl Iterator<Item = &Trade> {
        self.entries.iter().map(|e| &e.trade)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn push(&mut self, trade: Trade) {
        self.stats.record(trade.outcome);
        self.entries.push(LedgerEntry {
            trade,
            stats: self.stats,
        });
    }
}
