//! Batch backtest driver
//!
//! Runs one pattern across a list of securities: fetch the series, scan it,
//! hand the result to the ledger sink. Securities are independent, so they
//! fan out over rayon unless a sequential run is requested.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::data::MarketDataSource;
use crate::ledger::TradeSink;
use crate::strategies::PatternScanner;
use crate::{RunStatistics, Symbol};

/// Outcome for one security
#[derive(Debug, Clone, Serialize)]
pub struct SymbolReport {
    pub symbol: Symbol,
    pub bars: usize,
    pub stats: RunStatistics,
    pub ledger: PathBuf,
    /// Set when the series could not be retrieved and was scanned as empty
    pub data_error: Option<String>,
}

/// Results of running one pattern over every configured security
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub pattern: String,
    pub reports: Vec<SymbolReport>,
    pub totals: RunStatistics,
}

impl BatchSummary {
    fn from_reports(pattern: String, reports: Vec<SymbolReport>) -> Self {
        let totals = reports
            .iter()
            .fold(RunStatistics::default(), |acc, r| acc.merge(&r.stats));
        BatchSummary {
            pattern,
            reports,
            totals,
        }
    }

    pub fn failed_symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.reports
            .iter()
            .filter(|r| r.data_error.is_some())
            .map(|r| &r.symbol)
    }
}

pub struct BatchRunner {
    scanner: Box<dyn PatternScanner>,
    symbols: Vec<Symbol>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    sequential: bool,
    progress: ProgressBar,
}

impl BatchRunner {
    pub fn new(scanner: Box<dyn PatternScanner>, symbols: Vec<Symbol>) -> Self {
        BatchRunner {
            scanner,
            symbols,
            start: None,
            end: None,
            sequential: false,
            progress: ProgressBar::hidden(),
        }
    }

    /// Restrict every series to an inclusive date range
    pub fn with_date_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Run securities one at a time instead of in parallel
    pub fn sequential(mut self, sequential: bool) -> Self {
        self.sequential = sequential;
        self
    }

    /// Advance `progress` once per finished security
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Scan every security and write its ledger
    ///
    /// A security whose series can't be retrieved is logged and recorded
    /// with zero trades. A sink failure stops the run.
    pub fn run(&self, source: &dyn MarketDataSource, sink: &dyn TradeSink) -> Result<BatchSummary> {
        info!(
            "Running pattern '{}' over {} symbols{}",
            self.scanner.name(),
            self.symbols.len(),
            if self.sequential { " sequentially" } else { "" }
        );

        let reports: Vec<SymbolReport> = if self.sequential {
            self.symbols
                .iter()
                .map(|symbol| self.run_symbol(symbol, source, sink))
                .collect::<Result<_>>()?
        } else {
            self.symbols
                .par_iter()
                .map(|symbol| self.run_symbol(symbol, source, sink))
                .collect::<Result<_>>()?
        };

        let summary = BatchSummary::from_reports(self.scanner.name().to_string(), reports);
        info!(
            "Pattern '{}' complete: {} trades across {} symbols",
            summary.pattern,
            summary.totals.total_trades,
            summary.reports.len()
        );
        Ok(summary)
    }

    fn run_symbol(
        &self,
        symbol: &Symbol,
        source: &dyn MarketDataSource,
        sink: &dyn TradeSink,
    ) -> Result<SymbolReport> {
        let (bars, data_error) = match source.fetch(symbol, self.start, self.end) {
            Ok(bars) => (bars, None),
            Err(e) => {
                warn!("No data for {}: {}; recording zero trades", symbol, e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        let result = self.scanner.scan(&bars);
        debug!(
            "{} [{}]: {} bars, {} trades",
            symbol,
            self.scanner.name(),
            bars.len(),
            result.len()
        );

        let ledger = sink
            .write(symbol, self.scanner.pattern(), &result)
            .with_context(|| format!("Failed to write trades for {}", symbol))?;

        self.progress.inc(1);

        Ok(SymbolReport {
            symbol: symbol.clone(),
            bars: bars.len(),
            stats: result.stats,
            ledger,
            data_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataError;
    use crate::strategies::inside_day::{InsideDayScanner, PatternConfig};
    use crate::{Bar, ScanResult};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MapSource(HashMap<Symbol, Vec<Bar>>);

    impl MarketDataSource for MapSource {
        fn fetch(
            &self,
            symbol: &Symbol,
            _start: Option<NaiveDate>,
            _end: Option<NaiveDate>,
        ) -> Result<Vec<Bar>, DataError> {
            self.0
                .get(symbol)
                .cloned()
                .ok_or_else(|| DataError::NotFound(PathBuf::from(symbol.as_str())))
        }
    }

    #[derive(Default)]
    struct MemorySink(Mutex<Vec<(Symbol, usize)>>);

    impl TradeSink for MemorySink {
        fn write(&self, symbol: &Symbol, _: &PatternConfig, result: &ScanResult) -> Result<PathBuf> {
            self.0.lock().unwrap().push((symbol.clone(), result.len()));
            Ok(PathBuf::from(format!("{}.csv", symbol)))
        }
    }

    struct FailingSink;

    impl TradeSink for FailingSink {
        fn write(&self, _: &Symbol, _: &PatternConfig, _: &ScanResult) -> Result<PathBuf> {
            anyhow::bail!("disk full")
        }
    }

    fn breakout_series() -> Vec<Bar> {
        let d = |i: u64| {
            NaiveDate::from_ymd_opt(2023, 1, 2)
                .unwrap()
                .checked_add_days(chrono::Days::new(i))
                .unwrap()
        };
        vec![
            Bar::new(d(0), 95.0, 100.0, 90.0, 95.0),
            Bar::new(d(1), 95.0, 99.0, 91.0, 95.0),
            Bar::new(d(2), 95.0, 98.0, 92.0, 95.0),
            Bar::new(d(3), 102.0, 106.0, 101.0, 105.0),
            Bar::new(d(4), 105.0, 107.0, 104.0, 106.0),
            Bar::new(d(5), 106.0, 108.0, 105.0, 107.0),
            Bar::new(d(6), 107.0, 109.0, 106.0, 108.0),
        ]
    }

    fn runner(symbols: &[&str]) -> BatchRunner {
        BatchRunner::new(
            Box::new(InsideDayScanner::new(PatternConfig::third_day())),
            symbols.iter().map(|s| Symbol::new(*s)).collect(),
        )
    }

    #[test]
    fn test_missing_series_yields_zero_trades() {
        let source = MapSource(HashMap::from([(Symbol::new("TCS.NS"), breakout_series())]));
        let sink = MemorySink::default();

        let summary = runner(&["TCS.NS", "GONE.NS"]).run(&source, &sink).unwrap();

        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.reports[0].stats.total_trades, 1);
        assert_eq!(summary.reports[1].stats.total_trades, 0);
        assert_eq!(summary.totals.total_trades, 1);
        assert_eq!(summary.totals.win_percentage, Some(100.0));
        assert_eq!(summary.failed_symbols().collect::<Vec<_>>(), vec![&Symbol::new("GONE.NS")]);
        // Every symbol still reaches the sink
        assert_eq!(sink.0.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let source = MapSource(HashMap::from([
            (Symbol::new("A"), breakout_series()),
            (Symbol::new("B"), breakout_series()),
        ]));

        let parallel = runner(&["A", "B"]).run(&source, &MemorySink::default()).unwrap();
        let sequential = runner(&["A", "B"])
            .sequential(true)
            .run(&source, &MemorySink::default())
            .unwrap();

        assert_eq!(parallel.totals, sequential.totals);
        assert_eq!(parallel.totals.total_trades, 2);
    }

    #[test]
    fn test_sink_failure_propagates() {
        let source = MapSource(HashMap::new());
        let err = runner(&["A"]).run(&source, &FailingSink).unwrap_err();
        assert!(format!("{:#}", err).contains("disk full"));
    }
}
