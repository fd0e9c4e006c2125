//! Data loading and management
//!
//! Loads daily OHLC series from CSV files and downloads fresh history from
//! Yahoo Finance. The batch driver only sees the `MarketDataSource` trait, so
//! a retrieval failure for one security never reaches the scanner.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::yahoo::YahooClient;
use crate::{Bar, Symbol};

/// Failures while retrieving a series
#[derive(Debug, Error)]
pub enum DataError {
    #[error("data file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("{path} row {row}: {message}")]
    Parse {
        path: PathBuf,
        row: usize,
        message: String,
    },

    #[error("download failed for {symbol}: {message}")]
    Download { symbol: String, message: String },
}

/// Supplies a time-ordered daily series for a security
pub trait MarketDataSource: Send + Sync {
    fn fetch(
        &self,
        symbol: &Symbol,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Bar>, DataError>;
}

// =============================================================================
// CSV Data Loading
// =============================================================================

/// Path of the stored series for `symbol`
pub fn series_path(data_dir: impl AsRef<Path>, symbol: &Symbol) -> PathBuf {
    data_dir.as_ref().join(format!("{}.csv", symbol.as_str()))
}

/// Parse a date string (YYYY-MM-DD, YYYY-MM-DD HH:MM:SS or RFC 3339)
pub fn parse_date(date_str: &str) -> Result<NaiveDate> {
    let date_str = date_str.trim();

    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        return Ok(date);
    }

    if let Ok(ndt) = NaiveDateTime::parse_from_str(date_str, "%Y-%m-%d %H:%M:%S") {
        return Ok(ndt.date());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Ok(dt.date_naive());
    }

    anyhow::bail!(
        "Failed to parse date: {}. Use YYYY-MM-DD or YYYY-MM-DD HH:MM:SS format",
        date_str
    )
}

/// Column positions resolved from the CSV header
struct Columns {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord, path: &Path) -> Result<Self, DataError> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };
        let require = |names: &[&str], column: &'static str| {
            find(names).ok_or_else(|| DataError::MissingColumn {
                path: path.to_path_buf(),
                column,
            })
        };

        Ok(Columns {
            date: require(&["date", "datetime"], "date")?,
            open: require(&["open"], "open")?,
            high: require(&["high"], "high")?,
            low: require(&["low"], "low")?,
            close: require(&["close"], "close")?,
            volume: find(&["volume"]),
        })
    }
}

fn parse_price(record: &csv::StringRecord, index: usize, row: usize, path: &Path) -> Result<f64, DataError> {
    let raw = record.get(index).unwrap_or_default().trim();
    raw.parse::<f64>().map_err(|_| DataError::Parse {
        path: path.to_path_buf(),
        row,
        message: format!("invalid number '{}'", raw),
    })
}

/// Load a daily series from a CSV file
///
/// Columns are matched by header name (case-insensitive): `date` (or
/// `datetime`), `open`, `high`, `low`, `close` and an optional `volume`.
/// Rows are sorted by date and duplicate dates dropped. Bars that break the
/// OHLC invariant are kept, with a warning.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Bar>, DataError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DataError::NotFound(path.to_path_buf()));
    }

    let csv_error = |source| DataError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
    let columns = Columns::from_headers(reader.headers().map_err(csv_error)?, path)?;

    let mut bars = Vec::new();
    let mut invalid_count = 0;

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.map_err(csv_error)?;
        // +2 for 1-indexed and header row
        let row = row_idx + 2;

        let date_str = record.get(columns.date).unwrap_or_default();
        let date = parse_date(date_str).map_err(|e| DataError::Parse {
            path: path.to_path_buf(),
            row,
            message: e.to_string(),
        })?;

        let volume = match columns.volume {
            Some(index) if !record.get(index).unwrap_or_default().trim().is_empty() => {
                parse_price(&record, index, row, path)?
            }
            _ => 0.0,
        };

        let bar = Bar::new(
            date,
            parse_price(&record, columns.open, row, path)?,
            parse_price(&record, columns.high, row, path)?,
            parse_price(&record, columns.low, row, path)?,
            parse_price(&record, columns.close, row, path)?,
        )
        .with_volume(volume);

        if let Err(e) = bar.validate() {
            invalid_count += 1;
            debug!("Inconsistent bar at row {} in {:?}: {}", row, path.file_name().unwrap_or_default(), e);
        }

        bars.push(bar);
    }

    if invalid_count > 0 {
        warn!(
            "{} of {} bars in {:?} break the OHLC invariant; scanning them as-is",
            invalid_count,
            bars.len(),
            path.file_name().unwrap_or_default()
        );
    }

    let original_len = bars.len();
    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);
    if bars.len() < original_len {
        warn!(
            "Dropped {} duplicate dates in {:?}",
            original_len - bars.len(),
            path.file_name().unwrap_or_default()
        );
    }

    Ok(bars)
}

/// Filter bars by inclusive date range
pub fn filter_bars_by_date(
    bars: Vec<Bar>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Vec<Bar> {
    bars.into_iter()
        .filter(|b| {
            let after_start = start.is_none_or(|s| b.date >= s);
            let before_end = end.is_none_or(|e| b.date <= e);
            after_start && before_end
        })
        .collect()
}

/// Write bars in the layout `load_csv` reads
pub fn save_to_csv(bars: &[Bar], path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create data directory")?;
    }

    let mut writer = csv::Writer::from_path(path).context("Failed to create output file")?;
    writer.write_record(["date", "open", "high", "low", "close", "volume"])?;

    for bar in bars {
        writer.write_record([
            bar.date.format("%Y-%m-%d").to_string(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ])?;
    }
    writer.flush()?;

    info!("Saved {} rows to {}", bars.len(), path.display());
    Ok(path.to_path_buf())
}

/// Reads `<data_dir>/<SYMBOL>.csv`
#[derive(Debug, Clone)]
pub struct CsvDataSource {
    data_dir: PathBuf,
}

impl CsvDataSource {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }
}

impl MarketDataSource for CsvDataSource {
    fn fetch(
        &self,
        symbol: &Symbol,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Bar>, DataError> {
        let bars = load_csv(series_path(&self.data_dir, symbol))?;
        let original_len = bars.len();
        let bars = filter_bars_by_date(bars, start, end);

        if start.is_some() || end.is_some() {
            info!(
                "Loaded {} bars for {} (filtered from {} total)",
                bars.len(),
                symbol,
                original_len
            );
        } else {
            info!("Loaded {} bars for {}", bars.len(), symbol);
        }

        Ok(bars)
    }
}

/// Check which symbols have no stored series
pub fn find_missing_data(data_dir: impl AsRef<Path>, symbols: &[Symbol]) -> Vec<Symbol> {
    symbols
        .iter()
        .filter(|symbol| !series_path(data_dir.as_ref(), symbol).exists())
        .cloned()
        .collect()
}

// =============================================================================
// Yahoo Finance Data Fetcher
// =============================================================================

/// Downloads daily history from Yahoo Finance and stores it as CSV
pub struct YahooDataFetcher {
    client: YahooClient,
    pub data_dir: PathBuf,
}

impl YahooDataFetcher {
    pub fn with_client(client: YahooClient, data_dir: impl AsRef<Path>) -> Self {
        YahooDataFetcher {
            client,
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    /// Fetch bars for an inclusive date range
    pub async fn fetch_history(
        &self,
        symbol: &Symbol,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Bar>, DataError> {
        let mut bars = self
            .client
            .get_daily_bars(symbol.as_str(), start, end)
            .await
            .map_err(|e| DataError::Download {
                symbol: symbol.to_string(),
                message: format!("{:#}", e),
            })?;

        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        Ok(filter_bars_by_date(bars, start, end))
    }

    /// Download history for a symbol and save it where `CsvDataSource` looks
    pub async fn download_symbol(
        &self,
        symbol: &Symbol,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<PathBuf> {
        let bars = self.fetch_history(symbol, start, end).await?;

        if bars.is_empty() {
            anyhow::bail!("No data fetched for {}", symbol);
        }

        save_to_csv(&bars, series_path(&self.data_dir, symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2023-11-20").unwrap(), date(2023, 11, 20));
        assert_eq!(parse_date("2023-11-20 09:15:00").unwrap(), date(2023, 11, 20));
        assert_eq!(parse_date("2023-11-20T00:00:00+05:30").unwrap(), date(2023, 11, 20));
        assert!(parse_date("20/11/2023").is_err());
    }

    #[test]
    fn test_load_csv_by_header_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("TCS.NS.csv");
        fs::write(
            &path,
            "Date,Open,High,Low,Close,Adj Close,Volume\n\
             2023-01-03,101,103,100,102,101.5,1000\n\
             2023-01-02,100,102,99,101,100.5,900\n\
             2023-01-03,101,103,100,102,101.5,1000\n",
        )
        .unwrap();

        let bars = load_csv(&path).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, date(2023, 1, 2));
        assert_eq!(bars[1].close, 102.0);
        assert_eq!(bars[1].volume, 1000.0);
    }

    #[test]
    fn test_load_csv_keeps_inconsistent_bars() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("X.csv");
        fs::write(&path, "date,open,high,low,close\n2023-01-02,100,90,95,120\n").unwrap();

        let bars = load_csv(&path).unwrap();
        assert_eq!(bars.len(), 1);
        assert!(!bars[0].is_valid());
        assert_eq!(bars[0].volume, 0.0);
    }

    #[test]
    fn test_load_csv_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = load_csv(dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(missing, DataError::NotFound(_)));

        let path = dir.path().join("bad.csv");
        fs::write(&path, "date,open,high,close\n2023-01-02,1,2,1\n").unwrap();
        assert!(matches!(
            load_csv(&path).unwrap_err(),
            DataError::MissingColumn { column: "low", .. }
        ));

        fs::write(&path, "date,open,high,low,close\n2023-01-02,1,2,x,1\n").unwrap();
        assert!(matches!(
            load_csv(&path).unwrap_err(),
            DataError::Parse { row: 2, .. }
        ));
    }

    #[test]
    fn test_filter_bars_by_date() {
        let bars: Vec<Bar> = (1..=5)
            .map(|d| Bar::new(date(2023, 1, d), 1.0, 1.0, 1.0, 1.0))
            .collect();

        let filtered = filter_bars_by_date(bars.clone(), Some(date(2023, 1, 2)), Some(date(2023, 1, 4)));
        assert_eq!(filtered.len(), 3);
        assert_eq!(filter_bars_by_date(bars, None, None).len(), 5);
    }

    #[test]
    fn test_save_and_fetch_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let symbol = Symbol::new("ITC.NS");
        let bars = vec![
            Bar::new(date(2023, 1, 2), 100.0, 102.0, 99.0, 101.0).with_volume(10.0),
            Bar::new(date(2023, 1, 3), 101.0, 103.0, 100.0, 102.5),
        ];

        save_to_csv(&bars, series_path(dir.path(), &symbol)).unwrap();

        let source = CsvDataSource::new(dir.path());
        assert_eq!(source.fetch(&symbol, None, None).unwrap(), bars);
        assert_eq!(
            source.fetch(&symbol, Some(date(2023, 1, 3)), None).unwrap().len(),
            1
        );
        assert!(find_missing_data(dir.path(), &[symbol]).is_empty());
    }
}
