//! Yahoo Finance chart API response types

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

use crate::Bar;

/// Top-level `/v8/finance/chart` response
#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    pub chart: Chart,
}

#[derive(Debug, Deserialize)]
pub struct Chart {
    pub result: Option<Vec<ChartResult>>,
    pub error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
pub struct ChartError {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct ChartResult {
    #[serde(default)]
    pub meta: ChartMeta,
    /// Bar open times, seconds since the epoch
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    pub symbol: Option<String>,
    /// Exchange offset from UTC, seconds
    #[serde(default)]
    pub gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<Quote>,
}

/// Parallel price columns; holidays and halts show up as `null`
#[derive(Debug, Default, Deserialize)]
pub struct Quote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

impl ChartResult {
    /// Convert to daily bars, skipping rows with any missing price
    pub fn to_bars(&self) -> Vec<Bar> {
        let Some(quote) = self.indicators.quote.first() else {
            return Vec::new();
        };

        self.timestamp
            .iter()
            .enumerate()
            .filter_map(|(i, &ts)| {
                let date = exchange_date(ts, self.meta.gmtoffset)?;
                let open = (*quote.open.get(i)?)?;
                let high = (*quote.high.get(i)?)?;
                let low = (*quote.low.get(i)?)?;
                let close = (*quote.close.get(i)?)?;
                let volume = quote.volume.get(i).copied().flatten().unwrap_or(0.0);
                Some(Bar::new(date, open, high, low, close).with_volume(volume))
            })
            .collect()
    }
}

/// Trading date of a bar as seen on the exchange's own calendar
fn exchange_date(timestamp: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp + gmtoffset, 0).map(|dt| dt.date_naive())
}
