pub mod backtest;
pub mod download;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use inside_day_breakout::data::parse_date;

/// Parse an optional `--start`/`--end` override
pub fn parse_date_arg(flag: &str, value: Option<String>) -> Result<Option<NaiveDate>> {
    value
        .map(|v| parse_date(&v).with_context(|| format!("Invalid --{} date", flag)))
        .transpose()
}
