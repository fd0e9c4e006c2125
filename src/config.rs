//! Configuration management
//!
//! Handles loading and parsing of the JSON run configuration: which
//! securities to scan, over which dates, with which patterns, and where
//! the ledgers go.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::strategies::{self, inside_day::PatternConfig};
use crate::Symbol;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        Ok(config)
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.symbols.iter().map(|s| Symbol::new(s.clone())).collect()
    }

    /// Resolve every pattern selection into a validated `PatternConfig`
    pub fn patterns(&self) -> Result<Vec<PatternConfig>> {
        self.scan
            .patterns
            .iter()
            .map(|selection| -> Result<PatternConfig> {
                let pattern = match selection {
                    PatternSelection::Preset(name) => strategies::preset(name)?,
                    PatternSelection::Custom(pattern) => pattern.clone(),
                };
                pattern.validate()?;
                Ok(pattern)
            })
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            symbols: default_symbols(),
            data: DataConfig::default(),
            scan: ScanConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

fn default_symbols() -> Vec<String> {
    [
        "ICICIBANK.NS",
        "RELIANCE.NS",
        "BAJAJ-AUTO.NS",
        "MARUTI.NS",
        "LTIM.NS",
        "TITAN.NS",
        "ULTRACEMCO.NS",
        "NTPC.NS",
        "TATACONSUM.NS",
        "KOTAKBANK.NS",
        "HDFCLIFE.NS",
        "COALINDIA.NS",
        "TATASTEEL.NS",
        "BAJFINANCE.NS",
        "BAJAJFINSV.NS",
        "ITC.NS",
        "HEROMOTOCO.NS",
        "INDUSINDBK.NS",
        "NESTLEIND.NS",
        "TECHM.NS",
        "ONGC.NS",
        "BRITANNIA.NS",
        "HINDALCO.NS",
        "TCS.NS",
        "APOLLOHOSP.NS",
        "WIPRO.NS",
        "CIPLA.NS",
        "ADANIENT.NS",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Price history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub data_dir: String,
    /// Inclusive, `YYYY-MM-DD`
    pub start_date: Option<NaiveDate>,
    /// Inclusive, `YYYY-MM-DD`
    pub end_date: Option<NaiveDate>,
    /// Attempts after the first failed download request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    3
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            data_dir: "data".to_string(),
            start_date: NaiveDate::from_ymd_opt(2018, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2023, 11, 19),
            max_retries: default_max_retries(),
        }
    }
}

/// A preset name (`"dynamic"`) or a full inline pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternSelection {
    Preset(String),
    Custom(PatternConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub patterns: Vec<PatternSelection>,
    /// Scan securities one at a time instead of in parallel
    #[serde(default)]
    pub sequential: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            patterns: ["dynamic", "third_day", "fourth_day"]
                .iter()
                .map(|name| PatternSelection::Preset(name.to_string()))
                .collect(),
            sequential: false,
        }
    }
}

/// Ledger output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub results_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            results_dir: "results".to_string(),
        }
    }
}
