//! Inside-Day Breakout Pattern
//!
//! A range day followed by inside days, then a close outside the range.

mod config;
mod strategy;

pub use config::{PatternConfig, PatternConfigError, StopLossRule, DEFAULT_EVALUATION_LABEL};
pub use strategy::{classify, scan, target_price, InsideDayScanner};

use crate::strategies::PatternScanner;

/// Build a scanner after checking the pattern parameters
pub fn create(config: &PatternConfig) -> Result<Box<dyn PatternScanner>, PatternConfigError> {
    config.validate()?;
    Ok(Box::new(InsideDayScanner::new(config.clone())))
}
