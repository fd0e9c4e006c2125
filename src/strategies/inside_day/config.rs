//! Inside-Day Pattern Configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Column label used for the evaluation close when a pattern doesn't name one
pub const DEFAULT_EVALUATION_LABEL: &str = "Evaluation_Close";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternConfigError {
    #[error("pattern '{0}': consolidation_days must be at least 1")]
    ZeroConsolidationDays(String),

    #[error("pattern '{0}': breakout_window must be at least 1")]
    ZeroBreakoutWindow(String),

    #[error("pattern '{0}': horizon must be at least 1")]
    ZeroHorizon(String),

    #[error("pattern '{0}': consolidation_days + breakout_window + horizon is too large")]
    WindowTooLarge(String),

    #[error("unknown pattern preset '{name}'. Available presets: {available}")]
    UnknownPreset { name: String, available: String },
}

/// Where the stop-loss is placed relative to the breakout bar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopLossRule {
    /// Breakout bar's open
    #[default]
    Open,
    /// Breakout bar's high on a downward breakout, its low on an upward one
    HighOrLowByDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Preset or user-chosen name; also used as the results sub-directory
    pub name: String,

    /// Inside days required after the range day (default: 2)
    pub consolidation_days: usize,

    /// Bars searched for a breakout close once consolidation is confirmed (default: 1)
    pub breakout_window: usize,

    /// Bars after the breakout day at which the outcome is read (default: 3)
    pub horizon: usize,

    #[serde(default)]
    pub stop_loss_rule: StopLossRule,

    /// Record how many bars the range held before breaking
    #[serde(default)]
    pub report_insider_days: bool,

    /// Header for the evaluation close column in the trade ledger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_label: Option<String>,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self::third_day()
    }
}

impl PatternConfig {
    /// Two inside days, breakout on the fourth bar, outcome read three bars later
    pub fn third_day() -> Self {
        Self {
            name: "third_day".to_string(),
            consolidation_days: 2,
            breakout_window: 1,
            horizon: 3,
            stop_loss_rule: StopLossRule::Open,
            report_insider_days: false,
            evaluation_label: Some("Seventh_Day_Close".to_string()),
        }
    }

    /// `third_day` with the stop on the breakout bar's far wick
    pub fn third_day_wick() -> Self {
        Self {
            name: "third_day_wick".to_string(),
            stop_loss_rule: StopLossRule::HighOrLowByDirection,
            ..Self::third_day()
        }
    }

    /// Three inside days, breakout on the fifth bar, outcome read three bars later
    pub fn fourth_day() -> Self {
        Self {
            name: "fourth_day".to_string(),
            consolidation_days: 3,
            breakout_window: 1,
            horizon: 3,
            stop_loss_rule: StopLossRule::Open,
            report_insider_days: false,
            evaluation_label: Some("Eighth_Day_Close".to_string()),
        }
    }

    /// Three inside days, breakout searched over the next three bars,
    /// outcome read two bars after whichever bar broke out
    pub fn dynamic() -> Self {
        Self {
            name: "dynamic".to_string(),
            consolidation_days: 3,
            breakout_window: 3,
            horizon: 2,
            stop_loss_rule: StopLossRule::Open,
            report_insider_days: true,
            evaluation_label: Some("Closing_Day_Close".to_string()),
        }
    }

    /// Bars needed past a start index for its window to be scanned
    ///
    /// Saturates, so an unvalidated oversized pattern scans nothing.
    pub fn min_window(&self) -> usize {
        self.checked_min_window().unwrap_or(usize::MAX)
    }

    fn checked_min_window(&self) -> Option<usize> {
        self.consolidation_days
            .checked_add(self.breakout_window)?
            .checked_add(self.horizon)?
            .checked_add(1)
    }

    pub fn evaluation_label(&self) -> &str {
        self.evaluation_label
            .as_deref()
            .unwrap_or(DEFAULT_EVALUATION_LABEL)
    }

    pub fn validate(&self) -> Result<(), PatternConfigError> {
        if self.consolidation_days == 0 {
            return Err(PatternConfigError::ZeroConsolidationDays(self.name.clone()));
        }
        if self.breakout_window == 0 {
            return Err(PatternConfigError::ZeroBreakoutWindow(self.name.clone()));
        }
        if self.horizon == 0 {
            return Err(PatternConfigError::ZeroHorizon(self.name.clone()));
        }
        if self.checked_min_window().is_none() {
            return Err(PatternConfigError::WindowTooLarge(self.name.clone()));
        }
        Ok(())
    }
}
