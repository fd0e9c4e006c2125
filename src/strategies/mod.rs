//! Pattern Scanners
//!
//! The scanner trait the batch driver runs against, plus the registry of
//! named inside-day presets.

pub mod inside_day;

use crate::{Bar, ScanResult};
use inside_day::{PatternConfig, PatternConfigError};

/// A pure scan over one security's daily series
pub trait PatternScanner: Send + Sync {
    /// Pattern identifier, used to name the results directory
    fn name(&self) -> &str;

    /// Parameters the scanner was built with
    fn pattern(&self) -> &PatternConfig;

    /// Scan the whole series. Must not depend on anything but `bars`.
    fn scan(&self, bars: &[Bar]) -> ScanResult;
}

/// Constructor for a named preset
pub type PresetFactory = fn() -> PatternConfig;

/// Named presets, in the order they are listed to users
pub const PRESETS: &[(&str, PresetFactory)] = &[
    ("third_day", PatternConfig::third_day as PresetFactory),
    ("third_day_wick", PatternConfig::third_day_wick as PresetFactory),
    ("fourth_day", PatternConfig::fourth_day as PresetFactory),
    ("dynamic", PatternConfig::dynamic as PresetFactory),
];

/// Look up a preset by name
pub fn preset(name: &str) -> Result<PatternConfig, PatternConfigError> {
    PRESETS
        .iter()
        .find(|(preset_name, _)| *preset_name == name)
        .map(|(_, factory)| factory())
        .ok_or_else(|| PatternConfigError::UnknownPreset {
            name: name.to_string(),
            available: available_presets().join(", "),
        })
}

/// Get list of preset names
pub fn available_presets() -> Vec<&'static str> {
    PRESETS.iter().map(|(name, _)| *name).collect()
}

/// Create a scanner for a pattern
pub fn create_scanner(config: &PatternConfig) -> Result<Box<dyn PatternScanner>, PatternConfigError> {
    inside_day::create(config)
}
