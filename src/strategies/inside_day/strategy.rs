//! Inside-Day Breakout Scanner
//!
//! Slides a window over a daily series. At each start bar the bar's high/low
//! defines a range; the next `consolidation_days` bars must stay inside it,
//! then the first close outside the range within `breakout_window` bars is
//! taken as the entry. The outcome is read from the close `horizon` bars
//! after the breakout.
//!
//! The outcome is a directional test only: an upward breakout is a profit when
//! the evaluation close is above entry, a downward one when it is below. The
//! stop-loss and target are recorded on every trade but never checked against
//! the bars in between.

use tracing::debug;

use crate::strategies::PatternScanner;
use crate::{Bar, Direction, ScanResult, Trade, TradeOutcome};

use super::config::{PatternConfig, StopLossRule};

/// High/low of the range-defining bar
#[derive(Debug, Clone, Copy, PartialEq)]
struct Range {
    low: f64,
    high: f64,
}

impl Range {
    fn of(bar: &Bar) -> Self {
        Self {
            low: bar.low,
            high: bar.high,
        }
    }

    fn breakout_direction(&self, close: f64) -> Option<Direction> {
        if close > self.high {
            Some(Direction::Up)
        } else if close < self.low {
            Some(Direction::Down)
        } else {
            None
        }
    }
}

/// Breakout bar position and how long the range held before it
#[derive(Debug, Clone, Copy)]
struct Breakout {
    index: usize,
    direction: Direction,
    insider_days: usize,
}

pub struct InsideDayScanner {
    config: PatternConfig,
}

impl InsideDayScanner {
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }

    /// Run the scan over one series. Series shorter than the minimum window
    /// give an empty result.
    pub fn scan(&self, bars: &[Bar]) -> ScanResult {
        let mut result = ScanResult::default();
        let min_window = self.config.min_window();

        if bars.len() < min_window {
            debug!(
                "{}: {} bars is below the {}-bar window, nothing to scan",
                self.config.name,
                bars.len(),
                min_window
            );
            return result;
        }

        for start in 0..=bars.len() - min_window {
            if let Some(trade) = self.evaluate_window(bars, start) {
                result.push(trade);
            }
        }

        debug!(
            "{}: scanned {} windows, {} trades",
            self.config.name,
            bars.len() - min_window + 1,
            result.len()
        );

        result
    }

    fn evaluate_window(&self, bars: &[Bar], start: usize) -> Option<Trade> {
        let range = Range::of(&bars[start]);

        if !self.is_consolidating(bars, start, range) {
            return None;
        }

        let breakout = self.find_breakout(bars, start, range)?;
        let breakout_bar = &bars[breakout.index];
        let evaluation_bar = bars.get(breakout.index + self.config.horizon)?;

        let entry_price = breakout_bar.close;
        let stop_loss = self.stop_loss(breakout_bar, breakout.direction);
        let target = target_price(entry_price, stop_loss, breakout.direction);
        let evaluation_close = evaluation_bar.close;

        Some(Trade {
            entry_date: breakout_bar.date,
            entry_price,
            stop_loss,
            target,
            evaluation_close,
            direction: breakout.direction,
            profit_or_loss: evaluation_close - entry_price,
            outcome: classify(breakout.direction, entry_price, evaluation_close),
            insider_days: self
                .config
                .report_insider_days
                .then_some(breakout.insider_days),
        })
    }

    fn is_consolidating(&self, bars: &[Bar], start: usize, range: Range) -> bool {
        bars[start + 1..=start + self.config.consolidation_days]
            .iter()
            .all(|bar| bar.is_inside(range.low, range.high))
    }

    fn find_breakout(&self, bars: &[Bar], start: usize, range: Range) -> Option<Breakout> {
        let first = start + self.config.consolidation_days + 1;
        let mut insider_days = self.config.consolidation_days;

        for index in first..first + self.config.breakout_window {
            let bar = bars.get(index)?;
            match range.breakout_direction(bar.close) {
                Some(direction) => {
                    return Some(Breakout {
                        index,
                        direction,
                        insider_days,
                    })
                }
                None => insider_days += 1,
            }
        }

        None
    }

    fn stop_loss(&self, breakout_bar: &Bar, direction: Direction) -> f64 {
        match (self.config.stop_loss_rule, direction) {
            (StopLossRule::Open, _) => breakout_bar.open,
            (StopLossRule::HighOrLowByDirection, Direction::Down) => breakout_bar.high,
            (StopLossRule::HighOrLowByDirection, Direction::Up) => breakout_bar.low,
        }
    }
}

impl PatternScanner for InsideDayScanner {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn pattern(&self) -> &PatternConfig {
        &self.config
    }

    fn scan(&self, bars: &[Bar]) -> ScanResult {
        InsideDayScanner::scan(self, bars)
    }
}

/// Two-to-one target measured from the stop distance
///
/// Downward: `entry - 2 * (stop - entry)`. Upward: `entry + 2 * (entry - stop)`.
/// The target only lands below entry on a downward breakout when the stop sits
/// above entry.
pub fn target_price(entry: f64, stop_loss: f64, direction: Direction) -> f64 {
    match direction {
        Direction::Down => entry - 2.0 * (stop_loss - entry),
        Direction::Up => entry + 2.0 * (entry - stop_loss),
    }
}

pub fn classify(direction: Direction, entry: f64, evaluation_close: f64) -> TradeOutcome {
    let favourable = match direction {
        Direction::Down => evaluation_close < entry,
        Direction::Up => evaluation_close > entry,
    };
    if favourable {
        TradeOutcome::Profit
    } else {
        TradeOutcome::Loss
    }
}

/// Scan `bars` with `config`
pub fn scan(bars: &[Bar], config: &PatternConfig) -> ScanResult {
    InsideDayScanner::new(config.clone()).scan(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn bars(ohlc: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        ohlc.iter()
            .enumerate()
            .map(|(i, &(o, h, l, c))| Bar::new(start + Duration::days(i as i64), o, h, l, c))
            .collect()
    }

    /// Range on bar 0, two inside bars, upward breakout on bar 3, bar 6 closes at `eval_close`
    fn third_day_setup(eval_close: f64) -> Vec<Bar> {
        bars(&[
            (95.0, 100.0, 90.0, 95.0),
            (95.0, 99.0, 91.0, 96.0),
            (96.0, 98.0, 92.0, 97.0),
            (102.0, 106.0, 101.0, 105.0),
            (105.0, 107.0, 104.0, 106.0),
            (106.0, 108.0, 105.0, 107.0),
            (107.0, 109.0, eval_close.min(106.0), eval_close),
            (108.0, 110.0, 107.0, 109.0),
            (109.0, 111.0, 108.0, 110.0),
            (110.0, 112.0, 109.0, 111.0),
        ])
    }

    #[test]
    fn test_third_day_profit() {
        let result = scan(&third_day_setup(108.0), &PatternConfig::third_day());

        assert_eq!(result.len(), 1);
        let entry = &result.entries[0];
        assert_eq!(entry.trade.entry_date, NaiveDate::from_ymd_opt(2023, 1, 5).unwrap());
        assert_relative_eq!(entry.trade.entry_price, 105.0);
        assert_relative_eq!(entry.trade.stop_loss, 102.0);
        assert_relative_eq!(entry.trade.target, 111.0);
        assert_relative_eq!(entry.trade.evaluation_close, 108.0);
        assert_eq!(entry.trade.direction, Direction::Up);
        assert_eq!(entry.trade.outcome, TradeOutcome::Profit);
        assert_eq!(entry.trade.insider_days, None);
        assert_eq!(entry.stats.total_trades, 1);
        assert_eq!(entry.stats.win_percentage, Some(100.0));
    }

    #[test]
    fn test_third_day_loss() {
        let result = scan(&third_day_setup(102.0), &PatternConfig::third_day());

        assert_eq!(result.len(), 1);
        let trade = &result.entries[0].trade;
        assert_eq!(trade.outcome, TradeOutcome::Loss);
        assert_relative_eq!(trade.profit_or_loss, -3.0);
        assert_eq!(result.stats.loss_trades, 1);
        assert_eq!(result.stats.win_percentage, Some(0.0));
    }

    #[test]
    fn test_consolidation_violation_rejects_window() {
        let mut series = third_day_setup(108.0);
        series[1].high = 101.0;

        let result = scan(&series, &PatternConfig::third_day());
        assert!(result.is_empty());
        assert_eq!(result.stats.total_trades, 0);
        assert_eq!(result.stats.win_percentage, None);
    }

    #[test]
    fn test_inside_bounds_inclusive() {
        let mut series = third_day_setup(108.0);
        series[1].high = 100.0;
        series[2].low = 90.0;

        let result = scan(&series, &PatternConfig::third_day());
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_close_on_range_edge_is_not_breakout() {
        let mut series = third_day_setup(108.0);
        series[3] = Bar::new(series[3].date, 99.0, 101.0, 98.0, 100.0);

        let result = scan(&series, &PatternConfig::third_day());
        assert!(result.is_empty());
    }

    #[test]
    fn test_downward_breakout_open_stop() {
        let series = bars(&[
            (95.0, 100.0, 90.0, 95.0),
            (95.0, 99.0, 91.0, 96.0),
            (96.0, 98.0, 92.0, 94.0),
            (88.0, 89.0, 84.0, 85.0),
            (85.0, 86.0, 82.0, 83.0),
            (83.0, 84.0, 80.0, 81.0),
            (81.0, 82.0, 79.0, 80.0),
        ]);

        let result = scan(&series, &PatternConfig::third_day());
        assert_eq!(result.len(), 1);
        let trade = &result.entries[0].trade;
        assert_eq!(trade.direction, Direction::Down);
        assert_relative_eq!(trade.stop_loss, 88.0);
        assert_relative_eq!(trade.target, 85.0 - 2.0 * (88.0 - 85.0));
        assert_eq!(trade.outcome, TradeOutcome::Profit);
        assert_relative_eq!(trade.profit_or_loss, -5.0);
    }

    #[test]
    fn test_wick_stop_rule() {
        let up = scan(&third_day_setup(108.0), &PatternConfig::third_day_wick());
        let trade = &up.entries[0].trade;
        assert_relative_eq!(trade.stop_loss, 101.0);
        assert_relative_eq!(trade.target, 105.0 + 2.0 * (105.0 - 101.0));

        let down = bars(&[
            (95.0, 100.0, 90.0, 95.0),
            (95.0, 99.0, 91.0, 96.0),
            (96.0, 98.0, 92.0, 94.0),
            (88.0, 89.0, 84.0, 85.0),
            (85.0, 86.0, 82.0, 83.0),
            (83.0, 84.0, 80.0, 81.0),
            (81.0, 87.0, 79.0, 86.0),
        ]);
        let result = scan(&down, &PatternConfig::third_day_wick());
        let trade = &result.entries[0].trade;
        assert_relative_eq!(trade.stop_loss, 89.0);
        assert_relative_eq!(trade.target, 85.0 - 2.0 * (89.0 - 85.0));
        assert_eq!(trade.outcome, TradeOutcome::Loss);
    }

    #[test]
    fn test_dynamic_counts_insider_days() {
        let series = bars(&[
            (95.0, 100.0, 90.0, 95.0),
            (95.0, 99.0, 91.0, 96.0),
            (96.0, 98.0, 92.0, 97.0),
            (95.0, 97.0, 93.0, 94.0),
            (95.0, 99.5, 94.0, 96.0),
            (102.0, 106.0, 101.0, 105.0),
            (105.0, 107.0, 104.0, 106.0),
            (106.0, 109.0, 105.0, 108.0),
            (108.0, 110.0, 107.0, 109.0),
            (109.0, 111.0, 108.0, 110.0),
        ]);

        let result = scan(&series, &PatternConfig::dynamic());
        assert_eq!(result.len(), 1);
        let trade = &result.entries[0].trade;
        assert_eq!(trade.entry_date, series[5].date);
        assert_eq!(trade.insider_days, Some(4));
        assert_relative_eq!(trade.evaluation_close, 108.0);
        assert_eq!(trade.outcome, TradeOutcome::Profit);
    }

    #[test]
    fn test_dynamic_no_breakout_in_window() {
        let series = bars(&[
            (95.0, 100.0, 90.0, 95.0),
            (95.0, 99.0, 91.0, 96.0),
            (96.0, 98.0, 92.0, 97.0),
            (95.0, 97.0, 93.0, 94.0),
            (95.0, 99.5, 94.0, 96.0),
            (96.0, 101.0, 94.0, 99.0),
            (99.0, 102.0, 95.0, 97.0),
            (102.0, 106.0, 101.0, 105.0),
            (105.0, 107.0, 104.0, 106.0),
        ]);

        let result = scan(&series, &PatternConfig::dynamic());
        assert!(result.is_empty());
    }

    #[test]
    fn test_short_series_yields_nothing() {
        let series = third_day_setup(108.0);
        for len in 0..PatternConfig::third_day().min_window() {
            let result = scan(&series[..len], &PatternConfig::third_day());
            assert!(result.is_empty());
            assert_eq!(result.stats.total_trades, 0);
        }
    }

    #[test]
    fn test_oversized_pattern_scans_nothing() {
        let config = PatternConfig {
            name: "huge".to_string(),
            consolidation_days: usize::MAX,
            ..PatternConfig::third_day()
        };
        assert!(scan(&[], &config).is_empty());
        assert!(scan(&third_day_setup(108.0), &config).is_empty());
    }

    #[test]
    fn test_window_needs_full_length() {
        // Start 0 needs 7 bars for the third-day pattern, 9 for dynamic
        let series = third_day_setup(108.0);
        assert_eq!(scan(&series[..7], &PatternConfig::third_day()).len(), 1);
        assert!(scan(&series[..6], &PatternConfig::third_day()).is_empty());
    }

    #[test]
    fn test_target_and_classify() {
        assert_relative_eq!(target_price(105.0, 102.0, Direction::Up), 111.0);
        assert_relative_eq!(target_price(85.0, 88.0, Direction::Down), 79.0);
        // Stop below entry on a downward breakout puts the target above entry
        assert_relative_eq!(target_price(85.0, 84.0, Direction::Down), 87.0);

        assert_eq!(classify(Direction::Up, 100.0, 100.0), TradeOutcome::Loss);
        assert_eq!(classify(Direction::Down, 100.0, 99.0), TradeOutcome::Profit);
        assert_eq!(classify(Direction::Down, 100.0, 101.0), TradeOutcome::Loss);
    }
}
