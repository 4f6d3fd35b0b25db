//! Rolling breakout channel features.
//!
//! For every bar this module produces the entry and exit channel extrema
//! (highest high / lowest low over a trailing window, inclusive of the bar),
//! the one-bar-lagged entry channel used as the breakout reference, breakout
//! flags, and the bars elapsed since the last breakout.
//!
//! Only bars at or before the current index are used. A window reports `None`
//! until it is full; partial windows are never evaluated.

use crate::domain::bar::Bar;
use std::collections::VecDeque;

/// Channel features aligned one-to-one with the input bars.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelFeatures {
    pub high_entry: Option<f64>,
    pub low_entry: Option<f64>,
    pub high_exit: Option<f64>,
    pub low_exit: Option<f64>,
    pub prev_high: Option<f64>,
    pub prev_low: Option<f64>,
    pub new_high: bool,
    pub new_low: bool,
    pub bars_since_high: Option<u32>,
    pub bars_since_low: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extremum {
    Max,
    Min,
}

/// Sliding-window maximum or minimum in amortised O(1) per push.
///
/// The deque holds `(index, value)` pairs whose values are monotonic, so the
/// front is always the extremum of the current window.
#[derive(Debug, Clone)]
pub struct RollingExtremum {
    window: usize,
    kind: Extremum,
    seen: usize,
    deque: VecDeque<(usize, f64)>,
}

impl RollingExtremum {
    pub fn max(window: usize) -> Self {
        Self::new(window, Extremum::Max)
    }

    pub fn min(window: usize) -> Self {
        Self::new(window, Extremum::Min)
    }

    fn new(window: usize, kind: Extremum) -> Self {
        Self {
            window,
            kind,
            seen: 0,
            deque: VecDeque::with_capacity(window),
        }
    }

    /// Adds the next value and returns the extremum of the trailing window,
    /// or `None` while fewer than `window` values have been pushed.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        if self.window == 0 {
            return None;
        }
        let index = self.seen;
        self.seen += 1;

        while let Some(&(_, back)) = self.deque.back() {
            let dominated = match self.kind {
                Extremum::Max => back <= value,
                Extremum::Min => back >= value,
            };
            if !dominated {
                break;
            }
            self.deque.pop_back();
        }
        self.deque.push_back((index, value));

        while let Some(&(front_index, _)) = self.deque.front() {
            if front_index + self.window > index {
                break;
            }
            self.deque.pop_front();
        }

        if self.seen < self.window {
            return None;
        }
        self.deque.front().map(|&(_, v)| v)
    }
}

pub fn rolling_max(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut roll = RollingExtremum::max(window);
    values.iter().map(|&v| roll.push(v)).collect()
}

pub fn rolling_min(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut roll = RollingExtremum::min(window);
    values.iter().map(|&v| roll.push(v)).collect()
}

/// Counts bars since the last breakout.
///
/// On a breakout bar the reported value is the distance to the previous
/// breakout (0 for the first one); the count then restarts from that bar.
#[derive(Debug, Clone, Default)]
struct BreakoutClock {
    last: Option<usize>,
}

impl BreakoutClock {
    fn tick(&mut self, index: usize, breakout: bool) -> Option<u32> {
        let elapsed = self.last.map(|last| (index - last) as u32);
        if breakout {
            self.last = Some(index);
            return Some(elapsed.unwrap_or(0));
        }
        elapsed
    }
}

/// Computes [`ChannelFeatures`] for every bar of an ordered series.
pub fn compute_features(
    bars: &[Bar],
    entry_period: usize,
    exit_period: usize,
) -> Vec<ChannelFeatures> {
    let mut high_entry_roll = RollingExtremum::max(entry_period);
    let mut low_entry_roll = RollingExtremum::min(entry_period);
    let mut high_exit_roll = RollingExtremum::max(exit_period);
    let mut low_exit_roll = RollingExtremum::min(exit_period);
    let mut high_clock = BreakoutClock::default();
    let mut low_clock = BreakoutClock::default();

    let mut out: Vec<ChannelFeatures> = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        let (prev_high, prev_low) = match out.last() {
            Some(prev) => (prev.high_entry, prev.low_entry),
            None => (None, None),
        };

        let new_high = prev_high.is_some_and(|reference| bar.high > reference);
        let new_low = prev_low.is_some_and(|reference| bar.low < reference);

        out.push(ChannelFeatures {
            high_entry: high_entry_roll.push(bar.high),
            low_entry: low_entry_roll.push(bar.low),
            high_exit: high_exit_roll.push(bar.high),
            low_exit: low_exit_roll.push(bar.low),
            prev_high,
            prev_low,
            new_high,
            new_low,
            bars_since_high: high_clock.tick(i, new_high),
            bars_since_low: low_clock.tick(i, new_low),
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bars(ranges: &[(f64, f64)]) -> Vec<Bar> {
        ranges
            .iter()
            .enumerate()
            .map(|(i, &(high, low))| Bar {
                timestamp: i as i64,
                open: (high + low) / 2.0,
                high,
                low,
                close: (high + low) / 2.0,
            })
            .collect()
    }

    #[test]
    fn rolling_max_requires_full_window() {
        let out = rolling_max(&[1.0, 3.0, 2.0, 5.0, 4.0], 3);
        assert_eq!(out, vec![None, None, Some(3.0), Some(5.0), Some(5.0)]);
    }

    #[test]
    fn rolling_min_drops_expired_values() {
        let out = rolling_min(&[1.0, 3.0, 2.0, 5.0, 4.0], 3);
        assert_eq!(out, vec![None, None, Some(1.0), Some(2.0), Some(2.0)]);
    }

    #[test]
    fn rolling_window_of_one_is_identity() {
        let values = [4.0, 1.0, 7.0];
        let out = rolling_max(&values, 1);
        assert_eq!(out, vec![Some(4.0), Some(1.0), Some(7.0)]);
    }

    #[test]
    fn rolling_window_zero_is_never_defined() {
        assert_eq!(rolling_max(&[1.0, 2.0], 0), vec![None, None]);
    }

    #[test]
    fn rolling_window_longer_than_series() {
        assert_eq!(rolling_min(&[1.0, 2.0], 5), vec![None, None]);
    }

    #[test]
    fn rolling_handles_equal_values() {
        let out = rolling_max(&[2.0, 2.0, 2.0, 1.0], 2);
        assert_eq!(out, vec![None, Some(2.0), Some(2.0), Some(2.0)]);
    }

    #[test]
    fn prev_levels_lag_one_bar() {
        let bars = make_bars(&[(10.0, 5.0), (12.0, 6.0), (11.0, 4.0), (13.0, 7.0)]);
        let f = compute_features(&bars, 2, 2);

        assert_eq!(f[0].high_entry, None);
        assert_eq!(f[1].high_entry, Some(12.0));
        assert_eq!(f[1].low_entry, Some(5.0));
        assert_eq!(f[1].prev_high, None);
        assert_eq!(f[2].prev_high, Some(12.0));
        assert_eq!(f[2].prev_low, Some(5.0));
        assert_eq!(f[3].prev_high, Some(12.0));
        assert_eq!(f[3].prev_low, Some(4.0));
    }

    #[test]
    fn breakout_flags_compare_against_prev_levels() {
        let bars = make_bars(&[(10.0, 5.0), (12.0, 6.0), (11.0, 4.0), (13.0, 7.0)]);
        let f = compute_features(&bars, 2, 2);

        assert!(!f[1].new_high && !f[1].new_low);
        assert!(!f[2].new_high);
        assert!(f[2].new_low);
        assert!(f[3].new_high);
        assert!(!f[3].new_low);
    }

    #[test]
    fn bars_since_null_until_first_breakout() {
        let bars = make_bars(&[(10.0, 5.0), (10.0, 5.0), (10.0, 5.0), (10.0, 5.0)]);
        let f = compute_features(&bars, 2, 2);
        assert!(f.iter().all(|row| row.bars_since_high.is_none()));
        assert!(f.iter().all(|row| row.bars_since_low.is_none()));
    }

    #[test]
    fn bars_since_reports_gap_on_breakout_bar() {
        // lows: break at index 2 and again at index 6
        let bars = make_bars(&[
            (10.0, 5.0),
            (10.0, 5.0),
            (10.0, 4.0),
            (10.0, 6.0),
            (10.0, 6.0),
            (10.0, 6.0),
            (10.0, 3.0),
            (10.0, 6.0),
        ]);
        let f = compute_features(&bars, 2, 2);
        let since: Vec<Option<u32>> = f.iter().map(|row| row.bars_since_low).collect();
        assert_eq!(
            since,
            vec![None, None, Some(0), Some(1), Some(2), Some(3), Some(4), Some(1)]
        );
        assert!(f[6].new_low);
    }

    #[test]
    fn exit_channel_uses_its_own_window() {
        let bars = make_bars(&[(10.0, 5.0), (14.0, 6.0), (11.0, 7.0), (12.0, 8.0)]);
        let f = compute_features(&bars, 4, 2);
        assert_eq!(f[2].high_exit, Some(14.0));
        assert_eq!(f[3].high_exit, Some(12.0));
        assert_eq!(f[3].low_exit, Some(7.0));
        assert_eq!(f[2].high_entry, None);
        assert_eq!(f[3].high_entry, Some(14.0));
    }

    #[test]
    fn empty_series_yields_no_rows() {
        assert!(compute_features(&[], 20, 6).is_empty());
    }
}
