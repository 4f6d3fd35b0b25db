//! Price bar representation and series validation.

use crate::domain::error::SoupError;
use chrono::{DateTime, Utc};

/// Column names every bar source must provide.
pub const REQUIRED_FIELDS: [&str; 5] = ["timestamp", "open", "high", "low", "close"];

/// One OHLC bar. `timestamp` is epoch milliseconds, UTC.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// Rejects series the simulator cannot walk: non-finite prices, a high below
/// the low, or timestamps that are not strictly ascending.
pub fn validate_series(bars: &[Bar]) -> Result<(), SoupError> {
    for (index, bar) in bars.iter().enumerate() {
        let prices = [bar.open, bar.high, bar.low, bar.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(SoupError::InvalidBar {
                index,
                reason: "non-finite price".into(),
            });
        }
        if bar.high < bar.low {
            return Err(SoupError::InvalidBar {
                index,
                reason: format!("high {} below low {}", bar.high, bar.low),
            });
        }
        if index > 0 {
            let previous = bars[index - 1].timestamp;
            if bar.timestamp <= previous {
                return Err(SoupError::UnorderedBars {
                    index,
                    timestamp: bar.timestamp,
                    previous,
                });
            }
        }
    }
    Ok(())
}

/// Sorts by timestamp and keeps the last occurrence of each timestamp.
///
/// Used by ingestion; the simulator itself never de-duplicates.
pub fn dedup_bars(mut bars: Vec<Bar>) -> Vec<Bar> {
    // stable sort keeps arrival order among equal timestamps
    bars.sort_by_key(|b| b.timestamp);
    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(last) if last.timestamp == bar.timestamp => *last = bar,
            _ => out.push(bar),
        }
    }
    out
}
