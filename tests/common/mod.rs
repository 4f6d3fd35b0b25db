#![allow(dead_code)]

use std::collections::HashMap;
use turtlesoup::domain::bar::Bar;
use turtlesoup::domain::error::SoupError;
use turtlesoup::domain::instrument::{InstrumentParams, SimPolicy};
use turtlesoup::domain::series::SeriesKey;
use turtlesoup::ports::data_port::DataPort;

pub const BASE_TS: i64 = 1_704_067_200_000;
pub const DAY_MS: i64 = 86_400_000;

pub struct MockDataPort {
    pub data: HashMap<SeriesKey, Vec<Bar>>,
    pub errors: HashMap<SeriesKey, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, instrument: &str, timeframe: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(SeriesKey::new(instrument, timeframe), bars);
        self
    }

    pub fn with_error(mut self, instrument: &str, timeframe: &str, reason: &str) -> Self {
        self.errors
            .insert(SeriesKey::new(instrument, timeframe), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(&self, instrument: &str, timeframe: &str) -> Result<Vec<Bar>, SoupError> {
        let key = SeriesKey::new(instrument, timeframe);
        if let Some(reason) = self.errors.get(&key) {
            return Err(SoupError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(&key).cloned().unwrap_or_default())
    }

    fn list_series(&self) -> Result<Vec<SeriesKey>, SoupError> {
        let mut keys: Vec<SeriesKey> = self.data.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn get_data_range(
        &self,
        instrument: &str,
        timeframe: &str,
    ) -> Result<Option<(i64, i64, usize)>, SoupError> {
        let bars = self.fetch_bars(instrument, timeframe)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp, bars.len())),
            _ => None,
        })
    }
}

pub fn ts(index: usize) -> i64 {
    BASE_TS + index as i64 * DAY_MS
}

pub fn make_bar(index: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        timestamp: ts(index),
        open,
        high,
        low,
        close,
    }
}

/// I:NDX-like instrument: quarter-point ticks, $2 per point.
pub fn ndx_params() -> InstrumentParams {
    InstrumentParams {
        tick_size: 0.25,
        dollar_per_point: 2.0,
        commission_per_unit: 0.91,
        risk_percent: 0.02,
        initial_account_value: 10_000.0,
        entry_period: 20,
        exit_period: 6,
        policy: SimPolicy::default(),
    }
}

pub fn flat_bars(count: usize) -> Vec<Bar> {
    (0..count)
        .map(|i| make_bar(i, 105.0, 110.0, 100.0, 105.0))
        .collect()
}

/// Twenty quiet bars, a first breakdown to 99 on bar 20, then a second
/// breakdown on `second_break` that closes back below the old low.
pub fn breakdown_bars(second_break: usize) -> Vec<Bar> {
    let mut bars = flat_bars(20);
    bars.push(make_bar(20, 105.0, 110.0, 99.0, 104.0));
    for i in 21..second_break {
        bars.push(make_bar(i, 105.0, 110.0, 101.0, 105.0));
    }
    bars.push(make_bar(second_break, 105.0, 110.0, 97.0, 98.0));
    bars
}

/// Breakdown on bar 25, fill on 26, stop trails on 27 and 28, target hit
/// on 29.
pub fn round_trip_bars() -> Vec<Bar> {
    let mut bars = breakdown_bars(25);
    bars.push(make_bar(26, 98.0, 101.0, 97.5, 100.0));
    bars.push(make_bar(27, 100.0, 103.0, 100.5, 102.0));
    bars.push(make_bar(28, 102.0, 108.0, 101.0, 107.0));
    bars.push(make_bar(29, 107.0, 111.0, 106.0, 110.0));
    bars
}

/// Mirror of [`round_trip_bars`]: a breakout to 111 on bar 20, a second
/// breakout on bar 25 that closes above the old high, a short fill at 111 on
/// bar 26, a trailed stop on 27 and the 100 target hit on 28.
pub fn short_round_trip_bars() -> Vec<Bar> {
    let mut bars = flat_bars(20);
    bars.push(make_bar(20, 105.0, 111.0, 100.0, 106.0));
    for i in 21..25 {
        bars.push(make_bar(i, 105.0, 109.0, 100.0, 105.0));
    }
    bars.push(make_bar(25, 105.0, 113.0, 100.0, 112.0));
    bars.push(make_bar(26, 112.0, 112.5, 110.0, 110.5));
    bars.push(make_bar(27, 110.5, 110.5, 109.0, 109.5));
    bars.push(make_bar(28, 105.0, 106.0, 99.0, 100.0));
    bars
}

pub fn scenario_ini(data_dir: &str) -> String {
    format!(
        r#"
[data]
source = csv
dir = {data_dir}

[strategy]
instruments = I:NDX
timeframes = 1d
entry_period = 20
exit_period = 6
risk_percent = 0.02
initial_account_value = 10000

[instrument.I:NDX]
tick_size = 0.25
dollar_per_point = 2.0
commission = 0.91
"#
    )
}

pub fn bars_csv(bars: &[Bar]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},1000\n",
            b.timestamp, b.open, b.high, b.low, b.close
        ));
    }
    out
}
