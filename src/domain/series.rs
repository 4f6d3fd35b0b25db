//! One (instrument, timeframe) series run end to end: compute channel
//! features, then simulate. Ordering is checked by [`simulate`].

use crate::domain::bar::Bar;
use crate::domain::channel::{compute_features, ChannelFeatures};
use crate::domain::error::SoupError;
use crate::domain::instrument::InstrumentParams;
use crate::domain::simulator::{simulate, SimState};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub instrument: String,
    pub timeframe: String,
}

impl SeriesKey {
    pub fn new(instrument: impl Into<String>, timeframe: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            timeframe: timeframe.into(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.instrument, self.timeframe)
    }
}

/// Bars, features and signal records of one series, index-aligned.
#[derive(Debug, Clone)]
pub struct SeriesOutput {
    pub key: SeriesKey,
    pub bars: Vec<Bar>,
    pub features: Vec<ChannelFeatures>,
    pub records: Vec<SimState>,
}

impl SeriesOutput {
    pub fn last_record(&self) -> Option<&SimState> {
        self.records.last()
    }
}

pub fn run_series(
    key: SeriesKey,
    bars: Vec<Bar>,
    params: &InstrumentParams,
) -> Result<SeriesOutput, SoupError> {
    let features = compute_features(&bars, params.entry_period, params.exit_period);
    let records = simulate(&bars, &features, params)?;
    Ok(SeriesOutput {
        key,
        bars,
        features,
        records,
    })
}
