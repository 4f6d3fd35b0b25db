//! Storage sink port for bars, features and signal records.
//!
//! Rows are keyed by (instrument, timeframe, timestamp); saving a row that
//! already exists replaces it.

use crate::domain::bar::Bar;
use crate::domain::error::SoupError;
use crate::domain::series::{SeriesKey, SeriesOutput};

pub trait SignalStore {
    fn save_bars(&self, key: &SeriesKey, bars: &[Bar]) -> Result<(), SoupError>;

    fn save_series(&self, output: &SeriesOutput) -> Result<(), SoupError>;
}
