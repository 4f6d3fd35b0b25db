//! Bar source port: where ordered price series come from.

use crate::domain::bar::Bar;
use crate::domain::error::SoupError;
use crate::domain::series::SeriesKey;

pub trait DataPort {
    /// Bars for one series, ascending by timestamp with unique timestamps.
    fn fetch_bars(&self, instrument: &str, timeframe: &str) -> Result<Vec<Bar>, SoupError>;

    fn list_series(&self) -> Result<Vec<SeriesKey>, SoupError>;

    /// First and last timestamp (epoch ms) and bar count, or `None` if the
    /// series holds no bars.
    fn get_data_range(
        &self,
        instrument: &str,
        timeframe: &str,
    ) -> Result<Option<(i64, i64, usize)>, SoupError>;
}
