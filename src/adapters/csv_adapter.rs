//! CSV file adapter: bars in, signal records out.
//!
//! Bars live in `<instrument>_<timeframe>.csv` with a header row; columns are
//! located by name so extra provider columns (volume, vwap, ...) are ignored.
//! Signal output goes to `<instrument>_<timeframe>_signals.csv` in the same
//! directory.

use crate::domain::bar::{dedup_bars, Bar, REQUIRED_FIELDS};
use crate::domain::channel::ChannelFeatures;
use crate::domain::error::SoupError;
use crate::domain::series::{SeriesKey, SeriesOutput};
use crate::domain::simulator::SimState;
use crate::ports::data_port::DataPort;
use crate::ports::store_port::SignalStore;
use chrono::{DateTime, NaiveDate};
use std::fs;
use std::path::PathBuf;

const SIGNALS_SUFFIX: &str = "_signals";

pub const SIGNAL_COLUMNS: [&str; 25] = [
    "timestamp",
    "open",
    "high",
    "low",
    "close",
    "high_entry",
    "low_entry",
    "high_exit",
    "low_exit",
    "prev_high",
    "prev_low",
    "new_high",
    "new_low",
    "bars_since_high",
    "bars_since_low",
    "position",
    "signal",
    "entry_price",
    "stop_price",
    "target_price",
    "position_basis",
    "unit_size",
    "account_value",
    "exit_reason",
    "exit_price",
];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, instrument: &str, timeframe: &str) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", instrument, timeframe))
    }

    pub fn signals_path(&self, key: &SeriesKey) -> PathBuf {
        self.base_path.join(format!(
            "{}_{}{}.csv",
            key.instrument, key.timeframe, SIGNALS_SUFFIX
        ))
    }

    fn ensure_dir(&self) -> Result<(), SoupError> {
        fs::create_dir_all(&self.base_path).map_err(|e| SoupError::Database {
            reason: format!(
                "failed to create directory {}: {}",
                self.base_path.display(),
                e
            ),
        })
    }
}

/// Accepts epoch milliseconds, RFC 3339, or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(ms) = raw.parse::<i64>() {
        return Some(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Reads bars from CSV text. `context` names the source in error messages.
pub fn read_bars(content: &str, context: &str) -> Result<Vec<Bar>, SoupError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| SoupError::Database {
            reason: format!("{context}: CSV header error: {e}"),
        })?
        .clone();

    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };
    let columns: Vec<Option<usize>> = REQUIRED_FIELDS.iter().map(|f| position(*f)).collect();
    let missing: Vec<String> = REQUIRED_FIELDS
        .iter()
        .zip(&columns)
        .filter(|(_, col)| col.is_none())
        .map(|(name, _)| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SoupError::MissingFields {
            context: context.to_string(),
            fields: missing,
        });
    }
    let columns: Vec<usize> = columns.into_iter().flatten().collect();

    let mut bars = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| SoupError::Database {
            reason: format!("{context}: CSV parse error: {e}"),
        })?;

        let mut cells = [""; 5];
        let mut empty = Vec::new();
        for (i, &col) in columns.iter().enumerate() {
            let cell = record.get(col).unwrap_or("").trim();
            if cell.is_empty() {
                empty.push(REQUIRED_FIELDS[i].to_string());
            }
            cells[i] = cell;
        }
        if !empty.is_empty() {
            return Err(SoupError::MissingFields {
                context: format!("{context} row {}", row + 1),
                fields: empty,
            });
        }

        let timestamp = parse_timestamp(cells[0]).ok_or_else(|| SoupError::InvalidBar {
            index: row,
            reason: format!("invalid timestamp '{}'", cells[0]),
        })?;
        let price = |i: usize| {
            cells[i].parse::<f64>().map_err(|e| SoupError::InvalidBar {
                index: row,
                reason: format!("invalid {} value '{}': {}", REQUIRED_FIELDS[i], cells[i], e),
            })
        };

        bars.push(Bar {
            timestamp,
            open: price(1)?,
            high: price(2)?,
            low: price(3)?,
            close: price(4)?,
        });
    }

    Ok(bars)
}

fn opt_f64(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn opt_u32(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn signal_row(bar: &Bar, features: &ChannelFeatures, record: &SimState) -> Vec<String> {
    vec![
        bar.timestamp.to_string(),
        bar.open.to_string(),
        bar.high.to_string(),
        bar.low.to_string(),
        bar.close.to_string(),
        opt_f64(features.high_entry),
        opt_f64(features.low_entry),
        opt_f64(features.high_exit),
        opt_f64(features.low_exit),
        opt_f64(features.prev_high),
        opt_f64(features.prev_low),
        features.new_high.to_string(),
        features.new_low.to_string(),
        opt_u32(features.bars_since_high),
        opt_u32(features.bars_since_low),
        record.position.as_i8().to_string(),
        record.signal.to_string(),
        opt_f64(record.entry_price),
        opt_f64(record.stop_price),
        opt_f64(record.target_price),
        opt_f64(record.position_basis),
        record.unit_size.map(|u| u.to_string()).unwrap_or_default(),
        record.account_value.to_string(),
        record.exit.map(|e| e.reason.to_string()).unwrap_or_default(),
        opt_f64(record.exit.map(|e| e.price)),
    ]
}

impl DataPort for CsvAdapter {
    fn fetch_bars(&self, instrument: &str, timeframe: &str) -> Result<Vec<Bar>, SoupError> {
        let path = self.csv_path(instrument, timeframe);
        let content = fs::read_to_string(&path).map_err(|e| SoupError::Database {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let raw = read_bars(&content, &path.display().to_string())?;
        let count = raw.len();
        let bars = dedup_bars(raw);
        if bars.len() != count {
            tracing::debug!(
                instrument,
                timeframe,
                dropped = count - bars.len(),
                "dropped duplicate timestamps"
            );
        }
        Ok(bars)
    }

    fn list_series(&self) -> Result<Vec<SeriesKey>, SoupError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| SoupError::Database {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SoupError::Database {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            let Some(stem) = name_str.strip_suffix(".csv") else {
                continue;
            };
            if stem.ends_with(SIGNALS_SUFFIX) {
                continue;
            }
            if let Some((instrument, timeframe)) = stem.rsplit_once('_') {
                if !instrument.is_empty() && !timeframe.is_empty() {
                    keys.push(SeriesKey::new(instrument, timeframe));
                }
            }
        }

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

impl SignalStore for CsvAdapter {
    fn save_bars(&self, key: &SeriesKey, bars: &[Bar]) -> Result<(), SoupError> {
        self.ensure_dir()?;
        let path = self.csv_path(&key.instrument, &key.timeframe);
        let mut wtr = csv::Writer::from_path(&path).map_err(|e| SoupError::Database {
            reason: format!("failed to create {}: {}", path.display(), e),
        })?;
        let write_err = |e: csv::Error| SoupError::Database {
            reason: format!("failed to write {}: {}", path.display(), e),
        };

        wtr.write_record(REQUIRED_FIELDS).map_err(write_err)?;
        for bar in bars {
            wtr.write_record([
                bar.timestamp.to_string(),
                bar.open.to_string(),
                bar.high.to_string(),
                bar.low.to_string(),
                bar.close.to_string(),
            ])
            .map_err(write_err)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn save_series(&self, output: &SeriesOutput) -> Result<(), SoupError> {
        self.ensure_dir()?;
        let path = self.signals_path(&output.key);
        let mut wtr = csv::Writer::from_path(&path).map_err(|e| SoupError::Database {
            reason: format!("failed to create {}: {}", path.display(), e),
        })?;
        let write_err = |e: csv::Error| SoupError::Database {
            reason: format!("failed to write {}: {}", path.display(), e),
        };

        wtr.write_record(SIGNAL_COLUMNS).map_err(write_err)?;
        for ((bar, features), record) in output
            .bars
            .iter()
            .zip(&output.features)
            .zip(&output.records)
        {
            wtr.write_record(signal_row(bar, features, record))
                .map_err(write_err)?;
        }
        wtr.flush()?;
        tracing::debug!(series = %output.key, path = %path.display(), "signals written");
        Ok(())
    }
}
