//! SQLite adapter: bar source and signal store in one database.
//!
//! Tables `bars`, `features` and `signals` are keyed by
//! (instrument, timeframe, timestamp). Re-saving a series replaces its rows.

use crate::domain::bar::Bar;
use crate::domain::error::SoupError;
use crate::domain::series::{SeriesKey, SeriesOutput};
use crate::domain::simulator::{Exit, ExitReason, Position, Signal, SimState};
use crate::ports::data_port::DataPort;
use crate::ports::store_port::SignalStore;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Transaction};
use std::path::Path;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn conversion_error(column: usize, reason: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        reason.into(),
    )
}

impl SqliteAdapter {
    pub fn open(db_path: &Path, pool_size: u32) -> Result<Self, SoupError> {
        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(|e: r2d2::Error| SoupError::Database {
                reason: format!("{}: {e}", db_path.display()),
            })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, SoupError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| SoupError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn connection(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, SoupError> {
        self.pool.get().map_err(|e: r2d2::Error| SoupError::Database {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), SoupError> {
        let conn = self.connection()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS bars (
                instrument TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                PRIMARY KEY (instrument, timeframe, timestamp)
            );
            CREATE TABLE IF NOT EXISTS features (
                instrument TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                high_entry REAL,
                low_entry REAL,
                high_exit REAL,
                low_exit REAL,
                prev_high REAL,
                prev_low REAL,
                new_high INTEGER NOT NULL,
                new_low INTEGER NOT NULL,
                bars_since_high INTEGER,
                bars_since_low INTEGER,
                PRIMARY KEY (instrument, timeframe, timestamp)
            );
            CREATE TABLE IF NOT EXISTS signals (
                instrument TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                position INTEGER NOT NULL,
                signal TEXT NOT NULL,
                entry_price REAL,
                stop_price REAL,
                target_price REAL,
                position_basis REAL,
                unit_size INTEGER,
                account_value REAL NOT NULL,
                exit_reason TEXT,
                exit_price REAL,
                PRIMARY KEY (instrument, timeframe, timestamp)
            );",
        )
        .map_err(|e: rusqlite::Error| SoupError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    fn insert_bars(tx: &Transaction<'_>, key: &SeriesKey, bars: &[Bar]) -> rusqlite::Result<()> {
        let mut stmt = tx.prepare_cached(
            "INSERT OR REPLACE INTO bars (instrument, timeframe, timestamp, open, high, low, close)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for bar in bars {
            stmt.execute(params![
                key.instrument,
                key.timeframe,
                bar.timestamp,
                bar.open,
                bar.high,
                bar.low,
                bar.close
            ])?;
        }
        Ok(())
    }

    fn insert_outputs(tx: &Transaction<'_>, output: &SeriesOutput) -> rusqlite::Result<()> {
        let key = &output.key;
        let mut features_stmt = tx.prepare_cached(
            "INSERT OR REPLACE INTO features (instrument, timeframe, timestamp, high_entry,
                low_entry, high_exit, low_exit, prev_high, prev_low, new_high, new_low,
                bars_since_high, bars_since_low)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )?;
        let mut signals_stmt = tx.prepare_cached(
            "INSERT OR REPLACE INTO signals (instrument, timeframe, timestamp, position, signal,
                entry_price, stop_price, target_price, position_basis, unit_size, account_value,
                exit_reason, exit_price)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )?;

        for ((bar, f), r) in output
            .bars
            .iter()
            .zip(&output.features)
            .zip(&output.records)
        {
            features_stmt.execute(params![
                key.instrument,
                key.timeframe,
                bar.timestamp,
                f.high_entry,
                f.low_entry,
                f.high_exit,
                f.low_exit,
                f.prev_high,
                f.prev_low,
                f.new_high,
                f.new_low,
                f.bars_since_high,
                f.bars_since_low
            ])?;
            signals_stmt.execute(params![
                key.instrument,
                key.timeframe,
                r.timestamp,
                r.position.as_i8(),
                r.signal.to_string(),
                r.entry_price,
                r.stop_price,
                r.target_price,
                r.position_basis,
                r.unit_size.map(|u| u as i64),
                r.account_value,
                r.exit.map(|e| e.reason.to_string()),
                r.exit.map(|e| e.price)
            ])?;
        }
        Ok(())
    }

    /// Stored signal records of one series, ascending by timestamp.
    pub fn fetch_signals(&self, key: &SeriesKey) -> Result<Vec<SimState>, SoupError> {
        let conn = self.connection()?;

        let mut stmt = conn
            .prepare(
                "SELECT timestamp, position, signal, entry_price, stop_price, target_price,
                        position_basis, unit_size, account_value, exit_reason, exit_price
                 FROM signals
                 WHERE instrument = ?1 AND timeframe = ?2
                 ORDER BY timestamp ASC",
            )
            .map_err(|e: rusqlite::Error| SoupError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map(params![key.instrument, key.timeframe], |row| {
                let position_code: i8 = row.get(1)?;
                let position = Position::from_i8(position_code)
                    .ok_or_else(|| conversion_error(1, format!("bad position {position_code}")))?;
                let label: String = row.get(2)?;
                let signal = Signal::parse(&label)
                    .ok_or_else(|| conversion_error(2, format!("bad signal '{label}'")))?;
                let units: Option<i64> = row.get(7)?;
                let exit_reason: Option<String> = row.get(9)?;
                let exit_price: Option<f64> = row.get(10)?;
                let exit = match (exit_reason.as_deref(), exit_price) {
                    (Some("stop"), Some(price)) => Some(Exit {
                        reason: ExitReason::Stop,
                        price,
                    }),
                    (Some("target"), Some(price)) => Some(Exit {
                        reason: ExitReason::Target,
                        price,
                    }),
                    _ => None,
                };
                Ok(SimState {
                    timestamp: row.get(0)?,
                    position,
                    signal,
                    entry_price: row.get(3)?,
                    stop_price: row.get(4)?,
                    target_price: row.get(5)?,
                    position_basis: row.get(6)?,
                    unit_size: units.and_then(|u| u64::try_from(u).ok()),
                    account_value: row.get(8)?,
                    exit,
                })
            })
            .map_err(|e: rusqlite::Error| SoupError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(|e: rusqlite::Error| SoupError::DatabaseQuery {
                reason: e.to_string(),
            })?);
        }

        Ok(records)
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_bars(&self, instrument: &str, timeframe: &str) -> Result<Vec<Bar>, SoupError> {
        let conn = self.connection()?;

        let query = "SELECT timestamp, open, high, low, close
                     FROM bars
                     WHERE instrument = ?1 AND timeframe = ?2
                     ORDER BY timestamp ASC";

        let mut stmt = conn
            .prepare(query)
            .map_err(|e: rusqlite::Error| SoupError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map(params![instrument, timeframe], |row| {
                Ok(Bar {
                    timestamp: row.get(0)?,
                    open: row.get(1)?,
                    high: row.get(2)?,
                    low: row.get(3)?,
                    close: row.get(4)?,
                })
            })
            .map_err(|e: rusqlite::Error| SoupError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut bars = Vec::new();
        for row in rows {
            bars.push(row.map_err(|e: rusqlite::Error| SoupError::DatabaseQuery {
                reason: e.to_string(),
            })?);
        }

        Ok(bars)
    }

    fn list_series(&self) -> Result<Vec<SeriesKey>, SoupError> {
        let conn = self.connection()?;

        let query =
            "SELECT DISTINCT instrument, timeframe FROM bars ORDER BY instrument, timeframe";

        let mut stmt = conn
            .prepare(query)
            .map_err(|e: rusqlite::Error| SoupError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map([], |row| {
                Ok(SeriesKey::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e: rusqlite::Error| SoupError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row.map_err(|e: rusqlite::Error| SoupError::DatabaseQuery {
                reason: e.to_string(),
            })?);
        }

        Ok(keys)
    }

    fn get_data_range(
        &self,
        instrument: &str,
        timeframe: &str,
    ) -> Result<Option<(i64, i64, usize)>, SoupError> {
        let conn = self.connection()?;

        let query = "SELECT MIN(timestamp), MAX(timestamp), COUNT(*) FROM bars
                     WHERE instrument = ?1 AND timeframe = ?2";

        let result: (Option<i64>, Option<i64>, i64) = conn
            .query_row(query, params![instrument, timeframe], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .map_err(|e: rusqlite::Error| SoupError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        match result {
            (Some(min), Some(max), count) if count > 0 => Ok(Some((min, max, count as usize))),
            _ => Ok(None),
        }
    }
}

impl SignalStore for SqliteAdapter {
    fn save_bars(&self, key: &SeriesKey, bars: &[Bar]) -> Result<(), SoupError> {
        let mut conn = self.connection()?;

        let tx = conn
            .transaction()
            .map_err(|e: rusqlite::Error| SoupError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        Self::insert_bars(&tx, key, bars).map_err(|e: rusqlite::Error| {
            SoupError::DatabaseQuery {
                reason: format!("{key}: {e}"),
            }
        })?;

        tx.commit()
            .map_err(|e: rusqlite::Error| SoupError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        tracing::debug!(series = %key, bars = bars.len(), "bars stored");
        Ok(())
    }

    fn save_series(&self, output: &SeriesOutput) -> Result<(), SoupError> {
        let mut conn = self.connection()?;

        let tx = conn
            .transaction()
            .map_err(|e: rusqlite::Error| SoupError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        Self::insert_bars(&tx, &output.key, &output.bars)
            .and_then(|_| Self::insert_outputs(&tx, output))
            .map_err(|e: rusqlite::Error| SoupError::DatabaseQuery {
                reason: format!("{}: {e}", output.key),
            })?;

        tx.commit()
            .map_err(|e: rusqlite::Error| SoupError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        tracing::debug!(series = %output.key, rows = output.records.len(), "signals stored");
        Ok(())
    }
}
