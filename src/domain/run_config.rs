//! Resolved run configuration: data location, series to compute and the
//! parameters of every configured instrument.

use crate::domain::batch::SeriesJob;
use crate::domain::config_validation::{
    instrument_section, validate_run_config, DATA_SECTION, STRATEGY_SECTION,
};
use crate::domain::error::SoupError;
use crate::domain::instrument::{InstrumentParams, SimPolicy};
use crate::domain::series::SeriesKey;
use crate::ports::config_port::ConfigPort;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Csv,
    Sqlite,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source: DataSource,
    pub dir: PathBuf,
    pub db_path: PathBuf,
    pub pool_size: u32,
    /// In configured order; every entry has a matching `params` key.
    pub instruments: Vec<String>,
    pub timeframes: Vec<String>,
    pub params: BTreeMap<String, InstrumentParams>,
}

impl RunConfig {
    /// Validates first, so the lookups below can fall back to defaults
    /// only for keys that are genuinely optional.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SoupError> {
        validate_run_config(config)?;

        let source = match config
            .get_string(DATA_SECTION, "source")
            .map(|s| s.trim().to_lowercase())
            .as_deref()
        {
            Some("sqlite") => DataSource::Sqlite,
            _ => DataSource::Csv,
        };
        let dir = config
            .get_string(DATA_SECTION, "dir")
            .unwrap_or_else(|| "data".to_string());
        let db_path = config
            .get_string(DATA_SECTION, "db_path")
            .unwrap_or_else(|| "market.db".to_string());
        let pool_size = config.get_int(DATA_SECTION, "pool_size", 4).clamp(1, 64) as u32;

        let defaults = strategy_defaults(config)?;
        let instruments = config.get_list(STRATEGY_SECTION, "instruments");
        let params = instruments
            .iter()
            .map(|name| (name.clone(), instrument_params(config, name, &defaults)))
            .collect();

        Ok(RunConfig {
            source,
            dir: PathBuf::from(dir),
            db_path: PathBuf::from(db_path),
            pool_size,
            instruments,
            timeframes: config.get_list(STRATEGY_SECTION, "timeframes"),
            params,
        })
    }

    /// One job per configured (instrument, timeframe) pair, optionally
    /// narrowed to a single instrument and/or timeframe.
    pub fn jobs(&self, instrument: Option<&str>, timeframe: Option<&str>) -> Vec<SeriesJob> {
        let mut jobs = Vec::new();
        for name in &self.instruments {
            if instrument.is_some_and(|wanted| wanted != name) {
                continue;
            }
            let Some(params) = self.params.get(name) else {
                continue;
            };
            for tf in &self.timeframes {
                if timeframe.is_some_and(|wanted| wanted != tf) {
                    continue;
                }
                jobs.push(SeriesJob {
                    key: SeriesKey::new(name.as_str(), tf.as_str()),
                    params: params.clone(),
                });
            }
        }
        jobs
    }
}

fn strategy_defaults(config: &dyn ConfigPort) -> Result<InstrumentParams, SoupError> {
    let base = InstrumentParams::default();
    let policy = SimPolicy {
        pnl: parse_choice(config, "pnl_formula")?,
        trailing_stop: parse_choice(config, "trailing_stop")?,
    };
    Ok(InstrumentParams {
        entry_period: period(config, STRATEGY_SECTION, "entry_period", base.entry_period),
        exit_period: period(config, STRATEGY_SECTION, "exit_period", base.exit_period),
        risk_percent: config.get_double(STRATEGY_SECTION, "risk_percent", base.risk_percent),
        initial_account_value: config.get_double(
            STRATEGY_SECTION,
            "initial_account_value",
            base.initial_account_value,
        ),
        policy,
        ..base
    })
}

fn parse_choice<T>(config: &dyn ConfigPort, key: &str) -> Result<T, SoupError>
where
    T: std::str::FromStr<Err = String> + Default,
{
    match config.get_string(STRATEGY_SECTION, key) {
        Some(raw) => raw.parse().map_err(|reason| SoupError::ConfigInvalid {
            section: STRATEGY_SECTION.to_string(),
            key: key.to_string(),
            reason,
        }),
        None => Ok(T::default()),
    }
}

fn instrument_params(
    config: &dyn ConfigPort,
    instrument: &str,
    defaults: &InstrumentParams,
) -> InstrumentParams {
    let section = instrument_section(instrument);
    InstrumentParams {
        tick_size: config.get_double(&section, "tick_size", defaults.tick_size),
        dollar_per_point: config.get_double(
            &section,
            "dollar_per_point",
            defaults.dollar_per_point,
        ),
        commission_per_unit: config.get_double(
            &section,
            "commission",
            defaults.commission_per_unit,
        ),
        risk_percent: config.get_double(&section, "risk_percent", defaults.risk_percent),
        initial_account_value: config.get_double(
            &section,
            "initial_account_value",
            defaults.initial_account_value,
        ),
        entry_period: period(config, &section, "entry_period", defaults.entry_period),
        exit_period: period(config, &section, "exit_period", defaults.exit_period),
        policy: defaults.policy,
    }
}

// Periods are validated as whole numbers, so reading them as doubles keeps
// "20.0" and "20" equivalent.
fn period(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> usize {
    let value = config.get_double(section, key, default as f64);
    if value >= 1.0 { value as usize } else { default }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use crate::domain::instrument::{PnlFormula, TrailingStop};

    const CONFIG: &str = r#"
[data]
source = sqlite
db_path = /tmp/soup.db

[strategy]
instruments = I:NDX, SPY
timeframes = 1d, 1h
entry_period = 20
exit_period = 6
risk_percent = 0.01
pnl_formula = symmetric
trailing_stop = ratchet

[instrument.I:NDX]
tick_size = 0.25
dollar_per_point = 2.0
commission = 0.91

[instrument.SPY]
tick_size = 0.01
dollar_per_point = 1
entry_period = 55
initial_account_value = 25000
"#;

    fn load() -> RunConfig {
        RunConfig::from_config(&FileConfigAdapter::from_string(CONFIG).unwrap()).unwrap()
    }

    #[test]
    fn resolves_data_section() {
        let run = load();
        assert_eq!(run.source, DataSource::Sqlite);
        assert_eq!(run.db_path, PathBuf::from("/tmp/soup.db"));
        assert_eq!(run.pool_size, 4);
        assert_eq!(run.dir, PathBuf::from("data"));
    }

    #[test]
    fn jobs_follow_configured_instrument_order() {
        let config = FileConfigAdapter::from_string(
            &CONFIG.replace("instruments = I:NDX, SPY", "instruments = SPY, I:NDX"),
        )
        .unwrap();
        let run = RunConfig::from_config(&config).unwrap();
        let keys: Vec<String> = run
            .jobs(None, Some("1d"))
            .iter()
            .map(|j| j.key.to_string())
            .collect();
        assert_eq!(keys, vec!["SPY 1d", "I:NDX 1d"]);
    }

    #[test]
    fn instrument_params_merge_defaults_and_overrides() {
        let run = load();
        let ndx = &run.params["I:NDX"];
        assert_eq!(ndx.tick_size, 0.25);
        assert_eq!(ndx.dollar_per_point, 2.0);
        assert_eq!(ndx.commission_per_unit, 0.91);
        assert_eq!(ndx.entry_period, 20);
        assert_eq!(ndx.risk_percent, 0.01);
        assert_eq!(ndx.initial_account_value, 10_000.0);
        assert_eq!(ndx.policy.pnl, PnlFormula::Symmetric);
        assert_eq!(ndx.policy.trailing_stop, TrailingStop::Ratchet);

        let spy = &run.params["SPY"];
        assert_eq!(spy.entry_period, 55);
        assert_eq!(spy.exit_period, 6);
        assert_eq!(spy.commission_per_unit, 0.0);
        assert_eq!(spy.initial_account_value, 25_000.0);
    }

    #[test]
    fn jobs_cover_every_pair() {
        let keys: Vec<String> = load()
            .jobs(None, None)
            .iter()
            .map(|j| j.key.to_string())
            .collect();
        assert_eq!(keys, vec!["I:NDX 1d", "I:NDX 1h", "SPY 1d", "SPY 1h"]);
    }

    #[test]
    fn jobs_can_be_narrowed() {
        let run = load();
        let jobs = run.jobs(Some("SPY"), Some("1h"));
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].key, SeriesKey::new("SPY", "1h"));
        assert_eq!(jobs[0].params.entry_period, 55);
        assert!(run.jobs(Some("QQQ"), None).is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = FileConfigAdapter::from_string("[strategy]\ntimeframes = 1d\n").unwrap();
        let err = RunConfig::from_config(&config).unwrap_err();
        assert!(matches!(err, SoupError::ConfigMissing { key, .. } if key == "instruments"));
    }
}
