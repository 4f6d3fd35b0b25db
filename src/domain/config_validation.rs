//! Configuration validation.
//!
//! Every value a run depends on is checked before any data is touched.

use crate::domain::error::SoupError;
use crate::domain::instrument::{PnlFormula, TrailingStop};
use crate::ports::config_port::ConfigPort;
use std::str::FromStr;

pub const DATA_SECTION: &str = "data";
pub const STRATEGY_SECTION: &str = "strategy";

pub fn instrument_section(instrument: &str) -> String {
    format!("instrument.{instrument}")
}

pub fn validate_run_config(config: &dyn ConfigPort) -> Result<(), SoupError> {
    validate_data_source(config)?;
    let instruments = require_list(config, STRATEGY_SECTION, "instruments")?;
    require_list(config, STRATEGY_SECTION, "timeframes")?;
    validate_strategy_defaults(config)?;
    for instrument in &instruments {
        validate_instrument(config, instrument)?;
    }
    Ok(())
}

fn validate_data_source(config: &dyn ConfigPort) -> Result<(), SoupError> {
    let source = config
        .get_string(DATA_SECTION, "source")
        .unwrap_or_else(|| "csv".to_string());
    match source.trim().to_lowercase().as_str() {
        "csv" => Ok(()),
        "sqlite" if cfg!(feature = "sqlite") => Ok(()),
        "sqlite" => Err(invalid(
            DATA_SECTION,
            "source",
            "sqlite support was not compiled in",
        )),
        other => Err(invalid(
            DATA_SECTION,
            "source",
            &format!("unknown data source '{other}', expected csv or sqlite"),
        )),
    }
}

fn require_list(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Vec<String>, SoupError> {
    let items = config.get_list(section, key);
    if items.is_empty() {
        return Err(SoupError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        });
    }
    Ok(items)
}

fn validate_strategy_defaults(config: &dyn ConfigPort) -> Result<(), SoupError> {
    validate_overridable(config, STRATEGY_SECTION)?;
    validate_choice::<PnlFormula>(config, "pnl_formula")?;
    validate_choice::<TrailingStop>(config, "trailing_stop")?;
    Ok(())
}

fn validate_choice<T>(config: &dyn ConfigPort, key: &str) -> Result<(), SoupError>
where
    T: FromStr<Err = String>,
{
    match config.get_string(STRATEGY_SECTION, key) {
        Some(raw) => raw
            .parse::<T>()
            .map(|_| ())
            .map_err(|reason| invalid(STRATEGY_SECTION, key, &reason)),
        None => Ok(()),
    }
}

/// Keys accepted both in `[strategy]` and per instrument.
fn validate_overridable(config: &dyn ConfigPort, section: &str) -> Result<(), SoupError> {
    for key in ["entry_period", "exit_period"] {
        if let Some(period) = parse_number(config, section, key)? {
            check(
                period >= 1.0 && period.fract() == 0.0,
                section,
                key,
                &format!("{key} must be a whole number of at least 1"),
            )?;
        }
    }
    if let Some(risk) = parse_number(config, section, "risk_percent")? {
        check(
            risk > 0.0 && risk <= 1.0,
            section,
            "risk_percent",
            "risk_percent must be between 0 and 1",
        )?;
    }
    if let Some(capital) = parse_number(config, section, "initial_account_value")? {
        check(
            capital > 0.0,
            section,
            "initial_account_value",
            "initial_account_value must be positive",
        )?;
    }
    Ok(())
}

fn validate_instrument(config: &dyn ConfigPort, instrument: &str) -> Result<(), SoupError> {
    let section = instrument_section(instrument);

    let required = |key: &str| -> Result<f64, SoupError> {
        parse_number(config, &section, key)?.ok_or_else(|| SoupError::ConfigMissing {
            section: section.clone(),
            key: key.to_string(),
        })
    };

    let tick_size = required("tick_size")?;
    check(tick_size > 0.0, &section, "tick_size", "tick_size must be positive")?;

    // Zero is accepted: sizing then yields no units and signals stay advisory.
    let dollar_per_point = required("dollar_per_point")?;
    check(
        dollar_per_point >= 0.0,
        &section,
        "dollar_per_point",
        "dollar_per_point must be non-negative",
    )?;

    if let Some(commission) = parse_number(config, &section, "commission")? {
        check(
            commission >= 0.0,
            &section,
            "commission",
            "commission must be non-negative",
        )?;
    }

    validate_overridable(config, &section)
}

/// `Ok(None)` when the key is absent; a present value that is not a finite
/// number is invalid rather than silently defaulted.
fn parse_number(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, SoupError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(invalid(
            section,
            key,
            &format!("'{}' is not a number", raw.trim()),
        )),
    }
}

fn check(ok: bool, section: &str, key: &str, reason: &str) -> Result<(), SoupError> {
    if ok {
        Ok(())
    } else {
        Err(invalid(section, key, reason))
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> SoupError {
    SoupError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
