//! Static per-instrument parameters injected into the simulator.

use std::fmt;
use std::str::FromStr;

/// How a realized close is converted into account currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PnlFormula {
    /// Long closes are not scaled by dollar-per-point, short closes are.
    #[default]
    AsRecorded,
    /// Both sides are scaled by dollar-per-point.
    Symmetric,
}

/// How the in-profit stop follows price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingStop {
    /// Reset to one tick beyond the current bar, even if that loosens it.
    #[default]
    Reset,
    /// Only ever tighten.
    Ratchet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimPolicy {
    pub pnl: PnlFormula,
    pub trailing_stop: TrailingStop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentParams {
    pub tick_size: f64,
    pub dollar_per_point: f64,
    pub commission_per_unit: f64,
    pub risk_percent: f64,
    pub initial_account_value: f64,
    pub entry_period: usize,
    pub exit_period: usize,
    pub policy: SimPolicy,
}

impl InstrumentParams {
    /// Flat execution cost charged once per closed trade.
    pub fn slippage(&self) -> f64 {
        4.0 * self.tick_size * self.dollar_per_point
    }
}

impl Default for InstrumentParams {
    fn default() -> Self {
        InstrumentParams {
            tick_size: 0.01,
            dollar_per_point: 1.0,
            commission_per_unit: 0.0,
            risk_percent: 0.02,
            initial_account_value: 10_000.0,
            entry_period: 20,
            exit_period: 6,
            policy: SimPolicy::default(),
        }
    }
}

impl fmt::Display for PnlFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PnlFormula::AsRecorded => write!(f, "as_recorded"),
            PnlFormula::Symmetric => write!(f, "symmetric"),
        }
    }
}

impl FromStr for PnlFormula {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "as_recorded" => Ok(PnlFormula::AsRecorded),
            "symmetric" => Ok(PnlFormula::Symmetric),
            other => Err(format!(
                "unknown pnl formula '{other}' (expected as_recorded or symmetric)"
            )),
        }
    }
}

impl fmt::Display for TrailingStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrailingStop::Reset => write!(f, "reset"),
            TrailingStop::Ratchet => write!(f, "ratchet"),
        }
    }
}

impl FromStr for TrailingStop {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reset" => Ok(TrailingStop::Reset),
            "ratchet" => Ok(TrailingStop::Ratchet),
            other => Err(format!(
                "unknown trailing stop '{other}' (expected reset or ratchet)"
            )),
        }
    }
}
