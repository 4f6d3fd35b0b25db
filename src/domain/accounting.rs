//! Position sizing and realized-equity accounting.
//!
//! The account is a realized ledger: it only moves when a position is closed.
//! Every closed trade pays commission twice per unit (entry and exit) and a
//! flat slippage charge of four ticks in account currency.

use crate::domain::instrument::{InstrumentParams, PnlFormula};
use crate::domain::simulator::{ExitReason, Position, SimState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Long,
    Short,
}

/// Number of whole units that risks `risk_percent` of the account between
/// `entry` and `stop`.
///
/// Returns `None` when the risk distance is zero, dollar-per-point is not
/// positive, or fewer than one unit would be bought.
pub fn unit_size(
    account_value: f64,
    entry: f64,
    stop: f64,
    params: &InstrumentParams,
) -> Option<u64> {
    let risk_points = (entry - stop).abs();
    if risk_points <= 0.0 || params.dollar_per_point <= 0.0 {
        return None;
    }
    let units =
        (params.risk_percent * account_value / (risk_points * params.dollar_per_point)).floor();
    if units.is_finite() && units >= 1.0 {
        Some(units as u64)
    } else {
        None
    }
}

/// Account value after closing `units` at `exit_price` against a fill at
/// `basis`.
///
/// With [`PnlFormula::AsRecorded`] the long side is settled in points per unit
/// while the short side is scaled by dollar-per-point.
pub fn settle_close(
    account_value: f64,
    side: Side,
    exit_price: f64,
    basis: f64,
    units: u64,
    params: &InstrumentParams,
) -> f64 {
    let units = units as f64;
    let commission = 2.0 * params.commission_per_unit * units;
    let slippage = params.slippage();
    match (side, params.policy.pnl) {
        (Side::Long, PnlFormula::AsRecorded) => {
            account_value + (exit_price - basis) * units - commission - slippage
        }
        (Side::Long, PnlFormula::Symmetric) => {
            account_value + (exit_price - basis) * units * params.dollar_per_point
                - commission
                - slippage
        }
        (Side::Short, _) => {
            account_value - (exit_price - basis) * units * params.dollar_per_point
                - commission
                - slippage
        }
    }
}

/// A completed round trip reconstructed from simulator output.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub side: Side,
    pub entry_timestamp: i64,
    pub exit_timestamp: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub reason: ExitReason,
    pub units: u64,
    pub pnl: f64,
}

/// Pairs every fill with the close that ends it. A position still open on the
/// last bar is not reported.
pub fn extract_trades(records: &[SimState]) -> Vec<ClosedTrade> {
    let mut trades = Vec::new();
    let mut open: Option<(Side, i64, f64, u64)> = None;

    for pair in records.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);

        if let Some(exit) = cur.exit {
            if let Some((side, entry_timestamp, entry_price, units)) = open.take() {
                trades.push(ClosedTrade {
                    side,
                    entry_timestamp,
                    exit_timestamp: cur.timestamp,
                    entry_price,
                    exit_price: exit.price,
                    reason: exit.reason,
                    units,
                    pnl: cur.account_value - prev.account_value,
                });
            }
            continue;
        }

        if prev.position == Position::Flat {
            if let (Some(side), Some(basis), Some(units)) =
                (cur.position.side(), cur.position_basis, cur.unit_size)
            {
                open = Some((side, cur.timestamp, basis, units));
            }
        }
    }

    trades
}
