//! Realized-equity curve for plotting.

use crate::domain::simulator::SimState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
    pub timestamp: i64,
    pub account_value: f64,
    pub percent_change: f64,
}

/// Percent gain or loss of `value` against the starting capital.
pub fn percent_change(value: f64, initial_account_value: f64) -> f64 {
    (value / initial_account_value - 1.0) * 100.0
}

/// One point per record; points whose value or percent change is not finite
/// are dropped.
pub fn equity_curve(records: &[SimState], initial_account_value: f64) -> Vec<EquityPoint> {
    records
        .iter()
        .map(|r| EquityPoint {
            timestamp: r.timestamp,
            account_value: r.account_value,
            percent_change: percent_change(r.account_value, initial_account_value),
        })
        .filter(|p| p.account_value.is_finite() && p.percent_change.is_finite())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instrument::InstrumentParams;
    use approx::assert_relative_eq;

    fn record(timestamp: i64, account_value: f64) -> SimState {
        SimState {
            timestamp,
            account_value,
            ..SimState::initial(timestamp, &InstrumentParams::default())
        }
    }

    #[test]
    fn percent_change_against_initial() {
        assert_relative_eq!(percent_change(10_500.0, 10_000.0), 5.0, epsilon = 1e-9);
        assert_relative_eq!(percent_change(9_000.0, 10_000.0), -10.0, epsilon = 1e-9);
    }

    #[test]
    fn curve_follows_records() {
        let curve = equity_curve(&[record(1, 10_000.0), record(2, 10_200.0)], 10_000.0);
        assert_eq!(curve.len(), 2);
        assert_eq!(curve[1].timestamp, 2);
        assert_relative_eq!(curve[1].percent_change, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn curve_drops_non_finite_points() {
        let curve = equity_curve(
            &[record(1, 10_000.0), record(2, f64::INFINITY), record(3, f64::NAN)],
            10_000.0,
        );
        assert_eq!(curve.len(), 1);
    }

    #[test]
    fn zero_initial_capital_yields_no_points() {
        assert!(equity_curve(&[record(1, 10.0)], 0.0).is_empty());
    }
}
