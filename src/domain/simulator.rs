//! Bar-by-bar position and signal state machine.
//!
//! [`step`] is a pure transition from the previous bar's finalized state to the
//! current bar's state; [`simulate`] folds it over a series. Each transition
//! runs, in order: carry-forward, exit check, entry fill, new-signal planning,
//! and in-position stop/target management. An exit ends the bar's processing.

use crate::domain::accounting::{self, Side};
use crate::domain::bar::{validate_series, Bar};
use crate::domain::channel::ChannelFeatures;
use crate::domain::error::SoupError;
use crate::domain::instrument::{InstrumentParams, TrailingStop};
use std::fmt;

/// A breakout must be older than this many bars before it can be faded.
pub const MIN_BARS_SINCE_BREAKOUT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Flat,
    Long,
    Short,
}

impl Position {
    pub fn side(self) -> Option<Side> {
        match self {
            Position::Flat => None,
            Position::Long => Some(Side::Long),
            Position::Short => Some(Side::Short),
        }
    }

    /// Numeric encoding used by stores: 0 flat, 1 long, -1 short.
    pub fn as_i8(self) -> i8 {
        match self {
            Position::Flat => 0,
            Position::Long => 1,
            Position::Short => -1,
        }
    }

    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            0 => Some(Position::Flat),
            1 => Some(Position::Long),
            -1 => Some(Position::Short),
            _ => None,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Flat => write!(f, "flat"),
            Position::Long => write!(f, "long"),
            Position::Short => write!(f, "short"),
        }
    }
}

/// Advisory label for the next bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    NoSignal,
    Long,
    Short,
    Close,
}

impl Signal {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().replace('_', " ").as_str() {
            "no signal" | "" => Some(Signal::NoSignal),
            "long" => Some(Signal::Long),
            "short" => Some(Signal::Short),
            "close" => Some(Signal::Close),
            _ => None,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::NoSignal => write!(f, "no signal"),
            Signal::Long => write!(f, "long"),
            Signal::Short => write!(f, "short"),
            Signal::Close => write!(f, "close"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitReason {
    Stop,
    Target,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Stop => write!(f, "stop"),
            ExitReason::Target => write!(f, "target"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exit {
    pub reason: ExitReason,
    pub price: f64,
}

/// Finalized state of one bar; also the persisted signal record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimState {
    pub timestamp: i64,
    pub position: Position,
    pub signal: Signal,
    pub entry_price: Option<f64>,
    pub stop_price: Option<f64>,
    pub target_price: Option<f64>,
    pub position_basis: Option<f64>,
    pub unit_size: Option<u64>,
    pub account_value: f64,
    pub exit: Option<Exit>,
}

impl SimState {
    pub fn initial(timestamp: i64, params: &InstrumentParams) -> Self {
        SimState {
            timestamp,
            position: Position::Flat,
            signal: Signal::NoSignal,
            entry_price: None,
            stop_price: None,
            target_price: None,
            position_basis: None,
            unit_size: None,
            account_value: params.initial_account_value,
            exit: None,
        }
    }

    fn carried_from(prev: &SimState, timestamp: i64) -> Self {
        SimState {
            timestamp,
            signal: Signal::NoSignal,
            entry_price: None,
            exit: None,
            ..*prev
        }
    }

    fn clear_trade_fields(&mut self) {
        self.stop_price = None;
        self.target_price = None;
        self.position_basis = None;
        self.unit_size = None;
    }
}

/// Advances the state machine by one bar.
pub fn step(
    prev: &SimState,
    bar: &Bar,
    features: &ChannelFeatures,
    params: &InstrumentParams,
) -> SimState {
    let mut next = SimState::carried_from(prev, bar.timestamp);

    if let Some(side) = prev.position.side() {
        if let Some(exit) = check_exit(side, prev, bar) {
            next.account_value = match (prev.position_basis, prev.unit_size) {
                (Some(basis), Some(units)) => accounting::settle_close(
                    prev.account_value,
                    side,
                    exit.price,
                    basis,
                    units,
                    params,
                ),
                _ => prev.account_value,
            };
            next.position = Position::Flat;
            next.signal = Signal::Close;
            next.exit = Some(exit);
            next.clear_trade_fields();
            return next;
        }
    }

    if prev.position == Position::Flat {
        fill_pending_entry(prev, bar, features, &mut next);
    }

    if next.position == Position::Flat {
        plan_entries(bar, features, params, &mut next);
    }

    if let Some(side) = next.position.side() {
        manage_open_position(side, bar, features, params, &mut next);
    }

    next
}

/// Stop is evaluated first: when both levels are crossed in one bar the
/// adverse move is assumed to have happened first.
fn check_exit(side: Side, prev: &SimState, bar: &Bar) -> Option<Exit> {
    let (stop_hit, target_hit) = match side {
        Side::Long => (
            prev.stop_price.is_some_and(|stop| bar.low <= stop),
            prev.target_price.is_some_and(|target| bar.high >= target),
        ),
        Side::Short => (
            prev.stop_price.is_some_and(|stop| bar.high >= stop),
            prev.target_price.is_some_and(|target| bar.low <= target),
        ),
    };

    if stop_hit {
        prev.stop_price.map(|price| Exit {
            reason: ExitReason::Stop,
            price,
        })
    } else if target_hit {
        prev.target_price.map(|price| Exit {
            reason: ExitReason::Target,
            price,
        })
    } else {
        None
    }
}

fn fill_pending_entry(
    prev: &SimState,
    bar: &Bar,
    features: &ChannelFeatures,
    next: &mut SimState,
) {
    let (Some(entry), Some(units)) = (prev.entry_price, prev.unit_size) else {
        return;
    };
    if units < 1 {
        return;
    }

    let filled = match prev.signal {
        Signal::Long if bar.high >= entry => {
            Some((Position::Long, bar.open.max(entry), features.high_exit))
        }
        Signal::Short if bar.low <= entry => {
            Some((Position::Short, bar.open.min(entry), features.low_exit))
        }
        _ => None,
    };

    if let Some((position, fill_price, target)) = filled {
        next.position = position;
        next.position_basis = Some(fill_price);
        next.stop_price = prev.stop_price;
        next.unit_size = Some(units);
        next.target_price = target;
    }
}

/// Fades a stale breakout: a close back beyond the lagged entry channel,
/// where the previous breakout on that side is older than
/// [`MIN_BARS_SINCE_BREAKOUT`] bars.
///
/// Long and short setups are evaluated independently; if both fire the short
/// plan is written last and wins.
fn plan_entries(
    bar: &Bar,
    features: &ChannelFeatures,
    params: &InstrumentParams,
    next: &mut SimState,
) {
    let mut planned = false;

    if let (Some(prev_low), Some(since)) = (features.prev_low, features.bars_since_low) {
        if bar.close < prev_low && since > MIN_BARS_SINCE_BREAKOUT {
            let stop = bar.low - params.tick_size;
            next.signal = Signal::Long;
            next.entry_price = Some(prev_low);
            next.stop_price = Some(stop);
            next.unit_size = accounting::unit_size(next.account_value, prev_low, stop, params);
            next.target_price = features.high_exit;
            planned = true;
        }
    }

    if let (Some(prev_high), Some(since)) = (features.prev_high, features.bars_since_high) {
        if bar.close > prev_high && since > MIN_BARS_SINCE_BREAKOUT {
            let stop = bar.high + params.tick_size;
            next.signal = Signal::Short;
            next.entry_price = Some(prev_high);
            next.stop_price = Some(stop);
            next.unit_size = accounting::unit_size(next.account_value, prev_high, stop, params);
            next.target_price = features.low_exit;
            planned = true;
        }
    }

    if !planned {
        next.clear_trade_fields();
    }
}

fn manage_open_position(
    side: Side,
    bar: &Bar,
    features: &ChannelFeatures,
    params: &InstrumentParams,
    next: &mut SimState,
) {
    let Some(basis) = next.position_basis else {
        return;
    };

    match side {
        Side::Long => {
            if bar.low > basis {
                let candidate = bar.low - params.tick_size;
                next.stop_price = Some(match (params.policy.trailing_stop, next.stop_price) {
                    (TrailingStop::Ratchet, Some(stop)) => stop.max(candidate),
                    _ => candidate,
                });
            }
            if let Some(target) = features.high_exit {
                next.target_price = Some(target);
            }
        }
        Side::Short => {
            if bar.high < basis {
                let candidate = bar.high + params.tick_size;
                next.stop_price = Some(match (params.policy.trailing_stop, next.stop_price) {
                    (TrailingStop::Ratchet, Some(stop)) => stop.min(candidate),
                    _ => candidate,
                });
            }
            if let Some(target) = features.low_exit {
                next.target_price = Some(target);
            }
        }
    }
}

/// Walks the whole series once, emitting one state per bar.
pub fn simulate(
    bars: &[Bar],
    features: &[ChannelFeatures],
    params: &InstrumentParams,
) -> Result<Vec<SimState>, SoupError> {
    if bars.len() != features.len() {
        return Err(SoupError::LengthMismatch {
            bars: bars.len(),
            features: features.len(),
        });
    }
    validate_series(bars)?;

    let Some(first) = bars.first() else {
        return Ok(Vec::new());
    };

    let mut records = Vec::with_capacity(bars.len());
    let mut state = SimState::initial(first.timestamp, params);
    records.push(state);

    for (bar, row) in bars.iter().zip(features).skip(1) {
        state = step(&state, bar, row, params);
        records.push(state);
    }

    Ok(records)
}
