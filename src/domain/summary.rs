//! Next-bar signal summary and the plain-text message built from it.
//!
//! Delivery (chat webhooks and the like) lives outside this crate; this module
//! only produces the text, split into chunks that fit a 2000 character limit.

use crate::domain::accounting::Side;
use crate::domain::series::{SeriesKey, SeriesOutput};
use crate::domain::simulator::{Signal, SimState};
use chrono::NaiveDateTime;

pub const MESSAGE_LIMIT: usize = 2000;
pub const CHUNK_SIZE: usize = 1999;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// What the last bar of a series tells a trader to do on the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct NextBarSignal {
    pub key: SeriesKey,
    pub direction: Option<Side>,
    pub entry_price: Option<f64>,
    pub stop_price: Option<f64>,
    pub target_price: Option<f64>,
}

impl NextBarSignal {
    pub fn from_last(key: SeriesKey, record: Option<&SimState>) -> Self {
        let actionable = record.and_then(|r| {
            let direction = match r.signal {
                Signal::Long => Side::Long,
                Signal::Short => Side::Short,
                Signal::NoSignal | Signal::Close => return None,
            };
            r.entry_price.map(|_| (direction, r))
        });

        match actionable {
            Some((direction, r)) => NextBarSignal {
                key,
                direction: Some(direction),
                entry_price: r.entry_price,
                stop_price: r.stop_price,
                target_price: r.target_price,
            },
            None => NextBarSignal {
                key,
                direction: None,
                entry_price: None,
                stop_price: None,
                target_price: None,
            },
        }
    }

    pub fn from_output(output: &SeriesOutput) -> Self {
        Self::from_last(output.key.clone(), output.last_record())
    }

    pub fn line(&self) -> String {
        let label = match self.direction {
            Some(Side::Long) => "Long",
            Some(Side::Short) => "Short",
            None => return format!("**{}**: No signal for next bar", self.key),
        };
        format!(
            "**{}**: {} at {}, stop {}, target {}",
            self.key,
            label,
            format_price(self.entry_price),
            format_price(self.stop_price),
            format_price(self.target_price),
        )
    }
}

/// Four decimals with trailing zeros removed; `n/a` when missing.
pub fn format_price(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => {
            let s = format!("{v:.4}");
            if s.contains('.') {
                s.trim_end_matches('0').trim_end_matches('.').to_string()
            } else {
                s
            }
        }
        _ => "n/a".to_string(),
    }
}

pub fn build_message(now: NaiveDateTime, lines: &[String]) -> String {
    let header = format!(
        "**Soup of the Day - {}**\n{RULE}\n",
        now.format("%Y-%m-%d %H:%M:%S")
    );
    let body = if lines.is_empty() {
        "No signals.".to_string()
    } else {
        lines.join("\n")
    };
    format!("{header}{body}\n{RULE}")
}

/// Splits on character boundaries; a message within the limit is one chunk.
pub fn chunk_message(content: &str) -> Vec<String> {
    if content.chars().count() <= MESSAGE_LIMIT {
        return vec![content.to_string()];
    }
    let chars: Vec<char> = content.chars().collect();
    chars
        .chunks(CHUNK_SIZE)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
