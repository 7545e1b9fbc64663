use chrono::NaiveDate;

use crate::config::SIGNAL_MIN_SCORE;
use crate::types::{Rationale, RiskParams, SetupClass, Signal, SignalKind};

pub const REVIEW_NOTE: &str = "Candidate meets threshold. Review DD notes before entry.";

/// End-of-day signal rules. Signals are advisory: a human reviews the DD note
/// before any entry, nothing here places orders.
///
/// Emits one `WATCH_ENTER` when the setup class is set and
/// `score_total >= 70`. A NaN score compares false and emits nothing.
pub fn generate(
    symbol: &str,
    date: NaiveDate,
    score_total: f64,
    setup_class: SetupClass,
    risk: &RiskParams,
) -> Vec<Signal> {
    let mut signals = Vec::new();

    if setup_class != SetupClass::None && score_total >= SIGNAL_MIN_SCORE {
        signals.push(Signal {
            symbol: symbol.to_string(),
            date,
            signal: SignalKind::WatchEnter,
            rationale: Rationale {
                note: REVIEW_NOTE.to_string(),
                risk: *risk,
                score: score_total,
                setup: setup_class,
            },
        });
    }

    signals
}
