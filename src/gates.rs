use chrono::{Days, NaiveDate};

use crate::types::{Filing, GateSet, PriceBar};

/// Sessions averaged for the liquidity gate.
pub const LIQUIDITY_SESSIONS: usize = 20;

/// Typical spacing between periodic reports, used to project the next one.
pub const REPORTING_CADENCE_DAYS: u64 = 91;

/// Thresholds the gate evaluator applies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateInputs {
    pub min_dollar_volume: f64,
    pub sec_stale_days: i64,
    pub dilution_lookback_days: i64,
    pub post_earnings_days: i64,
    pub anticipation_days: i64,
}

impl Default for GateInputs {
    fn default() -> Self {
        Self {
            min_dollar_volume: 5_000_000.0,
            sec_stale_days: 135,
            dilution_lookback_days: 90,
            post_earnings_days: 5,
            anticipation_days: 10,
        }
    }
}

/// Strips an amendment suffix: `10-Q/A` → `10-Q`.
fn base_form(form: &str) -> &str {
    form.trim().strip_suffix("/A").unwrap_or(form.trim())
}

/// Quarterly and annual reports, domestic and foreign.
pub fn is_periodic(form: &str) -> bool {
    matches!(base_form(form), "10-K" | "10-Q" | "20-F" | "40-F" | "10-KT" | "10-QT")
}

/// Registration statements and prospectuses that signal new share issuance.
pub fn is_dilutive(form: &str) -> bool {
    let f = base_form(form);
    matches!(f, "S-1" | "S-3" | "F-1" | "F-3" | "S-1MEF" | "S-3MEF") || f.starts_with("424B")
}

/// Mean dollar volume of the last 20 bars clears the floor.
pub fn liquidity_ok(bars: &[PriceBar], min_dollar_volume: f64) -> bool {
    if bars.is_empty() {
        return false;
    }
    let tail = &bars[bars.len().saturating_sub(LIQUIDITY_SESSIONS)..];
    let mean = tail.iter().map(|b| b.dollar_volume).sum::<f64>() / tail.len() as f64;
    mean >= min_dollar_volume
}

/// Most recent periodic report filed on or before `run_date`.
fn latest_periodic(filings: &[Filing], run_date: NaiveDate) -> Option<NaiveDate> {
    filings
        .iter()
        .filter(|f| is_periodic(&f.form) && f.filed_at <= run_date)
        .map(|f| f.filed_at)
        .max()
}

fn days_between(earlier: NaiveDate, later: NaiveDate) -> i64 {
    (later - earlier).num_days()
}

/// Computes every gate for one symbol as of `run_date`. Filings after the run
/// date are ignored so reruns of past dates see the same facts.
pub fn evaluate(bars: &[PriceBar], filings: &[Filing], run_date: NaiveDate, inputs: &GateInputs) -> GateSet {
    let last_periodic = latest_periodic(filings, run_date);

    let sec_current = last_periodic
        .is_some_and(|d| days_between(d, run_date) <= inputs.sec_stale_days);

    let recent_dilution_risk = filings.iter().any(|f| {
        is_dilutive(&f.form)
            && f.filed_at <= run_date
            && days_between(f.filed_at, run_date) <= inputs.dilution_lookback_days
    });

    let post_earnings_window = last_periodic
        .is_some_and(|d| days_between(d, run_date) <= inputs.post_earnings_days);

    let earnings_anticipation_window = last_periodic
        .and_then(|d| d.checked_add_days(Days::new(REPORTING_CADENCE_DAYS)))
        .is_some_and(|next| {
            let ahead = days_between(run_date, next);
            (0..=inputs.anticipation_days).contains(&ahead)
        });

    GateSet {
        liquidity_ok: liquidity_ok(bars, inputs.min_dollar_volume),
        sec_current,
        recent_dilution_risk,
        earnings_anticipation_window,
        post_earnings_window,
    }
}
