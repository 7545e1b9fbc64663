use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

// ---------------------------------------------------------------------------
// Price bars
// ---------------------------------------------------------------------------

/// One end-of-day session for one symbol. Keyed by `(symbol, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub dollar_volume: f64,
}

impl PriceBar {
    /// Builds a bar, deriving `dollar_volume = close × volume`.
    pub fn new(
        symbol: impl Into<String>,
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            open,
            high,
            low,
            close,
            volume,
            dollar_volume: close * volume,
        }
    }
}

// ---------------------------------------------------------------------------
// Features and gates
// ---------------------------------------------------------------------------

/// Indicators derived from one symbol's bar window. `None` means the value
/// could not be computed (short history, zero denominator) and never counts as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureSet {
    pub ret_5d: Option<f64>,
    pub ret_10d: Option<f64>,
    pub ret_20d: Option<f64>,
    /// `Some(r5 > r10 > r20)` when all three returns exist.
    pub accel: Option<bool>,
    pub vol_ratio_5_30: Option<f64>,
    pub dvol_ratio_5_30: Option<f64>,
}

/// Pass/fail facts computed outside the scorer. All five are required.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateSet {
    pub liquidity_ok: bool,
    pub sec_current: bool,
    pub recent_dilution_risk: bool,
    pub earnings_anticipation_window: bool,
    pub post_earnings_window: bool,
}

/// Drops NaN and infinities so undefined math becomes `None`.
pub fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupClass {
    None,
    EarningsAnticipation,
    PostEarningsContinuation,
}

impl SetupClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetupClass::None => "none",
            SetupClass::EarningsAnticipation => "earnings_anticipation",
            SetupClass::PostEarningsContinuation => "post_earnings_continuation",
        }
    }
}

impl std::fmt::Display for SetupClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SetupClass {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(SetupClass::None),
            "earnings_anticipation" => Ok(SetupClass::EarningsAnticipation),
            "post_earnings_continuation" => Ok(SetupClass::PostEarningsContinuation),
            other => Err(AppError::InvalidInput(format!("unknown setup class {other:?}"))),
        }
    }
}

/// Point contribution of every rubric category. Each category is always present,
/// so a zero entry records that its rule did not fire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Components {
    pub liquidity: f64,
    pub momentum: f64,
    pub volume: f64,
    pub dilution_penalty: f64,
    pub sec_filer: f64,
    pub setup_bonus: f64,
}

impl Components {
    /// `(name, points)` pairs in rubric order.
    pub fn entries(&self) -> [(&'static str, f64); 6] {
        [
            ("liquidity", self.liquidity),
            ("momentum", self.momentum),
            ("volume", self.volume),
            ("dilution_penalty", self.dilution_penalty),
            ("sec_filer", self.sec_filer),
            ("setup_bonus", self.setup_bonus),
        ]
    }

    pub fn sum(&self) -> f64 {
        self.entries().iter().map(|(_, v)| v).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub total: f64,
    pub setup_class: SetupClass,
    pub components: Components,
}

impl ScoreResult {
    /// The only constructor: `total` is always the sum of `components`.
    pub fn from_components(components: Components, setup_class: SetupClass) -> Self {
        Self {
            total: components.sum(),
            setup_class,
            components,
        }
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    WatchEnter,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::WatchEnter => write!(f, "WATCH_ENTER"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskParams {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            stop_loss_pct: 0.10,
            take_profit_pct: 0.10,
        }
    }
}

/// Why a signal fired. Fields are declared in key order so the JSON form is stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rationale {
    pub note: String,
    pub risk: RiskParams,
    pub score: f64,
    pub setup: SetupClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub date: NaiveDate,
    pub signal: SignalKind,
    pub rationale: Rationale,
}

// ---------------------------------------------------------------------------
// Filings and DD notes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filing {
    pub cik: String,
    pub accession: String,
    pub form: String,
    pub filed_at: NaiveDate,
    pub primary_doc: Option<String>,
    pub url: Option<String>,
}

/// Narrative annotation returned by the text-generation service, stored verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DdNote {
    pub symbol: String,
    pub date: NaiveDate,
    pub model: String,
    pub note_md: String,
}

/// One scored symbol of the current run.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub symbol: String,
    pub date: NaiveDate,
    pub score: ScoreResult,
    pub features: FeatureSet,
    pub gates: GateSet,
}
