use crate::config::{points, volume_thresholds};
use crate::types::{Components, FeatureSet, GateSet, ScoreResult, SetupClass};

/// Deterministic, auditable point score for one candidate.
///
/// Every rubric category is recorded in `components`, including zero and
/// negative entries, and `total` is their sum. Undefined features never
/// match a rule.
pub fn score(features: &FeatureSet, gates: &GateSet) -> ScoreResult {
    let (setup_bonus, setup_class) = setup(gates);

    let components = Components {
        liquidity: if gates.liquidity_ok { points::LIQUIDITY } else { 0.0 },
        momentum: momentum_points(features),
        volume: volume_points(features.dvol_ratio_5_30),
        dilution_penalty: if gates.recent_dilution_risk {
            points::DILUTION_PENALTY
        } else {
            0.0
        },
        sec_filer: if gates.sec_current {
            points::SEC_CURRENT
        } else {
            points::SEC_STALE
        },
        setup_bonus,
    };

    ScoreResult::from_components(components, setup_class)
}

/// Accelerating momentum earns the full weight; otherwise a positive 5-day
/// return earns the fallback.
///
/// The accelerating branch also requires each of r5, r10 and r20 to be
/// nonzero, so a flat return anywhere in the stack drops to the fallback even
/// when the ordering holds.
fn momentum_points(f: &FeatureSet) -> f64 {
    let nonzero = |r: Option<f64>| r.is_some_and(|v| v != 0.0);
    let accelerating =
        f.accel == Some(true) && nonzero(f.ret_5d) && nonzero(f.ret_10d) && nonzero(f.ret_20d);

    if accelerating {
        points::MOMENTUM_ACCEL
    } else if f.ret_5d.is_some_and(|r5| r5 > 0.0) {
        points::MOMENTUM_POSITIVE
    } else {
        0.0
    }
}

fn volume_points(dvol_ratio: Option<f64>) -> f64 {
    match dvol_ratio {
        Some(r) if r >= volume_thresholds::STRONG_MIN => points::VOLUME_STRONG,
        Some(r) if r >= volume_thresholds::MODERATE_MIN => points::VOLUME_MODERATE,
        _ => 0.0,
    }
}

/// Earnings anticipation wins over post-earnings when both windows are open.
fn setup(gates: &GateSet) -> (f64, SetupClass) {
    if gates.earnings_anticipation_window {
        (points::SETUP_BONUS, SetupClass::EarningsAnticipation)
    } else if gates.post_earnings_window {
        (points::SETUP_BONUS, SetupClass::PostEarningsContinuation)
    } else {
        (0.0, SetupClass::None)
    }
}
