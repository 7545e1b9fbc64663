use serde::Serialize;

use crate::types::finite;

/// Lookbacks, in trading sessions, of the stacked returns.
pub const LOOKBACKS: [usize; 3] = [5, 10, 20];

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Momentum {
    pub ret_5d: Option<f64>,
    pub ret_10d: Option<f64>,
    pub ret_20d: Option<f64>,
    pub accel: Option<bool>,
}

/// Simple return over `n` sessions: `close[-1] / close[-(n+1)] - 1`.
/// `None` with fewer than `n + 1` closes or when the base close is zero.
pub fn simple_return(closes: &[f64], n: usize) -> Option<f64> {
    if closes.len() <= n {
        return None;
    }
    let last = closes[closes.len() - 1];
    let base = closes[closes.len() - 1 - n];
    finite(last / base - 1.0)
}

/// 5/10/20-session returns plus the acceleration flag.
///
/// `accel` is `Some(r5 > r10 && r10 > r20)` only when all three returns are
/// defined; with any return missing it stays `None` rather than `false`.
pub fn stacked_returns(closes: &[f64]) -> Momentum {
    let [n5, n10, n20] = LOOKBACKS;
    let r5 = simple_return(closes, n5);
    let r10 = simple_return(closes, n10);
    let r20 = simple_return(closes, n20);

    let accel = match (r5, r10, r20) {
        (Some(a), Some(b), Some(c)) => Some(a > b && b > c),
        _ => None,
    };

    Momentum {
        ret_5d: r5,
        ret_10d: r10,
        ret_20d: r20,
        accel,
    }
}
