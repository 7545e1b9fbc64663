use serde::Serialize;

use crate::types::{finite, PriceBar};

pub const SHORT_WINDOW: usize = 5;
pub const LONG_WINDOW: usize = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VolumeRatios {
    pub vol_ratio_5_30: Option<f64>,
    pub dvol_ratio_5_30: Option<f64>,
}

/// Mean of the last `window` values; `None` when fewer than `window` exist.
pub fn trailing_mean(values: &[f64], window: usize) -> Option<f64> {
    if window == 0 || values.len() < window {
        return None;
    }
    let tail = &values[values.len() - window..];
    finite(tail.iter().sum::<f64>() / window as f64)
}

/// `short / long`, defined only for a finite, strictly positive denominator.
fn ratio(short: Option<f64>, long: Option<f64>) -> Option<f64> {
    match (short, long) {
        (Some(s), Some(l)) if l > 0.0 => finite(s / l),
        _ => None,
    }
}

/// Share and dollar volume expansion: 5-session mean over 30-session mean.
pub fn volume_expansion(bars: &[PriceBar]) -> VolumeRatios {
    let vol: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let dvol: Vec<f64> = bars.iter().map(|b| b.dollar_volume).collect();

    VolumeRatios {
        vol_ratio_5_30: ratio(
            trailing_mean(&vol, SHORT_WINDOW),
            trailing_mean(&vol, LONG_WINDOW),
        ),
        dvol_ratio_5_30: ratio(
            trailing_mean(&dvol, SHORT_WINDOW),
            trailing_mean(&dvol, LONG_WINDOW),
        ),
    }
}
