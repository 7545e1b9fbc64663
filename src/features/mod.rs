pub mod momentum;
pub mod volume;

use crate::types::{FeatureSet, PriceBar};

pub use momentum::stacked_returns;
pub use volume::volume_expansion;

impl FeatureSet {
    /// Extracts every feature from an ascending-by-date bar window of one symbol.
    pub fn from_bars(bars: &[PriceBar]) -> Self {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let mom = stacked_returns(&closes);
        let vol = volume_expansion(bars);
        Self {
            ret_5d: mom.ret_5d,
            ret_10d: mom.ret_10d,
            ret_20d: mom.ret_20d,
            accel: mom.accel,
            vol_ratio_5_30: vol.vol_ratio_5_30,
            dvol_ratio_5_30: vol.dvol_ratio_5_30,
        }
    }
}
