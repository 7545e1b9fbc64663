use chrono::NaiveDate;
use serde::Serialize;

use crate::error::Result;
use crate::types::{Candidate, Components, FeatureSet, GateSet, SetupClass};

/// Everything the DD model sees about one candidate.
#[derive(Debug, Clone, Serialize)]
pub struct DdContext {
    pub symbol: String,
    pub date: NaiveDate,
    pub score_total: f64,
    pub setup_class: SetupClass,
    pub components: Components,
    pub features: FeatureSet,
    pub gates: GateSet,
}

impl DdContext {
    pub fn from_candidate(c: &Candidate) -> Self {
        Self {
            symbol: c.symbol.clone(),
            date: c.date,
            score_total: c.score.total,
            setup_class: c.score.setup_class,
            components: c.score.components,
            features: c.features,
            gates: c.gates,
        }
    }

    /// Pretty JSON for the prompt. Undefined features serialize as `null`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScoreResult;

    #[test]
    fn undefined_features_are_null() {
        let c = Candidate {
            symbol: "SOUN".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            score: ScoreResult::from_components(Components::default(), SetupClass::None),
            features: FeatureSet { ret_5d: Some(0.1), ..FeatureSet::default() },
            gates: GateSet::default(),
        };
        let json = DdContext::from_candidate(&c).to_json().unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["date"], "2025-03-14");
        assert_eq!(v["setup_class"], "none");
        assert_eq!(v["features"]["ret_5d"], 0.1);
        assert!(v["features"]["ret_20d"].is_null());
        assert_eq!(v["components"]["sec_filer"], 0.0);
        assert_eq!(v["gates"]["liquidity_ok"], false);
    }
}
