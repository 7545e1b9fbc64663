use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::warn;

use crate::error::Result;
use crate::market::tiingo::TiingoClient;
use crate::types::PriceBar;

/// Calendar days fetched for a snapshot; about 20 trading sessions.
const SNAPSHOT_LOOKBACK_DAYS: u64 = 45;
const AVG_VOLUME_SESSIONS: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    /// Mean share volume over the last 20 sessions.
    pub avg_daily_volume: Option<f64>,
}

impl MarketSnapshot {
    /// Price and average volume from an ascending bar window.
    pub fn from_bars(bars: &[PriceBar]) -> Self {
        let price = bars.last().map(|b| b.close);
        let tail = &bars[bars.len().saturating_sub(AVG_VOLUME_SESSIONS)..];
        let avg_daily_volume = (!tail.is_empty())
            .then(|| tail.iter().map(|b| b.volume).sum::<f64>() / tail.len() as f64);
        Self {
            price,
            market_cap: None,
            avg_daily_volume,
        }
    }
}

/// Latest close, 20-session average volume and best-effort market cap.
pub async fn market_snapshot(client: &TiingoClient, symbol: &str, today: NaiveDate) -> Result<MarketSnapshot> {
    let start = today - Days::new(SNAPSHOT_LOOKBACK_DAYS);
    let bars = client.eod_prices(symbol, start, today).await?;
    if bars.is_empty() {
        return Ok(MarketSnapshot::default());
    }

    let mut snap = MarketSnapshot::from_bars(&bars);
    snap.market_cap = match client.market_cap(symbol).await {
        Ok(cap) => cap,
        Err(e) => {
            warn!(symbol, "Tiingo metadata unavailable: {e}");
            None
        }
    };
    Ok(snap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::fixtures::bars;

    #[test]
    fn snapshot_uses_last_twenty_sessions() {
        let mut points = vec![(1.0, 10_000.0); 5];
        points.extend(vec![(2.0, 100.0); 20]);
        let snap = MarketSnapshot::from_bars(&bars("SOUN", &points));
        assert_eq!(snap.price, Some(2.0));
        assert_eq!(snap.avg_daily_volume, Some(100.0));
        assert_eq!(snap.market_cap, None);
    }

    #[test]
    fn empty_window_is_all_na() {
        assert_eq!(MarketSnapshot::from_bars(&[]), MarketSnapshot::default());
    }
}
