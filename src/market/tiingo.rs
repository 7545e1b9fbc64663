use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::error::{check_status, AppError, Result};
use crate::types::PriceBar;

/// Raw row of `/tiingo/daily/{sym}/prices`.
#[derive(Debug, Deserialize)]
struct TiingoBar {
    date: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

/// Tiingo end-of-day prices client. One request per symbol.
pub struct TiingoClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TiingoClient {
    pub fn new(api_key: &str, base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Daily bars for `symbol` between `start` and `end` inclusive, ascending by date.
    /// Rows without a close or volume are dropped; `dollar_volume` is derived here.
    pub async fn eod_prices(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceBar>> {
        let url = format!("{}/tiingo/daily/{}/prices", self.base_url, symbol);
        let start_s = start.format("%Y-%m-%d").to_string();
        let end_s = end.format("%Y-%m-%d").to_string();

        let resp = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .query(&[
                ("startDate", start_s.as_str()),
                ("endDate", end_s.as_str()),
                ("format", "json"),
                ("resampleFreq", "daily"),
            ])
            .send()
            .await?;
        let rows: Vec<TiingoBar> = check_status("Tiingo", resp).await?.json().await?;
        debug!(symbol, rows = rows.len(), "Tiingo prices received");

        let mut bars = Vec::with_capacity(rows.len());
        for row in rows {
            let (Some(close), Some(volume)) = (row.close, row.volume) else {
                continue;
            };
            let date = parse_tiingo_date(&row.date)?;
            bars.push(PriceBar::new(
                symbol,
                date,
                row.open.unwrap_or(close),
                row.high.unwrap_or(close),
                row.low.unwrap_or(close),
                close,
                volume,
            ));
        }
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        Ok(bars)
    }

    /// Market cap from the ticker metadata endpoint, when the plan exposes it.
    pub async fn market_cap(&self, symbol: &str) -> Result<Option<f64>> {
        let url = format!("{}/tiingo/daily/{}", self.base_url, symbol);
        let resp = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .send()
            .await?;
        let meta: serde_json::Value = check_status("Tiingo", resp).await?.json().await?;
        Ok(["marketCap", "marketcap"]
            .iter()
            .find_map(|k| meta.get(*k).and_then(|v| v.as_f64())))
    }
}

/// Tiingo timestamps look like `2025-03-14T00:00:00.000Z`; the session date is the first 10 chars.
/// An unreadable date is a bad provider response, not bad caller input.
fn parse_tiingo_date(raw: &str) -> Result<NaiveDate> {
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|e| AppError::Upstream {
        service: "Tiingo",
        status: 200,
        body: format!("bad date {raw:?}: {e}"),
    })
}
