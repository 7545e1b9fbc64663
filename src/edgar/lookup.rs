use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::info;

use crate::edgar::client::EdgarClient;
use crate::edgar::parsers::cik_pad;
use crate::error::Result;

/// Ticker → 10-digit CIK map from SEC's `company_tickers.json`.
///
/// Owned by the caller and passed where needed. The map reloads on the first
/// lookup after `ttl` has elapsed, or on an explicit `refresh`.
pub struct TickerCikLookup {
    map: HashMap<String, String>,
    loaded_at: Option<Instant>,
    ttl: Duration,
}

impl TickerCikLookup {
    pub fn new(ttl: Duration) -> Self {
        Self {
            map: HashMap::new(),
            loaded_at: None,
            ttl,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.loaded_at.map_or(true, |t| t.elapsed() >= self.ttl)
    }

    pub async fn refresh(&mut self, client: &EdgarClient) -> Result<()> {
        let doc = client.company_tickers().await?;
        self.map = parse_ticker_map(&doc);
        self.loaded_at = Some(Instant::now());
        info!(tickers = self.map.len(), "Loaded SEC ticker→CIK map");
        Ok(())
    }

    /// CIK for `symbol`, reloading the map first when stale.
    pub async fn resolve(&mut self, client: &EdgarClient, symbol: &str) -> Result<Option<String>> {
        if self.is_stale() {
            self.refresh(client).await?;
        }
        Ok(self.get(symbol))
    }

    /// Lookup against the currently loaded map, without I/O.
    pub fn get(&self, symbol: &str) -> Option<String> {
        self.map.get(&symbol.trim().to_uppercase()).cloned()
    }
}

/// `{"0": {"cik_str": 320193, "ticker": "AAPL", "title": "..."}, ...}` → `{"AAPL": "0000320193"}`.
pub fn parse_ticker_map(doc: &serde_json::Value) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let Some(rows) = doc.as_object() else {
        return out;
    };
    for row in rows.values() {
        let ticker = row
            .get("ticker")
            .and_then(|t| t.as_str())
            .unwrap_or("")
            .trim()
            .to_uppercase();
        let raw_cik = match row.get("cik_str") {
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::String(s)) => s.clone(),
            _ => String::new(),
        };
        if ticker.is_empty() || !raw_cik.chars().any(|c| c.is_ascii_digit()) {
            continue;
        }
        out.insert(ticker, cik_pad(&raw_cik));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tickers_doc() -> serde_json::Value {
        json!({
            "0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."},
            "1": {"cik_str": "1840292", "ticker": "soun", "title": "SoundHound AI"},
            "2": {"cik_str": null, "ticker": "BAD", "title": "No CIK"}
        })
    }

    #[test]
    fn parses_numeric_and_string_ciks() {
        let map = parse_ticker_map(&tickers_doc());
        assert_eq!(map.get("AAPL").map(String::as_str), Some("0000320193"));
        assert_eq!(map.get("SOUN").map(String::as_str), Some("0001840292"));
        assert!(!map.contains_key("BAD"));
    }

    #[tokio::test]
    async fn loads_once_within_ttl() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/company_tickers.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tickers_doc()))
            .expect(1)
            .mount(&server)
            .await;

        let client = EdgarClient::new("ua", 100.0, &server.uri(), &server.uri()).unwrap();
        let mut lookup = TickerCikLookup::new(Duration::from_secs(3_600));
        assert!(lookup.is_stale());

        assert_eq!(lookup.resolve(&client, "soun").await.unwrap().as_deref(), Some("0001840292"));
        assert_eq!(lookup.resolve(&client, "MSFT").await.unwrap(), None);
        assert!(!lookup.is_stale());
        assert!(lookup.resolve(&client, "AAPL").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn zero_ttl_reloads_every_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/company_tickers.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tickers_doc()))
            .expect(2)
            .mount(&server)
            .await;

        let client = EdgarClient::new("ua", 100.0, &server.uri(), &server.uri()).unwrap();
        let mut lookup = TickerCikLookup::new(Duration::ZERO);
        lookup.resolve(&client, "AAPL").await.unwrap();
        lookup.resolve(&client, "AAPL").await.unwrap();
    }
}
