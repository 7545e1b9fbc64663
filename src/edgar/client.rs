use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{check_status, Result};

/// Which SEC host serves a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Host {
    /// `data.sec.gov`: submissions and XBRL company facts.
    Data,
    /// `www.sec.gov`: ticker map and archives.
    Www,
}

/// SEC EDGAR JSON client. SEC asks for a descriptive User-Agent and at most
/// ten requests per second; requests are spaced by `1 / max_rps`.
pub struct EdgarClient {
    client: reqwest::Client,
    data_base: String,
    www_base: String,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl EdgarClient {
    pub fn new(user_agent: &str, max_rps: f64, data_base: &str, www_base: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            data_base: data_base.trim_end_matches('/').to_string(),
            www_base: www_base.trim_end_matches('/').to_string(),
            min_interval: Duration::from_secs_f64(1.0 / max_rps.max(0.1)),
            last_request: Mutex::new(None),
        })
    }

    pub fn www_base(&self) -> &str {
        &self.www_base
    }

    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub async fn get_json(&self, path: &str, host: Host) -> Result<serde_json::Value> {
        self.throttle().await;

        let base = match host {
            Host::Data => &self.data_base,
            Host::Www => &self.www_base,
        };
        let url = format!("{base}{path}");
        debug!(%url, "EDGAR GET");

        let resp = self.client.get(&url).send().await?;
        let resp = check_status("SEC EDGAR", resp).await?;
        Ok(resp.json().await?)
    }

    /// `cik10` must already be zero-padded to 10 digits.
    pub async fn company_submissions(&self, cik10: &str) -> Result<serde_json::Value> {
        self.get_json(&format!("/submissions/CIK{cik10}.json"), Host::Data).await
    }

    pub async fn company_facts(&self, cik10: &str) -> Result<serde_json::Value> {
        self.get_json(&format!("/api/xbrl/companyfacts/CIK{cik10}.json"), Host::Data).await
    }

    pub async fn company_tickers(&self) -> Result<serde_json::Value> {
        self.get_json("/files/company_tickers.json", Host::Www).await
    }
}
