use serde::Serialize;

use crate::error::{AppError, Result};

pub const TIINGO_BASE_URL: &str = "https://api.tiingo.com";
pub const SEC_DATA_URL: &str = "https://data.sec.gov";
pub const SEC_WWW_URL: &str = "https://www.sec.gov";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-5.2";

/// Calendar days of bars requested per run. Covers 30 trading sessions with holidays.
pub const BAR_LOOKBACK_DAYS: i64 = 75;

/// Symbols with fewer bars than this are skipped before scoring.
pub const MIN_BARS: usize = 25;

/// Number of top-ranked candidates that get a DD note with `--dd`.
pub const DD_TOP_N: usize = 10;

/// Rows shown in the markdown report table.
pub const REPORT_TOP_N: usize = 20;

/// Ticker→CIK map refresh interval (seconds).
pub const CIK_CACHE_TTL_SECS: u64 = 24 * 3_600;

/// Point values of the scoring rubric. Fixed for compatibility with persisted history.
pub mod points {
    pub const LIQUIDITY: f64 = 25.0;
    pub const MOMENTUM_ACCEL: f64 = 25.0;
    pub const MOMENTUM_POSITIVE: f64 = 15.0;
    pub const VOLUME_STRONG: f64 = 20.0;
    pub const VOLUME_MODERATE: f64 = 12.0;
    pub const DILUTION_PENALTY: f64 = -20.0;
    pub const SEC_CURRENT: f64 = 10.0;
    pub const SEC_STALE: f64 = -50.0;
    pub const SETUP_BONUS: f64 = 10.0;
}

/// Dollar-volume expansion thresholds (5-session mean / 30-session mean).
pub mod volume_thresholds {
    pub const STRONG_MIN: f64 = 2.0;
    pub const MODERATE_MIN: f64 = 1.5;
}

/// Minimum score for a WATCH_ENTER signal.
pub const SIGNAL_MIN_SCORE: f64 = 70.0;

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub output_dir: String,
    /// Tickers scanned each run (SCANNER_UNIVERSE, comma-separated).
    pub universe: Vec<String>,
    #[serde(skip)]
    pub tiingo_api_key: Option<String>,
    pub tiingo_base_url: String,
    /// Contact string SEC requires on every request (SEC_USER_AGENT or EDGAR_USER_AGENT).
    pub sec_user_agent: Option<String>,
    pub sec_data_url: String,
    pub sec_www_url: String,
    pub sec_max_rps: f64,
    #[serde(skip)]
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    /// Mean 20-session dollar volume required for the liquidity gate (MIN_DOLLAR_VOLUME).
    pub min_dollar_volume: f64,
    /// A periodic report older than this many days marks the filer stale (SEC_STALE_DAYS).
    pub sec_stale_days: i64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // A missing .env is normal in production; the process env still applies.
        let _ = dotenvy::dotenv();

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "data/scanner.sqlite".to_string()),
            output_dir: std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "outputs".to_string()),
            universe: parse_universe(
                &std::env::var("SCANNER_UNIVERSE").unwrap_or_else(|_| "SOUN,BBIG".to_string()),
            ),
            tiingo_api_key: non_empty_var("TIINGO_API_KEY"),
            tiingo_base_url: std::env::var("TIINGO_BASE_URL")
                .unwrap_or_else(|_| TIINGO_BASE_URL.to_string()),
            sec_user_agent: non_empty_var("SEC_USER_AGENT")
                .or_else(|| non_empty_var("EDGAR_USER_AGENT")),
            sec_data_url: std::env::var("SEC_DATA_URL").unwrap_or_else(|_| SEC_DATA_URL.to_string()),
            sec_www_url: std::env::var("SEC_WWW_URL").unwrap_or_else(|_| SEC_WWW_URL.to_string()),
            sec_max_rps: parse_var("SEC_MAX_RPS", 5.0)?,
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            openai_model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| OPENAI_DEFAULT_MODEL.to_string()),
            openai_base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| OPENAI_BASE_URL.to_string()),
            min_dollar_volume: parse_var("MIN_DOLLAR_VOLUME", 5_000_000.0)?,
            sec_stale_days: parse_var("SEC_STALE_DAYS", 135)?,
            stop_loss_pct: parse_var("STOP_LOSS_PCT", 0.10)?,
            take_profit_pct: parse_var("TAKE_PROFIT_PCT", 0.10)?,
        })
    }

    pub fn require_tiingo_key(&self) -> Result<&str> {
        self.tiingo_api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("Missing TIINGO_API_KEY".to_string()))
    }

    pub fn require_sec_user_agent(&self) -> Result<&str> {
        self.sec_user_agent.as_deref().ok_or_else(|| {
            AppError::Config("Missing SEC_USER_AGENT (or EDGAR_USER_AGENT). Set it in .env".to_string())
        })
    }

    pub fn require_openai_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("Missing OPENAI_API_KEY".to_string()))
    }

    /// Fails on the first credential `run-eod` needs but does not have.
    pub fn validate_run_eod(&self, with_dd: bool) -> Result<()> {
        self.require_tiingo_key()?;
        self.require_sec_user_agent()?;
        if with_dd {
            self.require_openai_key()?;
        }
        Ok(())
    }
}

#[cfg(test)]
impl Config {
    pub fn for_test() -> Self {
        Self {
            log_level: "debug".to_string(),
            db_path: ":memory:".to_string(),
            output_dir: "outputs".to_string(),
            universe: vec!["SOUN".to_string()],
            tiingo_api_key: Some("tiingo-test".to_string()),
            tiingo_base_url: TIINGO_BASE_URL.to_string(),
            sec_user_agent: Some("eod-scanner tests test@example.com".to_string()),
            sec_data_url: SEC_DATA_URL.to_string(),
            sec_www_url: SEC_WWW_URL.to_string(),
            sec_max_rps: 1000.0,
            openai_api_key: None,
            openai_model: OPENAI_DEFAULT_MODEL.to_string(),
            openai_base_url: OPENAI_BASE_URL.to_string(),
            min_dollar_volume: 5_000_000.0,
            sec_stale_days: 135,
            stop_loss_pct: 0.10,
            take_profit_pct: 0.10,
        }
    }
}

pub fn parse_universe(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for sym in raw.split(',').map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty()) {
        if !out.contains(&sym) {
            out.push(sym);
        }
    }
    out
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match non_empty_var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} must be a number, got {raw:?}"))),
        None => Ok(default),
    }
}
