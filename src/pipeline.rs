//! End-of-day run: fetch, evaluate, score, signal, persist, report.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Days, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::config::{Config, BAR_LOOKBACK_DAYS, CIK_CACHE_TTL_SECS, DD_TOP_N, MIN_BARS};
use crate::db::Store;
use crate::dd::scorecard::render_filled_scorecard;
use crate::dd::{DdContext, OpenAiClient};
use crate::edgar::parsers::recent_filings;
use crate::edgar::{edgar_snapshot, EdgarClient, EdgarSnapshot, TickerCikLookup};
use crate::error::{AppError, Result};
use crate::gates::{self, GateInputs};
use crate::hash::{sha256_file, sha256_json};
use crate::market::{market_snapshot, TiingoClient};
use crate::report::{self, ReportPaths};
use crate::scorer::score;
use crate::signals;
use crate::types::{Candidate, DdNote, FeatureSet, Filing, RiskParams, Signal};

/// Per-invocation options of `run-eod`.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub date: NaiveDate,
    /// Hashed into the run row when it exists.
    pub config_path: PathBuf,
    pub dd: bool,
    /// Overrides the configured universe when set.
    pub symbols: Option<Vec<String>>,
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub candidates: usize,
    pub skipped: usize,
    pub signals: usize,
    pub dd_notes: usize,
    pub paths: ReportPaths,
}

/// Clients and store for one run. Built after configuration is validated, so a
/// missing credential fails before any symbol is touched. The OpenAI client
/// exists exactly when `opts.dd` is set.
pub struct Pipeline {
    cfg: Config,
    opts: RunOptions,
    store: Store,
    tiingo: TiingoClient,
    edgar: EdgarClient,
    lookup: TickerCikLookup,
    openai: Option<OpenAiClient>,
}

impl Pipeline {
    pub fn new(cfg: Config, store: Store, opts: RunOptions) -> Result<Self> {
        let tiingo = TiingoClient::new(cfg.require_tiingo_key()?, &cfg.tiingo_base_url)?;
        let edgar = EdgarClient::new(
            cfg.require_sec_user_agent()?,
            cfg.sec_max_rps,
            &cfg.sec_data_url,
            &cfg.sec_www_url,
        )?;
        let openai = if opts.dd {
            Some(OpenAiClient::new(
                cfg.require_openai_key()?,
                &cfg.openai_model,
                &cfg.openai_base_url,
            )?)
        } else {
            None
        };

        Ok(Self {
            cfg,
            opts,
            store,
            tiingo,
            edgar,
            lookup: TickerCikLookup::new(Duration::from_secs(CIK_CACHE_TTL_SECS)),
            openai,
        })
    }

    fn gate_inputs(&self) -> GateInputs {
        GateInputs {
            min_dollar_volume: self.cfg.min_dollar_volume,
            sec_stale_days: self.cfg.sec_stale_days,
            ..GateInputs::default()
        }
    }

    fn risk(&self) -> RiskParams {
        RiskParams {
            stop_loss_pct: self.cfg.stop_loss_pct,
            take_profit_pct: self.cfg.take_profit_pct,
        }
    }

    pub async fn run_eod(&mut self) -> Result<RunSummary> {
        let opts = self.opts.clone();
        let run_id = self.record_run(&opts.config_path).await?;
        let universe = opts.symbols.clone().unwrap_or_else(|| self.cfg.universe.clone());
        info!(%run_id, date = %opts.date, symbols = universe.len(), "EOD run started");

        let mut candidates = Vec::new();
        let mut skipped = 0usize;
        for symbol in &universe {
            match self.evaluate_symbol(symbol, opts.date).await? {
                Some(c) => candidates.push(c),
                None => skipped += 1,
            }
        }
        if candidates.is_empty() {
            warn!("No candidates after data availability checks");
        }

        std::fs::create_dir_all(&opts.out_dir)?;
        let paths = ReportPaths::for_date(&opts.out_dir, opts.date);
        let ranked = report::rank(&candidates);

        report::write_watchlist(&paths.watchlist, &ranked)?;
        info!(path = %paths.watchlist.display(), "Wrote watchlist");

        let risk = self.risk();
        let mut all_signals: Vec<Signal> = Vec::new();
        for c in &candidates {
            let fired = signals::generate(&c.symbol, c.date, c.score.total, c.score.setup_class, &risk);
            // An empty set still clears what an earlier run of this date stored.
            self.store.replace_signals(&c.symbol, c.date, &fired).await?;
            for s in fired {
                info!(symbol = %s.symbol, score = c.score.total, setup = %c.score.setup_class, "WATCH_ENTER");
                all_signals.push(s);
            }
        }
        report::write_signals(&paths.signals, &all_signals)?;
        info!(path = %paths.signals.display(), signals = all_signals.len(), "Wrote signals");

        let dd_notes = match &self.openai {
            Some(client) => write_dd_notes(&self.store, client, &ranked).await?,
            None => 0,
        };

        report::write_report(opts.date, &ranked, &paths)?;
        info!(path = %paths.report.display(), "Wrote report");

        Ok(RunSummary {
            run_id,
            candidates: candidates.len(),
            skipped,
            signals: all_signals.len(),
            dd_notes,
            paths,
        })
    }

    /// Inserts the run row. The config hash covers the config file when present,
    /// else the effective configuration.
    async fn record_run(&self, config_path: &Path) -> Result<String> {
        let started = Utc::now();
        let run_id = started.format("%Y%m%dT%H%M%S%.6fZ").to_string();
        let config_hash = if config_path.is_file() {
            sha256_file(config_path)?
        } else {
            sha256_json(&self.cfg)?
        };
        let git_commit = std::env::var("GIT_COMMIT").ok().filter(|c| !c.trim().is_empty());

        self.store
            .insert_run(
                &run_id,
                &started.to_rfc3339(),
                git_commit.as_deref(),
                Some(config_hash.as_str()),
            )
            .await?;
        Ok(run_id)
    }

    /// Scores one symbol. `None` when it is skipped for missing data; provider
    /// failures on bars skip the symbol, on filings they degrade to no filings.
    async fn evaluate_symbol(&mut self, symbol: &str, date: NaiveDate) -> Result<Option<Candidate>> {
        let start = date - Days::new(BAR_LOOKBACK_DAYS as u64);
        let bars = match self.tiingo.eod_prices(symbol, start, date).await {
            Ok(bars) => bars,
            Err(e) if e.is_external() => {
                warn!(symbol, "Skipping, price fetch failed: {e}");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        self.store.upsert_bars(&bars).await?;
        // Score from the stored window so vendor corrections and earlier
        // ingests of the same range are what the features see.
        let bars = self.store.load_bars(symbol, start, date).await?;

        if bars.len() < MIN_BARS {
            warn!(symbol, bars = bars.len(), "Skipping, not enough history");
            return Ok(None);
        }

        let filings = self.filings_for(symbol).await?;
        let features = FeatureSet::from_bars(&bars);
        let gates = gates::evaluate(&bars, &filings, date, &self.gate_inputs());
        let score = score(&features, &gates);
        self.store.upsert_score(symbol, date, &score).await?;

        info!(
            symbol,
            score = score.total,
            setup = %score.setup_class,
            filings = filings.len(),
            "Scored"
        );
        Ok(Some(Candidate {
            symbol: symbol.to_string(),
            date,
            score,
            features,
            gates,
        }))
    }

    /// Recent filings for `symbol`, persisted along with its ticker row.
    async fn filings_for(&mut self, symbol: &str) -> Result<Vec<Filing>> {
        let cik = match self.lookup.resolve(&self.edgar, symbol).await {
            Ok(cik) => cik,
            Err(e) if e.is_external() => {
                warn!(symbol, "CIK lookup failed, scoring without filings: {e}");
                None
            }
            Err(e) => return Err(e),
        };
        self.store.upsert_ticker(symbol, None, cik.as_deref()).await?;

        let Some(cik) = cik else {
            debug!(symbol, "No CIK mapped");
            return Ok(Vec::new());
        };

        let submissions = match self.edgar.company_submissions(&cik).await {
            Ok(doc) => doc,
            Err(e) if e.is_external() => {
                warn!(symbol, %cik, "Submissions fetch failed, scoring without filings: {e}");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        let filings = recent_filings(&submissions, &cik, self.edgar.www_base());
        self.store.upsert_filings(&filings).await?;
        Ok(filings)
    }
}

/// DD notes for the top candidates. A failed request or context serialization
/// skips that symbol's note; scores and signals are already persisted.
async fn write_dd_notes(store: &Store, client: &OpenAiClient, ranked: &[&Candidate]) -> Result<usize> {
    let mut written = 0;
    for c in ranked.iter().take(DD_TOP_N) {
        let ctx = DdContext::from_candidate(c);
        let note_md = match client.note_from_context(&ctx).await {
            Ok(note) => note,
            Err(e @ (AppError::Http(_) | AppError::Upstream { .. } | AppError::Json(_))) => {
                warn!(symbol = %c.symbol, "DD note skipped: {e}");
                continue;
            }
            Err(e) => return Err(e),
        };
        store
            .upsert_dd_note(&DdNote {
                symbol: c.symbol.clone(),
                date: c.date,
                model: client.model().to_string(),
                note_md,
            })
            .await?;
        written += 1;
    }
    info!(notes = written, "DD notes stored");
    Ok(written)
}

/// Fills the scorecard for `ticker` and writes `<out_dir>/<TICKER>_<date>.md`.
pub async fn write_scorecard(cfg: &Config, ticker: &str, out_dir: &Path, today: NaiveDate) -> Result<PathBuf> {
    let ticker = ticker.trim().to_uppercase();
    let tiingo = TiingoClient::new(cfg.require_tiingo_key()?, &cfg.tiingo_base_url)?;
    let edgar = EdgarClient::new(
        cfg.require_sec_user_agent()?,
        cfg.sec_max_rps,
        &cfg.sec_data_url,
        &cfg.sec_www_url,
    )?;

    let market = market_snapshot(&tiingo, &ticker, today).await?;

    let mut lookup = TickerCikLookup::new(Duration::from_secs(CIK_CACHE_TTL_SECS));
    let (company, industry, fundamentals) = match lookup.resolve(&edgar, &ticker).await? {
        Some(cik) => {
            let submissions = edgar.company_submissions(&cik).await?;
            let company = submissions.get("name").and_then(|v| v.as_str()).map(str::to_string);
            let industry = submissions
                .get("sicDescription")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            let facts = match edgar.company_facts(&cik).await {
                Ok(doc) => edgar_snapshot(&doc),
                Err(e) if e.is_external() => {
                    warn!(ticker = %ticker, "Company facts unavailable: {e}");
                    EdgarSnapshot::default()
                }
                Err(e) => return Err(e),
            };
            (company, industry, facts)
        }
        None => {
            warn!(ticker = %ticker, "No CIK mapped, EDGAR section left empty");
            (None, None, EdgarSnapshot::default())
        }
    };

    let md = render_filled_scorecard(
        &ticker,
        company.as_deref(),
        None,
        industry.as_deref(),
        &market,
        &fundamentals,
        today,
    );

    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(format!("{ticker}_{}.md", today.format("%Y-%m-%d")));
    std::fs::write(&path, md)?;
    info!(path = %path.display(), "Wrote scorecard");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::types::SetupClass;

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    /// 30 daily rows ending on the run date; volume quadruples over the last five.
    fn tiingo_rows() -> serde_json::Value {
        let rows: Vec<serde_json::Value> = (0..30u64)
            .map(|i| {
                let d = run_date() - Days::new(29 - i);
                let close = 10.0 + 0.05 * i as f64;
                let volume = if i >= 25 { 4_000_000.0 } else { 1_000_000.0 };
                json!({
                    "date": format!("{}T00:00:00.000Z", d.format("%Y-%m-%d")),
                    "open": close, "high": close, "low": close,
                    "close": close, "volume": volume
                })
            })
            .collect();
        json!(rows)
    }

    /// Tiingo bars for SOUN (BBIG fails), the ticker map and SOUN's submissions.
    /// With `recent_10q` the latest periodic report is three days before the run.
    async fn mock_providers(server: &MockServer, recent_10q: bool) {
        let recent = if recent_10q {
            json!({
                "form": ["10-Q", "8-K"],
                "accessionNumber": ["0001840856-25-000010", "0001840856-25-000009"],
                "filingDate": ["2025-03-11", "2025-02-27"],
                "primaryDocument": ["soun-20241231.htm", "ex99.htm"]
            })
        } else {
            json!({
                "form": ["8-K"],
                "accessionNumber": ["0001840856-25-000009"],
                "filingDate": ["2025-02-27"],
                "primaryDocument": ["ex99.htm"]
            })
        };
        Mock::given(method("GET"))
            .and(path("/tiingo/daily/SOUN/prices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tiingo_rows()))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tiingo/daily/BBIG/prices"))
            .respond_with(ResponseTemplate::new(503))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/company_tickers.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "0": {"cik_str": 1840856, "ticker": "SOUN", "title": "SoundHound AI, Inc."}
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/submissions/CIK0001840856.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "SoundHound AI, Inc.",
                "sicDescription": "Services-Prepackaged Software",
                "filings": {"recent": recent}
            })))
            .mount(server)
            .await;
    }

    fn test_config(server: &MockServer) -> Config {
        let mut cfg = Config::for_test();
        cfg.universe = vec!["SOUN".to_string(), "BBIG".to_string()];
        cfg.tiingo_base_url = server.uri();
        cfg.sec_data_url = server.uri();
        cfg.sec_www_url = server.uri();
        cfg.openai_base_url = server.uri();
        cfg
    }

    fn options(out: &Path, dd: bool, symbols: Option<Vec<String>>) -> RunOptions {
        RunOptions {
            date: run_date(),
            config_path: out.join("missing.yaml"),
            dd,
            symbols,
            out_dir: out.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn run_eod_scores_signals_and_reports() {
        let server = MockServer::start().await;
        mock_providers(&server, true).await;
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "output": [{"type": "message", "content": [
                    {"type": "output_text", "text": "Tier: Neutral"}
                ]}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = test_config(&server);
        cfg.openai_api_key = Some("sk-test".to_string());
        let store = Store::in_memory().await.unwrap();
        let out = tempfile::tempdir().unwrap();

        let mut pipeline = Pipeline::new(cfg, store.clone(), options(out.path(), true, None)).unwrap();
        let summary = pipeline.run_eod().await.unwrap();

        assert_eq!(summary.candidates, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.signals, 1);
        assert_eq!(summary.dd_notes, 1);

        // liquidity 25 + momentum 15 + volume 20 + sec 10 + setup 10
        let scored = store.load_score("SOUN", run_date()).await.unwrap().unwrap();
        assert_eq!(scored.total, 80.0);
        assert_eq!(scored.setup_class, SetupClass::PostEarningsContinuation);

        assert_eq!(store.count("daily_bars").await.unwrap(), 30);
        assert_eq!(store.count("filings").await.unwrap(), 2);
        assert_eq!(store.count("signals").await.unwrap(), 1);
        assert_eq!(store.count("runs").await.unwrap(), 1);
        let note = store.load_dd_note("SOUN", run_date()).await.unwrap().unwrap();
        assert_eq!(note.note_md, "Tier: Neutral");

        let watchlist = std::fs::read_to_string(&summary.paths.watchlist).unwrap();
        assert_eq!(
            watchlist,
            "symbol,score_total,setup_class\nSOUN,80,post_earnings_continuation\n"
        );
        assert!(summary.paths.signals.is_file());
        let md = std::fs::read_to_string(&summary.paths.report).unwrap();
        assert!(md.contains("| SOUN | 80 | post_earnings_continuation |"));

        let run = store.load_run(&summary.run_id).await.unwrap().unwrap();
        assert_eq!(run.config_hash.as_deref().map(str::len), Some(64));
    }

    #[tokio::test]
    async fn rerun_overwrites_instead_of_duplicating() {
        let server = MockServer::start().await;
        mock_providers(&server, true).await;

        let store = Store::in_memory().await.unwrap();
        let out = tempfile::tempdir().unwrap();
        let opts = options(out.path(), false, Some(vec!["SOUN".to_string()]));

        let mut pipeline = Pipeline::new(test_config(&server), store.clone(), opts).unwrap();
        pipeline.run_eod().await.unwrap();
        pipeline.run_eod().await.unwrap();

        assert_eq!(store.count("daily_bars").await.unwrap(), 30);
        assert_eq!(store.count("scores_daily").await.unwrap(), 1);
        assert_eq!(store.count("signals").await.unwrap(), 1);
        assert_eq!(store.count("dd_notes").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn rerun_below_threshold_clears_signal() {
        let store = Store::in_memory().await.unwrap();
        let out = tempfile::tempdir().unwrap();
        let opts = options(out.path(), false, Some(vec!["SOUN".to_string()]));

        let first = MockServer::start().await;
        mock_providers(&first, true).await;
        let mut pipeline = Pipeline::new(test_config(&first), store.clone(), opts.clone()).unwrap();
        assert_eq!(pipeline.run_eod().await.unwrap().signals, 1);
        assert_eq!(store.load_signals(run_date()).await.unwrap().len(), 1);

        // Same date again, but the 10-Q is gone: the filer is stale and the score drops.
        let second = MockServer::start().await;
        mock_providers(&second, false).await;
        let mut pipeline = Pipeline::new(test_config(&second), store.clone(), opts).unwrap();
        let summary = pipeline.run_eod().await.unwrap();

        let scored = store.load_score("SOUN", run_date()).await.unwrap().unwrap();
        assert_eq!(scored.total, 10.0);
        assert_eq!(scored.setup_class, SetupClass::None);
        assert_eq!(summary.signals, 0);
        assert!(store.load_signals(run_date()).await.unwrap().is_empty());

        let csv = std::fs::read_to_string(&summary.paths.signals).unwrap();
        assert_eq!(csv, "symbol,date,signal,rationale_json\n");
    }

    #[tokio::test]
    async fn malformed_price_row_skips_only_that_symbol() {
        let server = MockServer::start().await;
        mock_providers(&server, true).await;
        Mock::given(method("GET"))
            .and(path("/tiingo/daily/BBIG/prices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"date": "not-a-date", "close": 1.0, "volume": 10}
            ])))
            .with_priority(1)
            .mount(&server)
            .await;

        let store = Store::in_memory().await.unwrap();
        let out = tempfile::tempdir().unwrap();
        let opts = options(out.path(), false, Some(vec!["BBIG".to_string(), "SOUN".to_string()]));
        let mut pipeline = Pipeline::new(test_config(&server), store.clone(), opts).unwrap();
        let summary = pipeline.run_eod().await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.candidates, 1);
        assert!(store.load_score("SOUN", run_date()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn scoring_ignores_stored_bars_after_the_run_date() {
        let server = MockServer::start().await;
        mock_providers(&server, true).await;

        let store = Store::in_memory().await.unwrap();
        // A later run already stored a crash session after the date being recomputed.
        let later = run_date() + Days::new(3);
        store
            .upsert_bars(&[crate::types::PriceBar::new("SOUN", later, 1.0, 1.0, 1.0, 1.0, 1.0)])
            .await
            .unwrap();

        let out = tempfile::tempdir().unwrap();
        let opts = options(out.path(), false, Some(vec!["SOUN".to_string()]));
        let mut pipeline = Pipeline::new(test_config(&server), store.clone(), opts).unwrap();
        pipeline.run_eod().await.unwrap();

        let scored = store.load_score("SOUN", run_date()).await.unwrap().unwrap();
        assert_eq!(scored.total, 80.0);
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_request() {
        let server = MockServer::start().await;
        let store = Store::in_memory().await.unwrap();

        let out = tempfile::tempdir().unwrap();
        let mut cfg = test_config(&server);
        cfg.openai_api_key = None;
        assert!(Pipeline::new(cfg.clone(), store.clone(), options(out.path(), false, None)).is_ok());
        assert!(matches!(
            Pipeline::new(cfg.clone(), store.clone(), options(out.path(), true, None)),
            Err(AppError::Config(_))
        ));

        cfg.sec_user_agent = None;
        assert!(matches!(
            Pipeline::new(cfg, store, options(out.path(), false, None)),
            Err(AppError::Config(_))
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scorecard_uses_submissions_identity() {
        let server = MockServer::start().await;
        mock_providers(&server, true).await;
        Mock::given(method("GET"))
            .and(path("/tiingo/daily/SOUN"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ticker": "SOUN"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/xbrl/companyfacts/CIK0001840856.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let out = tempfile::tempdir().unwrap();
        let path = write_scorecard(&test_config(&server), "soun", out.path(), run_date())
            .await
            .unwrap();

        assert!(path.ends_with("SOUN_2025-03-14.md"));
        let md = std::fs::read_to_string(&path).unwrap();
        assert!(md.contains("Ticker: SOUN"));
        assert!(md.contains("Company: SoundHound AI, Inc."));
        assert!(md.contains("Industry: Services-Prepackaged Software"));
        assert!(md.contains("Price: 11.4"));
        assert!(md.contains("Market Cap: NA"));
        assert!(md.contains("- Revenue (TTM): NA"));
    }
}
