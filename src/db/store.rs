use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::debug;

use crate::db::models::DailyBarRow;
#[cfg(test)]
use crate::db::models::{DdNoteRow, RunRow, ScoreRow, SignalRow};
use crate::error::{AppError, Result};
use crate::types::{DdNote, Filing, PriceBar, ScoreResult, Signal};
#[cfg(test)]
use crate::types::{Components, SetupClass};

const DATE_FMT: &str = "%Y-%m-%d";

fn fmt_date(d: NaiveDate) -> String {
    d.format(DATE_FMT).to_string()
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT)
        .map_err(|e| AppError::InvalidInput(format!("stored date {s:?}: {e}")))
}

/// SQLite persistence. Every write is an insert-or-replace keyed as in the
/// schema, so rerunning a date overwrites rather than duplicates.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if needed) the database file and applies migrations.
    pub async fn connect(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().max_connections(1).connect_with(opts).await?;
        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    // -----------------------------------------------------------------------
    // Runs and tickers
    // -----------------------------------------------------------------------

    pub async fn insert_run(
        &self,
        run_id: &str,
        started_at: &str,
        git_commit: Option<&str>,
        config_hash: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO runs (run_id, started_at, git_commit, config_hash)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(run_id) DO UPDATE SET
                started_at = excluded.started_at,
                git_commit = excluded.git_commit,
                config_hash = excluded.config_hash
            "#,
        )
        .bind(run_id)
        .bind(started_at)
        .bind(git_commit)
        .bind(config_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_ticker(&self, symbol: &str, exchange: Option<&str>, cik: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tickers (symbol, exchange, cik) VALUES (?, ?, ?)
            ON CONFLICT(symbol) DO UPDATE SET
                exchange = COALESCE(excluded.exchange, tickers.exchange),
                cik = COALESCE(excluded.cik, tickers.cik)
            "#,
        )
        .bind(symbol)
        .bind(exchange)
        .bind(cik)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Bars and filings
    // -----------------------------------------------------------------------

    pub async fn upsert_bars(&self, bars: &[PriceBar]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for b in bars {
            sqlx::query(
                r#"
                INSERT INTO daily_bars (symbol, date, open, high, low, close, volume, dollar_volume)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(symbol, date) DO UPDATE SET
                    open = excluded.open,
                    high = excluded.high,
                    low = excluded.low,
                    close = excluded.close,
                    volume = excluded.volume,
                    dollar_volume = excluded.dollar_volume
                "#,
            )
            .bind(b.symbol.as_str())
            .bind(fmt_date(b.date))
            .bind(b.open)
            .bind(b.high)
            .bind(b.low)
            .bind(b.close)
            .bind(b.volume)
            .bind(b.dollar_volume)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(rows = bars.len(), "daily_bars upserted");
        Ok(bars.len())
    }

    /// Bars of `symbol` dated `since..=until`, ascending. Rows missing a close are skipped.
    pub async fn load_bars(&self, symbol: &str, since: NaiveDate, until: NaiveDate) -> Result<Vec<PriceBar>> {
        let rows = sqlx::query_as::<_, DailyBarRow>(
            r#"
            SELECT symbol, date, open, high, low, close, volume, dollar_volume
            FROM daily_bars
            WHERE symbol = ? AND date >= ? AND date <= ?
            ORDER BY date ASC
            "#,
        )
        .bind(symbol)
        .bind(fmt_date(since))
        .bind(fmt_date(until))
        .fetch_all(&self.pool)
        .await?;

        let mut bars = Vec::with_capacity(rows.len());
        for r in rows {
            let Some(close) = r.close else { continue };
            let volume = r.volume.unwrap_or(0.0);
            bars.push(PriceBar {
                date: parse_date(&r.date)?,
                symbol: r.symbol,
                open: r.open.unwrap_or(close),
                high: r.high.unwrap_or(close),
                low: r.low.unwrap_or(close),
                close,
                volume,
                dollar_volume: r.dollar_volume.unwrap_or(close * volume),
            });
        }
        Ok(bars)
    }

    pub async fn upsert_filings(&self, filings: &[Filing]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for f in filings {
            sqlx::query(
                r#"
                INSERT INTO filings (cik, accession, form, filed_at, primary_doc, url)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(cik, accession) DO UPDATE SET
                    form = excluded.form,
                    filed_at = excluded.filed_at,
                    primary_doc = excluded.primary_doc,
                    url = excluded.url
                "#,
            )
            .bind(f.cik.as_str())
            .bind(f.accession.as_str())
            .bind(f.form.as_str())
            .bind(fmt_date(f.filed_at))
            .bind(f.primary_doc.as_deref())
            .bind(f.url.as_deref())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(filings.len())
    }

    // -----------------------------------------------------------------------
    // Scores, signals, DD notes
    // -----------------------------------------------------------------------

    pub async fn upsert_score(&self, symbol: &str, date: NaiveDate, score: &ScoreResult) -> Result<()> {
        let components_json = serde_json::to_string(&score.components)?;
        sqlx::query(
            r#"
            INSERT INTO scores_daily (symbol, date, score_total, components_json, setup_class)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(symbol, date) DO UPDATE SET
                score_total = excluded.score_total,
                components_json = excluded.components_json,
                setup_class = excluded.setup_class
            "#,
        )
        .bind(symbol)
        .bind(fmt_date(date))
        .bind(score.total)
        .bind(components_json)
        .bind(score.setup_class.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replaces every signal stored for `(symbol, date)` with `signals`, which
    /// may be empty. A recomputed date never keeps a signal that no longer fires.
    pub async fn replace_signals(&self, symbol: &str, date: NaiveDate, signals: &[Signal]) -> Result<()> {
        let date_s = fmt_date(date);
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM signals WHERE symbol = ? AND date = ?")
            .bind(symbol)
            .bind(date_s.as_str())
            .execute(&mut *tx)
            .await?;
        for signal in signals {
            let rationale_json = serde_json::to_string(&signal.rationale)?;
            sqlx::query(
                r#"
                INSERT INTO signals (symbol, date, signal, rationale_json)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(symbol, date, signal) DO UPDATE SET
                    rationale_json = excluded.rationale_json
                "#,
            )
            .bind(signal.symbol.as_str())
            .bind(fmt_date(signal.date))
            .bind(signal.signal.to_string())
            .bind(rationale_json)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn upsert_dd_note(&self, note: &DdNote) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dd_notes (symbol, date, model, note_md)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(symbol, date) DO UPDATE SET
                model = excluded.model,
                note_md = excluded.note_md
            "#,
        )
        .bind(note.symbol.as_str())
        .bind(fmt_date(note.date))
        .bind(note.model.as_str())
        .bind(note.note_md.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Read side used by tests to check what a run persisted.
#[cfg(test)]
impl Store {
    /// Private in-memory database. One connection, so every query sees the same data.
    pub async fn in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new().max_connections(1).connect_with(opts).await?;
        Self::migrate(pool).await
    }

    pub async fn load_run(&self, run_id: &str) -> Result<Option<RunRow>> {
        let row = sqlx::query_as::<_, RunRow>(
            "SELECT run_id, started_at, git_commit, config_hash FROM runs WHERE run_id = ?",
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn load_score(&self, symbol: &str, date: NaiveDate) -> Result<Option<ScoreResult>> {
        let row = sqlx::query_as::<_, ScoreRow>(
            r#"
            SELECT symbol, date, score_total, components_json, setup_class
            FROM scores_daily
            WHERE symbol = ? AND date = ?
            "#,
        )
        .bind(symbol)
        .bind(fmt_date(date))
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let components: Components = serde_json::from_str(&row.components_json)?;
        let setup_class = SetupClass::from_str(&row.setup_class)?;
        Ok(Some(ScoreResult {
            total: row.score_total,
            setup_class,
            components,
        }))
    }

    pub async fn load_signals(&self, date: NaiveDate) -> Result<Vec<SignalRow>> {
        let rows = sqlx::query_as::<_, SignalRow>(
            r#"
            SELECT symbol, date, signal, rationale_json
            FROM signals
            WHERE date = ?
            ORDER BY symbol ASC
            "#,
        )
        .bind(fmt_date(date))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn load_dd_note(&self, symbol: &str, date: NaiveDate) -> Result<Option<DdNote>> {
        let row = sqlx::query_as::<_, DdNoteRow>(
            "SELECT symbol, date, model, note_md FROM dd_notes WHERE symbol = ? AND date = ?",
        )
        .bind(symbol)
        .bind(fmt_date(date))
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(DdNote {
                date: parse_date(&r.date)?,
                symbol: r.symbol,
                model: r.model,
                note_md: r.note_md,
            })
        })
        .transpose()
    }

    /// Row count of one of the schema's tables.
    pub async fn count(&self, table: &str) -> Result<i64> {
        const TABLES: [&str; 7] =
            ["runs", "tickers", "daily_bars", "filings", "scores_daily", "signals", "dd_notes"];
        if !TABLES.contains(&table) {
            return Err(AppError::InvalidInput(format!("unknown table {table:?}")));
        }
        let sql = format!("SELECT COUNT(*) FROM {table}");
        let (n,): (i64,) = sqlx::query_as(&sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}
