mod config;
mod db;
mod dd;
mod edgar;
mod error;
mod features;
mod gates;
mod hash;
mod market;
mod pipeline;
mod report;
mod scorer;
mod signals;
mod types;

use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{parse_universe, Config};
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::pipeline::{Pipeline, RunOptions};

#[derive(Parser)]
#[command(name = "scanner", about = "End-of-day equity screening pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the SQLite database and schema.
    InitDb {
        /// Database path. Defaults to DB_PATH.
        #[arg(long)]
        db: Option<String>,
    },
    /// Score the universe for one session and write signals and reports.
    RunEod {
        /// Session date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<String>,

        /// Config file hashed into the run record.
        #[arg(long, default_value = "config/config.yaml")]
        config: PathBuf,

        /// Database path. Defaults to DB_PATH.
        #[arg(long)]
        db: Option<String>,

        /// Request DD notes for the top candidates.
        #[arg(long, default_value_t = false)]
        dd: bool,

        /// Comma-separated symbols, overriding SCANNER_UNIVERSE.
        #[arg(long)]
        symbols: Option<String>,

        /// Output directory. Defaults to OUTPUT_DIR.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Write a filled DD scorecard for one ticker.
    Scorecard {
        ticker: String,

        /// Output directory. Defaults to <OUTPUT_DIR>/scorecards.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cli.command, cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, cfg: Config) -> Result<()> {
    match command {
        Commands::InitDb { db } => {
            let db_path = db.unwrap_or_else(|| cfg.db_path.clone());
            Store::connect(&db_path).await?;
            info!("Database ready at {db_path}");
        }
        Commands::RunEod {
            date,
            config,
            db,
            dd,
            symbols,
            out_dir,
        } => {
            let opts = RunOptions {
                date: parse_run_date(date.as_deref())?,
                config_path: config,
                dd,
                symbols: symbols.as_deref().map(parse_universe).filter(|s| !s.is_empty()),
                out_dir: out_dir.unwrap_or_else(|| PathBuf::from(&cfg.output_dir)),
            };
            let db_path = db.unwrap_or_else(|| cfg.db_path.clone());

            // Credentials are checked before the database is touched.
            cfg.validate_run_eod(opts.dd)?;
            let store = Store::connect(&db_path).await?;
            let mut pipeline = Pipeline::new(cfg, store, opts)?;
            let summary = pipeline.run_eod().await?;
            info!(
                run_id = %summary.run_id,
                candidates = summary.candidates,
                skipped = summary.skipped,
                signals = summary.signals,
                dd_notes = summary.dd_notes,
                report = %summary.paths.report.display(),
                "EOD run complete"
            );
        }
        Commands::Scorecard { ticker, out_dir } => {
            let out_dir = out_dir.unwrap_or_else(|| PathBuf::from(&cfg.output_dir).join("scorecards"));
            let today = Local::now().date_naive();
            pipeline::write_scorecard(&cfg, &ticker, &out_dir, today).await?;
        }
    }
    Ok(())
}

fn parse_run_date(raw: Option<&str>) -> Result<NaiveDate> {
    match raw {
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|e| AppError::InvalidInput(format!("--date {s:?}: {e}"))),
        None => Ok(Local::now().date_naive()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_date_parses_iso_dates() {
        assert_eq!(
            parse_run_date(Some("2025-03-14")).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
        );
        assert!(matches!(parse_run_date(Some("14/03/2025")), Err(AppError::InvalidInput(_))));
        assert!(parse_run_date(None).is_ok());
    }

    #[test]
    fn cli_parses_run_eod_flags() {
        let cli = Cli::try_parse_from([
            "scanner", "run-eod", "--date", "2025-03-14", "--dd", "--symbols", "soun,bbig",
        ])
        .unwrap();
        match cli.command {
            Commands::RunEod { date, dd, symbols, config, .. } => {
                assert_eq!(date.as_deref(), Some("2025-03-14"));
                assert!(dd);
                assert_eq!(symbols.as_deref(), Some("soun,bbig"));
                assert_eq!(config, PathBuf::from("config/config.yaml"));
            }
            _ => panic!("expected run-eod"),
        }
    }
}
