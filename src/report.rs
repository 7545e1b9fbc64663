//! Run artifacts written under the output directory.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::config::REPORT_TOP_N;
use crate::error::Result;
use crate::types::{Candidate, Signal};

/// Paths of the three per-run artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPaths {
    pub watchlist: PathBuf,
    pub signals: PathBuf,
    pub report: PathBuf,
}

impl ReportPaths {
    pub fn for_date(out_dir: &Path, date: NaiveDate) -> Self {
        let d = date.format("%Y-%m-%d");
        Self {
            watchlist: out_dir.join(format!("watchlist_{d}.csv")),
            signals: out_dir.join(format!("signals_{d}.csv")),
            report: out_dir.join(format!("report_{d}.md")),
        }
    }
}

/// Candidates by score, highest first. The sort is stable so ties keep universe order.
pub fn rank(candidates: &[Candidate]) -> Vec<&Candidate> {
    let mut ranked: Vec<&Candidate> = candidates.iter().collect();
    ranked.sort_by(|a, b| b.score.total.total_cmp(&a.score.total));
    ranked
}

pub fn write_watchlist(path: &Path, ranked: &[&Candidate]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["symbol", "score_total", "setup_class"])?;
    for c in ranked {
        wtr.write_record([
            c.symbol.as_str(),
            &c.score.total.to_string(),
            c.score.setup_class.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// One row per signal; `rationale_json` is the rationale with its keys in sorted order.
pub fn write_signals(path: &Path, signals: &[Signal]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["symbol", "date", "signal", "rationale_json"])?;
    for s in signals {
        let rationale = serde_json::to_string(&s.rationale)?;
        wtr.write_record([
            s.symbol.as_str(),
            &s.date.format("%Y-%m-%d").to_string(),
            &s.signal.to_string(),
            &rationale,
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Markdown summary: top candidates table and the artifact list.
pub fn render_report(date: NaiveDate, ranked: &[&Candidate], paths: &ReportPaths) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# EOD Scan Report {}\n", date.format("%Y-%m-%d"));
    md.push_str("## Top candidates\n\n");
    md.push_str("| symbol | score_total | setup_class |\n");
    md.push_str("|:-------|------------:|:------------|\n");
    for c in ranked.iter().take(REPORT_TOP_N) {
        let _ = writeln!(md, "| {} | {} | {} |", c.symbol, c.score.total, c.score.setup_class);
    }
    md.push_str("\n## Files\n");
    for p in [&paths.watchlist, &paths.signals, &paths.report] {
        let _ = writeln!(md, "- {}", p.display());
    }
    md
}

pub fn write_report(date: NaiveDate, ranked: &[&Candidate], paths: &ReportPaths) -> Result<()> {
    std::fs::write(&paths.report, render_report(date, ranked, paths))?;
    Ok(())
}
