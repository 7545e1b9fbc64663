/// Row types of the tables in `migrations/0001_init.sql`.
/// Dates are stored as `YYYY-MM-DD` text.

#[derive(Debug, sqlx::FromRow)]
pub struct DailyBarRow {
    pub symbol: String,
    pub date: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    pub dollar_volume: Option<f64>,
}

#[cfg(test)]
#[derive(Debug, sqlx::FromRow)]
pub struct ScoreRow {
    pub symbol: String,
    pub date: String,
    pub score_total: f64,
    pub components_json: String,
    pub setup_class: String,
}

#[cfg(test)]
#[derive(Debug, sqlx::FromRow)]
pub struct SignalRow {
    pub symbol: String,
    pub date: String,
    pub signal: String,
    pub rationale_json: String,
}

#[cfg(test)]
#[derive(Debug, sqlx::FromRow)]
pub struct DdNoteRow {
    pub symbol: String,
    pub date: String,
    pub model: String,
    pub note_md: String,
}

#[cfg(test)]
#[derive(Debug, sqlx::FromRow)]
pub struct RunRow {
    pub run_id: String,
    pub started_at: String,
    pub git_commit: Option<String>,
    pub config_hash: Option<String>,
}
