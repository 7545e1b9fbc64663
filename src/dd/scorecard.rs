use std::fmt::Write as _;

use chrono::NaiveDate;

use crate::edgar::EdgarSnapshot;
use crate::market::MarketSnapshot;

const SCORECARD_TEMPLATE: &str = include_str!("../../templates/scorecard_v1.md");

const NA: &str = "NA";

/// `$1.23B`, `$4.50M`, `$7.00K` or `$12.34`.
pub fn fmt_money(x: Option<f64>) -> String {
    let Some(x) = x else {
        return NA.to_string();
    };
    let abs = x.abs();
    if abs >= 1e9 {
        format!("${:.2}B", x / 1e9)
    } else if abs >= 1e6 {
        format!("${:.2}M", x / 1e6)
    } else if abs >= 1e3 {
        format!("${:.2}K", x / 1e3)
    } else {
        format!("${x:.2}")
    }
}

/// Rounded to a whole number with `,` thousands separators.
pub fn fmt_num(x: Option<f64>) -> String {
    let Some(x) = x else {
        return NA.to_string();
    };
    let rounded = format!("{:.0}", x);
    let (sign, digits) = match rounded.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rounded.as_str()),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if grouped == "0" {
        // -0.4 rounds to "-0"
        return grouped;
    }
    format!("{sign}{grouped}")
}

/// Fraction as a percentage with one decimal: `0.253` → `25.3%`.
pub fn fmt_pct(x: Option<f64>) -> String {
    match x {
        Some(x) => format!("{:.1}%", x * 100.0),
        None => NA.to_string(),
    }
}

pub fn fmt_yes_no_na(flag: Option<bool>) -> &'static str {
    match flag {
        Some(true) => "Yes",
        Some(false) => "No",
        None => NA,
    }
}

fn fmt_price(price: Option<f64>) -> String {
    price.map(|p| p.to_string()).unwrap_or_else(|| NA.to_string())
}

/// Fills the identity block of the scorecard template and appends a data appendix.
pub fn render_filled_scorecard(
    ticker: &str,
    company: Option<&str>,
    sector: Option<&str>,
    industry: Option<&str>,
    market: &MarketSnapshot,
    edgar: &EdgarSnapshot,
    today: NaiveDate,
) -> String {
    let price = fmt_price(market.price);
    let market_cap = fmt_money(market.market_cap);
    let fills = [
        ("Ticker:", ticker.to_string()),
        ("Company:", company.unwrap_or(NA).to_string()),
        ("Sector:", sector.unwrap_or(NA).to_string()),
        ("Industry:", industry.unwrap_or(NA).to_string()),
        ("Price:", price.clone()),
        ("Market Cap:", market_cap.clone()),
        ("Score Date:", today.format("%Y-%m-%d").to_string()),
    ];

    let mut filled = SCORECARD_TEMPLATE.to_string();
    for (label, value) in fills {
        filled = filled.replacen(label, &format!("{label} {value}"), 1);
    }

    let mut out = filled;
    // Writing into a String cannot fail.
    let _ = write!(
        out,
        "\n---\n\n\
         # Data Appendix (v1 Autofill)\n\n\
         ## Market\n\
         - Price: {price}\n\
         - Market Cap: {market_cap}\n\
         - Avg Daily Volume (shares): {}\n\n\
         ## EDGAR\n\
         - Revenue (TTM): {}\n\
         - Gross Margin: {}\n\
         - Operating Margin: {}\n\
         - Net Income (TTM): {}\n\
         - Free Cash Flow (TTM): {}\n\
         - Cash: {}\n\
         - Debt: {}\n\
         - Shares Outstanding: {}\n\
         - Going Concern Flag: {}\n",
        fmt_num(market.avg_daily_volume),
        fmt_money(edgar.revenue_ttm),
        fmt_pct(edgar.gross_margin),
        fmt_pct(edgar.operating_margin),
        fmt_money(edgar.net_income_ttm),
        fmt_money(edgar.free_cash_flow_ttm),
        fmt_money(edgar.cash),
        fmt_money(edgar.debt),
        fmt_num(edgar.shares_outstanding),
        fmt_yes_no_na(edgar.going_concern_flag),
    );
    out
}
