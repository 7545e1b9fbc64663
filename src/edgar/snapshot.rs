use serde::Serialize;

/// Fundamentals pulled from XBRL company facts. Every field is best-effort.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EdgarSnapshot {
    pub revenue_ttm: Option<f64>,
    pub gross_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub net_income_ttm: Option<f64>,
    pub free_cash_flow_ttm: Option<f64>,
    pub cash: Option<f64>,
    pub debt: Option<f64>,
    pub shares_outstanding: Option<f64>,
    /// Needs a text scan of the auditor's report; not derived from facts.
    pub going_concern_flag: Option<bool>,
}

/// One reported value of a us-gaap concept.
#[derive(Debug, Clone, PartialEq)]
struct Fact {
    end: String,
    val: f64,
    form: String,
}

/// Entries of `facts.us-gaap.<tag>.units.<unit>` that carry a value and a period end.
fn facts_list(company_facts: &serde_json::Value, tag: &str, unit: &str) -> Vec<Fact> {
    let Some(entries) = company_facts
        .pointer(&format!("/facts/us-gaap/{tag}/units/{unit}"))
        .and_then(|v| v.as_array())
    else {
        return Vec::new();
    };

    let mut out: Vec<Fact> = entries
        .iter()
        .filter_map(|e| {
            let end = e.get("end")?.as_str()?.to_string();
            if end.is_empty() {
                return None;
            }
            let val = e.get("val")?.as_f64()?;
            let form = e.get("form").and_then(|f| f.as_str()).unwrap_or("").to_uppercase();
            Some(Fact { end, val, form })
        })
        .collect();
    // ISO dates sort lexicographically.
    out.sort_by(|a, b| a.end.cmp(&b.end));
    out
}

/// First tag with any entries.
fn first_present(company_facts: &serde_json::Value, tags: &[&str], unit: &str) -> Vec<Fact> {
    tags.iter()
        .map(|tag| facts_list(company_facts, tag, unit))
        .find(|items| !items.is_empty())
        .unwrap_or_default()
}

fn latest_value(items: &[Fact]) -> Option<f64> {
    items.last().map(|f| f.val)
}

/// Sum of the last four 10-Q values, when at least four exist.
fn ttm_sum_quarters(items: &[Fact]) -> Option<f64> {
    let quarters: Vec<&Fact> = items.iter().filter(|f| f.form == "10-Q").collect();
    if quarters.len() < 4 {
        return None;
    }
    Some(quarters[quarters.len() - 4..].iter().map(|f| f.val).sum())
}

/// Most recent 10-K value, else the most recent value of any form.
fn latest_annual(items: &[Fact]) -> Option<f64> {
    let annual: Vec<Fact> = items.iter().filter(|f| f.form == "10-K").cloned().collect();
    if annual.is_empty() {
        latest_value(items)
    } else {
        latest_value(&annual)
    }
}

fn ttm_or_annual(items: &[Fact]) -> Option<f64> {
    ttm_sum_quarters(items).or_else(|| latest_annual(items))
}

/// Derives the fundamentals snapshot from a `companyfacts` document.
pub fn edgar_snapshot(facts: &serde_json::Value) -> EdgarSnapshot {
    let revenue_ttm = ttm_or_annual(&first_present(facts, &["Revenues", "SalesRevenueNet"], "USD"));
    let net_income_ttm = ttm_or_annual(&facts_list(facts, "NetIncomeLoss", "USD"));
    let gross_profit_ttm = ttm_or_annual(&facts_list(facts, "GrossProfit", "USD"));
    let op_income_ttm = ttm_or_annual(&facts_list(facts, "OperatingIncomeLoss", "USD"));

    let cash = latest_value(&first_present(
        facts,
        &[
            "CashAndCashEquivalentsAtCarryingValue",
            "CashCashEquivalentsRestrictedCashAndRestrictedCashEquivalents",
        ],
        "USD",
    ));

    let debt_items = facts_list(facts, "Debt", "USD");
    let debt = if !debt_items.is_empty() {
        latest_value(&debt_items)
    } else {
        let current = latest_value(&facts_list(facts, "LongTermDebtCurrent", "USD"));
        let noncurrent = latest_value(&facts_list(facts, "LongTermDebtNoncurrent", "USD"));
        match (current, noncurrent) {
            (None, None) => None,
            (c, n) => Some(c.unwrap_or(0.0) + n.unwrap_or(0.0)),
        }
    };

    let shares_outstanding =
        latest_value(&facts_list(facts, "CommonStockSharesOutstanding", "shares"));

    let cfo = ttm_or_annual(&facts_list(facts, "NetCashProvidedByUsedInOperatingActivities", "USD"));
    let capex = ttm_or_annual(&facts_list(facts, "PaymentsToAcquirePropertyPlantAndEquipment", "USD"));
    let free_cash_flow_ttm = match (cfo, capex) {
        (Some(c), Some(x)) => Some(c - x),
        _ => None,
    };

    let (gross_margin, operating_margin) = match revenue_ttm {
        Some(rev) if rev != 0.0 => (
            gross_profit_ttm.map(|g| g / rev),
            op_income_ttm.map(|o| o / rev),
        ),
        _ => (None, None),
    };

    EdgarSnapshot {
        revenue_ttm,
        gross_margin,
        operating_margin,
        net_income_ttm,
        free_cash_flow_ttm,
        cash,
        debt,
        shares_outstanding,
        going_concern_flag: None,
    }
}
