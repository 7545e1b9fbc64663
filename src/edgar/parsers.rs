use chrono::NaiveDate;

use crate::types::Filing;

/// Digits only, left-padded with zeros to SEC's 10-character CIK.
pub fn cik_pad(cik: &str) -> String {
    let digits: String = cik.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("{digits:0>10}")
}

/// Archive URL of a filing's primary document.
/// `0001628280-24-012345` under CIK `0001234567` →
/// `{www}/Archives/edgar/data/1234567/000162828024012345/{doc}`.
pub fn filing_url(www_base: &str, cik10: &str, accession: &str, primary_doc: &str) -> String {
    let cik_num = cik10.trim_start_matches('0');
    let acc: String = accession.chars().filter(|c| *c != '-').collect();
    format!("{www_base}/Archives/edgar/data/{cik_num}/{acc}/{primary_doc}")
}

/// Normalizes `filings.recent` of a submissions document into rows.
///
/// The recent block is column-oriented; rows are zipped up to the shortest of
/// form / accession / filing date. Rows with an unparseable date are dropped.
pub fn recent_filings(submissions: &serde_json::Value, cik10: &str, www_base: &str) -> Vec<Filing> {
    let recent = submissions.get("filings").and_then(|f| f.get("recent"));
    let column = |name: &str| -> Vec<Option<String>> {
        recent
            .and_then(|r| r.get(name))
            .and_then(|c| c.as_array())
            .map(|a| a.iter().map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    };

    let forms = column("form");
    let accessions = column("accessionNumber");
    let filed = column("filingDate");
    let primary = column("primaryDocument");

    let n = forms.len().min(accessions.len()).min(filed.len());
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let (Some(form), Some(accession), Some(filed_at)) =
            (forms[i].clone(), accessions[i].clone(), filed[i].as_deref())
        else {
            continue;
        };
        let Ok(filed_at) = NaiveDate::parse_from_str(filed_at, "%Y-%m-%d") else {
            continue;
        };
        let primary_doc = primary.get(i).cloned().flatten().filter(|d| !d.is_empty());
        let url = primary_doc
            .as_deref()
            .map(|doc| filing_url(www_base, cik10, &accession, doc));
        out.push(Filing {
            cik: cik10.to_string(),
            accession,
            form,
            filed_at,
            primary_doc,
            url,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cik_is_zero_padded_digits() {
        assert_eq!(cik_pad("320193"), "0000320193");
        assert_eq!(cik_pad("CIK 1234"), "0000001234");
        assert_eq!(cik_pad("0001840292"), "0001840292");
    }

    #[test]
    fn recent_filings_zip_to_shortest_column() {
        let doc = json!({
            "filings": {"recent": {
                "form": ["10-Q", "8-K", "S-3"],
                "accessionNumber": ["0001-24-000001", "0001-24-000002", "0001-24-000003"],
                "filingDate": ["2024-11-08", "2024-10-01"],
                "primaryDocument": ["q3.htm"]
            }}
        });
        let rows = recent_filings(&doc, "0000001234", "https://www.sec.gov");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].form, "10-Q");
        assert_eq!(rows[0].filed_at, NaiveDate::from_ymd_opt(2024, 11, 8).unwrap());
        assert_eq!(rows[0].primary_doc.as_deref(), Some("q3.htm"));
        assert_eq!(
            rows[0].url.as_deref(),
            Some("https://www.sec.gov/Archives/edgar/data/1234/0001240000001/q3.htm")
        );
        assert_eq!(rows[1].primary_doc, None);
        assert_eq!(rows[1].url, None);
    }

    #[test]
    fn missing_recent_block_is_empty() {
        assert!(recent_filings(&json!({}), "0000001234", "https://www.sec.gov").is_empty());
    }
}
