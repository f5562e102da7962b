use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use crate::branches::BranchDirectory;
use crate::error::AnalysisError;
use crate::models::{BranchEntry, CaseRecord};

#[derive(Debug, Deserialize)]
struct CaseRow {
    #[serde(rename = "Date")]
    date: Option<String>,
    #[serde(rename = "State")]
    state: Option<String>,
    #[serde(rename = "District")]
    district: Option<String>,
    #[serde(rename = "Confirmed")]
    confirmed: Option<String>,
    #[serde(rename = "Recovered")]
    recovered: Option<String>,
    #[serde(rename = "Deceased")]
    deceased: Option<String>,
    #[serde(rename = "Tested")]
    tested: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BranchRow {
    #[serde(rename = "Branch")]
    branch: String,
    #[serde(rename = "District")]
    district: String,
    #[serde(rename = "State", default)]
    state: Option<String>,
}

/// Reads a district case file, keeping only the districts of interest.
///
/// An empty `districts` set keeps every row. Rows of other districts are
/// skipped before validation.
pub fn read_cases(path: &Path, districts: &BTreeSet<String>) -> anyhow::Result<Vec<CaseRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open case data {}", path.display()))?;
    let records = parse_cases(file, districts)?;
    info!(path = %path.display(), rows = records.len(), "loaded case records");
    Ok(records)
}

pub fn parse_cases<R: Read>(
    reader: R,
    districts: &BTreeSet<String>,
) -> anyhow::Result<Vec<CaseRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut records = Vec::new();

    for (index, result) in reader.deserialize::<CaseRow>().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let row = result.map_err(|err| AnalysisError::MalformedRecord {
            line,
            reason: err.to_string(),
        })?;

        if !districts.is_empty() {
            match row.district.as_deref() {
                Some(name) if districts.contains(name) => {}
                _ => continue,
            }
        }

        records.push(to_case_record(row, line)?);
    }

    Ok(records)
}

fn to_case_record(row: CaseRow, line: usize) -> Result<CaseRecord, AnalysisError> {
    let malformed = |reason: String| AnalysisError::MalformedRecord { line, reason };

    let district = row
        .district
        .filter(|name| !name.is_empty())
        .ok_or_else(|| malformed("missing District".to_string()))?;
    let date_text = row
        .date
        .filter(|text| !text.is_empty())
        .ok_or_else(|| malformed("missing Date".to_string()))?;
    let date = NaiveDate::parse_from_str(&date_text, "%Y-%m-%d")
        .map_err(|err| malformed(format!("invalid Date {date_text:?}: {err}")))?;
    // chrono accepts unpadded fields; only zero-padded YYYY-MM-DD is allowed.
    if date.format("%Y-%m-%d").to_string() != date_text {
        return Err(malformed(format!("Date {date_text:?} is not YYYY-MM-DD")));
    }

    Ok(CaseRecord {
        state: row.state.unwrap_or_default(),
        district,
        date,
        confirmed: parse_count("Confirmed", row.confirmed.as_deref()).map_err(malformed)?,
        recovered: parse_count("Recovered", row.recovered.as_deref()).map_err(malformed)?,
        deceased: parse_count("Deceased", row.deceased.as_deref()).map_err(malformed)?,
        tested: parse_count("Tested", row.tested.as_deref()).map_err(malformed)?,
    })
}

fn parse_count(field: &str, value: Option<&str>) -> Result<i64, String> {
    let text = value
        .filter(|text| !text.is_empty())
        .ok_or_else(|| format!("missing {field}"))?;

    if let Ok(count) = text.parse::<i64>() {
        return Ok(count);
    }

    // Exported feeds write whole counts as "12.0"; exponents and fractions
    // are rejected.
    text.split_once('.')
        .filter(|(_, fraction)| !fraction.is_empty() && fraction.bytes().all(|b| b == b'0'))
        .and_then(|(whole, _)| whole.parse::<i64>().ok())
        .ok_or_else(|| format!("{field} is not a whole number: {text:?}"))
}

pub fn filter_state(records: Vec<CaseRecord>, state: &str) -> Vec<CaseRecord> {
    records
        .into_iter()
        .filter(|record| record.state.eq_ignore_ascii_case(state))
        .collect()
}

pub fn read_branches(path: &Path) -> anyhow::Result<BranchDirectory> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open branch directory {}", path.display()))?;
    let directory = parse_branches(file)?;
    info!(
        path = %path.display(),
        branches = directory.len(),
        "loaded branch directory"
    );
    Ok(directory)
}

pub fn parse_branches<R: Read>(reader: R) -> anyhow::Result<BranchDirectory> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut entries = Vec::new();

    for result in reader.deserialize::<BranchRow>() {
        let row = result.context("invalid branch directory row")?;
        entries.push(BranchEntry {
            branch: row.branch,
            district: row.district,
            state: row.state.filter(|state| !state.is_empty()),
        });
    }

    Ok(BranchDirectory::new(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CASES: &str = "\
Date,State,District,Confirmed,Recovered,Deceased,Other,Tested
2021-04-26,Karnataka,Mysuru,1000,800,10,0,20000
2021-04-26,Karnataka,Bengaluru Urban,90000,70000,900,0,800000
2021-04-27,Karnataka,Mysuru,1100.0,850,11,0,21000
";

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn malformed(err: anyhow::Error) -> AnalysisError {
        err.downcast::<AnalysisError>().unwrap()
    }

    #[test]
    fn parses_rows_of_interest() {
        let records = parse_cases(CASES.as_bytes(), &set(&["Mysuru"])).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].district, "Mysuru");
        assert_eq!(records[0].state, "Karnataka");
        assert_eq!(records[1].confirmed, 1100);
        assert_eq!(records[1].tested, 21000);
        assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2021, 4, 27).unwrap());
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let records = parse_cases(CASES.as_bytes(), &BTreeSet::new()).unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn blank_count_is_malformed() {
        let data = "Date,State,District,Confirmed,Recovered,Deceased,Tested\n\
                    2021-04-26,Karnataka,Mysuru,1000,800,10,\n";
        let err = malformed(parse_cases(data.as_bytes(), &BTreeSet::new()).unwrap_err());
        assert!(matches!(err, AnalysisError::MalformedRecord { line: 2, ref reason } if reason.contains("Tested")));
    }

    #[test]
    fn fractional_count_is_malformed() {
        let data = "Date,State,District,Confirmed,Recovered,Deceased,Tested\n\
                    2021-04-26,Karnataka,Mysuru,1000.5,800,10,5\n";
        let err = malformed(parse_cases(data.as_bytes(), &BTreeSet::new()).unwrap_err());
        assert!(matches!(err, AnalysisError::MalformedRecord { line: 2, .. }));
    }

    #[test]
    fn bad_date_is_malformed() {
        let data = "Date,State,District,Confirmed,Recovered,Deceased,Tested\n\
                    2021-04-26,Karnataka,Mysuru,1,1,1,1\n\
                    26/04/2021,Karnataka,Mysuru,1,1,1,1\n";
        let err = malformed(parse_cases(data.as_bytes(), &BTreeSet::new()).unwrap_err());
        assert!(matches!(err, AnalysisError::MalformedRecord { line: 3, .. }));

        let unpadded = "Date,State,District,Confirmed,Recovered,Deceased,Tested\n\
                        2021-4-5,Karnataka,Mysuru,1,1,1,1\n";
        let err = malformed(parse_cases(unpadded.as_bytes(), &BTreeSet::new()).unwrap_err());
        assert!(matches!(err, AnalysisError::MalformedRecord { line: 2, .. }));
    }

    #[test]
    fn out_of_range_and_exponent_counts_are_malformed() {
        for confirmed in ["1e30", "-1e30", "1e3", "9223372036854775808.0"] {
            let data = format!(
                "Date,State,District,Confirmed,Recovered,Deceased,Tested\n\
                 2021-04-26,Karnataka,Mysuru,{confirmed},1,1,1\n"
            );
            let err = malformed(parse_cases(data.as_bytes(), &BTreeSet::new()).unwrap_err());
            assert!(
                matches!(err, AnalysisError::MalformedRecord { line: 2, ref reason } if reason.contains("Confirmed")),
                "{confirmed} should be rejected"
            );
        }

        assert_eq!(parse_count("Confirmed", Some("-0.00")), Ok(0));
        assert_eq!(parse_count("Confirmed", Some("42.000")), Ok(42));
    }

    #[test]
    fn malformed_rows_outside_selection_are_skipped() {
        let data = "Date,State,District,Confirmed,Recovered,Deceased,Tested\n\
                    2021-04-26,Karnataka,Mysuru,1,1,1,1\n\
                    2021-04-26,Karnataka,Hassan,,,,\n";
        let records = parse_cases(data.as_bytes(), &set(&["Mysuru"])).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn filters_by_state() {
        let mut records = parse_cases(CASES.as_bytes(), &BTreeSet::new()).unwrap();
        records[1].state = "Tamil Nadu".to_string();

        let karnataka = filter_state(records, "karnataka");
        assert_eq!(karnataka.len(), 2);
        assert!(karnataka.iter().all(|record| record.district == "Mysuru"));
    }

    #[test]
    fn reads_files_from_disk() {
        let mut cases = tempfile::NamedTempFile::new().unwrap();
        cases.write_all(CASES.as_bytes()).unwrap();
        let records = read_cases(cases.path(), &set(&["Bengaluru Urban"])).unwrap();
        assert_eq!(records.len(), 1);

        let mut branches = tempfile::NamedTempFile::new().unwrap();
        writeln!(branches, "Branch,District").unwrap();
        writeln!(branches, "Mysuru North,Mysuru").unwrap();
        writeln!(branches, "Hunsur,Mysuru").unwrap();
        let directory = read_branches(branches.path()).unwrap();
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.districts(), set(&["Mysuru"]));
    }
}
