use std::collections::BTreeSet;

use crate::error::{AnalysisError, Result};
use crate::models::{AggregateTotals, CaseRecord};

/// Sums the latest cumulative counters of each requested district.
pub fn aggregate<R: AsRef<CaseRecord>>(
    records: &[R],
    districts: &BTreeSet<String>,
) -> Result<AggregateTotals> {
    let mut totals = AggregateTotals::default();

    for district in districts {
        let latest = latest_for(records, district).ok_or_else(|| {
            AnalysisError::MissingDistrict {
                district: district.clone(),
            }
        })?;

        totals.confirmed += latest.confirmed;
        totals.recovered += latest.recovered;
        totals.deceased += latest.deceased;
        totals.tested += latest.tested;
    }

    Ok(totals)
}

fn latest_for<'a, R: AsRef<CaseRecord>>(records: &'a [R], district: &str) -> Option<&'a CaseRecord> {
    let mut latest: Option<&CaseRecord> = None;
    for item in records {
        let record: &CaseRecord = item.as_ref();
        if record.district != district {
            continue;
        }
        if latest.map_or(true, |current| record.date >= current.date) {
            latest = Some(record);
        }
    }
    latest
}
