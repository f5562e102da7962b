use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::{AnalysisError, Result};
use crate::models::{CaseRecord, EnrichedRecord};

pub const DEFAULT_WINDOWS: [usize; 4] = [7, 14, 21, 28];

/// Derives new cases and trailing averages for every district in `records`.
///
/// Each district is sorted by date and processed on its own, so windows never
/// span two districts. Districts are emitted in name order.
pub fn transform(records: &[CaseRecord], windows: &[usize]) -> Result<Vec<EnrichedRecord>> {
    let windows: BTreeSet<usize> = windows.iter().copied().collect();
    if windows.contains(&0) {
        return Err(AnalysisError::InvalidWindow(0));
    }

    let mut partitions: BTreeMap<&str, Vec<&CaseRecord>> = BTreeMap::new();
    for (index, record) in records.iter().enumerate() {
        if record.district.trim().is_empty() {
            return Err(AnalysisError::MalformedRecord {
                line: index + 1,
                reason: "district name is empty".to_string(),
            });
        }
        partitions
            .entry(record.district.as_str())
            .or_default()
            .push(record);
    }

    let mut enriched = Vec::with_capacity(records.len());
    for (district, mut rows) in partitions {
        rows.sort_by_key(|record| record.date);
        let deltas = daily_deltas(&rows)?;
        let rolling: BTreeMap<usize, Vec<Option<f64>>> = windows
            .iter()
            .map(|&window| (window, rolling_mean(&deltas, window)))
            .collect();

        debug!(district, rows = rows.len(), "derived rolling averages");

        for (index, record) in rows.into_iter().enumerate() {
            let averages = rolling
                .iter()
                .map(|(&window, values)| (window, values[index]))
                .collect();
            enriched.push(EnrichedRecord {
                record: record.clone(),
                new_cases: deltas[index],
                averages,
            });
        }
    }

    Ok(enriched)
}

fn daily_deltas(rows: &[&CaseRecord]) -> Result<Vec<Option<i64>>> {
    let mut deltas = Vec::with_capacity(rows.len());
    let mut previous: Option<i64> = None;

    for record in rows {
        let delta = match previous {
            Some(prior) => Some(record.confirmed.checked_sub(prior).ok_or_else(|| {
                AnalysisError::CountOverflow {
                    district: record.district.clone(),
                    date: record.date,
                }
            })?),
            None => None,
        };
        deltas.push(delta);
        previous = Some(record.confirmed);
    }

    Ok(deltas)
}

/// Mean of the last `window` values at each index, `None` unless every value
/// in the window is defined.
fn rolling_mean(values: &[Option<i64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|index| {
            if index + 1 < window {
                return None;
            }
            let slice = &values[index + 1 - window..=index];
            let total = slice
                .iter()
                .try_fold(0i128, |sum, value| value.map(|v| sum + i128::from(v)))?;
            Some(total as f64 / window as f64)
        })
        .collect()
}

/// The most recent `lookback` records of one district, oldest first.
pub fn recent<'a>(
    enriched: &'a [EnrichedRecord],
    district: &str,
    lookback: usize,
) -> Vec<&'a EnrichedRecord> {
    let mut rows: Vec<&EnrichedRecord> = enriched
        .iter()
        .filter(|row| row.record.district == district)
        .collect();
    rows.sort_by_key(|row| row.record.date);

    let keep = lookback.max(1);
    let skip = rows.len().saturating_sub(keep);
    rows.split_off(skip)
}
