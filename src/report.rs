use std::collections::BTreeMap;

use serde::Serialize;

use crate::branches::ResolvedSelection;
use crate::error::{AnalysisError, Result};
use crate::models::{
    AggregateTotals, BranchEntry, DistrictAssessment, EnrichedRecord, LabelSummary, RiskLabel,
};
use crate::{risk, stats, trend};

/// Everything the presentation layer needs for one analysis request.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub state: Option<String>,
    pub branches: Vec<BranchEntry>,
    pub districts: Vec<String>,
    pub totals: AggregateTotals,
    pub label_mix: Vec<LabelSummary>,
    pub assessments: Vec<DistrictAssessment>,
    pub recent: BTreeMap<String, Vec<EnrichedRecord>>,
}

pub fn build_report(
    state: Option<&str>,
    selection: &ResolvedSelection,
    windows: &[usize],
    lookback: usize,
) -> Result<AnalysisReport> {
    let enriched = trend::transform(&selection.cases, windows)?;
    let totals = stats::aggregate(&enriched, &selection.districts)?;

    let mut assessments = Vec::with_capacity(selection.districts.len());
    let mut recent = BTreeMap::new();
    for district in &selection.districts {
        let assessment = risk::assess_district(&enriched, district, lookback).ok_or_else(|| {
            AnalysisError::MissingDistrict {
                district: district.clone(),
            }
        })?;
        assessments.push(assessment);

        let window: Vec<EnrichedRecord> = trend::recent(&enriched, district, lookback)
            .into_iter()
            .cloned()
            .collect();
        recent.insert(district.clone(), window);
    }

    assessments.sort_by(|a, b| {
        a.assessment
            .score
            .cmp(&b.assessment.score)
            .then_with(|| a.district.cmp(&b.district))
    });

    Ok(AnalysisReport {
        state: state.map(str::to_string),
        branches: selection.branches.clone(),
        districts: selection.districts.iter().cloned().collect(),
        totals,
        label_mix: summarize_by_label(&assessments, &selection.branches),
        assessments,
        recent,
    })
}

/// Districts and branches per risk label, riskiest label first.
pub fn summarize_by_label(
    assessments: &[DistrictAssessment],
    branches: &[BranchEntry],
) -> Vec<LabelSummary> {
    [RiskLabel::HighRisk, RiskLabel::Moderate, RiskLabel::LowRisk]
        .into_iter()
        .filter_map(|label| {
            let districts: Vec<&str> = assessments
                .iter()
                .filter(|entry| entry.assessment.label == label)
                .map(|entry| entry.district.as_str())
                .collect();
            if districts.is_empty() {
                return None;
            }

            let branch_count = branches
                .iter()
                .filter(|branch| districts.contains(&branch.district.as_str()))
                .count();
            Some(LabelSummary {
                label,
                districts: districts.len(),
                branches: branch_count,
            })
        })
        .collect()
}
