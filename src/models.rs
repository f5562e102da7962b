use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day of cumulative counters for a district.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub state: String,
    pub district: String,
    pub date: NaiveDate,
    pub confirmed: i64,
    pub recovered: i64,
    pub deceased: i64,
    pub tested: i64,
}

/// A case record with its day-over-day delta and trailing averages.
///
/// `None` marks a value that cannot be derived yet: the first day of a
/// district has no delta, and an average needs a full window of deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub record: CaseRecord,
    pub new_cases: Option<i64>,
    pub averages: BTreeMap<usize, Option<f64>>,
}

impl EnrichedRecord {
    pub fn average(&self, window: usize) -> Option<f64> {
        self.averages.get(&window).copied().flatten()
    }
}

impl AsRef<CaseRecord> for EnrichedRecord {
    fn as_ref(&self) -> &CaseRecord {
        &self.record
    }
}

impl AsRef<CaseRecord> for CaseRecord {
    fn as_ref(&self) -> &CaseRecord {
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateTotals {
    pub confirmed: i64,
    pub recovered: i64,
    pub deceased: i64,
    pub tested: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchEntry {
    pub branch: String,
    pub district: String,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Avg7BelowAvg14,
    Avg7BelowAvg21,
    Avg7BelowAvg28,
    Avg14BelowAvg21,
    Avg14BelowAvg28,
    Avg21BelowAvg28,
    Avg7BelowCeiling,
    LastDayAtMostHalfAvg7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionResult {
    pub criterion: Criterion,
    pub fired: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendLabel {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "improving")]
    Improving,
    #[serde(rename = "strongly improving")]
    StronglyImproving,
}

impl TrendLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendLabel::None => "none",
            TrendLabel::Improving => "improving",
            TrendLabel::StronglyImproving => "strongly improving",
        }
    }
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLabel {
    #[serde(rename = "high risk")]
    HighRisk,
    #[serde(rename = "moderate")]
    Moderate,
    #[serde(rename = "low risk")]
    LowRisk,
}

impl RiskLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::HighRisk => "high risk",
            RiskLabel::Moderate => "moderate",
            RiskLabel::LowRisk => "low risk",
        }
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest new cases and trailing averages feeding a risk score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskInputs {
    pub last_day: Option<f64>,
    pub avg7: Option<f64>,
    pub avg14: Option<f64>,
    pub avg21: Option<f64>,
    pub avg28: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundedInputs {
    pub last_day: Option<i64>,
    pub avg7: Option<i64>,
    pub avg14: Option<i64>,
    pub avg21: Option<i64>,
    pub avg28: Option<i64>,
}

impl RiskInputs {
    pub fn rounded(&self) -> RoundedInputs {
        let round = |value: Option<f64>| value.map(|v| v.round() as i64);
        RoundedInputs {
            last_day: round(self.last_day),
            avg7: round(self.avg7),
            avg14: round(self.avg14),
            avg21: round(self.avg21),
            avg28: round(self.avg28),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubScores {
    pub short_term: u8,
    pub medium_term: u8,
    pub long_term: u8,
    pub new_case: u8,
}

impl SubScores {
    pub fn total(&self) -> u8 {
        self.short_term + self.medium_term + self.long_term + self.new_case
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubLabels {
    pub short_term: TrendLabel,
    pub medium_term: TrendLabel,
    pub long_term: TrendLabel,
    pub new_case: TrendLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub inputs: RiskInputs,
    pub rounded: RoundedInputs,
    pub score: u8,
    pub sub_scores: SubScores,
    pub sub_labels: SubLabels,
    pub label: RiskLabel,
    pub criteria: Vec<CriterionResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictAssessment {
    pub district: String,
    pub as_of: NaiveDate,
    pub assessment: RiskAssessment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSummary {
    pub label: RiskLabel,
    pub districts: usize,
    pub branches: usize,
}
