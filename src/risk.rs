use crate::models::{
    Criterion, CriterionResult, DistrictAssessment, EnrichedRecord, RiskAssessment, RiskInputs,
    RiskLabel, SubLabels, SubScores, TrendLabel,
};
use crate::trend;

/// Seven-day average below which a district earns a new-case point.
pub const NEW_CASE_CEILING: f64 = 1000.0;

pub const DEFAULT_LOOKBACK: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Horizon {
    ShortTerm,
    MediumTerm,
    LongTerm,
    NewCase,
}

impl Criterion {
    fn horizon(&self) -> Horizon {
        match self {
            Criterion::Avg7BelowAvg14 | Criterion::Avg7BelowAvg21 | Criterion::Avg7BelowAvg28 => {
                Horizon::ShortTerm
            }
            Criterion::Avg14BelowAvg21 | Criterion::Avg14BelowAvg28 => Horizon::MediumTerm,
            Criterion::Avg21BelowAvg28 => Horizon::LongTerm,
            Criterion::Avg7BelowCeiling | Criterion::LastDayAtMostHalfAvg7 => Horizon::NewCase,
        }
    }
}

/// Scores a district from its latest new cases and trailing averages.
///
/// Each of the eight criteria adds one point. A criterion that depends on a
/// missing value never fires.
pub fn score(
    d1: Option<f64>,
    avg7: Option<f64>,
    avg14: Option<f64>,
    avg21: Option<f64>,
    avg28: Option<f64>,
) -> RiskAssessment {
    let inputs = RiskInputs {
        last_day: d1,
        avg7,
        avg14,
        avg21,
        avg28,
    };

    let criteria = vec![
        fired(Criterion::Avg7BelowAvg14, below(avg7, avg14)),
        fired(Criterion::Avg7BelowAvg21, below(avg7, avg21)),
        fired(Criterion::Avg7BelowAvg28, below(avg7, avg28)),
        fired(Criterion::Avg14BelowAvg21, below(avg14, avg21)),
        fired(Criterion::Avg14BelowAvg28, below(avg14, avg28)),
        fired(Criterion::Avg21BelowAvg28, below(avg21, avg28)),
        fired(Criterion::Avg7BelowCeiling, below(avg7, Some(NEW_CASE_CEILING))),
        fired(
            Criterion::LastDayAtMostHalfAvg7,
            at_most(d1, avg7.map(|avg| avg / 2.0)),
        ),
    ];

    let mut sub_scores = SubScores::default();
    for result in criteria.iter().filter(|result| result.fired) {
        match result.criterion.horizon() {
            Horizon::ShortTerm => sub_scores.short_term += 1,
            Horizon::MediumTerm => sub_scores.medium_term += 1,
            Horizon::LongTerm => sub_scores.long_term += 1,
            Horizon::NewCase => sub_scores.new_case += 1,
        }
    }

    let total = sub_scores.total();
    RiskAssessment {
        inputs,
        rounded: inputs.rounded(),
        score: total,
        sub_scores,
        sub_labels: SubLabels {
            short_term: short_term_label(sub_scores.short_term),
            medium_term: paired_label(sub_scores.medium_term),
            long_term: long_term_label(sub_scores.long_term),
            new_case: paired_label(sub_scores.new_case),
        },
        label: overall_label(total),
        criteria,
    }
}

/// Assesses the final record of the district's recent look-back window.
pub fn assess_district(
    enriched: &[EnrichedRecord],
    district: &str,
    lookback: usize,
) -> Option<DistrictAssessment> {
    let window = trend::recent(enriched, district, lookback);
    let latest = window.last()?;

    let assessment = score(
        latest.new_cases.map(|cases| cases as f64),
        latest.average(7),
        latest.average(14),
        latest.average(21),
        latest.average(28),
    );

    Some(DistrictAssessment {
        district: district.to_string(),
        as_of: latest.record.date,
        assessment,
    })
}

fn fired(criterion: Criterion, fired: bool) -> CriterionResult {
    CriterionResult { criterion, fired }
}

fn below(left: Option<f64>, right: Option<f64>) -> bool {
    match (left, right) {
        (Some(left), Some(right)) => left < right,
        _ => false,
    }
}

fn at_most(left: Option<f64>, right: Option<f64>) -> bool {
    match (left, right) {
        (Some(left), Some(right)) => left <= right,
        _ => false,
    }
}

fn short_term_label(points: u8) -> TrendLabel {
    match points {
        0 => TrendLabel::None,
        1..=2 => TrendLabel::Improving,
        _ => TrendLabel::StronglyImproving,
    }
}

fn paired_label(points: u8) -> TrendLabel {
    match points {
        0 => TrendLabel::None,
        1 => TrendLabel::Improving,
        _ => TrendLabel::StronglyImproving,
    }
}

fn long_term_label(points: u8) -> TrendLabel {
    match points {
        0 => TrendLabel::None,
        _ => TrendLabel::Improving,
    }
}

pub fn overall_label(score: u8) -> RiskLabel {
    match score {
        0..=3 => RiskLabel::HighRisk,
        4..=7 => RiskLabel::Moderate,
        _ => RiskLabel::LowRisk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CaseRecord;
    use chrono::{Duration, NaiveDate};

    #[test]
    fn improving_district_scores_low_risk() {
        let result = score(Some(2.0), Some(5.0), Some(10.0), Some(12.0), Some(15.0));

        assert_eq!(
            result.sub_scores,
            SubScores {
                short_term: 3,
                medium_term: 2,
                long_term: 1,
                new_case: 2,
            }
        );
        assert_eq!(result.score, 8);
        assert_eq!(result.label, RiskLabel::LowRisk);
        assert_eq!(result.sub_labels.short_term, TrendLabel::StronglyImproving);
        assert_eq!(result.sub_labels.medium_term, TrendLabel::StronglyImproving);
        assert_eq!(result.sub_labels.long_term, TrendLabel::Improving);
        assert_eq!(result.sub_labels.new_case, TrendLabel::StronglyImproving);
        assert!(result.criteria.iter().all(|c| c.fired));
    }

    #[test]
    fn missing_inputs_never_fire() {
        let result = score(None, None, None, None, None);

        assert_eq!(result.score, 0);
        assert_eq!(result.label, RiskLabel::HighRisk);
        assert!(result.criteria.iter().all(|c| !c.fired));
        assert_eq!(result.sub_labels.short_term, TrendLabel::None);

        let partial = score(None, Some(5.0), None, None, Some(15.0));
        assert_eq!(partial.sub_scores.short_term, 1);
        assert_eq!(partial.sub_scores.medium_term, 0);
        assert_eq!(partial.sub_scores.long_term, 0);
        assert_eq!(partial.sub_scores.new_case, 1);
    }

    #[test]
    fn overall_label_thresholds() {
        let three = score(Some(2.0), Some(5.0), Some(10.0), None, None);
        assert_eq!(three.score, 3);
        assert_eq!(three.label, RiskLabel::HighRisk);

        let four = score(Some(100.0), Some(5.0), Some(10.0), Some(12.0), None);
        assert_eq!(four.score, 4);
        assert_eq!(four.label, RiskLabel::Moderate);

        let seven = score(Some(100.0), Some(5.0), Some(10.0), Some(12.0), Some(15.0));
        assert_eq!(seven.score, 7);
        assert_eq!(seven.label, RiskLabel::Moderate);
        assert_eq!(seven.sub_labels.new_case, TrendLabel::Improving);
    }

    #[test]
    fn short_term_label_bands() {
        assert_eq!(short_term_label(1), TrendLabel::Improving);
        assert_eq!(short_term_label(2), TrendLabel::Improving);
        assert_eq!(short_term_label(3), TrendLabel::StronglyImproving);
        assert_eq!(long_term_label(1), TrendLabel::Improving);
    }

    #[test]
    fn ceiling_and_half_average_are_strict_and_inclusive() {
        let at_ceiling = score(None, Some(NEW_CASE_CEILING), None, None, None);
        assert_eq!(at_ceiling.sub_scores.new_case, 0);

        let half = score(Some(2.5), Some(5.0), None, None, None);
        assert_eq!(half.sub_scores.new_case, 2);
    }

    #[test]
    fn total_is_sum_of_sub_scores() {
        let values = [None, Some(0.0), Some(3.0), Some(9.0), Some(1500.0)];
        for d1 in values {
            for avg7 in values {
                for avg14 in values {
                    for avg21 in values {
                        for avg28 in values {
                            let result = score(d1, avg7, avg14, avg21, avg28);
                            assert_eq!(result.score, result.sub_scores.total());
                            assert!(result.score <= 8);
                            assert_eq!(result.label, overall_label(result.score));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn lower_short_average_never_lowers_short_term() {
        let mut previous = 0;
        for step in (0..=80).rev() {
            let avg7 = step as f64 * 0.5;
            let result = score(Some(1.0), Some(avg7), Some(10.0), Some(20.0), Some(30.0));
            assert!(result.sub_scores.short_term >= previous);
            previous = result.sub_scores.short_term;
        }
        assert_eq!(previous, 3);
    }

    #[test]
    fn keeps_unrounded_inputs() {
        let result = score(Some(6.6), Some(7.142857), None, None, None);
        assert_eq!(result.inputs.avg7, Some(7.142857));
        assert_eq!(result.rounded.avg7, Some(7));
        assert_eq!(result.rounded.last_day, Some(7));
        assert_eq!(result.rounded.avg14, None);
    }

    #[test]
    fn assesses_latest_record_of_district() {
        let start = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        let records: Vec<CaseRecord> = (0..45)
            .map(|day| CaseRecord {
                state: "Andhra Pradesh".to_string(),
                district: "Chittoor".to_string(),
                date: start + Duration::days(day),
                confirmed: 1000 + 40 * day - day * day / 2,
                recovered: 0,
                deceased: 0,
                tested: 0,
            })
            .collect();
        let enriched = trend::transform(&records, &trend::DEFAULT_WINDOWS).unwrap();

        let result = assess_district(&enriched, "Chittoor", DEFAULT_LOOKBACK).unwrap();
        assert_eq!(result.as_of, start + Duration::days(44));
        assert!(result.assessment.inputs.avg28.is_some());
        assert_eq!(result.assessment.sub_scores.short_term, 3);

        assert!(assess_district(&enriched, "Guntur", DEFAULT_LOOKBACK).is_none());
    }
}
