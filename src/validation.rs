use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::models::{
    Answer, AnswerKind, Catalog, Indicator, IndicatorShape, Measurement, MeasurementInput,
    NewIndicator, Periodicity, Reading, Unit,
};

pub const MAX_NOTES_CHARS: usize = 2000;

static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(IG|IE|IS)-(\d{2,3})$").expect("valid code regex"));
static MONTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(0[1-9]|1[0-2])$").expect("valid month regex"));
static QUARTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-T([1-4])$").expect("valid quarter regex"));
static HALF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-S([12])$").expect("valid half regex"));
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})$").expect("valid year regex"));

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleViolation {
    #[error("code '{code}' does not match the {catalog} format {prefix}-NN")]
    BadCode {
        code: String,
        catalog: Catalog,
        prefix: &'static str,
    },
    #[error("name must not be empty")]
    EmptyName,
    #[error("minimum {min} is greater than maximum {max}")]
    InvertedBounds { min: f64, max: f64 },
    #[error("bound {bound} lies outside the natural range of {unit}")]
    BoundOutsideUnit { bound: f64, unit: Unit },
    #[error("value is not a finite number")]
    NotFinite,
    #[error("value {value} is below the minimum {min}")]
    BelowMinimum { value: f64, min: f64 },
    #[error("value {value} is above the maximum {max}")]
    AboveMaximum { value: f64, max: f64 },
    #[error("value {0} must be a whole number")]
    NotWhole(f64),
    #[error("measurement date {0} is in the future")]
    FutureDate(NaiveDate),
    #[error("measurement date {0} is before {earliest}", earliest = earliest_date())]
    DateTooEarly(NaiveDate),
    #[error("notes exceed {max} characters", max = MAX_NOTES_CHARS)]
    NotesTooLong,
    #[error("period '{period}' does not match the {periodicity} format {expected}")]
    BadPeriod {
        period: String,
        periodicity: Periodicity,
        expected: &'static str,
    },
    #[error("measurement date {measured_on} precedes the start of period {period}")]
    MeasuredBeforePeriod {
        period: String,
        measured_on: NaiveDate,
    },
    #[error("a {expected} value was sent to a {actual} indicator")]
    CatalogMismatch { expected: Catalog, actual: Catalog },
    #[error("this indicator expects a yes/no answer")]
    ExpectedYesNo,
    #[error("this indicator expects a numeric answer")]
    ExpectedNumber,
    #[error("{field} cannot change while {count} values are recorded")]
    LockedWhileRecorded { field: &'static str, count: usize },
    #[error("recorded value {value} of {measured_on} would break the new bounds: {reason}")]
    RecordedValueOutOfBounds {
        value: f64,
        measured_on: NaiveDate,
        reason: String,
    },
}

pub fn earliest_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Bounds a numeric reading must respect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRule {
    pub unit: Unit,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ValueRule {
    pub fn for_indicator(indicator: &Indicator) -> Self {
        Self {
            unit: indicator.unit,
            min: indicator.min_value,
            max: indicator.max_value,
        }
    }

    /// Unit range narrowed by the indicator's own bounds.
    pub fn effective_bounds(&self) -> (Option<f64>, Option<f64>) {
        let (unit_min, unit_max) = self.unit.range();
        let min = match (unit_min, self.min) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let max = match (unit_max, self.max) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        (min, max)
    }
}

/// Calendar span a tracking period label covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

pub fn validate_code(catalog: Catalog, code: &str) -> Result<(), RuleViolation> {
    let prefix = catalog.code_prefix();
    match CODE_RE.captures(code) {
        Some(caps) if &caps[1] == prefix => Ok(()),
        _ => Err(RuleViolation::BadCode {
            code: code.to_string(),
            catalog,
            prefix,
        }),
    }
}

pub fn validate_definition(input: &NewIndicator) -> Vec<RuleViolation> {
    let mut violations = Vec::new();

    if let Err(v) = validate_code(input.shape.catalog(), input.code.trim()) {
        violations.push(v);
    }
    if input.name.trim().is_empty() {
        violations.push(RuleViolation::EmptyName);
    }
    if let (Some(min), Some(max)) = (input.min_value, input.max_value) {
        if min > max {
            violations.push(RuleViolation::InvertedBounds { min, max });
        }
    }

    let (unit_min, unit_max) = input.unit.range();
    for bound in [input.min_value, input.max_value].into_iter().flatten() {
        let below = unit_min.is_some_and(|m| bound < m);
        let above = unit_max.is_some_and(|m| bound > m);
        if !bound.is_finite() || below || above {
            violations.push(RuleViolation::BoundOutsideUnit {
                bound,
                unit: input.unit,
            });
        }
    }

    // Yes/no answers carry no numeric range.
    if let IndicatorShape::Strategic {
        answer_kind: AnswerKind::YesNo,
    } = input.shape
    {
        violations.retain(|v| !matches!(v, RuleViolation::BoundOutsideUnit { .. }));
    }

    violations
}

/// What editing `current` into `proposed` would break among the `recorded`
/// values. Shape and unit are frozen once a value exists; new bounds must
/// still admit every recorded number.
pub fn definition_change_conflicts(
    current: &Indicator,
    proposed: &NewIndicator,
    recorded: &[Measurement],
) -> Vec<RuleViolation> {
    let count = recorded.len();
    if count == 0 {
        return Vec::new();
    }

    let mut violations = Vec::new();
    if proposed.shape != current.shape {
        let field = match current.shape {
            IndicatorShape::Strategic { .. } => "answer kind",
            IndicatorShape::Tracking { .. } => "periodicity",
            IndicatorShape::General => "catalog",
        };
        violations.push(RuleViolation::LockedWhileRecorded { field, count });
    }
    if proposed.unit != current.unit {
        violations.push(RuleViolation::LockedWhileRecorded {
            field: "unit",
            count,
        });
    }
    if !violations.is_empty() {
        return violations;
    }

    let rule = ValueRule {
        unit: proposed.unit,
        min: proposed.min_value,
        max: proposed.max_value,
    };
    for measurement in recorded {
        let value = match measurement.reading {
            Reading::General { value, .. } | Reading::Tracking { value, .. } => value,
            Reading::Strategic {
                answer: Answer::Number(value),
            } => value,
            Reading::Strategic { .. } => continue,
        };
        if let Some(first) = validate_number(&rule, value).into_iter().next() {
            violations.push(RuleViolation::RecordedValueOutOfBounds {
                value,
                measured_on: measurement.measured_on,
                reason: first.to_string(),
            });
        }
    }
    violations
}

pub fn validate_number(rule: &ValueRule, value: f64) -> Vec<RuleViolation> {
    if !value.is_finite() {
        return vec![RuleViolation::NotFinite];
    }

    let mut violations = Vec::new();
    let (min, max) = rule.effective_bounds();
    if let Some(min) = min.filter(|m| value < *m) {
        violations.push(RuleViolation::BelowMinimum { value, min });
    }
    if let Some(max) = max.filter(|m| value > *m) {
        violations.push(RuleViolation::AboveMaximum { value, max });
    }
    if rule.unit.is_whole() && value.fract() != 0.0 {
        violations.push(RuleViolation::NotWhole(value));
    }
    violations
}

pub fn validate_measured_on(date: NaiveDate, today: NaiveDate) -> Result<(), RuleViolation> {
    if date > today {
        Err(RuleViolation::FutureDate(date))
    } else if date < earliest_date() {
        Err(RuleViolation::DateTooEarly(date))
    } else {
        Ok(())
    }
}

pub fn validate_notes(notes: &str) -> Result<(), RuleViolation> {
    if notes.chars().count() > MAX_NOTES_CHARS {
        Err(RuleViolation::NotesTooLong)
    } else {
        Ok(())
    }
}

pub fn period_format(periodicity: Periodicity) -> &'static str {
    match periodicity {
        Periodicity::Monthly => "YYYY-MM",
        Periodicity::Quarterly => "YYYY-T1..T4",
        Periodicity::Biannual => "YYYY-S1..S2",
        Periodicity::Annual => "YYYY",
    }
}

pub fn parse_period(periodicity: Periodicity, label: &str) -> Result<Period, RuleViolation> {
    let label = label.trim();
    let bad = || RuleViolation::BadPeriod {
        period: label.to_string(),
        periodicity,
        expected: period_format(periodicity),
    };

    let (year, first_month, months) = match periodicity {
        Periodicity::Monthly => {
            let caps = MONTH_RE.captures(label).ok_or_else(bad)?;
            (caps[1].parse::<i32>(), caps[2].parse::<u32>().map_err(|_| bad())?, 1)
        }
        Periodicity::Quarterly => {
            let caps = QUARTER_RE.captures(label).ok_or_else(bad)?;
            let quarter = caps[2].parse::<u32>().map_err(|_| bad())?;
            (caps[1].parse::<i32>(), (quarter - 1) * 3 + 1, 3)
        }
        Periodicity::Biannual => {
            let caps = HALF_RE.captures(label).ok_or_else(bad)?;
            let half = caps[2].parse::<u32>().map_err(|_| bad())?;
            (caps[1].parse::<i32>(), (half - 1) * 6 + 1, 6)
        }
        Periodicity::Annual => {
            let caps = YEAR_RE.captures(label).ok_or_else(bad)?;
            (caps[1].parse::<i32>(), 1, 12)
        }
    };
    let year = year.map_err(|_| bad())?;

    let start = NaiveDate::from_ymd_opt(year, first_month, 1).ok_or_else(bad)?;
    let end = first_day_after(year, first_month + months - 1)
        .and_then(|d| d.pred_opt())
        .ok_or_else(bad)?;
    Ok(Period { start, end })
}

fn first_day_after(year: i32, month: u32) -> Option<NaiveDate> {
    if month >= 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
}

/// Runs every rule that applies to `input` against `indicator` and returns
/// all violations found.
pub fn validate_measurement(
    indicator: &Indicator,
    input: &MeasurementInput,
    today: NaiveDate,
) -> Vec<RuleViolation> {
    let mut violations = Vec::new();
    let rule = ValueRule::for_indicator(indicator);

    match (&indicator.shape, &input.reading) {
        (IndicatorShape::General, Reading::General { value, .. }) => {
            violations.extend(validate_number(&rule, *value));
        }
        (IndicatorShape::Strategic { answer_kind }, Reading::Strategic { answer }) => {
            match (answer_kind, answer) {
                (AnswerKind::YesNo, Answer::Flag(_)) => {}
                (AnswerKind::YesNo, Answer::Number(_)) => {
                    violations.push(RuleViolation::ExpectedYesNo)
                }
                (AnswerKind::Numeric, Answer::Number(n)) => {
                    violations.extend(validate_number(&rule, *n))
                }
                (AnswerKind::Numeric, Answer::Flag(_)) => {
                    violations.push(RuleViolation::ExpectedNumber)
                }
            }
        }
        (IndicatorShape::Tracking { periodicity }, Reading::Tracking { period, value }) => {
            match parse_period(*periodicity, period) {
                Ok(span) if input.measured_on < span.start => {
                    violations.push(RuleViolation::MeasuredBeforePeriod {
                        period: period.clone(),
                        measured_on: input.measured_on,
                    });
                }
                Ok(_) => {}
                Err(v) => violations.push(v),
            }
            violations.extend(validate_number(&rule, *value));
        }
        (shape, reading) => {
            return vec![RuleViolation::CatalogMismatch {
                expected: reading.catalog(),
                actual: shape.catalog(),
            }];
        }
    }

    if let Err(v) = validate_measured_on(input.measured_on, today) {
        violations.push(v);
    }
    if let Err(v) = validate_notes(&input.notes) {
        violations.push(v);
    }
    violations
}

/// Orders tracking period labels chronologically; unparseable labels sort last.
pub fn period_sort_key(periodicity: Periodicity, label: &str) -> (NaiveDate, String) {
    let start = parse_period(periodicity, label)
        .map(|p| p.start)
        .unwrap_or(NaiveDate::MAX);
    (start, label.to_string())
}

pub fn current_period(periodicity: Periodicity, date: NaiveDate) -> String {
    match periodicity {
        Periodicity::Monthly => format!("{}-{:02}", date.year(), date.month()),
        Periodicity::Quarterly => format!("{}-T{}", date.year(), (date.month() - 1) / 3 + 1),
        Periodicity::Biannual => format!("{}-S{}", date.year(), (date.month() - 1) / 6 + 1),
        Periodicity::Annual => date.year().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Phase;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn indicator(unit: Unit, shape: IndicatorShape) -> Indicator {
        Indicator {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            code: "IG-01".to_string(),
            name: "Cobertura arbórea".to_string(),
            description: None,
            unit,
            min_value: None,
            max_value: None,
            shape,
        }
    }

    fn recorded(indicator: &Indicator, reading: Reading, measured_on: NaiveDate) -> Measurement {
        Measurement {
            id: Uuid::new_v4(),
            indicator_id: indicator.id,
            reading,
            measured_on,
            notes: String::new(),
            recorded_by: None,
            updated_at: chrono::Utc::now(),
        }
    }

    fn definition_of(indicator: &Indicator) -> NewIndicator {
        NewIndicator {
            code: indicator.code.clone(),
            name: indicator.name.clone(),
            description: indicator.description.clone(),
            unit: indicator.unit,
            min_value: indicator.min_value,
            max_value: indicator.max_value,
            shape: indicator.shape,
        }
    }

    fn input(reading: Reading, measured_on: NaiveDate) -> MeasurementInput {
        MeasurementInput {
            reading,
            measured_on,
            notes: String::new(),
        }
    }

    #[test]
    fn codes_follow_catalog_prefix() {
        assert!(validate_code(Catalog::General, "IG-01").is_ok());
        assert!(validate_code(Catalog::Strategic, "IE-123").is_ok());
        assert!(validate_code(Catalog::Tracking, "IG-01").is_err());
        assert!(validate_code(Catalog::General, "IG-1").is_err());
        assert!(validate_code(Catalog::General, "ig-01").is_err());
    }

    #[test]
    fn percentage_is_clamped_to_unit_range() {
        let rule = ValueRule {
            unit: Unit::Percentage,
            min: None,
            max: None,
        };
        assert!(validate_number(&rule, 55.0).is_empty());
        assert_eq!(
            validate_number(&rule, 120.0),
            vec![RuleViolation::AboveMaximum {
                value: 120.0,
                max: 100.0
            }]
        );
        assert_eq!(validate_number(&rule, f64::NAN), vec![RuleViolation::NotFinite]);
    }

    #[test]
    fn indicator_bounds_narrow_unit_range() {
        let rule = ValueRule {
            unit: Unit::Percentage,
            min: Some(10.0),
            max: Some(150.0),
        };
        assert_eq!(rule.effective_bounds(), (Some(10.0), Some(100.0)));
        assert_eq!(validate_number(&rule, 5.0).len(), 1);
    }

    #[test]
    fn counts_must_be_whole_and_non_negative() {
        let rule = ValueRule {
            unit: Unit::Count,
            min: None,
            max: None,
        };
        let violations = validate_number(&rule, -1.5);
        assert!(violations.contains(&RuleViolation::NotWhole(-1.5)));
        assert!(violations
            .iter()
            .any(|v| matches!(v, RuleViolation::BelowMinimum { .. })));
    }

    #[test]
    fn dates_must_be_past_and_recent_enough() {
        let today = date(2025, 6, 1);
        assert!(validate_measured_on(date(2025, 6, 1), today).is_ok());
        assert_eq!(
            validate_measured_on(date(2025, 6, 2), today),
            Err(RuleViolation::FutureDate(date(2025, 6, 2)))
        );
        assert!(validate_measured_on(date(1999, 12, 31), today).is_err());
    }

    #[test]
    fn periods_parse_to_calendar_spans() {
        assert_eq!(
            parse_period(Periodicity::Quarterly, "2025-T4"),
            Ok(Period {
                start: date(2025, 10, 1),
                end: date(2025, 12, 31)
            })
        );
        assert_eq!(
            parse_period(Periodicity::Monthly, "2024-02").map(|p| p.end),
            Ok(date(2024, 2, 29))
        );
        assert_eq!(
            parse_period(Periodicity::Biannual, "2025-S2").map(|p| p.start),
            Ok(date(2025, 7, 1))
        );
        assert!(parse_period(Periodicity::Annual, "2025-T1").is_err());
        assert!(parse_period(Periodicity::Monthly, "2025-13").is_err());
    }

    #[test]
    fn current_period_matches_parse() {
        let today = date(2025, 8, 14);
        for periodicity in Periodicity::ALL.iter().copied() {
            let label = current_period(periodicity, today);
            let span = parse_period(periodicity, &label).unwrap();
            assert!(span.start <= today && today <= span.end, "{label}");
        }
    }

    #[test]
    fn general_measurement_collects_all_violations() {
        let ind = indicator(Unit::Percentage, IndicatorShape::General);
        let mut value = input(
            Reading::General {
                phase: Phase::Baseline,
                value: 140.0,
            },
            date(2030, 1, 1),
        );
        value.notes = "x".repeat(MAX_NOTES_CHARS + 1);
        let violations = validate_measurement(&ind, &value, date(2025, 1, 1));
        assert_eq!(violations.len(), 3);
    }

    #[test]
    fn strategic_answer_must_match_kind() {
        let yes_no = indicator(
            Unit::Number,
            IndicatorShape::Strategic {
                answer_kind: AnswerKind::YesNo,
            },
        );
        let today = date(2025, 1, 1);
        let flag = input(
            Reading::Strategic {
                answer: Answer::Flag(true),
            },
            today,
        );
        let number = input(
            Reading::Strategic {
                answer: Answer::Number(3.0),
            },
            today,
        );
        assert!(validate_measurement(&yes_no, &flag, today).is_empty());
        assert_eq!(
            validate_measurement(&yes_no, &number, today),
            vec![RuleViolation::ExpectedYesNo]
        );
    }

    #[test]
    fn tracking_checks_period_against_date() {
        let ind = indicator(
            Unit::Hectares,
            IndicatorShape::Tracking {
                periodicity: Periodicity::Quarterly,
            },
        );
        let today = date(2025, 12, 31);
        let early = input(
            Reading::Tracking {
                period: "2025-T3".to_string(),
                value: 4.2,
            },
            date(2025, 6, 30),
        );
        assert!(matches!(
            validate_measurement(&ind, &early, today).as_slice(),
            [RuleViolation::MeasuredBeforePeriod { .. }]
        ));

        let malformed = input(
            Reading::Tracking {
                period: "2025-Q3".to_string(),
                value: 4.2,
            },
            date(2025, 9, 30),
        );
        assert!(matches!(
            validate_measurement(&ind, &malformed, today).as_slice(),
            [RuleViolation::BadPeriod { .. }]
        ));
    }

    #[test]
    fn reading_for_other_catalog_is_rejected() {
        let ind = indicator(Unit::Number, IndicatorShape::General);
        let today = date(2025, 1, 1);
        let wrong = input(
            Reading::Tracking {
                period: "2024".to_string(),
                value: 1.0,
            },
            today,
        );
        assert_eq!(
            validate_measurement(&ind, &wrong, today),
            vec![RuleViolation::CatalogMismatch {
                expected: Catalog::Tracking,
                actual: Catalog::General
            }]
        );
    }

    #[test]
    fn definitions_check_code_name_and_bounds() {
        let def = NewIndicator {
            code: "IS-04".to_string(),
            name: " ".to_string(),
            description: None,
            unit: Unit::Percentage,
            min_value: Some(80.0),
            max_value: Some(120.0),
            shape: IndicatorShape::General,
        };
        let violations = validate_definition(&def);
        assert!(violations
            .iter()
            .any(|v| matches!(v, RuleViolation::BadCode { .. })));
        assert!(violations.contains(&RuleViolation::EmptyName));
        assert!(violations.contains(&RuleViolation::BoundOutsideUnit {
            bound: 120.0,
            unit: Unit::Percentage
        }));
    }

    #[test]
    fn period_sort_key_orders_chronologically() {
        let mut labels = vec!["2025-T1", "2024-T4", "2025-T3"];
        labels.sort_by_key(|l| period_sort_key(Periodicity::Quarterly, l));
        assert_eq!(labels, vec!["2024-T4", "2025-T1", "2025-T3"]);
    }

    #[test]
    fn definitions_without_values_change_freely() {
        let current = indicator(Unit::Count, IndicatorShape::General);
        let mut proposed = definition_of(&current);
        proposed.unit = Unit::Hectares;
        proposed.max_value = Some(1.0);
        assert!(definition_change_conflicts(&current, &proposed, &[]).is_empty());
    }

    #[test]
    fn shape_and_unit_are_frozen_once_recorded() {
        let current = indicator(
            Unit::Count,
            IndicatorShape::Strategic {
                answer_kind: AnswerKind::Numeric,
            },
        );
        let stored = [recorded(
            &current,
            Reading::Strategic {
                answer: Answer::Number(4.0),
            },
            date(2024, 5, 1),
        )];

        let mut proposed = definition_of(&current);
        proposed.shape = IndicatorShape::Strategic {
            answer_kind: AnswerKind::YesNo,
        };
        proposed.unit = Unit::Number;
        let conflicts = definition_change_conflicts(&current, &proposed, &stored);
        assert_eq!(
            conflicts,
            vec![
                RuleViolation::LockedWhileRecorded {
                    field: "answer kind",
                    count: 1
                },
                RuleViolation::LockedWhileRecorded {
                    field: "unit",
                    count: 1
                },
            ]
        );

        let mut renamed = definition_of(&current);
        renamed.name = "Entidades colaboradoras".to_string();
        assert!(definition_change_conflicts(&current, &renamed, &stored).is_empty());
    }

    #[test]
    fn narrowed_bounds_must_admit_recorded_values() {
        let current = indicator(
            Unit::Count,
            IndicatorShape::Tracking {
                periodicity: Periodicity::Quarterly,
            },
        );
        let stored = [
            recorded(
                &current,
                Reading::Tracking {
                    period: "2024-T1".to_string(),
                    value: 18.0,
                },
                date(2024, 3, 31),
            ),
            recorded(
                &current,
                Reading::Tracking {
                    period: "2024-T2".to_string(),
                    value: 24.0,
                },
                date(2024, 6, 30),
            ),
        ];

        let mut proposed = definition_of(&current);
        proposed.max_value = Some(20.0);
        let conflicts = definition_change_conflicts(&current, &proposed, &stored);
        assert_eq!(conflicts.len(), 1);
        assert!(matches!(
            conflicts[0],
            RuleViolation::RecordedValueOutOfBounds { value, .. } if value == 24.0
        ));
        assert!(conflicts[0].to_string().contains("2024-06-30"));

        proposed.max_value = Some(30.0);
        assert!(definition_change_conflicts(&current, &proposed, &stored).is_empty());
    }

    #[test]
    fn yes_no_answers_ignore_bounds() {
        let current = indicator(
            Unit::Number,
            IndicatorShape::Strategic {
                answer_kind: AnswerKind::YesNo,
            },
        );
        let stored = [recorded(
            &current,
            Reading::Strategic {
                answer: Answer::Flag(true),
            },
            date(2024, 2, 10),
        )];
        let mut proposed = definition_of(&current);
        proposed.max_value = Some(0.0);
        assert!(definition_change_conflicts(&current, &proposed, &stored).is_empty());
    }
}
