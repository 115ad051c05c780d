//! Bulk CSV upload of measurements.
//!
//! Rows are checked one by one; a bad row never stops the file. Accepted rows
//! are upserted, rejected rows are reported with their file line.

use std::collections::{HashMap, HashSet};
use std::io::Read;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::models::{
    Answer, AnswerKind, Catalog, ImportReport, Indicator, IndicatorShape, MeasurementInput, Phase,
    Reading, RowError,
};
use crate::validation;

pub const REQUIRED_COLUMNS: &[&str] = &["catalog", "code", "value", "measured_on"];

/// One CSV line as text; parsing happens per field so every problem in the
/// row can be reported together.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CsvRow {
    pub catalog: String,
    pub code: String,
    pub phase: String,
    pub period: String,
    pub value: String,
    pub measured_on: String,
    pub notes: String,
}

#[derive(Debug, Clone)]
pub struct ParsedLine {
    pub line: usize,
    pub row: Result<CsvRow, String>,
}

#[derive(Debug, Clone)]
pub struct PlannedWrite {
    pub line: usize,
    pub indicator: Indicator,
    pub input: MeasurementInput,
}

#[derive(Debug, Default)]
pub struct ImportPlan {
    pub accepted: Vec<PlannedWrite>,
    pub rejected: Vec<RowError>,
}

pub type IndicatorIndex = HashMap<(Catalog, String), Indicator>;

pub fn index_indicators(indicators: Vec<Indicator>) -> IndicatorIndex {
    indicators
        .into_iter()
        .map(|i| ((i.catalog(), i.code.clone()), i))
        .collect()
}

pub fn read_rows<R: Read>(reader: R) -> anyhow::Result<Vec<ParsedLine>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers().context("failed to read CSV header")?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h.eq_ignore_ascii_case(col)))
        .collect();
    if !missing.is_empty() {
        anyhow::bail!("CSV header is missing columns: {}", missing.join(", "));
    }
    let headers = csv::StringRecord::from(
        headers
            .iter()
            .map(|h| h.to_ascii_lowercase())
            .collect::<Vec<_>>(),
    );

    let mut lines = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let fallback_line = index + 2;
        let parsed = match record {
            Ok(record) => {
                if record.iter().all(str::is_empty) {
                    continue;
                }
                let line = record
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(fallback_line);
                ParsedLine {
                    line,
                    row: record
                        .deserialize::<CsvRow>(Some(&headers))
                        .map_err(|e| e.to_string()),
                }
            }
            Err(err) => ParsedLine {
                line: err
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(fallback_line),
                row: Err(err.to_string()),
            },
        };
        lines.push(parsed);
    }

    Ok(lines)
}

/// Normalizes accents and separators used in hand-edited spreadsheets.
fn fold(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            ' ' | '-' => '_',
            other => other,
        })
        .collect()
}

pub fn parse_flag(text: &str) -> Option<bool> {
    match fold(text).as_str() {
        "si" | "s" | "yes" | "y" | "true" | "1" => Some(true),
        "no" | "n" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// Accepts `12.5` and the Spanish `12,5`.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let normalized = if text.contains(',') && !text.contains('.') {
        text.replace(',', ".")
    } else {
        text.to_string()
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%d/%m/%Y"))
        .ok()
}

fn parse_row(
    row: &CsvRow,
    index: &IndicatorIndex,
    today: NaiveDate,
) -> Result<PlannedWrite, Vec<String>> {
    let mut errors = Vec::new();

    let catalog = match fold(&row.catalog).parse::<Catalog>() {
        Ok(c) => Some(c),
        Err(err) => {
            errors.push(err.to_string());
            None
        }
    };
    let code = row.code.trim().to_uppercase();
    if code.is_empty() {
        errors.push("code is empty".to_string());
    }
    let measured_on = parse_date(&row.measured_on);
    if measured_on.is_none() {
        errors.push(format!(
            "measured_on '{}' is not a date (YYYY-MM-DD or DD/MM/YYYY)",
            row.measured_on
        ));
    }

    let indicator = match catalog {
        Some(catalog) if !code.is_empty() => {
            let found = index.get(&(catalog, code.clone()));
            if found.is_none() {
                errors.push(format!(
                    "indicator {code} is not in the {catalog} catalog of this project"
                ));
            }
            found
        }
        _ => None,
    };

    let reading = indicator.and_then(|ind| match ind.shape {
        IndicatorShape::General => {
            let phase = fold(&row.phase).parse::<Phase>();
            let value = parse_number(&row.value);
            if let Err(err) = &phase {
                errors.push(err.to_string());
            }
            if value.is_none() {
                errors.push(format!("value '{}' is not a number", row.value));
            }
            Some(Reading::General {
                phase: phase.ok()?,
                value: value?,
            })
        }
        IndicatorShape::Strategic { answer_kind } => {
            let answer = match answer_kind {
                AnswerKind::YesNo => parse_flag(&row.value).map(Answer::Flag),
                AnswerKind::Numeric => parse_number(&row.value).map(Answer::Number),
            };
            if answer.is_none() {
                errors.push(match answer_kind {
                    AnswerKind::YesNo => format!("value '{}' is not si/no", row.value),
                    AnswerKind::Numeric => format!("value '{}' is not a number", row.value),
                });
            }
            Some(Reading::Strategic { answer: answer? })
        }
        IndicatorShape::Tracking { periodicity } => {
            let value = parse_number(&row.value);
            if value.is_none() {
                errors.push(format!("value '{}' is not a number", row.value));
            }
            // An empty period means the one containing the measurement date.
            let period = match row.period.trim() {
                "" => validation::current_period(periodicity, measured_on?),
                label => label.to_string(),
            };
            Some(Reading::Tracking {
                period,
                value: value?,
            })
        }
    });

    match (indicator, reading, measured_on) {
        (Some(indicator), Some(reading), Some(measured_on)) if errors.is_empty() => {
            let input = MeasurementInput {
                reading,
                measured_on,
                notes: row.notes.trim().to_string(),
            };
            let violations = validation::validate_measurement(indicator, &input, today);
            if violations.is_empty() {
                Ok(PlannedWrite {
                    line: 0,
                    indicator: indicator.clone(),
                    input,
                })
            } else {
                Err(violations.iter().map(ToString::to_string).collect())
            }
        }
        _ => Err(errors),
    }
}

/// Key a stored value is unique on within its indicator.
fn write_key(write: &PlannedWrite) -> (Uuid, String) {
    let key = match &write.input.reading {
        Reading::General { phase, .. } => phase.as_str().to_string(),
        Reading::Strategic { .. } => write.input.measured_on.to_string(),
        Reading::Tracking { period, .. } => period.clone(),
    };
    (write.indicator.id, key)
}

pub fn plan_import(
    lines: Vec<ParsedLine>,
    index: &IndicatorIndex,
    today: NaiveDate,
) -> ImportPlan {
    let mut plan = ImportPlan::default();
    let mut seen: HashMap<(Uuid, String), usize> = HashMap::new();

    for ParsedLine { line, row } in lines {
        let code = row
            .as_ref()
            .ok()
            .map(|r| r.code.trim().to_uppercase())
            .filter(|c| !c.is_empty());

        let outcome = row
            .map_err(|e| vec![e])
            .and_then(|row| parse_row(&row, index, today));

        match outcome {
            Ok(mut write) => {
                write.line = line;
                let key = write_key(&write);
                if let Some(first) = seen.get(&key) {
                    plan.rejected.push(RowError {
                        line,
                        code,
                        errors: vec![format!("duplicates line {first}")],
                    });
                } else {
                    seen.insert(key, line);
                    plan.accepted.push(write);
                }
            }
            Err(errors) => plan.rejected.push(RowError { line, code, errors }),
        }
    }

    plan
}

#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    pub dry_run: bool,
    pub recorded_by: Option<Uuid>,
    /// Dates after this day are rejected as future measurements.
    pub today: NaiveDate,
}

/// Reads, validates and stores a CSV of measurements for one project.
pub async fn import_csv<R: Read>(
    pool: &PgPool,
    project_id: Uuid,
    reader: R,
    options: ImportOptions,
) -> anyhow::Result<ImportReport> {
    let lines = read_rows(reader)?;
    import_lines(pool, project_id, lines, options).await
}

/// Validates already-read lines against the project's indicators and stores
/// the accepted ones unless `dry_run` is set.
pub async fn import_lines(
    pool: &PgPool,
    project_id: Uuid,
    lines: Vec<ParsedLine>,
    options: ImportOptions,
) -> anyhow::Result<ImportReport> {
    let total_rows = lines.len();
    let indicators = db::indicators::list_indicators(pool, project_id, None).await?;
    let index = index_indicators(indicators);
    let plan = plan_import(lines, &index, options.today);
    let mut report = ImportReport {
        total_rows,
        rejected: plan.rejected,
        dry_run: options.dry_run,
        ..ImportReport::default()
    };

    if options.dry_run {
        for write in plan.accepted.iter() {
            if db::values::measurement_exists(pool, &write.indicator, &write.input).await? {
                report.updated += 1;
            } else {
                report.inserted += 1;
            }
        }
        tracing::info!(
            %project_id,
            would_insert = report.inserted,
            would_update = report.updated,
            rejected = report.rejected.len(),
            "import dry run"
        );
        return Ok(report);
    }

    let mut touched = HashSet::new();
    for write in plan.accepted.iter() {
        let (_, inserted) = db::values::upsert_measurement(
            pool,
            &write.indicator,
            &write.input,
            options.recorded_by,
        )
        .await
        .with_context(|| format!("failed to store line {}", write.line))?;
        touched.insert(write.indicator.id);
        if inserted {
            report.inserted += 1;
        } else {
            report.updated += 1;
        }
    }
    tracing::info!(
        %project_id,
        indicators = touched.len(),
        inserted = report.inserted,
        updated = report.updated,
        rejected = report.rejected.len(),
        "import stored"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Periodicity, Unit};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn indicator(code: &str, unit: Unit, shape: IndicatorShape) -> Indicator {
        Indicator {
            id: Uuid::new_v4(),
            project_id: Uuid::nil(),
            code: code.to_string(),
            name: code.to_string(),
            description: None,
            unit,
            min_value: None,
            max_value: None,
            shape,
        }
    }

    fn index() -> IndicatorIndex {
        index_indicators(vec![
            indicator("IG-01", Unit::Hectares, IndicatorShape::General),
            indicator(
                "IE-01",
                Unit::Number,
                IndicatorShape::Strategic {
                    answer_kind: AnswerKind::YesNo,
                },
            ),
            indicator(
                "IE-04",
                Unit::Count,
                IndicatorShape::Strategic {
                    answer_kind: AnswerKind::Numeric,
                },
            ),
            indicator(
                "IS-01",
                Unit::Count,
                IndicatorShape::Tracking {
                    periodicity: Periodicity::Quarterly,
                },
            ),
        ])
    }

    fn plan(csv: &str) -> ImportPlan {
        let lines = read_rows(csv.as_bytes()).unwrap();
        plan_import(lines, &index(), date(2025, 12, 31))
    }

    #[test]
    fn accepts_rows_from_every_catalog() {
        let plan = plan(
            "catalog,code,phase,period,value,measured_on,notes\n\
             general,IG-01,linea base,,\"12,5\",2024-03-01,inicio\n\
             estratégico,IE-01,,,sí,15/06/2025,\n\
             estrategico,IE-04,,,7,2025-06-15,\n\
             seguimiento,is-01,,2025-T2,31,2025-06-30,\n",
        );
        assert!(plan.rejected.is_empty(), "{:?}", plan.rejected);
        assert_eq!(plan.accepted.len(), 4);
        assert_eq!(plan.accepted[0].line, 2);
        assert_eq!(
            plan.accepted[0].input.reading,
            Reading::General {
                phase: Phase::Baseline,
                value: 12.5
            }
        );
        assert_eq!(
            plan.accepted[1].input.reading,
            Reading::Strategic {
                answer: Answer::Flag(true)
            }
        );
    }

    #[test]
    fn reports_every_problem_of_a_row() {
        let plan = plan(
            "catalog,code,phase,value,measured_on\n\
             general,IG-01,inicial,mucho,ayer\n",
        );
        assert!(plan.accepted.is_empty());
        let rejected = &plan.rejected[0];
        assert_eq!(rejected.line, 2);
        assert_eq!(rejected.code.as_deref(), Some("IG-01"));
        assert_eq!(rejected.errors.len(), 3, "{:?}", rejected.errors);
    }

    #[test]
    fn unknown_indicators_and_catalogs_are_rejected() {
        let plan = plan(
            "catalog,code,value,measured_on\n\
             general,IG-99,1,2025-01-01\n\
             anual,IG-01,1,2025-01-01\n",
        );
        assert_eq!(plan.rejected.len(), 2);
        assert!(plan.rejected[0].errors[0].contains("IG-99"));
        assert!(plan.rejected[1].errors[0].contains("unknown catalog"));
    }

    #[test]
    fn rule_violations_surface_as_row_errors() {
        let plan = plan(
            "catalog,code,period,value,measured_on\n\
             seguimiento,IS-01,2025-T3,2.5,2025-06-30\n",
        );
        let errors = &plan.rejected[0].errors;
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("whole number")));
        assert!(errors.iter().any(|e| e.contains("precedes")));
    }

    #[test]
    fn empty_period_is_taken_from_the_measurement_date() {
        let plan = plan(
            "catalog,code,period,value,measured_on\n\
             seguimiento,IS-01,,31,2025-05-20\n",
        );
        assert!(plan.rejected.is_empty(), "{:?}", plan.rejected);
        assert_eq!(
            plan.accepted[0].input.reading,
            Reading::Tracking {
                period: "2025-T2".to_string(),
                value: 31.0
            }
        );
    }

    #[test]
    fn duplicates_within_a_file_keep_the_first_row() {
        let plan = plan(
            "catalog,code,phase,value,measured_on\n\
             general,IG-01,final,3,2025-01-01\n\
             general,IG-01,final,4,2025-02-01\n",
        );
        assert_eq!(plan.accepted.len(), 1);
        assert_eq!(plan.rejected[0].line, 3);
        assert_eq!(plan.rejected[0].errors, vec!["duplicates line 2".to_string()]);
    }

    #[test]
    fn yes_no_indicator_refuses_numbers() {
        let plan = plan("catalog,code,value,measured_on\nestrategico,IE-01,3,2025-01-01\n");
        assert_eq!(plan.rejected[0].errors, vec!["value '3' is not si/no".to_string()]);
    }

    #[test]
    fn missing_required_header_fails_the_file() {
        let err = read_rows("catalog,code,value\ngeneral,IG-01,1\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("measured_on"));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let csv = "catalog,code,value,measured_on\n,,,\ngeneral,IG-01,1,2025-01-01\n";
        let lines = read_rows(csv.as_bytes()).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].line, 3);
    }

    #[test]
    fn flags_and_numbers_accept_spanish_forms() {
        assert_eq!(parse_flag("Sí"), Some(true));
        assert_eq!(parse_flag("NO"), Some(false));
        assert_eq!(parse_flag("quizá"), None);
        assert_eq!(parse_number("1,25"), Some(1.25));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_date("31/12/2024"), Some(date(2024, 12, 31)));
    }
}
