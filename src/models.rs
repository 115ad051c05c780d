use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Closed vocabularies stored as lowercase text columns and sent as the same
/// strings over the wire.
macro_rules! text_enum {
    (
        $(#[$meta:meta])* $name:ident, $kind:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| ParseEnumError {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

text_enum!(
    /// Who a user acts for: a municipality (Ayuntamiento) or the foundation.
    Role, "role" {
        Municipality => "ayuntamiento",
        Foundation => "fundacion",
    }
);

text_enum!(
    /// The three indicator catalogs.
    Catalog, "catalog" {
        General => "general",
        Strategic => "estrategico",
        Tracking => "seguimiento",
    }
);

text_enum!(
    Unit, "unit" {
        Percentage => "porcentaje",
        Number => "numero",
        Count => "conteo",
        Hectares => "hectareas",
        Meters => "metros",
        Euros => "euros",
        Index => "indice",
    }
);

text_enum!(
    /// Stage of a general indicator measurement.
    Phase, "phase" {
        Baseline => "linea_base",
        Intermediate => "intermedio",
        Final => "final",
    }
);

text_enum!(
    AnswerKind, "answer kind" {
        YesNo => "si_no",
        Numeric => "numerico",
    }
);

text_enum!(
    Periodicity, "periodicity" {
        Monthly => "mensual",
        Quarterly => "trimestral",
        Biannual => "semestral",
        Annual => "anual",
    }
);

impl Catalog {
    pub fn indicator_table(self) -> &'static str {
        match self {
            Catalog::General => "renaturalization.general_indicators",
            Catalog::Strategic => "renaturalization.strategic_indicators",
            Catalog::Tracking => "renaturalization.tracking_indicators",
        }
    }

    pub fn value_table(self) -> &'static str {
        match self {
            Catalog::General => "renaturalization.general_values",
            Catalog::Strategic => "renaturalization.strategic_values",
            Catalog::Tracking => "renaturalization.tracking_values",
        }
    }

    pub fn code_prefix(self) -> &'static str {
        match self {
            Catalog::General => "IG",
            Catalog::Strategic => "IE",
            Catalog::Tracking => "IS",
        }
    }
}

impl Unit {
    /// Natural range of the unit, before any per-indicator bounds.
    pub fn range(self) -> (Option<f64>, Option<f64>) {
        match self {
            Unit::Percentage => (Some(0.0), Some(100.0)),
            Unit::Index => (Some(0.0), Some(1.0)),
            Unit::Count | Unit::Hectares | Unit::Meters | Unit::Euros => (Some(0.0), None),
            Unit::Number => (None, None),
        }
    }

    pub fn is_whole(self) -> bool {
        matches!(self, Unit::Count)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub municipality: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectInput {
    pub code: String,
    pub name: String,
    pub municipality: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub project_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    pub password: String,
}

/// Catalog-specific part of an indicator definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "catalog")]
pub enum IndicatorShape {
    #[serde(rename = "general")]
    General,
    #[serde(rename = "estrategico")]
    Strategic { answer_kind: AnswerKind },
    #[serde(rename = "seguimiento")]
    Tracking { periodicity: Periodicity },
}

impl IndicatorShape {
    pub fn catalog(&self) -> Catalog {
        match self {
            IndicatorShape::General => Catalog::General,
            IndicatorShape::Strategic { .. } => Catalog::Strategic,
            IndicatorShape::Tracking { .. } => Catalog::Tracking,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Indicator {
    pub id: Uuid,
    pub project_id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub unit: Unit,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    #[serde(flatten)]
    pub shape: IndicatorShape,
}

impl Indicator {
    pub fn catalog(&self) -> Catalog {
        self.shape.catalog()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIndicator {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub unit: Unit,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(flatten)]
    pub shape: IndicatorShape,
}

/// A strategic answer: yes/no or a number, depending on the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Flag(bool),
    Number(f64),
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Flag(true) => f.write_str("si"),
            Answer::Flag(false) => f.write_str("no"),
            Answer::Number(n) => write!(f, "{n}"),
        }
    }
}

/// The measured quantity, shaped by the catalog it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "catalog")]
pub enum Reading {
    #[serde(rename = "general")]
    General { phase: Phase, value: f64 },
    #[serde(rename = "estrategico")]
    Strategic { answer: Answer },
    #[serde(rename = "seguimiento")]
    Tracking { period: String, value: f64 },
}

impl Reading {
    pub fn catalog(&self) -> Catalog {
        match self {
            Reading::General { .. } => Catalog::General,
            Reading::Strategic { .. } => Catalog::Strategic,
            Reading::Tracking { .. } => Catalog::Tracking,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MeasurementInput {
    #[serde(flatten)]
    pub reading: Reading,
    pub measured_on: NaiveDate,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Measurement {
    pub id: Uuid,
    pub indicator_id: Uuid,
    #[serde(flatten)]
    pub reading: Reading,
    pub measured_on: NaiveDate,
    pub notes: String,
    pub recorded_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

/// A measurement joined with the indicator it was recorded against.
#[derive(Debug, Clone)]
pub struct ProjectMeasurement {
    pub code: String,
    pub name: String,
    pub unit: Unit,
    pub measurement: Measurement,
}

impl ProjectMeasurement {
    pub fn catalog(&self) -> Catalog {
        self.measurement.reading.catalog()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogCoverage {
    pub catalog: Catalog,
    pub indicators: usize,
    pub with_values: usize,
    pub completion_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneralProgress {
    pub code: String,
    pub name: String,
    pub unit: Unit,
    pub baseline: Option<f64>,
    pub intermediate: Option<f64>,
    pub final_value: Option<f64>,
    pub change: Option<f64>,
    pub change_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategicLatest {
    pub code: String,
    pub name: String,
    pub answer: Answer,
    pub measured_on: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Flat,
    New,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackingLatest {
    pub code: String,
    pub name: String,
    pub unit: Unit,
    pub period: String,
    pub value: f64,
    pub previous: Option<f64>,
    pub trend: Trend,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub project_id: Uuid,
    pub code: String,
    pub name: String,
    pub municipality: String,
    pub coverage: Vec<CatalogCoverage>,
    pub general_progress: Vec<GeneralProgress>,
    pub strategic_latest: Vec<StrategicLatest>,
    pub tracking_latest: Vec<TrackingLatest>,
    /// Codes of indicators that have no value yet.
    pub pending: Vec<String>,
    pub last_measured_on: Option<NaiveDate>,
}

impl ProjectSummary {
    /// Share of indicators with at least one value, across all catalogs.
    pub fn overall_completion_pct(&self) -> f64 {
        let total: usize = self.coverage.iter().map(|c| c.indicators).sum();
        let filled: usize = self.coverage.iter().map(|c| c.with_values).sum();
        percent(filled, total)
    }
}

pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub line: usize,
    pub code: Option<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub total_rows: usize,
    pub inserted: usize,
    pub updated: usize,
    pub rejected: Vec<RowError>,
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_enums_parse_case_insensitively() {
        assert_eq!("Trimestral".parse::<Periodicity>(), Ok(Periodicity::Quarterly));
        assert_eq!(" linea_base ".parse::<Phase>(), Ok(Phase::Baseline));
        assert_eq!("FUNDACION".parse::<Role>(), Ok(Role::Foundation));
        let err = "weekly".parse::<Periodicity>().unwrap_err();
        assert_eq!(err.to_string(), "unknown periodicity 'weekly'");
    }

    #[test]
    fn indicator_serializes_catalog_inline() {
        let indicator = Indicator {
            id: Uuid::nil(),
            project_id: Uuid::nil(),
            code: "IS-01".to_string(),
            name: "Aves censadas".to_string(),
            description: None,
            unit: Unit::Count,
            min_value: None,
            max_value: None,
            shape: IndicatorShape::Tracking {
                periodicity: Periodicity::Quarterly,
            },
        };
        let json = serde_json::to_value(&indicator).unwrap();
        assert_eq!(json["catalog"], "seguimiento");
        assert_eq!(json["periodicity"], "trimestral");
        assert_eq!(json["unit"], "conteo");
    }

    #[test]
    fn new_indicator_reads_general_without_extras() {
        let input: NewIndicator = serde_json::from_str(
            r#"{"catalog":"general","code":"IG-07","name":"Superficie","unit":"hectareas"}"#,
        )
        .unwrap();
        assert_eq!(input.shape, IndicatorShape::General);
        assert!(input.min_value.is_none());
    }

    #[test]
    fn measurement_input_reads_each_catalog() {
        let general: MeasurementInput = serde_json::from_str(
            r#"{"catalog":"general","phase":"final","value":12.5,"measured_on":"2025-06-30"}"#,
        )
        .unwrap();
        assert_eq!(
            general.reading,
            Reading::General {
                phase: Phase::Final,
                value: 12.5
            }
        );
        assert_eq!(general.notes, "");

        let strategic: MeasurementInput = serde_json::from_str(
            r#"{"catalog":"estrategico","answer":true,"measured_on":"2025-06-30","notes":"ok"}"#,
        )
        .unwrap();
        assert_eq!(
            strategic.reading,
            Reading::Strategic {
                answer: Answer::Flag(true)
            }
        );

        let tracking: MeasurementInput = serde_json::from_str(
            r#"{"catalog":"seguimiento","period":"2025-T2","value":4,"measured_on":"2025-06-30"}"#,
        )
        .unwrap();
        assert_eq!(tracking.reading.catalog(), Catalog::Tracking);
    }

    #[test]
    fn overall_completion_weights_all_catalogs() {
        let summary = ProjectSummary {
            project_id: Uuid::nil(),
            code: "REN-001".to_string(),
            name: "Demo".to_string(),
            municipality: "Soria".to_string(),
            coverage: vec![
                CatalogCoverage {
                    catalog: Catalog::General,
                    indicators: 3,
                    with_values: 3,
                    completion_pct: 100.0,
                },
                CatalogCoverage {
                    catalog: Catalog::Tracking,
                    indicators: 1,
                    with_values: 0,
                    completion_pct: 0.0,
                },
            ],
            general_progress: vec![],
            strategic_latest: vec![],
            tracking_latest: vec![],
            pending: vec![],
            last_measured_on: None,
        };
        assert!((summary.overall_completion_pct() - 75.0).abs() < 1e-9);
        assert_eq!(percent(0, 0), 0.0);
    }
}
