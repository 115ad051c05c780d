//! CSV export in the same layout `import` reads.

use std::io::Write;

use serde::Serialize;

use crate::models::{Catalog, Phase, ProjectMeasurement, Reading};

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    catalog: Catalog,
    code: &'a str,
    name: &'a str,
    unit: &'a str,
    phase: &'a str,
    period: &'a str,
    value: String,
    measured_on: String,
    notes: &'a str,
}

fn phase_rank(phase: Phase) -> usize {
    Phase::ALL.iter().position(|p| *p == phase).unwrap_or(usize::MAX)
}

/// Export order: catalog, code, then phase or period, then date.
pub fn sort_for_export(measurements: &mut [ProjectMeasurement]) {
    measurements.sort_by(|a, b| {
        let order = a
            .catalog()
            .cmp(&b.catalog())
            .then_with(|| a.code.cmp(&b.code));
        let within = match (&a.measurement.reading, &b.measurement.reading) {
            (Reading::General { phase: pa, .. }, Reading::General { phase: pb, .. }) => {
                phase_rank(*pa).cmp(&phase_rank(*pb))
            }
            (Reading::Tracking { period: pa, .. }, Reading::Tracking { period: pb, .. }) => {
                pa.cmp(pb)
            }
            _ => std::cmp::Ordering::Equal,
        };
        order
            .then(within)
            .then_with(|| a.measurement.measured_on.cmp(&b.measurement.measured_on))
    });
}

pub fn write_csv<W: Write>(writer: W, measurements: &[ProjectMeasurement]) -> anyhow::Result<()> {
    let mut out = csv::Writer::from_writer(writer);

    for item in measurements {
        let m = &item.measurement;
        let (phase, period, value) = match &m.reading {
            Reading::General { phase, value } => (phase.as_str(), "", value.to_string()),
            Reading::Strategic { answer } => ("", "", answer.to_string()),
            Reading::Tracking { period, value } => ("", period.as_str(), value.to_string()),
        };
        out.serialize(ExportRow {
            catalog: item.catalog(),
            code: &item.code,
            name: &item.name,
            unit: item.unit.as_str(),
            phase,
            period,
            value,
            measured_on: m.measured_on.format("%Y-%m-%d").to_string(),
            notes: &m.notes,
        })?;
    }

    if measurements.is_empty() {
        out.write_record([
            "catalog",
            "code",
            "name",
            "unit",
            "phase",
            "period",
            "value",
            "measured_on",
            "notes",
        ])?;
    }

    out.flush()?;
    Ok(())
}

pub fn to_csv_string(measurements: &[ProjectMeasurement]) -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, measurements)?;
    Ok(String::from_utf8(buffer)?)
}
