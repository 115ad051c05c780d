use std::collections::HashMap;
use std::fmt::Write;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{
    percent, Catalog, CatalogCoverage, GeneralProgress, Indicator, IndicatorShape, Phase,
    Project, ProjectMeasurement, ProjectSummary, Reading, StrategicLatest, TrackingLatest, Trend,
};
use crate::validation;

const FLAT_EPSILON: f64 = 1e-9;

pub fn summarize_project(
    project: &Project,
    indicators: &[Indicator],
    measurements: &[ProjectMeasurement],
) -> ProjectSummary {
    let mut by_indicator: HashMap<Uuid, Vec<&ProjectMeasurement>> = HashMap::new();
    for m in measurements {
        by_indicator
            .entry(m.measurement.indicator_id)
            .or_default()
            .push(m);
    }

    let mut sorted: Vec<&Indicator> = indicators.iter().collect();
    sorted.sort_by(|a, b| a.catalog().cmp(&b.catalog()).then_with(|| a.code.cmp(&b.code)));

    let coverage = Catalog::ALL
        .iter()
        .map(|catalog| {
            let in_catalog: Vec<&&Indicator> =
                sorted.iter().filter(|i| i.catalog() == *catalog).collect();
            let with_values = in_catalog
                .iter()
                .filter(|i| by_indicator.contains_key(&i.id))
                .count();
            CatalogCoverage {
                catalog: *catalog,
                indicators: in_catalog.len(),
                with_values,
                completion_pct: percent(with_values, in_catalog.len()),
            }
        })
        .collect();

    let mut general_progress = Vec::new();
    let mut strategic_latest = Vec::new();
    let mut tracking_latest = Vec::new();
    let mut pending = Vec::new();

    for indicator in sorted.iter() {
        let values = by_indicator.get(&indicator.id).map(Vec::as_slice).unwrap_or(&[]);
        if values.is_empty() {
            pending.push(indicator.code.clone());
        }

        match indicator.shape {
            IndicatorShape::General => {
                general_progress.push(general_progress_for(indicator, values));
            }
            IndicatorShape::Strategic { .. } => {
                if let Some(latest) = values.iter().max_by_key(|m| m.measurement.measured_on) {
                    if let Reading::Strategic { answer } = latest.measurement.reading {
                        strategic_latest.push(StrategicLatest {
                            code: indicator.code.clone(),
                            name: indicator.name.clone(),
                            answer,
                            measured_on: latest.measurement.measured_on,
                        });
                    }
                }
            }
            IndicatorShape::Tracking { periodicity } => {
                let mut series: Vec<(String, f64)> = values
                    .iter()
                    .filter_map(|m| match &m.measurement.reading {
                        Reading::Tracking { period, value } => Some((period.clone(), *value)),
                        _ => None,
                    })
                    .collect();
                series.sort_by_key(|(period, _)| validation::period_sort_key(periodicity, period));

                if let Some((period, value)) = series.last().cloned() {
                    let previous = series.len().checked_sub(2).map(|i| series[i].1);
                    tracking_latest.push(TrackingLatest {
                        code: indicator.code.clone(),
                        name: indicator.name.clone(),
                        unit: indicator.unit,
                        period,
                        value,
                        previous,
                        trend: trend(previous, value),
                    });
                }
            }
        }
    }

    ProjectSummary {
        project_id: project.id,
        code: project.code.clone(),
        name: project.name.clone(),
        municipality: project.municipality.clone(),
        coverage,
        general_progress,
        strategic_latest,
        tracking_latest,
        pending,
        last_measured_on: measurements.iter().map(|m| m.measurement.measured_on).max(),
    }
}

fn general_progress_for(indicator: &Indicator, values: &[&ProjectMeasurement]) -> GeneralProgress {
    let phase_value = |wanted: Phase| {
        values.iter().find_map(|m| match m.measurement.reading {
            Reading::General { phase, value } if phase == wanted => Some(value),
            _ => None,
        })
    };
    let baseline = phase_value(Phase::Baseline);
    let intermediate = phase_value(Phase::Intermediate);
    let final_value = phase_value(Phase::Final);

    let change = match (baseline, final_value.or(intermediate)) {
        (Some(start), Some(latest)) => Some(latest - start),
        _ => None,
    };
    let change_pct = match (baseline, change) {
        (Some(start), Some(delta)) if start.abs() > FLAT_EPSILON => {
            Some(delta * 100.0 / start.abs())
        }
        _ => None,
    };

    GeneralProgress {
        code: indicator.code.clone(),
        name: indicator.name.clone(),
        unit: indicator.unit,
        baseline,
        intermediate,
        final_value,
        change,
        change_pct,
    }
}

pub fn trend(previous: Option<f64>, current: f64) -> Trend {
    match previous {
        None => Trend::New,
        Some(prev) if current - prev > FLAT_EPSILON => Trend::Up,
        Some(prev) if prev - current > FLAT_EPSILON => Trend::Down,
        Some(_) => Trend::Flat,
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.2}"))
        .unwrap_or_else(|| "-".to_string())
}

pub fn build_report(summaries: &[ProjectSummary], generated_on: NaiveDate) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Renaturalization Indicators Report");
    let _ = writeln!(
        output,
        "Generated on {} for {} project(s)",
        generated_on,
        summaries.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");

    if summaries.is_empty() {
        let _ = writeln!(output, "No projects registered.");
        return output;
    }

    let _ = writeln!(
        output,
        "| Project | Municipality | General | Strategic | Tracking | Overall | Last measurement |"
    );
    let _ = writeln!(output, "|---|---|---|---|---|---|---|");
    for summary in summaries {
        let cell = |catalog: Catalog| {
            summary
                .coverage
                .iter()
                .find(|c| c.catalog == catalog)
                .map(|c| format!("{}/{} ({:.0}%)", c.with_values, c.indicators, c.completion_pct))
                .unwrap_or_else(|| "-".to_string())
        };
        let _ = writeln!(
            output,
            "| {} {} | {} | {} | {} | {} | {:.0}% | {} |",
            summary.code,
            summary.name,
            summary.municipality,
            cell(Catalog::General),
            cell(Catalog::Strategic),
            cell(Catalog::Tracking),
            summary.overall_completion_pct(),
            summary
                .last_measured_on
                .map(|d| d.to_string())
                .unwrap_or_else(|| "never".to_string()),
        );
    }

    for summary in summaries {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "## {} {} ({})",
            summary.code, summary.name, summary.municipality
        );

        let _ = writeln!(output);
        let _ = writeln!(output, "### General indicators");
        let recorded: Vec<&GeneralProgress> = summary
            .general_progress
            .iter()
            .filter(|g| g.baseline.is_some() || g.intermediate.is_some() || g.final_value.is_some())
            .collect();
        if recorded.is_empty() {
            let _ = writeln!(output, "No general values recorded.");
        }
        for progress in recorded {
            let change = match (progress.change, progress.change_pct) {
                (Some(delta), Some(pct)) => format!(" change {delta:+.2} ({pct:+.1}%)"),
                (Some(delta), None) => format!(" change {delta:+.2}"),
                _ => String::new(),
            };
            let _ = writeln!(
                output,
                "- {} {} [{}]: baseline {}, intermediate {}, final {}{}",
                progress.code,
                progress.name,
                progress.unit,
                fmt_opt(progress.baseline),
                fmt_opt(progress.intermediate),
                fmt_opt(progress.final_value),
                change
            );
        }

        let _ = writeln!(output);
        let _ = writeln!(output, "### Strategic indicators");
        if summary.strategic_latest.is_empty() {
            let _ = writeln!(output, "No strategic answers recorded.");
        }
        for latest in summary.strategic_latest.iter() {
            let _ = writeln!(
                output,
                "- {} {}: {} (as of {})",
                latest.code, latest.name, latest.answer, latest.measured_on
            );
        }

        let _ = writeln!(output);
        let _ = writeln!(output, "### Tracking indicators");
        if summary.tracking_latest.is_empty() {
            let _ = writeln!(output, "No tracking values recorded.");
        }
        for latest in summary.tracking_latest.iter() {
            let trend = match (latest.trend, latest.previous) {
                (Trend::New, _) | (_, None) => "first value".to_string(),
                (Trend::Up, Some(prev)) => format!("up from {prev}"),
                (Trend::Down, Some(prev)) => format!("down from {prev}"),
                (Trend::Flat, Some(_)) => "unchanged".to_string(),
            };
            let _ = writeln!(
                output,
                "- {} {}: {} {} in {} ({})",
                latest.code, latest.name, latest.value, latest.unit, latest.period, trend
            );
        }

        if !summary.pending.is_empty() {
            let _ = writeln!(output);
            let _ = writeln!(output, "### Pending indicators");
            let _ = writeln!(output, "{}", summary.pending.join(", "));
        }
    }

    output
}
