//! Demo data: two projects with the default catalog, one user per role and a
//! handful of recorded values. Safe to run repeatedly.

use std::collections::HashMap;

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::auth;
use crate::db;
use crate::import::index_indicators;
use crate::models::{
    Answer, MeasurementInput, NewUser, Phase, Project, ProjectInput, Reading, Role,
};
use crate::validation;

#[derive(Debug, Default)]
pub struct SeedSummary {
    pub projects: usize,
    pub indicators_added: usize,
    pub users: usize,
    pub values: usize,
}

fn day(year: i32, month: u32, d: u32) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, d).context("invalid date")
}

fn general(phase: Phase, value: f64) -> Reading {
    Reading::General { phase, value }
}

fn strategic(answer: Answer) -> Reading {
    Reading::Strategic { answer }
}

fn tracking(period: &str, value: f64) -> Reading {
    Reading::Tracking {
        period: period.to_string(),
        value,
    }
}

/// Returns the project and how many template indicators it gained.
async fn ensure_project(pool: &PgPool, input: ProjectInput) -> anyhow::Result<(Project, usize)> {
    match db::projects::get_project_by_code(pool, &input.code).await? {
        Some(project) => {
            let mut conn = pool.acquire().await?;
            let added = db::indicators::apply_template(&mut conn, project.id).await?;
            Ok((project, added))
        }
        None => db::projects::create_project_with_template(pool, &input, true).await,
    }
}

/// `today` bounds the measurement dates, as for any other write.
pub async fn seed(pool: &PgPool, password: &str, today: NaiveDate) -> anyhow::Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    let projects = vec![
        ProjectInput {
            code: "REN-001".to_string(),
            name: "Riberas vivas del Duero".to_string(),
            municipality: "Soria".to_string(),
            description: Some("Restauración de la ribera urbana y sus sotos".to_string()),
        },
        ProjectInput {
            code: "REN-002".to_string(),
            name: "Corredor verde del Henares".to_string(),
            municipality: "Alcalá de Henares".to_string(),
            description: None,
        },
    ];

    let mut by_code = HashMap::new();
    for input in projects {
        let (project, added) = ensure_project(pool, input).await?;
        summary.indicators_added += added;
        summary.projects += 1;
        by_code.insert(project.code.clone(), project);
    }
    let project_id_of = |code: &str| {
        by_code
            .get(code)
            .map(|p| p.id)
            .with_context(|| format!("seed project {code} missing"))
    };

    let users = vec![
        (
            "fundacion@renatura.example.org",
            "Equipo técnico de la fundación",
            Role::Foundation,
            None,
        ),
        (
            "medioambiente@soria.example.es",
            "Ayuntamiento de Soria",
            Role::Municipality,
            Some("REN-001"),
        ),
        (
            "urbanismo@alcala.example.es",
            "Ayuntamiento de Alcalá de Henares",
            Role::Municipality,
            Some("REN-002"),
        ),
    ];

    let hash = auth::hash_password(password).context("seed password rejected")?;
    let mut recorder = None;
    for (email, name, role, project) in users {
        let project_id = project.map(project_id_of).transpose()?;
        let user = db::users::upsert_user(
            pool,
            &NewUser {
                email: email.to_string(),
                name: name.to_string(),
                role,
                project_id,
                password: password.to_string(),
            },
            &hash,
        )
        .await?;
        if role == Role::Foundation {
            recorder = Some(user.id);
        }
        summary.users += 1;
    }

    use Phase::{Baseline, Intermediate};
    let values = vec![
        ("REN-001", "IG-01", general(Baseline, 0.0), day(2023, 3, 1)?, "Antes de las obras"),
        ("REN-001", "IG-01", general(Intermediate, 4.5), day(2024, 6, 15)?, ""),
        ("REN-001", "IG-03", general(Baseline, 12.5), day(2023, 3, 1)?, "Ortofoto PNOA"),
        ("REN-001", "IG-05", general(Baseline, 0.0), day(2023, 3, 1)?, ""),
        (
            "REN-001",
            "IG-05",
            general(Intermediate, 320.0),
            day(2024, 6, 15)?,
            "Primera campaña de plantación",
        ),
        ("REN-001", "IE-01", strategic(Answer::Flag(true)), day(2024, 2, 10)?, "Aprobado en pleno"),
        ("REN-001", "IE-04", strategic(Answer::Number(7.0)), day(2024, 9, 30)?, ""),
        ("REN-001", "IS-01", tracking("2024-T1", 18.0), day(2024, 3, 31)?, ""),
        ("REN-001", "IS-01", tracking("2024-T2", 24.0), day(2024, 6, 30)?, "Censo primaveral"),
        ("REN-001", "IS-03", tracking("2024-S1", 92.5), day(2024, 6, 30)?, ""),
        ("REN-002", "IG-01", general(Baseline, 1.2), day(2023, 9, 1)?, ""),
        ("REN-002", "IE-03", strategic(Answer::Flag(false)), day(2024, 1, 20)?, ""),
        ("REN-002", "IS-01", tracking("2024-T2", 11.0), day(2024, 6, 28)?, ""),
    ];

    let mut indexes = HashMap::new();
    for (project, code, reading, measured_on, notes) in values {
        let project_id = project_id_of(project)?;
        let catalog = reading.catalog();
        if !indexes.contains_key(&project_id) {
            let indicators = db::indicators::list_indicators(pool, project_id, None).await?;
            indexes.insert(project_id, index_indicators(indicators));
        }
        let indicator = indexes
            .get(&project_id)
            .and_then(|index| index.get(&(catalog, code.to_string())))
            .with_context(|| format!("{project} has no {catalog} indicator {code}"))?;

        let input = MeasurementInput {
            reading,
            measured_on,
            notes: notes.to_string(),
        };
        let violations = validation::validate_measurement(indicator, &input, today);
        if let Some(first) = violations.first() {
            anyhow::bail!("seed value for {project} {code} is invalid: {first}");
        }
        db::values::upsert_measurement(pool, indicator, &input, recorder).await?;
        summary.values += 1;
    }

    tracing::info!(
        projects = summary.projects,
        indicators_added = summary.indicators_added,
        users = summary.users,
        values = summary.values,
        "seed complete"
    );
    Ok(summary)
}
