//! End-to-end behavior against a real Postgres. Each test gets a fresh
//! database with the migrations applied; run them with
//! `DATABASE_URL=postgres://... cargo test -- --ignored`.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{NaiveDate, TimeDelta, Utc};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use renatura_indicators::api;
use renatura_indicators::auth;
use renatura_indicators::config::Config;
use renatura_indicators::db;
use renatura_indicators::import::{self, ImportOptions};
use renatura_indicators::models::{
    Answer, Catalog, Indicator, MeasurementInput, NewUser, Phase, Project, ProjectInput, Reading,
    Role, User,
};
use renatura_indicators::state::AppState;

fn app(pool: PgPool) -> Router {
    let config = Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://unused".to_string()),
        _ => None,
    })
    .unwrap();
    api::router(Arc::new(AppState::new(pool, config)))
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn project(pool: &PgPool, code: &str) -> Project {
    let input = ProjectInput {
        code: code.to_string(),
        name: format!("Proyecto {code}"),
        municipality: "Soria".to_string(),
        description: None,
    };
    let (project, _) = db::projects::create_project_with_template(pool, &input, true)
        .await
        .unwrap();
    project
}

async fn user(pool: &PgPool, email: &str, role: Role, project_id: Option<Uuid>) -> User {
    let input = NewUser {
        email: email.to_string(),
        name: "Equipo técnico".to_string(),
        role,
        project_id,
        password: "riberas-2025".to_string(),
    };
    let hash = auth::hash_password(&input.password).unwrap();
    db::users::create_user(pool, &input, &hash).await.unwrap()
}

/// Opens a session directly, skipping the password round.
async fn sign_in(pool: &PgPool, user: &User) -> String {
    let token = auth::new_session_token();
    let expires_at = Utc::now() + TimeDelta::hours(1);
    db::users::create_session(pool, user.id, &auth::token_digest(&token), expires_at)
        .await
        .unwrap();
    token
}

async fn indicator(pool: &PgPool, project_id: Uuid, catalog: Catalog, code: &str) -> Indicator {
    db::indicators::list_indicators(pool, project_id, Some(catalog))
        .await
        .unwrap()
        .into_iter()
        .find(|i| i.code == code)
        .unwrap()
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn new_project_gets_the_whole_template(pool: PgPool) {
    let admin = user(&pool, "fundacion@renatura.example.org", Role::Foundation, None).await;
    let token = sign_in(&pool, &admin).await;
    let app = app(pool.clone());

    let body = json!({"code": "REN-010", "name": "Patios vivos", "municipality": "Zaragoza"});
    let (status, created) = send(&app, Method::POST, "/api/projects", &token, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["indicators_added"], 22);

    let body = json!({"code": "REN-010", "name": "Otro", "municipality": "Huesca"});
    let (status, error) = send(&app, Method::POST, "/api/projects", &token, Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"], "conflict");

    let projects = db::projects::list_projects(&pool).await.unwrap();
    assert_eq!(projects.len(), 1);
    let indicators = db::indicators::list_indicators(&pool, projects[0].id, None)
        .await
        .unwrap();
    assert_eq!(indicators.len(), 22);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn recording_the_same_phase_twice_replaces_it(pool: PgPool) {
    let soria = project(&pool, "REN-001").await;
    let clerk = user(
        &pool,
        "medioambiente@soria.example.es",
        Role::Municipality,
        Some(soria.id),
    )
    .await;
    let token = sign_in(&pool, &clerk).await;
    let ig01 = indicator(&pool, soria.id, Catalog::General, "IG-01").await;
    let app = app(pool.clone());
    let uri = format!("/api/indicators/general/{}/values", ig01.id);

    let first = json!({"catalog": "general", "phase": "linea_base", "value": 1.5,
        "measured_on": "2024-03-01"});
    let (status, stored) = send(&app, Method::POST, &uri, &token, Some(first)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(stored["value"], 1.5);

    let again = json!({"catalog": "general", "phase": "linea_base", "value": 2.0,
        "measured_on": "2024-04-01", "notes": "Corrección"});
    let (status, replaced) = send(&app, Method::POST, &uri, &token, Some(again)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replaced["id"], stored["id"]);
    assert_eq!(replaced["value"], 2.0);

    let (status, values) = send(&app, Method::GET, &uri, &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(values.as_array().unwrap().len(), 1);

    for bad in [
        format!("/api/indicators/desconocido/{}/values", ig01.id),
        "/api/indicators/general/not-a-uuid/values".to_string(),
    ] {
        let (status, error) = send(&app, Method::GET, &bad, &token, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{bad}");
        assert_eq!(error["error"], "bad_request");
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn duplicate_indicator_code_is_a_conflict(pool: PgPool) {
    let soria = project(&pool, "REN-001").await;
    let admin = user(&pool, "fundacion@renatura.example.org", Role::Foundation, None).await;
    let token = sign_in(&pool, &admin).await;
    let app = app(pool.clone());

    let body = json!({"catalog": "general", "code": "IG-01", "name": "Repetido",
        "unit": "hectareas"});
    let uri = format!("/api/projects/{}/indicators", soria.id);
    let (status, error) = send(&app, Method::POST, &uri, &token, Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"], "conflict");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn municipal_users_only_change_their_own_values(pool: PgPool) {
    let soria = project(&pool, "REN-001").await;
    let alcala = project(&pool, "REN-002").await;
    let clerk = user(
        &pool,
        "medioambiente@soria.example.es",
        Role::Municipality,
        Some(soria.id),
    )
    .await;
    let token = sign_in(&pool, &clerk).await;

    let reading = MeasurementInput {
        reading: Reading::General {
            phase: Phase::Baseline,
            value: 1.2,
        },
        measured_on: date(2023, 9, 1),
        notes: String::new(),
    };
    let theirs = indicator(&pool, alcala.id, Catalog::General, "IG-01").await;
    let (foreign, _) = db::values::upsert_measurement(&pool, &theirs, &reading, None)
        .await
        .unwrap();
    let ours = indicator(&pool, soria.id, Catalog::General, "IG-01").await;
    let (own, _) = db::values::upsert_measurement(&pool, &ours, &reading, None)
        .await
        .unwrap();

    let app = app(pool.clone());
    let edit = json!({"catalog": "general", "phase": "linea_base", "value": 9.0,
        "measured_on": "2023-09-01"});
    let uri = format!("/api/values/general/{}", foreign.id);
    let (status, error) = send(&app, Method::PUT, &uri, &token, Some(edit.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error["error"], "forbidden");

    let uri = format!("/api/values/general/{}", own.id);
    let (status, updated) = send(&app, Method::PUT, &uri, &token, Some(edit)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["value"], 9.0);

    let untouched = db::values::get_measurement(&pool, Catalog::General, foreign.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.reading, reading.reading);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn project_measurements_span_all_catalogs(pool: PgPool) {
    let soria = project(&pool, "REN-001").await;
    let readings = [
        (
            "IG-05",
            Catalog::General,
            Reading::General {
                phase: Phase::Baseline,
                value: 0.0,
            },
        ),
        (
            "IE-01",
            Catalog::Strategic,
            Reading::Strategic {
                answer: Answer::Flag(true),
            },
        ),
        (
            "IS-01",
            Catalog::Tracking,
            Reading::Tracking {
                period: "2024-T2".to_string(),
                value: 24.0,
            },
        ),
    ];
    for (code, catalog, reading) in readings {
        let target = indicator(&pool, soria.id, catalog, code).await;
        let input = MeasurementInput {
            reading,
            measured_on: date(2024, 6, 30),
            notes: String::new(),
        };
        let (_, inserted) = db::values::upsert_measurement(&pool, &target, &input, None)
            .await
            .unwrap();
        assert!(inserted);
    }

    let measurements = db::values::list_project_measurements(&pool, soria.id)
        .await
        .unwrap();
    let mut codes: Vec<&str> = measurements.iter().map(|m| m.code.as_str()).collect();
    codes.sort_unstable();
    assert_eq!(codes, ["IE-01", "IG-05", "IS-01"]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn bounds_cannot_exclude_recorded_values(pool: PgPool) {
    let soria = project(&pool, "REN-001").await;
    let admin = user(&pool, "fundacion@renatura.example.org", Role::Foundation, None).await;
    let token = sign_in(&pool, &admin).await;
    let is01 = indicator(&pool, soria.id, Catalog::Tracking, "IS-01").await;
    let input = MeasurementInput {
        reading: Reading::Tracking {
            period: "2024-T2".to_string(),
            value: 24.0,
        },
        measured_on: date(2024, 6, 30),
        notes: String::new(),
    };
    db::values::upsert_measurement(&pool, &is01, &input, None)
        .await
        .unwrap();

    let app = app(pool.clone());
    let uri = format!("/api/indicators/seguimiento/{}", is01.id);
    let narrowed = json!({"catalog": "seguimiento", "periodicity": "trimestral",
        "code": "IS-01", "name": is01.name, "unit": "conteo", "max_value": 20.0});
    let (status, error) = send(&app, Method::PUT, &uri, &token, Some(narrowed)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(error["message"].as_str().unwrap().contains("2024-06-30"));

    let monthly = json!({"catalog": "seguimiento", "periodicity": "mensual",
        "code": "IS-01", "name": is01.name, "unit": "conteo"});
    let (status, _) = send(&app, Method::PUT, &uri, &token, Some(monthly)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let widened = json!({"catalog": "seguimiento", "periodicity": "trimestral",
        "code": "IS-01", "name": is01.name, "unit": "conteo", "max_value": 30.0});
    let (status, updated) = send(&app, Method::PUT, &uri, &token, Some(widened)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["max_value"], 30.0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn dry_run_tells_new_rows_from_replacements(pool: PgPool) {
    let soria = project(&pool, "REN-001").await;
    let ig01 = indicator(&pool, soria.id, Catalog::General, "IG-01").await;
    let baseline = MeasurementInput {
        reading: Reading::General {
            phase: Phase::Baseline,
            value: 0.0,
        },
        measured_on: date(2023, 3, 1),
        notes: String::new(),
    };
    db::values::upsert_measurement(&pool, &ig01, &baseline, None)
        .await
        .unwrap();

    let csv = "catalog,code,phase,value,measured_on\n\
               general,IG-01,linea_base,0.5,2023-03-01\n\
               general,IG-01,intermedio,4.5,2024-06-15\n";
    let options = ImportOptions {
        dry_run: true,
        recorded_by: None,
        today: date(2025, 1, 1),
    };
    let report = import::import_csv(&pool, soria.id, csv.as_bytes(), options)
        .await
        .unwrap();
    assert!(report.dry_run);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.updated, 1);
    assert!(report.rejected.is_empty());

    let stored = db::values::list_measurements(&pool, &ig01).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].reading, baseline.reading);
}
