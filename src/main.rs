use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use renatura_indicators::config::Config;
use renatura_indicators::import::ImportOptions;
use renatura_indicators::models::{NewUser, Project, Role};
use renatura_indicators::state::AppState;
use renatura_indicators::{api, auth, db, export, import, report, seed};

const DEFAULT_LOG_FILTER: &str = "renatura_indicators=info,tower_http=info";

#[derive(Parser)]
#[command(name = "renatura-indicators")]
#[command(
    about = "Biodiversity and renaturalization indicators for municipal projects",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo projects, users and values
    Seed {
        #[arg(
            long,
            env = "SEED_PASSWORD",
            hide_env_values = true,
            default_value = "renatura-demo"
        )]
        password: String,
    },
    /// Run the HTTP API
    Serve {
        /// Overrides PORT
        #[arg(long)]
        port: Option<u16>,
        /// Apply pending migrations before listening
        #[arg(long)]
        migrate: bool,
    },
    /// Create a login
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        /// ayuntamiento or fundacion
        #[arg(long)]
        role: Role,
        /// Project code, required for ayuntamiento users
        #[arg(long)]
        project: Option<String>,
        #[arg(long, env = "RENATURA_USER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Import values for a project from a CSV file
    Import {
        #[arg(long)]
        project: String,
        #[arg(long)]
        csv: PathBuf,
        /// Validate only, store nothing
        #[arg(long)]
        dry_run: bool,
    },
    /// Export the values of a project as CSV
    Export {
        #[arg(long)]
        project: String,
        /// Writes to stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate a markdown report
    Report {
        /// Limit the report to one project code
        #[arg(long)]
        project: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

async fn project_by_code(pool: &sqlx::PgPool, code: &str) -> anyhow::Result<Project> {
    db::projects::get_project_by_code(pool, code)
        .await?
        .with_context(|| format!("no project with code {code}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    let pool = db::connect(&config).await?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed { password } => {
            let summary = seed::seed(&pool, &password, config.today()).await?;
            println!(
                "Seeded {} projects ({} new indicators), {} users and {} values.",
                summary.projects, summary.indicators_added, summary.users, summary.values
            );
        }
        Commands::Serve { port, migrate } => {
            if let Some(port) = port {
                config.port = port;
            }
            if migrate {
                db::init_db(&pool).await?;
            }
            serve(config, pool).await?;
        }
        Commands::CreateUser {
            email,
            name,
            role,
            project,
            password,
        } => {
            let project_id = match project {
                Some(code) => Some(project_by_code(&pool, &code).await?.id),
                None => None,
            };
            let input = NewUser {
                email,
                name,
                role,
                project_id,
                password,
            };
            let problems = auth::check_new_user(&input);
            if !problems.is_empty() {
                anyhow::bail!("cannot create user: {}", problems.join("; "));
            }
            let hash = auth::hash_password(&input.password)?;
            let user = db::users::create_user(&pool, &input, &hash).await?;
            println!("Created {} user {} ({}).", user.role, user.email, user.id);
        }
        Commands::Import {
            project,
            csv,
            dry_run,
        } => {
            let project = project_by_code(&pool, &project).await?;
            let file = std::fs::File::open(&csv)
                .with_context(|| format!("failed to open {}", csv.display()))?;
            let options = ImportOptions {
                dry_run,
                recorded_by: None,
                today: config.today(),
            };
            let outcome = import::import_csv(&pool, project.id, file, options).await?;

            let verb = if dry_run { "Would store" } else { "Stored" };
            println!(
                "{verb} {} new and {} updated values for {} from {} rows.",
                outcome.inserted,
                outcome.updated,
                project.code,
                outcome.total_rows
            );
            for rejected in outcome.rejected.iter() {
                println!(
                    "- line {} ({}): {}",
                    rejected.line,
                    rejected.code.as_deref().unwrap_or("?"),
                    rejected.errors.join("; ")
                );
            }
        }
        Commands::Export { project, out } => {
            let project = project_by_code(&pool, &project).await?;
            let mut measurements =
                db::values::list_project_measurements(&pool, project.id).await?;
            export::sort_for_export(&mut measurements);
            match out {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    export::write_csv(file, &measurements)?;
                    println!(
                        "Exported {} values of {} to {}.",
                        measurements.len(),
                        project.code,
                        path.display()
                    );
                }
                None => export::write_csv(std::io::stdout().lock(), &measurements)?,
            }
        }
        Commands::Report { project, out } => {
            let projects = match project {
                Some(code) => vec![project_by_code(&pool, &code).await?],
                None => db::projects::list_projects(&pool).await?,
            };
            let mut summaries = Vec::with_capacity(projects.len());
            for project in projects.iter() {
                let indicators = db::indicators::list_indicators(&pool, project.id, None).await?;
                let measurements = db::values::list_project_measurements(&pool, project.id).await?;
                summaries.push(report::summarize_project(project, &indicators, &measurements));
            }
            let report = report::build_report(&summaries, config.today());
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn serve(config: Config, pool: sqlx::PgPool) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let state = Arc::new(AppState::new(pool.clone(), config));
    let app = api::router(state);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(3600));
        loop {
            ticker.tick().await;
            match db::users::purge_expired_sessions(&pool).await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "expired sessions removed"),
                Err(err) => tracing::warn!(error = %format!("{err:#}"), "session purge failed"),
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
    }
}
