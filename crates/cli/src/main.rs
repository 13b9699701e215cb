use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fareadvisor_core::config::Settings;
use fareadvisor_core::domain::query::PriceQuery;
use fareadvisor_core::domain::route::Route;
use fareadvisor_core::engine::{EngineConfig, PriceAlert};
use fareadvisor_core::ingest::{HttpJsonSearchProvider, InMemorySearchProvider, SearchProvider};
use fareadvisor_core::llm::{explain_or_fallback, AnthropicExplainer, Explainer, Explanation};
use fareadvisor_core::storage::{HistoryStore, InMemoryHistoryStore, PgHistoryStore};
use fareadvisor_core::time::resolve_as_of_date;
use fareadvisor_core::{PriceAdvice, PriceEngine};

mod stub;

/// Days of synthetic history behind `--stub` runs.
const STUB_HISTORY_DAYS: i64 = 60;

#[derive(Debug, Parser)]
#[command(name = "fareadvisor", about = "Buy / wait / alternate advice for flight fares")]
struct Cli {
    /// Observation date (YYYY-MM-DD). Defaults to today's UTC date.
    #[arg(long, global = true)]
    as_of_date: Option<String>,

    /// Use deterministic offline search and history instead of live services.
    #[arg(long, global = true, conflicts_with = "fixture")]
    stub: bool,

    /// JSON file with scripted `searches` and `history`.
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Advise on one trip.
    Advise(AdviseArgs),
    /// Scan routes for fares well below their historical mean.
    Alerts(AlertsArgs),
}

#[derive(Debug, Args)]
struct AdviseArgs {
    #[arg(long)]
    origin: String,
    #[arg(long)]
    destination: String,
    #[arg(long)]
    departure_date: NaiveDate,
    #[arg(long)]
    return_date: Option<NaiveDate>,
    #[arg(long)]
    budget: Decimal,
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    flexibility_days: i64,
    /// Attach a prose explanation (LLM when configured, else the built-in rendering).
    #[arg(long)]
    explain: bool,
}

#[derive(Debug, Args)]
struct AlertsArgs {
    /// Route as ORIGIN-DESTINATION; repeatable.
    #[arg(long = "route", required = true)]
    routes: Vec<String>,
}

#[derive(Debug, Serialize)]
struct AdviseOutput {
    advice: PriceAdvice,
    explanation: Option<Explanation>,
}

#[derive(Debug, Serialize)]
struct AlertsOutput {
    as_of_date: NaiveDate,
    alerts: Vec<PriceAlert>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let cli = Cli::parse();
    let as_of = resolve_as_of_date(cli.as_of_date.as_deref(), chrono::Utc::now())?;
    let config = EngineConfig::from_env()?;

    let out = match run(&cli, &settings, config, as_of).await {
        Ok(out) => out,
        Err(err) => {
            if !is_query_error(&err) {
                sentry_anyhow::capture_anyhow(&err);
            }
            tracing::error!(error = %format!("{err:#}"), "fareadvisor failed");
            return Err(err);
        }
    };

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

async fn run(
    cli: &Cli,
    settings: &Settings,
    config: EngineConfig,
    as_of: NaiveDate,
) -> anyhow::Result<Value> {
    let routes = match &cli.command {
        Command::Advise(a) => vec![Route::new(&a.origin, &a.destination)?],
        Command::Alerts(a) => a
            .routes
            .iter()
            .map(|r| Route::parse_key(r))
            .collect::<Result<Vec<_>, _>>()?,
    };

    let (search, history) = collaborators(cli, settings, &config, &routes, as_of).await?;
    tracing::info!(
        %as_of,
        search = search.provider_name(),
        history = history.store_name(),
        "collaborators ready"
    );
    let engine = PriceEngine::new(search, history, config);

    match &cli.command {
        Command::Advise(a) => {
            let query = PriceQuery {
                origin: a.origin.clone(),
                destination: a.destination.clone(),
                departure_date: a.departure_date,
                return_date: a.return_date,
                budget: a.budget,
                flexibility_days: a.flexibility_days,
            };
            let advice = engine.advise(query, as_of).await?;

            let explanation = if a.explain {
                let explainer = if cli.stub || cli.fixture.is_some() {
                    None
                } else {
                    AnthropicExplainer::from_settings(settings).ok()
                };
                let explainer = explainer.as_ref().map(|e| e as &dyn Explainer);
                Some(explain_or_fallback(explainer, &advice).await)
            } else {
                None
            };

            Ok(serde_json::to_value(AdviseOutput {
                advice,
                explanation,
            })?)
        }
        Command::Alerts(_) => {
            let alerts = engine.market_alerts(&routes, as_of).await;
            Ok(serde_json::to_value(AlertsOutput {
                as_of_date: as_of,
                alerts,
            })?)
        }
    }
}

async fn collaborators(
    cli: &Cli,
    settings: &Settings,
    config: &EngineConfig,
    routes: &[Route],
    as_of: NaiveDate,
) -> anyhow::Result<(Arc<dyn SearchProvider>, Arc<dyn HistoryStore>)> {
    if let Some(path) = &cli.fixture {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read fixture {} failed", path.display()))?;
        let fixture: Value = serde_json::from_str(&text)
            .with_context(|| format!("fixture {} is not valid JSON", path.display()))?;
        return Ok((
            Arc::new(InMemorySearchProvider::from_fixture(&fixture)?),
            Arc::new(InMemoryHistoryStore::from_fixture(&fixture)?),
        ));
    }

    if cli.stub {
        let series = routes
            .iter()
            .map(|r| stub::stub_history(r, as_of, STUB_HISTORY_DAYS));
        return Ok((
            Arc::new(stub::StubSearchProvider),
            Arc::new(InMemoryHistoryStore::with_series(series)),
        ));
    }

    let search = HttpJsonSearchProvider::from_settings(settings)
        .context("live search needs FLIGHT_SEARCH_BASE_URL (or pass --stub / --fixture)")?;

    let history: Arc<dyn HistoryStore> = match settings.database_url.as_deref() {
        Some(db_url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(2)
                .connect(db_url)
                .await
                .context("connect DATABASE_URL failed")?;
            fareadvisor_core::storage::migrate(&pool).await?;
            Arc::new(PgHistoryStore::new(pool, config.normalize.currency.clone()))
        }
        None => {
            tracing::warn!("DATABASE_URL missing; advising without price history");
            Arc::new(InMemoryHistoryStore::new())
        }
    };

    Ok((Arc::new(search), history))
}

fn is_query_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<fareadvisor_core::error::QueryError>()
        .is_some()
        || err
            .downcast_ref::<fareadvisor_core::error::ValidationError>()
            .is_some()
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
