mod error;

use axum::{extract::State, routing::get, routing::post, Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use error::AppError;
use fareadvisor_core::config::Settings;
use fareadvisor_core::domain::query::PriceQuery;
use fareadvisor_core::domain::route::Route;
use fareadvisor_core::engine::{EngineConfig, PriceAlert};
use fareadvisor_core::ingest::HttpJsonSearchProvider;
use fareadvisor_core::llm::{explain_or_fallback, AnthropicExplainer, Explainer, Explanation};
use fareadvisor_core::storage::{HistoryStore, InMemoryHistoryStore, PgHistoryStore};
use fareadvisor_core::{PriceAdvice, PriceEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let config = EngineConfig::from_env()?;
    let history = history_store(&settings, &config).await;

    let engine = match HttpJsonSearchProvider::from_settings(&settings) {
        Ok(search) => Some(PriceEngine::new(Arc::new(search), history, config)),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "flight search not configured; starting API in degraded mode");
            None
        }
    };

    let explainer: Option<Arc<dyn Explainer>> = match AnthropicExplainer::from_settings(&settings) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "explainer not configured; explanations use the fallback");
            None
        }
    };

    let state = AppState { engine, explainer };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/advice", post(post_advice))
        .route("/alerts", post(post_alerts))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Postgres when reachable, else a process-local store so queries still work without history.
async fn history_store(settings: &Settings, config: &EngineConfig) -> Arc<dyn HistoryStore> {
    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match fareadvisor_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; using in-memory history");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; using in-memory history");
                None
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "DATABASE_URL missing; using in-memory history");
            None
        }
    };

    match pool {
        Some(pool) => Arc::new(PgHistoryStore::new(pool, config.normalize.currency.clone())),
        None => Arc::new(InMemoryHistoryStore::new()),
    }
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    engine: Option<PriceEngine>,
    explainer: Option<Arc<dyn Explainer>>,
}

impl AppState {
    fn engine(&self) -> Result<&PriceEngine, AppError> {
        self.engine.as_ref().ok_or(AppError::Unavailable)
    }
}

#[derive(Debug, Deserialize)]
struct AdviceRequest {
    #[serde(flatten)]
    query: PriceQuery,
    #[serde(default)]
    explain: bool,
    #[serde(default)]
    as_of_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct AdviceResponse {
    advice_id: Uuid,
    generated_at: DateTime<Utc>,
    advice: PriceAdvice,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<Explanation>,
}

async fn post_advice(
    State(state): State<AppState>,
    Json(req): Json<AdviceRequest>,
) -> Result<Json<AdviceResponse>, AppError> {
    let engine = state.engine()?;
    let generated_at = Utc::now();
    let as_of = req.as_of_date.unwrap_or_else(|| generated_at.date_naive());

    let advice = engine.advise(req.query, as_of).await?;

    let explanation = if req.explain {
        Some(explain_or_fallback(state.explainer.as_deref(), &advice).await)
    } else {
        None
    };

    Ok(Json(AdviceResponse {
        advice_id: Uuid::new_v4(),
        generated_at,
        advice,
        explanation,
    }))
}

#[derive(Debug, Deserialize)]
struct AlertsRequest {
    routes: Vec<String>,
    #[serde(default)]
    as_of_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct AlertsResponse {
    as_of_date: NaiveDate,
    alerts: Vec<PriceAlert>,
}

async fn post_alerts(
    State(state): State<AppState>,
    Json(req): Json<AlertsRequest>,
) -> Result<Json<AlertsResponse>, AppError> {
    let engine = state.engine()?;
    if req.routes.is_empty() {
        return Err(AppError::BadRequest("routes must be non-empty".to_string()));
    }
    let routes = req
        .routes
        .iter()
        .map(|r| Route::parse_key(r))
        .collect::<Result<Vec<_>, _>>()?;
    let as_of_date = req.as_of_date.unwrap_or_else(|| Utc::now().date_naive());

    let alerts = engine.market_alerts(&routes, as_of_date).await;
    Ok(Json(AlertsResponse { as_of_date, alerts }))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
