use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use cardwise_core::domain::card::CardProduct;
use cardwise_core::domain::catalog::Catalog;
use cardwise_core::domain::recommendation::ComputedRecommendation;
use cardwise_core::engine::recommend::{RecommendOptions, RecommendationEngine};
use cardwise_core::engine::tables::CategoryTables;

const MAX_RESULTS_DEFAULT: usize = 5;
const MAX_RESULTS_LIMIT: usize = 20;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = cardwise_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match cardwise_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let state = AppState {
        pool,
        engine: Arc::new(RecommendationEngine::new(CategoryTables::default_us())),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/recommend", get(get_recommendation))
        .route("/cards", get(list_cards))
        .route("/stats", get(get_stats))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

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

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    pool: Option<PgPool>,
    engine: Arc<RecommendationEngine>,
}

#[derive(Debug, Deserialize)]
struct RecommendParams {
    query: String,
    max_results: Option<usize>,
    monthly_spend: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ApiRecommendation {
    /// Snapshot the recommendation was computed from; null before the first
    /// successful refresh.
    snapshot_id: Option<Uuid>,
    source: Option<String>,
    recommendation: ComputedRecommendation,
}

#[derive(Debug, Serialize)]
struct ApiCards {
    snapshot_id: Uuid,
    source: String,
    cards: Vec<CardProduct>,
}

#[derive(Debug, Serialize)]
struct ApiStats {
    snapshot_id: Uuid,
    source: String,
    total_cards: usize,
    total_rules: usize,
    total_programs: usize,
    cards_by_issuer: BTreeMap<String, usize>,
    cards_by_network: BTreeMap<String, usize>,
}

async fn get_recommendation(
    State(state): State<AppState>,
    Query(params): Query<RecommendParams>,
) -> Result<Json<ApiRecommendation>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let max_results = params.max_results.unwrap_or(MAX_RESULTS_DEFAULT);
    if !(1..=MAX_RESULTS_LIMIT).contains(&max_results) {
        return Err(StatusCode::BAD_REQUEST);
    }
    if let Some(spend) = params.monthly_spend {
        if !spend.is_finite() || spend < 0.0 {
            return Err(StatusCode::BAD_REQUEST);
        }
    }

    let latest = cardwise_core::storage::catalog::fetch_latest(pool)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    // No snapshot yet is a valid state: recommend over an empty catalog.
    let (snapshot_id, source, catalog) = match latest {
        Some((id, source, catalog)) => (Some(id), Some(source), catalog),
        None => (
            None,
            None,
            Catalog {
                programs: BTreeMap::new(),
                cards: Vec::new(),
                rules_by_card: BTreeMap::new(),
            },
        ),
    };

    let opts = RecommendOptions {
        max_results,
        assumed_monthly_spend: params.monthly_spend,
    };
    let recommendation = state
        .engine
        .recommend(&params.query, &catalog, &opts)
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(ApiRecommendation {
        snapshot_id,
        source,
        recommendation,
    }))
}

async fn list_cards(State(state): State<AppState>) -> Result<Json<ApiCards>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let (snapshot_id, source, catalog) = cardwise_core::storage::catalog::fetch_latest(pool)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(ApiCards {
        snapshot_id,
        source,
        cards: catalog.cards,
    }))
}

async fn get_stats(State(state): State<AppState>) -> Result<Json<ApiStats>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let (snapshot_id, source, catalog) = cardwise_core::storage::catalog::fetch_latest(pool)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let mut cards_by_issuer: BTreeMap<String, usize> = BTreeMap::new();
    let mut cards_by_network: BTreeMap<String, usize> = BTreeMap::new();
    for card in &catalog.cards {
        *cards_by_issuer.entry(card.issuer.clone()).or_insert(0) += 1;
        *cards_by_network
            .entry(card.network.as_str().to_string())
            .or_insert(0) += 1;
    }

    Ok(Json(ApiStats {
        snapshot_id,
        source,
        total_cards: catalog.cards.len(),
        total_rules: catalog.rule_count(),
        total_programs: catalog.programs.len(),
        cards_by_issuer,
        cards_by_network,
    }))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &cardwise_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
