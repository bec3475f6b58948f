use std::future::Future;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::analytics;
use crate::state::AppState;
use crate::time::fixed_now;

use super::{HttpError, require_positive_limit};

const DEFAULT_ANALYTICS_LIMIT: u64 = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analytics/trending", get(get_trending))
        .route("/analytics/controversial", get(get_controversial))
        .route("/analytics/rankings", get(get_rankings))
        .route("/analytics/barometer", get(get_barometer))
        .route("/analytics/stats", get(get_stats))
        .route("/analytics/categories", get(get_category_stats))
}

#[derive(Debug, Deserialize, Default)]
struct LimitQuery {
    limit: Option<u64>,
}

/// Serves a view from the analytics cache, computing and storing it on miss.
async fn cached<T, F>(state: &AppState, key: String, compute: F) -> Result<Json<Value>, HttpError>
where
    T: Serialize,
    F: Future<Output = Result<T, DbErr>>,
{
    if let Some(hit) = state.cache.cached_analytics(&key).await {
        debug!("Analytics cache hit for {key}");
        return Ok(Json(hit));
    }

    let generation = state.cache.analytics_generation();
    let view = compute
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    let value = serde_json::to_value(view)
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    state
        .cache
        .store_analytics(key, generation, value.clone())
        .await;
    Ok(Json(value))
}

async fn get_trending(
    Query(query): Query<LimitQuery>,
    State(state): State<AppState>,
) -> Result<Json<Value>, HttpError> {
    let limit = require_positive_limit(query.limit, DEFAULT_ANALYTICS_LIMIT)?
        .min(analytics::MAX_TRENDING_LIMIT);
    cached(
        &state,
        format!("trending:{limit}"),
        analytics::trending(&state.database, &state.ranking, fixed_now(), limit),
    )
    .await
}

async fn get_controversial(
    Query(query): Query<LimitQuery>,
    State(state): State<AppState>,
) -> Result<Json<Value>, HttpError> {
    let limit = require_positive_limit(query.limit, DEFAULT_ANALYTICS_LIMIT)?
        .min(analytics::MAX_CONTROVERSIAL_LIMIT);
    cached(
        &state,
        format!("controversial:{limit}"),
        analytics::controversial(&state.database, &state.ranking, limit),
    )
    .await
}

async fn get_rankings(
    Query(query): Query<LimitQuery>,
    State(state): State<AppState>,
) -> Result<Json<Value>, HttpError> {
    let limit = require_positive_limit(query.limit, 20)?.min(analytics::MAX_RANKING_LIMIT);
    cached(
        &state,
        format!("rankings:{limit}"),
        analytics::contributor_rankings(&state.database, limit),
    )
    .await
}

async fn get_barometer(State(state): State<AppState>) -> Result<Json<Value>, HttpError> {
    cached(
        &state,
        "barometer".to_string(),
        analytics::frustration_barometer(&state.database, &state.ranking, fixed_now()),
    )
    .await
}

async fn get_stats(State(state): State<AppState>) -> Result<Json<Value>, HttpError> {
    cached(
        &state,
        "stats".to_string(),
        analytics::global_stats(&state.database),
    )
    .await
}

async fn get_category_stats(State(state): State<AppState>) -> Result<Json<Value>, HttpError> {
    cached(
        &state,
        "categories".to_string(),
        analytics::category_stats(&state.database),
    )
    .await
}
