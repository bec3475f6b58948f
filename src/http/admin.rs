use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::audit;
use crate::models::audit::ApiLogView;
use crate::state::AppState;

use super::{HttpError, require_positive_limit};

pub fn router() -> Router<AppState> {
    Router::new().route("/admin/api-logs", get(get_api_logs))
}

#[derive(Debug, Deserialize, Default)]
struct ApiLogQuery {
    limit: Option<u64>,
    status: Option<i32>,
}

async fn get_api_logs(
    Query(query): Query<ApiLogQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<ApiLogView>>, HttpError> {
    let limit = require_positive_limit(query.limit, 100)?;
    let logs = audit::recent_logs(&state.database, limit, query.status)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    Ok(Json(logs.into_iter().map(ApiLogView::from).collect()))
}
