//! Per-request audit trail stored in `api_logs`.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use tracing::warn;

use crate::entities::api_log;
use crate::state::AppState;
use crate::time::fixed_now;

pub const USER_HEADER: &str = "x-user-id";
pub const MAX_LOG_LIMIT: u64 = 500;
const MAX_PATH_LEN: usize = 512;

pub async fn record_api_call(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !state.audit.enabled || path.starts_with("/health") {
        return next.run(request).await;
    }

    let method = request.method().to_string();
    let user_id = request
        .headers()
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<i64>().ok());
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let started = Instant::now();
    let response = next.run(request).await;
    let duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

    let entry = api_log::ActiveModel {
        id: NotSet,
        method: Set(method),
        path: Set(path.chars().take(MAX_PATH_LEN).collect()),
        status_code: Set(i32::from(response.status().as_u16())),
        duration_ms: Set(duration_ms),
        user_id: Set(user_id),
        client_ip: Set(client_ip),
        created_at: Set(fixed_now()),
    };
    if let Err(err) = entry.insert(&state.database).await {
        warn!("Failed to record API call: {err}");
    }

    response
}

pub async fn recent_logs(
    database: &DatabaseConnection,
    limit: u64,
    status_code: Option<i32>,
) -> Result<Vec<api_log::Model>, DbErr> {
    let limit = limit.clamp(1, MAX_LOG_LIMIT);
    let mut select = api_log::Entity::find();
    if let Some(status_code) = status_code {
        select = select.filter(api_log::Column::StatusCode.eq(status_code));
    }
    select
        .order_by_desc(api_log::Column::CreatedAt)
        .order_by_desc(api_log::Column::Id)
        .limit(limit)
        .all(database)
        .await
}
