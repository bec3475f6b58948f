use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::models::proposal::ProposalSummary;
use crate::models::user::{UserProfileView, UserRegistrationRequest};
use crate::models::vote::VoteHistoryEntry;
use crate::proposals::{self, StatusFilter};
use crate::state::AppState;
use crate::users;

use super::proposals::ListProposalsQuery;
use super::{HttpError, require_offset, require_positive_limit};

const DEFAULT_HISTORY_LIMIT: u64 = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(register_user))
        .route("/users/{id}", get(get_profile))
        .route("/users/{id}/votes", get(get_vote_history))
        .route("/users/{id}/proposals", get(get_user_proposals))
}

#[derive(Debug, Deserialize, Default)]
struct VoteHistoryQuery {
    limit: Option<u64>,
    offset: Option<u64>,
}

async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<UserRegistrationRequest>,
) -> Result<(StatusCode, Json<UserProfileView>), HttpError> {
    let created = users::register_user(
        &state.database,
        &request.username,
        &request.email,
        request.display_name.as_deref(),
    )
    .await?;
    state.cache.invalidate_analytics();

    let profile = users::profile(&state.database, created.id).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn get_profile(
    Path(user_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<UserProfileView>, HttpError> {
    let profile = users::profile(&state.database, user_id).await?;
    Ok(Json(profile))
}

async fn get_vote_history(
    Path(user_id): Path<i64>,
    Query(query): Query<VoteHistoryQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<VoteHistoryEntry>>, HttpError> {
    let limit = require_positive_limit(query.limit, DEFAULT_HISTORY_LIMIT)?;
    let offset = require_offset(query.offset)?;
    let history = users::vote_history(&state.database, user_id, limit, offset).await?;
    Ok(Json(history))
}

/// Every proposal of the user unless a status is requested.
async fn get_user_proposals(
    Path(user_id): Path<i64>,
    Query(query): Query<ListProposalsQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<ProposalSummary>>, HttpError> {
    users::profile(&state.database, user_id).await?;

    let status = query.status.clone();
    let mut filter = query.into_filter()?;
    filter.author_id = Some(user_id);
    if status.is_none() {
        filter.status = StatusFilter::All;
    }

    let proposals = proposals::list_proposals(&state.database, &filter).await?;
    Ok(Json(proposals.into_iter().map(ProposalSummary::from).collect()))
}
