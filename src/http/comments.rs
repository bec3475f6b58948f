use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::{Json, Router};
use serde::Deserialize;

use crate::comments;
use crate::models::comment::{CommentUpdateRequest, CommentView};
use crate::state::AppState;
use crate::validation::require_id;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/comments/{id}", put(edit_comment).delete(delete_comment))
        .route("/comments/{id}/like", post(like_comment))
}

#[derive(Debug, Deserialize)]
struct ActingUserQuery {
    user_id: i64,
}

async fn edit_comment(
    Path(comment_id): Path<i64>,
    State(state): State<AppState>,
    Json(request): Json<CommentUpdateRequest>,
) -> Result<Json<CommentView>, HttpError> {
    let user_id = require_id(request.user_id, "user_id")?;
    let edited = comments::edit_comment(&state.database, comment_id, user_id, &request.content)
        .await?;
    Ok(Json(CommentView::from(edited)))
}

async fn delete_comment(
    Path(comment_id): Path<i64>,
    Query(acting): Query<ActingUserQuery>,
    State(state): State<AppState>,
) -> Result<StatusCode, HttpError> {
    let user_id = require_id(acting.user_id, "user_id")?;
    comments::delete_comment(&state.database, comment_id, user_id).await?;
    state.cache.invalidate_analytics();
    Ok(StatusCode::NO_CONTENT)
}

async fn like_comment(
    Path(comment_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<CommentView>, HttpError> {
    let liked = comments::like_comment(&state.database, comment_id).await?;
    Ok(Json(CommentView::from(liked)))
}
