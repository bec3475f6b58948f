use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderName};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::audit;
use crate::comments::CommentError;
use crate::proposals::ProposalError;
use crate::state::AppState;
use crate::users::UserError;
use crate::validation::ValidationError;
use crate::voting::VoteError;

mod admin;
mod analytics;
mod categories;
mod comments;
mod proposals;
mod users;

pub fn router(state: AppState) -> Router {
    assert!(
        state.start_time.elapsed() < Duration::from_secs(86_400),
        "Application uptime exceeds 24 hours before router creation"
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            ACCEPT,
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(audit::USER_HEADER),
        ])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_live))
        .route("/health/ready", get(health_ready))
        .merge(users::router())
        .merge(categories::router())
        .merge(proposals::router())
        .merge(comments::router())
        .merge(analytics::router())
        .merge(admin::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            audit::record_api_call,
        ))
        .layer(cors)
        .with_state(state)
}

async fn health_live(State(state): State<AppState>) -> Result<Json<HealthResponse>, HttpError> {
    let response = HealthResponse {
        status: "live",
        uptime_seconds: state.start_time.elapsed().as_secs(),
    };
    Ok(Json(response))
}

async fn health_ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, HttpError> {
    state
        .database
        .ping()
        .await
        .map_err(|err| HttpError::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string()))?;

    let response = ReadyResponse {
        status: "ready",
        audit_enabled: state.audit.enabled,
        cache_entries: CacheSummary {
            analytics: state.cache.analytics.entry_count(),
            categories: state.cache.categories.entry_count(),
        },
    };
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
struct ReadyResponse {
    status: &'static str,
    audit_enabled: bool,
    cache_entries: CacheSummary,
}

#[derive(Debug, Serialize)]
struct CacheSummary {
    analytics: u64,
    categories: u64,
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: String) -> Self {
        assert!(status != StatusCode::OK, "Error status cannot be 200");
        assert!(!message.is_empty(), "Error message cannot be empty");
        Self { status, message }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        info!("HTTP error: {}", self.message);
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl From<ValidationError> for HttpError {
    fn from(err: ValidationError) -> Self {
        HttpError::new(StatusCode::BAD_REQUEST, err.to_string())
    }
}

impl From<VoteError> for HttpError {
    fn from(err: VoteError) -> Self {
        let status = match &err {
            VoteError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            VoteError::ProposalNotFound(_)
            | VoteError::UserNotFound(_)
            | VoteError::VoteNotFound { .. } => StatusCode::NOT_FOUND,
            VoteError::ProposalClosed { .. } | VoteError::DuplicateVote { .. } => {
                StatusCode::CONFLICT
            }
        };
        HttpError::new(status, err.to_string())
    }
}

impl From<ProposalError> for HttpError {
    fn from(err: ProposalError) -> Self {
        let status = match &err {
            ProposalError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProposalError::Validation(_)
            | ProposalError::UnknownStatus(_)
            | ProposalError::UnknownSort(_) => StatusCode::BAD_REQUEST,
            ProposalError::NotFound(_)
            | ProposalError::UserNotFound(_)
            | ProposalError::CategoryNotFound(_) => StatusCode::NOT_FOUND,
            ProposalError::NotAuthor { .. } | ProposalError::NotModerator(_) => {
                StatusCode::FORBIDDEN
            }
            ProposalError::NotEditable { .. } | ProposalError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
        };
        HttpError::new(status, err.to_string())
    }
}

impl From<CommentError> for HttpError {
    fn from(err: CommentError) -> Self {
        let status = match &err {
            CommentError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CommentError::Validation(_)
            | CommentError::ParentMismatch { .. }
            | CommentError::ThreadTooDeep { .. } => StatusCode::BAD_REQUEST,
            CommentError::ProposalNotFound(_)
            | CommentError::UserNotFound(_)
            | CommentError::NotFound(_) => StatusCode::NOT_FOUND,
            CommentError::Forbidden { .. } => StatusCode::FORBIDDEN,
            CommentError::ProposalClosed { .. } | CommentError::HasReplies(_) => {
                StatusCode::CONFLICT
            }
        };
        HttpError::new(status, err.to_string())
    }
}

impl From<UserError> for HttpError {
    fn from(err: UserError) -> Self {
        let status = match &err {
            UserError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            UserError::Validation(_) => StatusCode::BAD_REQUEST,
            UserError::NotFound(_) => StatusCode::NOT_FOUND,
            UserError::AlreadyRegistered => StatusCode::CONFLICT,
        };
        HttpError::new(status, err.to_string())
    }
}

fn require_positive_limit(limit: Option<u64>, default: u64) -> Result<u64, HttpError> {
    let requested = limit.unwrap_or(default);
    if requested == 0 {
        return Err(HttpError::new(
            StatusCode::BAD_REQUEST,
            "limit must be positive".to_string(),
        ));
    }
    Ok(requested)
}

/// Largest offset the database accepts.
const MAX_OFFSET: u64 = i64::MAX as u64;

fn require_offset(offset: Option<u64>) -> Result<u64, HttpError> {
    let requested = offset.unwrap_or(0);
    if requested > MAX_OFFSET {
        return Err(HttpError::new(
            StatusCode::BAD_REQUEST,
            format!("offset must not exceed {MAX_OFFSET}"),
        ));
    }
    Ok(requested)
}
