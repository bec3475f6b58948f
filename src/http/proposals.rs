use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Deserialize;

use crate::comments;
use crate::entities::proposal::{self, ProposalStatus};
use crate::entities::vote::{self, VoteType};
use crate::models::comment::{CommentCreateRequest, CommentView};
use crate::models::proposal::{
    ProposalCreateRequest, ProposalSummary, ProposalUpdateRequest, ProposalView,
    StatusChangeRequest, VoteSubmissionRequest, VoteSubmissionResponse,
};
use crate::models::vote::VoteView;
use crate::proposals::{
    self, DEFAULT_LIST_LIMIT, NewProposal, ProposalChanges, ProposalFilter, ProposalSort,
    StatusFilter,
};
use crate::state::AppState;
use crate::validation::require_id;
use crate::voting::{self, VoteOutcome};

use super::{HttpError, require_offset, require_positive_limit};

const MAX_PROPOSAL_VOTE_LIMIT: u64 = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/proposals", get(list_proposals).post(create_proposal))
        .route("/proposals/{id}", get(get_proposal).put(update_proposal))
        .route("/proposals/{id}/status", put(change_status))
        .route(
            "/proposals/{id}/votes",
            get(get_proposal_votes)
                .post(cast_vote)
                .put(change_vote)
                .delete(retract_vote),
        )
        .route(
            "/proposals/{id}/comments",
            get(get_comments).post(add_comment),
        )
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct ListProposalsQuery {
    pub status: Option<String>,
    pub category_id: Option<i32>,
    pub author_id: Option<i64>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl ListProposalsQuery {
    pub(super) fn into_filter(self) -> Result<ProposalFilter, HttpError> {
        Ok(ProposalFilter {
            status: StatusFilter::parse(self.status.as_deref())?,
            category_id: self.category_id,
            author_id: self.author_id,
            search: self.search,
            sort: ProposalSort::parse(self.sort.as_deref())?,
            limit: require_positive_limit(self.limit, DEFAULT_LIST_LIMIT)?,
            offset: require_offset(self.offset)?,
        })
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ProposalDetailQuery {
    user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ActingUserQuery {
    user_id: i64,
}

#[derive(Debug, Deserialize, Default)]
struct PageQuery {
    limit: Option<u64>,
    offset: Option<u64>,
}

async fn list_proposals(
    Query(query): Query<ListProposalsQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<ProposalSummary>>, HttpError> {
    let filter = query.into_filter()?;
    let proposals = proposals::list_proposals(&state.database, &filter).await?;
    Ok(Json(proposals.into_iter().map(ProposalSummary::from).collect()))
}

async fn create_proposal(
    State(state): State<AppState>,
    Json(request): Json<ProposalCreateRequest>,
) -> Result<(StatusCode, Json<ProposalView>), HttpError> {
    let author_id = require_id(request.author_id, "author_id")?;
    let created = proposals::create_proposal(
        &state.database,
        NewProposal {
            author_id,
            title: request.title,
            description: request.description,
            category_id: request.category_id,
        },
    )
    .await?;
    state.cache.invalidate_analytics();

    Ok((StatusCode::CREATED, Json(ProposalView::new(created, 0))))
}

async fn get_proposal(
    Path(proposal_id): Path<i64>,
    Query(detail): Query<ProposalDetailQuery>,
    State(state): State<AppState>,
) -> Result<Json<ProposalView>, HttpError> {
    let proposal = proposals::record_view(&state.database, proposal_id).await?;
    let comment_count = comments::count_for_proposal(&state.database, proposal_id)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    let user_vote_record = match detail.user_id {
        Some(user_id) => vote::Entity::find_by_id((proposal_id, user_id))
            .one(&state.database)
            .await
            .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?,
        None => None,
    };

    let mut view = ProposalView::new(proposal, comment_count as i64);
    if detail.user_id.is_some() {
        view.has_voted = Some(user_vote_record.is_some());
        view.user_vote = user_vote_record.map(VoteView::from);
    }
    Ok(Json(view))
}

async fn update_proposal(
    Path(proposal_id): Path<i64>,
    State(state): State<AppState>,
    Json(request): Json<ProposalUpdateRequest>,
) -> Result<Json<ProposalView>, HttpError> {
    let user_id = require_id(request.user_id, "user_id")?;
    let updated = proposals::update_proposal(
        &state.database,
        proposal_id,
        user_id,
        ProposalChanges {
            title: request.title,
            description: request.description,
            category_id: request.category_id,
        },
    )
    .await?;
    state.cache.invalidate_analytics();

    let comment_count = comments::count_for_proposal(&state.database, proposal_id)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    Ok(Json(ProposalView::new(updated, comment_count as i64)))
}

async fn change_status(
    Path(proposal_id): Path<i64>,
    State(state): State<AppState>,
    Json(request): Json<StatusChangeRequest>,
) -> Result<Json<ProposalView>, HttpError> {
    let user_id = require_id(request.user_id, "user_id")?;
    let next = ProposalStatus::parse(&request.status).ok_or_else(|| {
        HttpError::new(
            StatusCode::BAD_REQUEST,
            format!("unknown proposal status '{}'", request.status),
        )
    })?;

    let updated = proposals::change_status(&state.database, proposal_id, user_id, next).await?;
    state.cache.invalidate_analytics();

    let comment_count = comments::count_for_proposal(&state.database, proposal_id)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    Ok(Json(ProposalView::new(updated, comment_count as i64)))
}

async fn get_proposal_votes(
    Path(proposal_id): Path<i64>,
    Query(page): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<VoteView>>, HttpError> {
    let limit = require_positive_limit(page.limit, 100)?.min(MAX_PROPOSAL_VOTE_LIMIT);
    let offset = require_offset(page.offset)?;

    proposal::Entity::find_by_id(proposal_id)
        .one(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .ok_or_else(|| {
            HttpError::new(
                StatusCode::NOT_FOUND,
                format!("proposal {proposal_id} not found"),
            )
        })?;

    let votes = vote::Entity::find()
        .filter(vote::Column::ProposalId.eq(proposal_id))
        .order_by_desc(vote::Column::CreatedAt)
        .order_by_asc(vote::Column::UserId)
        .limit(limit)
        .offset(offset)
        .all(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    assert!(
        votes.len() <= limit as usize,
        "Returned more votes than requested"
    );
    Ok(Json(votes.into_iter().map(VoteView::from).collect()))
}

fn parse_vote_type(raw: &str) -> Result<VoteType, HttpError> {
    VoteType::parse(raw).ok_or_else(|| {
        HttpError::new(
            StatusCode::BAD_REQUEST,
            format!("unknown vote type '{raw}'"),
        )
    })
}

fn submission_response(outcome: VoteOutcome) -> VoteSubmissionResponse {
    VoteSubmissionResponse {
        proposal_id: outcome.proposal_id,
        user_id: outcome.user_id,
        vote_type: outcome.vote_type,
        weight: outcome.weight,
        votes_for: outcome.tallies.votes_for,
        votes_against: outcome.tallies.votes_against,
        votes_abstain: outcome.tallies.votes_abstain,
        weighted_for: outcome.tallies.weighted_for,
        weighted_against: outcome.tallies.weighted_against,
    }
}

async fn cast_vote(
    Path(proposal_id): Path<i64>,
    State(state): State<AppState>,
    Json(request): Json<VoteSubmissionRequest>,
) -> Result<(StatusCode, Json<VoteSubmissionResponse>), HttpError> {
    let user_id = require_id(request.user_id, "user_id")?;
    let vote_type = parse_vote_type(&request.vote_type)?;

    let outcome = voting::cast_vote(&state.database, proposal_id, user_id, vote_type).await?;
    state.cache.invalidate_analytics();

    Ok((StatusCode::CREATED, Json(submission_response(outcome))))
}

async fn change_vote(
    Path(proposal_id): Path<i64>,
    State(state): State<AppState>,
    Json(request): Json<VoteSubmissionRequest>,
) -> Result<Json<VoteSubmissionResponse>, HttpError> {
    let user_id = require_id(request.user_id, "user_id")?;
    let vote_type = parse_vote_type(&request.vote_type)?;

    let outcome = voting::change_vote(&state.database, proposal_id, user_id, vote_type).await?;
    state.cache.invalidate_analytics();

    Ok(Json(submission_response(outcome)))
}

async fn retract_vote(
    Path(proposal_id): Path<i64>,
    Query(acting): Query<ActingUserQuery>,
    State(state): State<AppState>,
) -> Result<Json<VoteSubmissionResponse>, HttpError> {
    let user_id = require_id(acting.user_id, "user_id")?;
    let outcome = voting::retract_vote(&state.database, proposal_id, user_id).await?;
    state.cache.invalidate_analytics();

    Ok(Json(submission_response(outcome)))
}

async fn get_comments(
    Path(proposal_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Vec<CommentView>>, HttpError> {
    let tree = comments::comment_tree(&state.database, proposal_id).await?;
    Ok(Json(tree))
}

async fn add_comment(
    Path(proposal_id): Path<i64>,
    State(state): State<AppState>,
    Json(request): Json<CommentCreateRequest>,
) -> Result<(StatusCode, Json<CommentView>), HttpError> {
    let user_id = require_id(request.user_id, "user_id")?;
    let created = comments::add_comment(
        &state.database,
        proposal_id,
        user_id,
        &request.content,
        request.parent_id,
    )
    .await?;
    state.cache.invalidate_analytics();

    Ok((StatusCode::CREATED, Json(CommentView::from(created))))
}
