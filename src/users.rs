use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, SqlErr,
};
use thiserror::Error;
use tracing::info;

use crate::contribution::ContributionLevel;
use crate::entities::{comment, proposal, user, vote};
use crate::models::user::{LevelProgress, UserProfileView};
use crate::models::vote::VoteHistoryEntry;
use crate::time::fixed_now;
use crate::validation::{self, ValidationError};

pub const MAX_HISTORY_LIMIT: u64 = 200;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("user {0} not found")]
    NotFound(i64),
    #[error("username or email already registered")]
    AlreadyRegistered,
}

pub async fn register_user(
    database: &DatabaseConnection,
    username: &str,
    email: &str,
    display_name: Option<&str>,
) -> Result<user::Model, UserError> {
    let username = validation::sanitize_username(username)?;
    let email = validation::normalize_email(email)?;
    let display_name = match display_name {
        Some(raw) => validation::canonicalize_display_name(raw)?,
        None => None,
    };

    let taken = user::Entity::find()
        .filter(
            Condition::any()
                .add(user::Column::Username.eq(username.clone()))
                .add(user::Column::Email.eq(email.clone())),
        )
        .count(database)
        .await?;
    if taken > 0 {
        return Err(UserError::AlreadyRegistered);
    }

    let now = fixed_now();
    let created = user::ActiveModel {
        id: NotSet,
        username: Set(username),
        email: Set(email),
        display_name: Set(display_name),
        contribution_level: Set(ContributionLevel::PetitNicolas),
        reputation_score: Set(0),
        is_moderator: Set(false),
        created_at: Set(now),
        last_active_at: Set(now),
    }
    .insert(database)
    .await
    .map_err(|err| {
        if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
            UserError::AlreadyRegistered
        } else {
            UserError::Database(err)
        }
    })?;

    info!("Registered user {} ({})", created.id, created.username);
    Ok(created)
}

pub async fn profile(
    database: &DatabaseConnection,
    user_id: i64,
) -> Result<UserProfileView, UserError> {
    let user = user::Entity::find_by_id(user_id)
        .one(database)
        .await?
        .ok_or(UserError::NotFound(user_id))?;

    let proposals_submitted = proposal::Entity::find()
        .filter(proposal::Column::AuthorId.eq(user_id))
        .count(database)
        .await?;
    let votes_cast = vote::Entity::find()
        .filter(vote::Column::UserId.eq(user_id))
        .count(database)
        .await?;
    let comments_posted = comment::Entity::find()
        .filter(comment::Column::AuthorId.eq(user_id))
        .count(database)
        .await?;

    let level = user.contribution_level;
    let next_level = level.next().map(|(next, required)| LevelProgress {
        level: next,
        label: next.label(),
        required_reputation: required,
        missing_reputation: (required - user.reputation_score).max(0),
    });

    Ok(UserProfileView {
        id: user.id,
        username: user.username,
        display_name: user.display_name,
        contribution_level: level,
        contribution_label: level.label(),
        vote_weight: level.vote_weight(),
        reputation_score: user.reputation_score,
        next_level,
        is_moderator: user.is_moderator,
        proposals_submitted: proposals_submitted as i64,
        votes_cast: votes_cast as i64,
        comments_posted: comments_posted as i64,
        created_at: user.created_at.timestamp(),
        last_active_at: user.last_active_at.timestamp(),
    })
}

/// Votes of a user, newest first, with the title of each proposal.
pub async fn vote_history(
    database: &DatabaseConnection,
    user_id: i64,
    limit: u64,
    offset: u64,
) -> Result<Vec<VoteHistoryEntry>, UserError> {
    let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
    let offset = offset.min(i64::MAX as u64);
    user::Entity::find_by_id(user_id)
        .one(database)
        .await?
        .ok_or(UserError::NotFound(user_id))?;

    let rows = vote::Entity::find()
        .find_also_related(proposal::Entity)
        .filter(vote::Column::UserId.eq(user_id))
        .order_by_desc(vote::Column::UpdatedAt)
        .order_by_desc(vote::Column::ProposalId)
        .limit(limit)
        .offset(offset)
        .all(database)
        .await?;

    let history = rows
        .into_iter()
        .map(|(vote, proposal)| VoteHistoryEntry {
            proposal_id: vote.proposal_id,
            proposal_title: proposal.map(|p| p.title).unwrap_or_default(),
            vote_type: vote.vote_type,
            weight: vote.weight,
            voted_at: vote.updated_at.timestamp(),
        })
        .collect::<Vec<_>>();
    assert!(
        history.len() <= limit as usize,
        "Returned more votes than requested"
    );
    Ok(history)
}
