//! Threaded discussion under proposals.

use std::collections::HashMap;

use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, SqlErr, TransactionTrait,
};
use thiserror::Error;
use tracing::info;

use crate::contribution::{self, Reward};
use crate::entities::proposal::{self, ProposalStatus};
use crate::entities::{comment, user};
use crate::models::comment::CommentView;
use crate::time::fixed_now;
use crate::validation::{self, ValidationError};

/// Deepest reply level accepted under a top-level comment.
pub const MAX_REPLY_DEPTH: usize = 8;

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("proposal {0} not found")]
    ProposalNotFound(i64),
    #[error("user {0} not found")]
    UserNotFound(i64),
    #[error("comment {0} not found")]
    NotFound(i64),
    #[error("proposal {proposal_id} is {status} and closed to comments")]
    ProposalClosed {
        proposal_id: i64,
        status: ProposalStatus,
    },
    #[error("parent comment {parent_id} does not belong to proposal {proposal_id}")]
    ParentMismatch { parent_id: i64, proposal_id: i64 },
    #[error("user {user_id} may not modify comment {comment_id}")]
    Forbidden { comment_id: i64, user_id: i64 },
    #[error("comment {0} has replies and cannot be deleted")]
    HasReplies(i64),
    #[error("replies to comment {parent_id} would exceed {max} levels")]
    ThreadTooDeep { parent_id: i64, max: usize },
}

pub async fn add_comment(
    database: &DatabaseConnection,
    proposal_id: i64,
    user_id: i64,
    content: &str,
    parent_id: Option<i64>,
) -> Result<comment::Model, CommentError> {
    let content = validation::canonicalize_comment(content)?;

    let txn = database.begin().await?;
    let proposal = proposal::Entity::find_by_id(proposal_id)
        .one(&txn)
        .await?
        .ok_or(CommentError::ProposalNotFound(proposal_id))?;
    if !proposal.status.accepts_comments() {
        return Err(CommentError::ProposalClosed {
            proposal_id,
            status: proposal.status,
        });
    }

    user::Entity::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or(CommentError::UserNotFound(user_id))?;

    if let Some(parent_id) = parent_id {
        let parent = comment::Entity::find_by_id(parent_id).one(&txn).await?;
        let Some(parent) = parent.filter(|p| p.proposal_id == proposal_id) else {
            return Err(CommentError::ParentMismatch {
                parent_id,
                proposal_id,
            });
        };

        let mut depth = 1;
        let mut ancestor = parent.parent_id;
        while let Some(ancestor_id) = ancestor {
            depth += 1;
            if depth > MAX_REPLY_DEPTH {
                return Err(CommentError::ThreadTooDeep {
                    parent_id,
                    max: MAX_REPLY_DEPTH,
                });
            }
            ancestor = comment::Entity::find_by_id(ancestor_id)
                .one(&txn)
                .await?
                .and_then(|c| c.parent_id);
        }
    }

    let now = fixed_now();
    let created = comment::ActiveModel {
        id: NotSet,
        proposal_id: Set(proposal_id),
        author_id: Set(user_id),
        parent_id: Set(parent_id),
        content: Set(content),
        like_count: Set(0),
        is_edited: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    contribution::award(&txn, user_id, Reward::CommentPosted).await?;
    txn.commit().await?;

    Ok(created)
}

pub async fn count_for_proposal(
    database: &DatabaseConnection,
    proposal_id: i64,
) -> Result<u64, DbErr> {
    comment::Entity::find()
        .filter(comment::Column::ProposalId.eq(proposal_id))
        .count(database)
        .await
}

/// All comments of a proposal as a forest, oldest first at every depth.
pub async fn comment_tree(
    database: &DatabaseConnection,
    proposal_id: i64,
) -> Result<Vec<CommentView>, CommentError> {
    proposal::Entity::find_by_id(proposal_id)
        .one(database)
        .await?
        .ok_or(CommentError::ProposalNotFound(proposal_id))?;

    let rows = comment::Entity::find()
        .find_also_related(user::Entity)
        .filter(comment::Column::ProposalId.eq(proposal_id))
        .order_by_asc(comment::Column::CreatedAt)
        .order_by_asc(comment::Column::Id)
        .all(database)
        .await?;

    let rows = rows
        .into_iter()
        .map(|(comment, author)| (comment, author.map(|a| a.username)))
        .collect();
    Ok(build_tree(rows))
}

pub fn build_tree(rows: Vec<(comment::Model, Option<String>)>) -> Vec<CommentView> {
    let mut nodes: HashMap<i64, CommentView> = HashMap::with_capacity(rows.len());
    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut root_ids = Vec::new();
    for (comment, author_username) in rows {
        match comment.parent_id {
            Some(parent_id) => children.entry(parent_id).or_default().push(comment.id),
            None => root_ids.push(comment.id),
        }
        nodes.insert(comment.id, comment_view(comment, author_username));
    }

    // Breadth-first order puts every reply after its parent.
    let mut order = root_ids.clone();
    let mut cursor = 0;
    while let Some(&id) = order.get(cursor) {
        if let Some(replies) = children.get(&id) {
            order.extend(replies.iter().copied());
        }
        cursor += 1;
    }

    for id in order.iter().rev() {
        let Some(reply_ids) = children.remove(id) else {
            continue;
        };
        let replies: Vec<CommentView> = reply_ids
            .into_iter()
            .filter_map(|reply_id| nodes.remove(&reply_id))
            .collect();
        if let Some(node) = nodes.get_mut(id) {
            node.replies = replies;
        }
    }

    root_ids
        .into_iter()
        .filter_map(|id| nodes.remove(&id))
        .collect()
}

fn comment_view(comment: comment::Model, author_username: Option<String>) -> CommentView {
    CommentView {
        id: comment.id,
        proposal_id: comment.proposal_id,
        author_id: comment.author_id,
        author_username,
        parent_id: comment.parent_id,
        content: comment.content,
        like_count: comment.like_count,
        is_edited: comment.is_edited,
        created_at: comment.created_at.timestamp(),
        updated_at: comment.updated_at.timestamp(),
        replies: Vec::new(),
    }
}

impl From<comment::Model> for CommentView {
    fn from(comment: comment::Model) -> Self {
        comment_view(comment, None)
    }
}

pub async fn edit_comment(
    database: &DatabaseConnection,
    comment_id: i64,
    user_id: i64,
    content: &str,
) -> Result<comment::Model, CommentError> {
    let content = validation::canonicalize_comment(content)?;
    let existing = comment::Entity::find_by_id(comment_id)
        .one(database)
        .await?
        .ok_or(CommentError::NotFound(comment_id))?;
    if existing.author_id != user_id {
        return Err(CommentError::Forbidden {
            comment_id,
            user_id,
        });
    }

    let mut model = existing.into_active_model();
    model.content = Set(content);
    model.is_edited = Set(true);
    model.updated_at = Set(fixed_now());
    Ok(model.update(database).await?)
}

/// Removes a leaf comment. The author or a moderator may delete.
pub async fn delete_comment(
    database: &DatabaseConnection,
    comment_id: i64,
    user_id: i64,
) -> Result<(), CommentError> {
    let txn = database.begin().await?;
    let existing = comment::Entity::find_by_id(comment_id)
        .one(&txn)
        .await?
        .ok_or(CommentError::NotFound(comment_id))?;
    let actor = user::Entity::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or(CommentError::UserNotFound(user_id))?;
    if existing.author_id != user_id && !actor.is_moderator {
        return Err(CommentError::Forbidden {
            comment_id,
            user_id,
        });
    }

    let replies = comment::Entity::find()
        .filter(comment::Column::ParentId.eq(comment_id))
        .count(&txn)
        .await?;
    if replies > 0 {
        return Err(CommentError::HasReplies(comment_id));
    }

    comment::Entity::delete_by_id(comment_id)
        .exec(&txn)
        .await
        .map_err(|err| {
            if matches!(err.sql_err(), Some(SqlErr::ForeignKeyConstraintViolation(_))) {
                CommentError::HasReplies(comment_id)
            } else {
                CommentError::Database(err)
            }
        })?;
    txn.commit().await?;

    info!("Comment {comment_id} deleted by user {user_id}");
    Ok(())
}

pub async fn like_comment(
    database: &DatabaseConnection,
    comment_id: i64,
) -> Result<comment::Model, CommentError> {
    let result = comment::Entity::update_many()
        .col_expr(
            comment::Column::LikeCount,
            Expr::col(comment::Column::LikeCount).add(1),
        )
        .filter(comment::Column::Id.eq(comment_id))
        .exec(database)
        .await?;
    if result.rows_affected == 0 {
        return Err(CommentError::NotFound(comment_id));
    }

    comment::Entity::find_by_id(comment_id)
        .one(database)
        .await?
        .ok_or(CommentError::NotFound(comment_id))
}
