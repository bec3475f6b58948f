//! Vote casting, changing and retraction.
//!
//! Each operation runs in a single transaction: the one-vote-per-user check,
//! the vote row write, the tally recomputation and the reputation reward
//! commit together or not at all. Proposal tallies are never adjusted
//! incrementally; they are always re-read from the votes table.

use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, QuerySelect, SqlErr, TransactionTrait,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::contribution::{self, Reward};
use crate::entities::proposal::{self, ProposalStatus};
use crate::entities::vote::{self, VoteType};
use crate::entities::user;
use crate::time::fixed_now;

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("proposal {0} not found")]
    ProposalNotFound(i64),
    #[error("user {0} not found")]
    UserNotFound(i64),
    #[error("proposal {proposal_id} is {status} and no longer accepts votes")]
    ProposalClosed {
        proposal_id: i64,
        status: ProposalStatus,
    },
    #[error("user {user_id} has already voted on proposal {proposal_id}")]
    DuplicateVote { proposal_id: i64, user_id: i64 },
    #[error("user {user_id} has not voted on proposal {proposal_id}")]
    VoteNotFound { proposal_id: i64, user_id: i64 },
}

/// Snapshot of a proposal's cached vote columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tallies {
    pub votes_for: i64,
    pub votes_against: i64,
    pub votes_abstain: i64,
    pub weighted_for: i64,
    pub weighted_against: i64,
}

impl Tallies {
    pub fn of(proposal: &proposal::Model) -> Self {
        Self {
            votes_for: proposal.votes_for,
            votes_against: proposal.votes_against,
            votes_abstain: proposal.votes_abstain,
            weighted_for: proposal.weighted_for,
            weighted_against: proposal.weighted_against,
        }
    }

    pub fn total_votes(&self) -> i64 {
        self.votes_for + self.votes_against + self.votes_abstain
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteOutcome {
    pub proposal_id: i64,
    pub user_id: i64,
    /// `None` once the vote has been retracted.
    pub vote_type: Option<VoteType>,
    pub weight: i32,
    pub tallies: Tallies,
}

pub async fn cast_vote(
    database: &DatabaseConnection,
    proposal_id: i64,
    user_id: i64,
    vote_type: VoteType,
) -> Result<VoteOutcome, VoteError> {
    let txn = database.begin().await?;
    load_open_proposal(&txn, proposal_id).await?;

    let voter = user::Entity::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or(VoteError::UserNotFound(user_id))?;

    if vote::Entity::find_by_id((proposal_id, user_id))
        .one(&txn)
        .await?
        .is_some()
    {
        return Err(VoteError::DuplicateVote {
            proposal_id,
            user_id,
        });
    }

    let weight = voter.contribution_level.vote_weight();
    assert!(weight > 0, "Vote weight must be positive");

    let now = fixed_now();
    let model = vote::ActiveModel {
        proposal_id: Set(proposal_id),
        user_id: Set(user_id),
        vote_type: Set(vote_type),
        weight: Set(weight),
        created_at: Set(now),
        updated_at: Set(now),
    };
    model.insert(&txn).await.map_err(|err| {
        // A concurrent request may have won the race between the check and the insert.
        if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
            VoteError::DuplicateVote {
                proposal_id,
                user_id,
            }
        } else {
            VoteError::Database(err)
        }
    })?;

    let tallies = recompute_tallies(&txn, proposal_id).await?;
    contribution::award(&txn, user_id, Reward::VoteCast).await?;
    txn.commit().await?;

    info!(
        "Vote {vote_type} (weight {weight}) cast by user {user_id} on proposal {proposal_id}"
    );

    Ok(VoteOutcome {
        proposal_id,
        user_id,
        vote_type: Some(vote_type),
        weight,
        tallies,
    })
}

pub async fn change_vote(
    database: &DatabaseConnection,
    proposal_id: i64,
    user_id: i64,
    vote_type: VoteType,
) -> Result<VoteOutcome, VoteError> {
    let txn = database.begin().await?;
    let proposal = load_open_proposal(&txn, proposal_id).await?;

    let existing = vote::Entity::find_by_id((proposal_id, user_id))
        .one(&txn)
        .await?
        .ok_or(VoteError::VoteNotFound {
            proposal_id,
            user_id,
        })?;

    let voter = user::Entity::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or(VoteError::UserNotFound(user_id))?;
    let weight = voter.contribution_level.vote_weight();

    if existing.vote_type == vote_type && existing.weight == weight {
        debug!("Vote of user {user_id} on proposal {proposal_id} unchanged");
        txn.commit().await?;
        return Ok(VoteOutcome {
            proposal_id,
            user_id,
            vote_type: Some(vote_type),
            weight,
            tallies: Tallies::of(&proposal),
        });
    }

    let previous = existing.vote_type;
    let mut model = existing.into_active_model();
    model.vote_type = Set(vote_type);
    model.weight = Set(weight);
    model.updated_at = Set(fixed_now());
    model.update(&txn).await?;

    let tallies = recompute_tallies(&txn, proposal_id).await?;
    txn.commit().await?;

    info!("User {user_id} changed vote on proposal {proposal_id} from {previous} to {vote_type}");

    Ok(VoteOutcome {
        proposal_id,
        user_id,
        vote_type: Some(vote_type),
        weight,
        tallies,
    })
}

pub async fn retract_vote(
    database: &DatabaseConnection,
    proposal_id: i64,
    user_id: i64,
) -> Result<VoteOutcome, VoteError> {
    let txn = database.begin().await?;
    load_open_proposal(&txn, proposal_id).await?;

    let existing = vote::Entity::find_by_id((proposal_id, user_id))
        .one(&txn)
        .await?
        .ok_or(VoteError::VoteNotFound {
            proposal_id,
            user_id,
        })?;

    vote::Entity::delete_by_id((proposal_id, user_id))
        .exec(&txn)
        .await?;

    let tallies = recompute_tallies(&txn, proposal_id).await?;
    contribution::award(&txn, user_id, Reward::VoteRetracted).await?;
    txn.commit().await?;

    info!("User {user_id} retracted vote on proposal {proposal_id}");

    Ok(VoteOutcome {
        proposal_id,
        user_id,
        vote_type: None,
        weight: existing.weight,
        tallies,
    })
}

/// Rewrites the proposal's cached counts and weight sums from the vote rows.
pub async fn recompute_tallies<C: ConnectionTrait>(
    conn: &C,
    proposal_id: i64,
) -> Result<Tallies, DbErr> {
    let rows: Vec<(VoteType, i64, Option<i64>)> = vote::Entity::find()
        .select_only()
        .column(vote::Column::VoteType)
        .column_as(vote::Column::UserId.count(), "votes")
        .column_as(vote::Column::Weight.sum(), "weight")
        .filter(vote::Column::ProposalId.eq(proposal_id))
        .group_by(vote::Column::VoteType)
        .into_tuple()
        .all(conn)
        .await?;

    let mut tallies = Tallies::default();
    for (vote_type, count, weight) in rows {
        let weight = weight.unwrap_or(0);
        assert!(count >= 0, "Vote count cannot be negative");
        assert!(weight >= 0, "Vote weight sum cannot be negative");
        match vote_type {
            VoteType::For => {
                tallies.votes_for = count;
                tallies.weighted_for = weight;
            }
            VoteType::Against => {
                tallies.votes_against = count;
                tallies.weighted_against = weight;
            }
            VoteType::Abstain => tallies.votes_abstain = count,
        }
    }

    proposal::Entity::update_many()
        .col_expr(proposal::Column::VotesFor, Expr::value(tallies.votes_for))
        .col_expr(
            proposal::Column::VotesAgainst,
            Expr::value(tallies.votes_against),
        )
        .col_expr(
            proposal::Column::VotesAbstain,
            Expr::value(tallies.votes_abstain),
        )
        .col_expr(
            proposal::Column::WeightedFor,
            Expr::value(tallies.weighted_for),
        )
        .col_expr(
            proposal::Column::WeightedAgainst,
            Expr::value(tallies.weighted_against),
        )
        .col_expr(proposal::Column::UpdatedAt, Expr::value(fixed_now()))
        .filter(proposal::Column::Id.eq(proposal_id))
        .exec(conn)
        .await?;

    Ok(tallies)
}

async fn load_open_proposal<C: ConnectionTrait>(
    conn: &C,
    proposal_id: i64,
) -> Result<proposal::Model, VoteError> {
    let proposal = proposal::Entity::find_by_id(proposal_id)
        .one(conn)
        .await?
        .ok_or(VoteError::ProposalNotFound(proposal_id))?;

    if !proposal.status.accepts_votes() {
        return Err(VoteError::ProposalClosed {
            proposal_id,
            status: proposal.status,
        });
    }

    Ok(proposal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contribution::ContributionLevel;
    use crate::test_support::{insert_category, insert_proposal, insert_user, setup_database};

    async fn reload(database: &DatabaseConnection, proposal_id: i64) -> proposal::Model {
        proposal::Entity::find_by_id(proposal_id)
            .one(database)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn cast_vote_recomputes_tallies_with_weights() {
        let db = setup_database().await;
        let category = insert_category(&db, "fiscalite").await;
        let author = insert_user(&db, "auteur", 0).await;
        let petit = insert_user(&db, "petit", 0).await;
        let gros = insert_user(&db, "gros", 600).await;
        let abstainer = insert_user(&db, "neutre", 0).await;
        let proposal = insert_proposal(&db, author.id, category.id, "Supprimer la redevance").await;

        cast_vote(&db, proposal.id, petit.id, VoteType::For)
            .await
            .unwrap();
        let outcome = cast_vote(&db, proposal.id, gros.id, VoteType::Against)
            .await
            .unwrap();
        assert_eq!(outcome.weight, ContributionLevel::GrosNicolas.vote_weight());
        cast_vote(&db, proposal.id, abstainer.id, VoteType::Abstain)
            .await
            .unwrap();

        let stored = reload(&db, proposal.id).await;
        assert_eq!(stored.votes_for, 1);
        assert_eq!(stored.votes_against, 1);
        assert_eq!(stored.votes_abstain, 1);
        assert_eq!(stored.weighted_for, 1);
        assert_eq!(stored.weighted_against, 3);
        assert_eq!(Tallies::of(&stored).total_votes(), 3);
    }

    #[tokio::test]
    async fn duplicate_vote_is_rejected() {
        let db = setup_database().await;
        let category = insert_category(&db, "sante").await;
        let author = insert_user(&db, "auteur", 0).await;
        let voter = insert_user(&db, "votant", 0).await;
        let proposal = insert_proposal(&db, author.id, category.id, "Rembourser les lunettes").await;

        cast_vote(&db, proposal.id, voter.id, VoteType::For)
            .await
            .unwrap();
        let second = cast_vote(&db, proposal.id, voter.id, VoteType::Against).await;
        assert!(matches!(second, Err(VoteError::DuplicateVote { .. })));

        let stored = reload(&db, proposal.id).await;
        assert_eq!(stored.votes_for, 1);
        assert_eq!(stored.votes_against, 0);
    }

    #[tokio::test]
    async fn change_and_retract_keep_tallies_in_sync() {
        let db = setup_database().await;
        let category = insert_category(&db, "logement").await;
        let author = insert_user(&db, "auteur", 0).await;
        let voter = insert_user(&db, "votant", 0).await;
        let proposal = insert_proposal(&db, author.id, category.id, "Encadrer les loyers").await;

        cast_vote(&db, proposal.id, voter.id, VoteType::For)
            .await
            .unwrap();
        let changed = change_vote(&db, proposal.id, voter.id, VoteType::Against)
            .await
            .unwrap();
        assert_eq!(changed.tallies.votes_for, 0);
        assert_eq!(changed.tallies.votes_against, 1);

        let unchanged = change_vote(&db, proposal.id, voter.id, VoteType::Against)
            .await
            .unwrap();
        assert_eq!(unchanged.tallies, changed.tallies);

        let retracted = retract_vote(&db, proposal.id, voter.id).await.unwrap();
        assert_eq!(retracted.vote_type, None);
        assert_eq!(retracted.tallies, Tallies::default());
        assert_eq!(Tallies::of(&reload(&db, proposal.id).await), Tallies::default());

        let again = retract_vote(&db, proposal.id, voter.id).await;
        assert!(matches!(again, Err(VoteError::VoteNotFound { .. })));
    }

    #[tokio::test]
    async fn votes_on_closed_proposals_are_rejected() {
        let db = setup_database().await;
        let category = insert_category(&db, "justice").await;
        let author = insert_user(&db, "auteur", 0).await;
        let voter = insert_user(&db, "votant", 0).await;
        let proposal = insert_proposal(&db, author.id, category.id, "Juges de proximité").await;

        let mut model = proposal.clone().into_active_model();
        model.status = Set(ProposalStatus::Rejected);
        model.update(&db).await.unwrap();

        let result = cast_vote(&db, proposal.id, voter.id, VoteType::For).await;
        assert!(matches!(
            result,
            Err(VoteError::ProposalClosed {
                status: ProposalStatus::Rejected,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn missing_entities_are_reported() {
        let db = setup_database().await;
        let category = insert_category(&db, "culture").await;
        let author = insert_user(&db, "auteur", 0).await;
        let proposal = insert_proposal(&db, author.id, category.id, "Musées gratuits").await;

        assert!(matches!(
            cast_vote(&db, 9_999, author.id, VoteType::For).await,
            Err(VoteError::ProposalNotFound(9_999))
        ));
        assert!(matches!(
            cast_vote(&db, proposal.id, 9_999, VoteType::For).await,
            Err(VoteError::UserNotFound(9_999))
        ));
    }

    #[tokio::test]
    async fn voting_earns_and_retracting_returns_reputation() {
        let db = setup_database().await;
        let category = insert_category(&db, "transports").await;
        let author = insert_user(&db, "auteur", 0).await;
        let voter = insert_user(&db, "votant", 10).await;
        let proposal = insert_proposal(&db, author.id, category.id, "Péages plafonnés").await;

        cast_vote(&db, proposal.id, voter.id, VoteType::For)
            .await
            .unwrap();
        let after_vote = user::Entity::find_by_id(voter.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after_vote.reputation_score, 11);

        retract_vote(&db, proposal.id, voter.id).await.unwrap();
        let after_retract = user::Entity::find_by_id(voter.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after_retract.reputation_score, 10);
    }
}
