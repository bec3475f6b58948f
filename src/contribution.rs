//! Contribution tiers, the vote weight each tier carries, and the reputation
//! rewards that move a user between tiers.

use std::fmt;

use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::IntoActiveModel;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::entities::user;
use crate::time::fixed_now;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum ContributionLevel {
    #[sea_orm(string_value = "petit_nicolas")]
    PetitNicolas,
    #[sea_orm(string_value = "gros_moyen_nicolas")]
    GrosMoyenNicolas,
    #[sea_orm(string_value = "gros_nicolas")]
    GrosNicolas,
    #[sea_orm(string_value = "nicolas_supreme")]
    NicolasSupreme,
}

/// Tiers in ascending order.
pub const LEVELS: [ContributionLevel; 4] = [
    ContributionLevel::PetitNicolas,
    ContributionLevel::GrosMoyenNicolas,
    ContributionLevel::GrosNicolas,
    ContributionLevel::NicolasSupreme,
];

impl ContributionLevel {
    pub const fn vote_weight(self) -> i32 {
        match self {
            Self::PetitNicolas => 1,
            Self::GrosMoyenNicolas => 2,
            Self::GrosNicolas => 3,
            Self::NicolasSupreme => 5,
        }
    }

    pub const fn min_reputation(self) -> i32 {
        match self {
            Self::PetitNicolas => 0,
            Self::GrosMoyenNicolas => 100,
            Self::GrosNicolas => 500,
            Self::NicolasSupreme => 2_000,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::PetitNicolas => "Petit Nicolas",
            Self::GrosMoyenNicolas => "Gros Moyen Nicolas",
            Self::GrosNicolas => "Gros Nicolas",
            Self::NicolasSupreme => "Nicolas Suprême",
        }
    }

    /// Highest tier whose threshold the score reaches. Negative scores map to
    /// the first tier.
    pub fn for_reputation(score: i32) -> Self {
        LEVELS
            .iter()
            .rev()
            .copied()
            .find(|level| score >= level.min_reputation())
            .unwrap_or(Self::PetitNicolas)
    }

    /// The tier above this one together with its reputation threshold.
    pub fn next(self) -> Option<(Self, i32)> {
        let position = LEVELS.iter().position(|level| *level == self)?;
        LEVELS
            .get(position + 1)
            .map(|level| (*level, level.min_reputation()))
    }
}

impl fmt::Display for ContributionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reward {
    ProposalSubmitted,
    VoteCast,
    VoteRetracted,
    CommentPosted,
    ProposalImplemented,
}

impl Reward {
    pub const fn points(self) -> i32 {
        match self {
            Self::ProposalSubmitted => 10,
            Self::VoteCast => 1,
            Self::VoteRetracted => -1,
            Self::CommentPosted => 2,
            Self::ProposalImplemented => 50,
        }
    }
}

/// Applies a reward to a user, re-deriving the contribution level from the
/// new score. Returns `None` when the user does not exist.
pub async fn award<C: ConnectionTrait>(
    conn: &C,
    user_id: i64,
    reward: Reward,
) -> Result<Option<user::Model>, DbErr> {
    let Some(existing) = user::Entity::find_by_id(user_id).one(conn).await? else {
        return Ok(None);
    };

    let score = existing
        .reputation_score
        .saturating_add(reward.points())
        .max(0);
    let level = ContributionLevel::for_reputation(score);
    let previous = existing.contribution_level;

    let mut model = existing.into_active_model();
    model.reputation_score = Set(score);
    model.contribution_level = Set(level);
    model.last_active_at = Set(fixed_now());
    let updated = model.update(conn).await?;

    if level != previous {
        info!("User {user_id} moved from {previous} to {level} ({score} reputation)");
    }

    Ok(Some(updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{insert_user, setup_database};

    #[test]
    fn weights_grow_with_level() {
        let weights: Vec<i32> = LEVELS.iter().map(|level| level.vote_weight()).collect();
        assert_eq!(weights, vec![1, 2, 3, 5]);
    }

    #[test]
    fn level_follows_thresholds() {
        assert_eq!(
            ContributionLevel::for_reputation(-5),
            ContributionLevel::PetitNicolas
        );
        assert_eq!(
            ContributionLevel::for_reputation(99),
            ContributionLevel::PetitNicolas
        );
        assert_eq!(
            ContributionLevel::for_reputation(100),
            ContributionLevel::GrosMoyenNicolas
        );
        assert_eq!(
            ContributionLevel::for_reputation(1_999),
            ContributionLevel::GrosNicolas
        );
        assert_eq!(
            ContributionLevel::for_reputation(i32::MAX),
            ContributionLevel::NicolasSupreme
        );
    }

    #[test]
    fn next_level_stops_at_top_tier() {
        assert_eq!(
            ContributionLevel::PetitNicolas.next(),
            Some((ContributionLevel::GrosMoyenNicolas, 100))
        );
        assert_eq!(ContributionLevel::NicolasSupreme.next(), None);
    }

    #[tokio::test]
    async fn award_promotes_and_floors_at_zero() {
        let db = setup_database().await;
        let user = insert_user(&db, "jean", 95).await;

        for _ in 0..5 {
            award(&db, user.id, Reward::VoteCast).await.unwrap();
        }
        let promoted = user::Entity::find_by_id(user.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(promoted.reputation_score, 100);
        assert_eq!(
            promoted.contribution_level,
            ContributionLevel::GrosMoyenNicolas
        );

        let fresh = insert_user(&db, "paul", 0).await;
        let updated = award(&db, fresh.id, Reward::VoteRetracted)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.reputation_score, 0);
    }

    #[tokio::test]
    async fn award_missing_user_is_none() {
        let db = setup_database().await;
        assert!(award(&db, 404, Reward::CommentPosted).await.unwrap().is_none());
    }
}
