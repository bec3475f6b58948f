//! Aggregate views: trending, controversial, rankings, frustration barometer
//! and platform statistics.

use std::collections::HashMap;

use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, JoinType, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait,
};

use crate::config::RankingConfig;
use crate::entities::proposal::{self, ProposalStatus};
use crate::entities::vote::{self, VoteType};
use crate::entities::{category, comment, user};
use crate::models::analytics::{
    CategoryFrustration, CategoryStatsView, ContributorRanking, ControversialProposal,
    FrustrationBarometerView, FrustrationReading, GlobalStatsView, TrendingProposal,
};
use crate::ranking::{self, ControversyKey, FrustrationLevel, TrendingKey};

pub const MAX_TRENDING_LIMIT: u64 = 50;
pub const MAX_CONTROVERSIAL_LIMIT: u64 = 50;
pub const MAX_RANKING_LIMIT: u64 = 100;

pub async fn trending(
    database: &DatabaseConnection,
    config: &RankingConfig,
    now: DateTimeWithTimeZone,
    limit: u64,
) -> Result<Vec<TrendingProposal>, DbErr> {
    let limit = limit.clamp(1, MAX_TRENDING_LIMIT);
    let cutoff = now - config.trending_window();

    let recent: Vec<(i64, i64, Option<i64>)> = vote::Entity::find()
        .select_only()
        .column(vote::Column::ProposalId)
        .column_as(vote::Column::UserId.count(), "votes")
        .column_as(vote::Column::Weight.sum(), "weight")
        .filter(vote::Column::CreatedAt.gte(cutoff))
        .group_by(vote::Column::ProposalId)
        .into_tuple()
        .all(database)
        .await?;
    if recent.is_empty() {
        return Ok(Vec::new());
    }

    let activity: HashMap<i64, (i64, i64)> = recent
        .into_iter()
        .map(|(proposal_id, votes, weight)| (proposal_id, (votes, weight.unwrap_or(0))))
        .collect();

    let proposals = proposal::Entity::find()
        .filter(proposal::Column::Id.is_in(activity.keys().copied()))
        .filter(proposal::Column::Status.eq(ProposalStatus::Active))
        .all(database)
        .await?;

    let mut scored: Vec<(TrendingKey, TrendingProposal)> = proposals
        .into_iter()
        .filter_map(|proposal| {
            let (recent_votes, recent_weight) = activity.get(&proposal.id).copied()?;
            let age = now.signed_duration_since(proposal.created_at);
            let score = ranking::trending_score(recent_weight, age, config.trending_gravity);
            let created_at = proposal.created_at.timestamp();
            Some((
                TrendingKey { score, created_at },
                TrendingProposal {
                    proposal_id: proposal.id,
                    title: proposal.title,
                    category_id: proposal.category_id,
                    recent_votes,
                    recent_weight,
                    trending_score: score,
                    created_at,
                },
            ))
        })
        .filter(|(key, _)| key.score > 0.0)
        .collect();

    scored.sort_by(|(a, _), (b, _)| a.rank_cmp(b));
    scored.truncate(limit as usize);
    Ok(scored.into_iter().map(|(_, view)| view).collect())
}

/// Active proposals whose decisive votes are closest to an even split.
pub async fn controversial(
    database: &DatabaseConnection,
    config: &RankingConfig,
    limit: u64,
) -> Result<Vec<ControversialProposal>, DbErr> {
    let limit = limit.clamp(1, MAX_CONTROVERSIAL_LIMIT);
    let min_votes = config.controversy_min_votes.max(1);

    let candidates = proposal::Entity::find()
        .filter(proposal::Column::Status.eq(ProposalStatus::Active))
        .filter(
            Expr::expr(
                Expr::col(proposal::Column::VotesFor)
                    .add(Expr::col(proposal::Column::VotesAgainst)),
            )
            .gte(min_votes),
        )
        .all(database)
        .await?;

    let mut ranked: Vec<(ControversyKey, ControversialProposal)> = candidates
        .into_iter()
        .filter_map(|proposal| {
            let ratio = ranking::for_ratio(proposal.votes_for, proposal.votes_against)?;
            let controversy = ranking::controversy(proposal.votes_for, proposal.votes_against)?;
            let created_at = proposal.created_at.timestamp();
            Some((
                ControversyKey {
                    controversy,
                    decisive_votes: proposal.votes_for + proposal.votes_against,
                    created_at,
                },
                ControversialProposal {
                    proposal_id: proposal.id,
                    title: proposal.title,
                    category_id: proposal.category_id,
                    votes_for: proposal.votes_for,
                    votes_against: proposal.votes_against,
                    for_ratio: ratio,
                    controversy,
                    created_at,
                },
            ))
        })
        .collect();

    ranked.sort_by(|(a, _), (b, _)| a.rank_cmp(b));
    ranked.truncate(limit as usize);
    Ok(ranked.into_iter().map(|(_, view)| view).collect())
}

pub async fn contributor_rankings(
    database: &DatabaseConnection,
    limit: u64,
) -> Result<Vec<ContributorRanking>, DbErr> {
    let limit = limit.clamp(1, MAX_RANKING_LIMIT);
    let users = user::Entity::find()
        .order_by_desc(user::Column::ReputationScore)
        .order_by_asc(user::Column::Id)
        .limit(limit)
        .all(database)
        .await?;
    if users.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = users.iter().map(|u| u.id).collect();

    let proposal_counts: HashMap<i64, i64> = proposal::Entity::find()
        .select_only()
        .column(proposal::Column::AuthorId)
        .column_as(proposal::Column::Id.count(), "proposals")
        .filter(proposal::Column::AuthorId.is_in(ids.clone()))
        .group_by(proposal::Column::AuthorId)
        .into_tuple::<(i64, i64)>()
        .all(database)
        .await?
        .into_iter()
        .collect();

    let vote_counts: HashMap<i64, i64> = vote::Entity::find()
        .select_only()
        .column(vote::Column::UserId)
        .column_as(vote::Column::ProposalId.count(), "votes")
        .filter(vote::Column::UserId.is_in(ids))
        .group_by(vote::Column::UserId)
        .into_tuple::<(i64, i64)>()
        .all(database)
        .await?
        .into_iter()
        .collect();

    let rankings = users
        .into_iter()
        .zip(1u32..)
        .map(|(user, rank)| ContributorRanking {
            rank,
            user_id: user.id,
            proposals_submitted: proposal_counts.get(&user.id).copied().unwrap_or(0),
            votes_cast: vote_counts.get(&user.id).copied().unwrap_or(0),
            username: user.username,
            display_name: user.display_name,
            contribution_level: user.contribution_level,
            reputation_score: user.reputation_score,
        })
        .collect();
    Ok(rankings)
}

fn reading(for_weight: i64, against_weight: i64) -> FrustrationReading {
    let index = ranking::frustration_index(for_weight, against_weight);
    let level = FrustrationLevel::from_index(index);
    FrustrationReading {
        for_weight,
        against_weight,
        index,
        level,
        label: level.label(),
    }
}

/// Share of weighted disapproval over the configured window, overall and
/// for every category.
pub async fn frustration_barometer(
    database: &DatabaseConnection,
    config: &RankingConfig,
    now: DateTimeWithTimeZone,
) -> Result<FrustrationBarometerView, DbErr> {
    let cutoff = now - config.barometer_window();

    let rows: Vec<(i32, VoteType, Option<i64>)> = vote::Entity::find()
        .select_only()
        .column(proposal::Column::CategoryId)
        .column(vote::Column::VoteType)
        .column_as(vote::Column::Weight.sum(), "weight")
        .join(JoinType::InnerJoin, vote::Relation::Proposal.def())
        .filter(vote::Column::CreatedAt.gte(cutoff))
        .filter(vote::Column::VoteType.ne(VoteType::Abstain))
        .group_by(proposal::Column::CategoryId)
        .group_by(vote::Column::VoteType)
        .into_tuple()
        .all(database)
        .await?;

    let mut per_category: HashMap<i32, (i64, i64)> = HashMap::new();
    for (category_id, vote_type, weight) in rows {
        let weight = weight.unwrap_or(0);
        let entry = per_category.entry(category_id).or_default();
        match vote_type {
            VoteType::For => entry.0 += weight,
            VoteType::Against => entry.1 += weight,
            VoteType::Abstain => {}
        }
    }

    let (global_for, global_against) = per_category
        .values()
        .fold((0, 0), |(f, a), (cf, ca)| (f + cf, a + ca));

    let categories = category::Entity::find()
        .order_by_asc(category::Column::SortOrder)
        .order_by_asc(category::Column::Id)
        .all(database)
        .await?
        .into_iter()
        .map(|category| {
            let (for_weight, against_weight) =
                per_category.get(&category.id).copied().unwrap_or((0, 0));
            CategoryFrustration {
                category_id: category.id,
                slug: category.slug,
                name: category.name,
                reading: reading(for_weight, against_weight),
            }
        })
        .collect();

    Ok(FrustrationBarometerView {
        window_days: config.barometer_window_days,
        global: reading(global_for, global_against),
        categories,
    })
}

pub async fn global_stats(database: &DatabaseConnection) -> Result<GlobalStatsView, DbErr> {
    Ok(GlobalStatsView {
        users: user::Entity::find().count(database).await?,
        proposals: proposal::Entity::find().count(database).await?,
        active_proposals: proposal::Entity::find()
            .filter(proposal::Column::Status.eq(ProposalStatus::Active))
            .count(database)
            .await?,
        votes: vote::Entity::find().count(database).await?,
        comments: comment::Entity::find().count(database).await?,
    })
}

pub async fn category_stats(database: &DatabaseConnection) -> Result<Vec<CategoryStatsView>, DbErr> {
    let rows: Vec<(i32, ProposalStatus, i64)> = proposal::Entity::find()
        .select_only()
        .column(proposal::Column::CategoryId)
        .column(proposal::Column::Status)
        .column_as(proposal::Column::Id.count(), "proposals")
        .group_by(proposal::Column::CategoryId)
        .group_by(proposal::Column::Status)
        .into_tuple()
        .all(database)
        .await?;

    let mut counts: HashMap<i32, (i64, i64)> = HashMap::new();
    for (category_id, status, proposals) in rows {
        let entry = counts.entry(category_id).or_default();
        entry.0 += proposals;
        if status == ProposalStatus::Active {
            entry.1 += proposals;
        }
    }

    let stats = category::Entity::find()
        .order_by_asc(category::Column::SortOrder)
        .order_by_asc(category::Column::Id)
        .all(database)
        .await?
        .into_iter()
        .map(|category| {
            let (proposals, active_proposals) =
                counts.get(&category.id).copied().unwrap_or((0, 0));
            CategoryStatsView {
                category_id: category.id,
                slug: category.slug,
                name: category.name,
                proposals,
                active_proposals,
            }
        })
        .collect();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        insert_category, insert_proposal, insert_proposal_with_status, insert_user,
        setup_database, test_ranking_config,
    };
    use crate::time::fixed_now;
    use crate::voting::cast_vote;

    #[tokio::test]
    async fn trending_ranks_recent_weight() {
        let db = setup_database().await;
        let category = insert_category(&db, "fiscalite").await;
        let author = insert_user(&db, "auteur", 0).await;
        let heavy = insert_user(&db, "lourd", 2_000).await;
        let light = insert_user(&db, "leger", 0).await;
        let hot = insert_proposal(&db, author.id, category.id, "Chaude").await;
        let warm = insert_proposal(&db, author.id, category.id, "Tiède").await;
        insert_proposal(&db, author.id, category.id, "Froide").await;

        cast_vote(&db, hot.id, heavy.id, VoteType::For).await.unwrap();
        cast_vote(&db, warm.id, light.id, VoteType::For).await.unwrap();

        let views = trending(&db, &test_ranking_config(), fixed_now(), 10)
            .await
            .unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].proposal_id, hot.id);
        assert_eq!(views[0].recent_weight, 5);
        assert!(views[0].trending_score > views[1].trending_score);
    }

    #[tokio::test]
    async fn controversial_prefers_even_splits_and_skips_thin_debates() {
        let db = setup_database().await;
        let category = insert_category(&db, "retraites").await;
        let author = insert_user(&db, "auteur", 0).await;
        let voters = [
            insert_user(&db, "v1", 0).await,
            insert_user(&db, "v2", 0).await,
            insert_user(&db, "v3", 0).await,
        ];
        let split = insert_proposal(&db, author.id, category.id, "Partagée").await;
        let lopsided = insert_proposal(&db, author.id, category.id, "Unanime").await;
        let thin = insert_proposal(&db, author.id, category.id, "Confidentielle").await;

        cast_vote(&db, split.id, voters[0].id, VoteType::For).await.unwrap();
        cast_vote(&db, split.id, voters[1].id, VoteType::Against)
            .await
            .unwrap();
        for voter in &voters {
            cast_vote(&db, lopsided.id, voter.id, VoteType::For)
                .await
                .unwrap();
        }
        cast_vote(&db, thin.id, voters[0].id, VoteType::Against)
            .await
            .unwrap();

        let views = controversial(&db, &test_ranking_config(), 10).await.unwrap();
        let ids: Vec<i64> = views.iter().map(|v| v.proposal_id).collect();
        assert_eq!(ids, vec![split.id, lopsided.id]);
        assert_eq!(views[0].controversy, 0.0);
        assert_eq!(views[1].for_ratio, 1.0);
    }

    #[tokio::test]
    async fn rankings_order_by_reputation_with_counts() {
        let db = setup_database().await;
        let category = insert_category(&db, "education").await;
        let top = insert_user(&db, "top", 900).await;
        let low = insert_user(&db, "bas", 5).await;
        let proposal = insert_proposal(&db, low.id, category.id, "Cantine bio").await;
        cast_vote(&db, proposal.id, top.id, VoteType::For).await.unwrap();

        let rankings = contributor_rankings(&db, 10).await.unwrap();
        assert_eq!(rankings.len(), 2);
        assert_eq!(rankings[0].rank, 1);
        assert_eq!(rankings[0].user_id, top.id);
        assert_eq!(rankings[0].votes_cast, 1);
        assert_eq!(rankings[1].proposals_submitted, 1);
    }

    #[tokio::test]
    async fn barometer_weighs_against_votes_per_category() {
        let db = setup_database().await;
        let angry = insert_category(&db, "fiscalite").await;
        let calm = insert_category(&db, "culture").await;
        let author = insert_user(&db, "auteur", 0).await;
        let heavy = insert_user(&db, "lourd", 500).await;
        let light = insert_user(&db, "leger", 0).await;
        let tax = insert_proposal(&db, author.id, angry.id, "Nouvelle taxe").await;
        let museum = insert_proposal(&db, author.id, calm.id, "Nuit des musées").await;

        cast_vote(&db, tax.id, heavy.id, VoteType::Against)
            .await
            .unwrap();
        cast_vote(&db, tax.id, light.id, VoteType::For).await.unwrap();
        cast_vote(&db, museum.id, light.id, VoteType::For).await.unwrap();
        cast_vote(&db, museum.id, heavy.id, VoteType::Abstain)
            .await
            .unwrap();

        let view = frustration_barometer(&db, &test_ranking_config(), fixed_now())
            .await
            .unwrap();
        assert_eq!(view.global.for_weight, 2);
        assert_eq!(view.global.against_weight, 3);
        assert_eq!(view.global.index, 60.0);
        assert_eq!(view.global.level, FrustrationLevel::Angry);

        let fiscal = view
            .categories
            .iter()
            .find(|c| c.category_id == angry.id)
            .unwrap();
        assert_eq!(fiscal.reading.level, FrustrationLevel::Revolt);
        let culture = view
            .categories
            .iter()
            .find(|c| c.category_id == calm.id)
            .unwrap();
        assert_eq!(culture.reading.index, 0.0);
        assert_eq!(culture.reading.level, FrustrationLevel::Serene);
    }

    #[tokio::test]
    async fn stats_count_everything() {
        let db = setup_database().await;
        let category = insert_category(&db, "transports").await;
        let empty = insert_category(&db, "autre").await;
        let author = insert_user(&db, "auteur", 0).await;
        insert_proposal(&db, author.id, category.id, "RER partout").await;
        insert_proposal_with_status(
            &db,
            author.id,
            category.id,
            "Autoroutes gratuites",
            ProposalStatus::Rejected,
        )
        .await;

        let global = global_stats(&db).await.unwrap();
        assert_eq!(global.users, 1);
        assert_eq!(global.proposals, 2);
        assert_eq!(global.active_proposals, 1);
        assert_eq!(global.votes, 0);

        let per_category = category_stats(&db).await.unwrap();
        let transports = per_category
            .iter()
            .find(|c| c.category_id == category.id)
            .unwrap();
        assert_eq!(transports.proposals, 2);
        assert_eq!(transports.active_proposals, 1);
        let other = per_category
            .iter()
            .find(|c| c.category_id == empty.id)
            .unwrap();
        assert_eq!(other.proposals, 0);
    }
}
