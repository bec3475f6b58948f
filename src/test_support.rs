//! In-memory SQLite fixtures for database-backed tests.

use std::sync::Arc;

use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, DbBackend, Schema};

use crate::config::{AuditConfig, CacheConfig, RankingConfig};
use crate::contribution::ContributionLevel;
use crate::entities::prelude::*;
use crate::entities::proposal::ProposalStatus;
use crate::entities::{category, proposal, user};
use crate::state::{ApiCache, AppState};
use crate::time::fixed_now;

pub async fn setup_database() -> DatabaseConnection {
    let database = Database::connect("sqlite::memory:")
        .await
        .expect("sqlite connection");

    let schema = Schema::new(DbBackend::Sqlite);
    let statements = vec![
        schema.create_table_from_entity(User),
        schema.create_table_from_entity(Category),
        schema.create_table_from_entity(Proposal),
        schema.create_table_from_entity(Vote),
        schema.create_table_from_entity(Comment),
        schema.create_table_from_entity(ApiLog),
    ];
    for statement in statements {
        database
            .execute(database.get_database_backend().build(&statement))
            .await
            .expect("create table");
    }

    database
}

pub fn test_cache_config() -> CacheConfig {
    CacheConfig {
        analytics_max_capacity: 64,
        analytics_ttl_seconds: 60,
        categories_ttl_seconds: 60,
    }
}

pub fn test_ranking_config() -> RankingConfig {
    RankingConfig {
        trending_window_hours: 72,
        trending_gravity: 1.5,
        controversy_min_votes: 2,
        barometer_window_days: 30,
    }
}

pub async fn test_state() -> AppState {
    let database = setup_database().await;
    AppState::new(
        database,
        Arc::new(ApiCache::new(&test_cache_config())),
        test_ranking_config(),
        AuditConfig { enabled: true },
    )
}

pub async fn insert_user(
    database: &DatabaseConnection,
    username: &str,
    reputation: i32,
) -> user::Model {
    let now = fixed_now();
    user::ActiveModel {
        id: NotSet,
        username: Set(username.to_string()),
        email: Set(format!("{username}@example.fr")),
        display_name: Set(None),
        contribution_level: Set(ContributionLevel::for_reputation(reputation)),
        reputation_score: Set(reputation),
        is_moderator: Set(false),
        created_at: Set(now),
        last_active_at: Set(now),
    }
    .insert(database)
    .await
    .expect("insert user")
}

pub async fn insert_moderator(database: &DatabaseConnection, username: &str) -> user::Model {
    let moderator = insert_user(database, username, 0).await;
    let mut model: user::ActiveModel = moderator.into();
    model.is_moderator = Set(true);
    model.update(database).await.expect("promote moderator")
}

pub async fn insert_category(database: &DatabaseConnection, slug: &str) -> category::Model {
    category::ActiveModel {
        id: NotSet,
        slug: Set(slug.to_string()),
        name: Set(slug.to_uppercase()),
        description: Set(format!("Catégorie {slug}")),
        icon: Set("tag".to_string()),
        sort_order: Set(1),
    }
    .insert(database)
    .await
    .expect("insert category")
}

pub async fn insert_proposal(
    database: &DatabaseConnection,
    author_id: i64,
    category_id: i32,
    title: &str,
) -> proposal::Model {
    insert_proposal_with_status(database, author_id, category_id, title, ProposalStatus::Active)
        .await
}

pub async fn insert_proposal_with_status(
    database: &DatabaseConnection,
    author_id: i64,
    category_id: i32,
    title: &str,
    status: ProposalStatus,
) -> proposal::Model {
    let now = fixed_now();
    proposal::ActiveModel {
        id: NotSet,
        title: Set(title.to_string()),
        description: Set(format!("{title} : proposition détaillée pour les tests")),
        category_id: Set(category_id),
        author_id: Set(author_id),
        status: Set(status),
        votes_for: Set(0),
        votes_against: Set(0),
        votes_abstain: Set(0),
        weighted_for: Set(0),
        weighted_against: Set(0),
        view_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        closed_at: Set(None),
    }
    .insert(database)
    .await
    .expect("insert proposal")
}
