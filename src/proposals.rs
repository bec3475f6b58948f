//! Proposal lifecycle: submission, edits, status transitions and listing.

use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use thiserror::Error;
use tracing::info;

use crate::contribution::{self, Reward};
use crate::entities::proposal::{self, ProposalStatus};
use crate::entities::{category, user};
use crate::time::fixed_now;
use crate::validation::{self, ValidationError};

pub const DEFAULT_LIST_LIMIT: u64 = 20;
pub const MAX_LIST_LIMIT: u64 = 100;
const MAX_SEARCH_LEN: usize = 100;

#[derive(Debug, Error)]
pub enum ProposalError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("proposal {0} not found")]
    NotFound(i64),
    #[error("user {0} not found")]
    UserNotFound(i64),
    #[error("category {0} not found")]
    CategoryNotFound(i32),
    #[error("user {user_id} is not the author of proposal {proposal_id}")]
    NotAuthor { proposal_id: i64, user_id: i64 },
    #[error("user {0} is not a moderator")]
    NotModerator(i64),
    #[error("proposal {proposal_id} is {status} and can no longer be edited")]
    NotEditable {
        proposal_id: i64,
        status: ProposalStatus,
    },
    #[error("cannot move a proposal from {from} to {to}")]
    InvalidTransition {
        from: ProposalStatus,
        to: ProposalStatus,
    },
    #[error("unknown proposal status '{0}'")]
    UnknownStatus(String),
    #[error("unknown sort order '{0}'")]
    UnknownSort(String),
}

#[derive(Debug, Clone)]
pub struct NewProposal {
    pub author_id: i64,
    pub title: String,
    pub description: String,
    pub category_id: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ProposalChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i32>,
}

pub async fn create_proposal(
    database: &DatabaseConnection,
    request: NewProposal,
) -> Result<proposal::Model, ProposalError> {
    let title = validation::canonicalize_title(&request.title)?;
    let description = validation::canonicalize_description(&request.description)?;

    let txn = database.begin().await?;
    user::Entity::find_by_id(request.author_id)
        .one(&txn)
        .await?
        .ok_or(ProposalError::UserNotFound(request.author_id))?;
    category::Entity::find_by_id(request.category_id)
        .one(&txn)
        .await?
        .ok_or(ProposalError::CategoryNotFound(request.category_id))?;

    let now = fixed_now();
    let created = proposal::ActiveModel {
        id: NotSet,
        title: Set(title),
        description: Set(description),
        category_id: Set(request.category_id),
        author_id: Set(request.author_id),
        status: Set(ProposalStatus::Active),
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
    .insert(&txn)
    .await?;

    contribution::award(&txn, request.author_id, Reward::ProposalSubmitted).await?;
    txn.commit().await?;

    info!(
        "Proposal {} submitted by user {} in category {}",
        created.id, created.author_id, created.category_id
    );
    Ok(created)
}

/// Bumps the view counter and returns the fresh row.
pub async fn record_view(
    database: &DatabaseConnection,
    proposal_id: i64,
) -> Result<proposal::Model, ProposalError> {
    let result = proposal::Entity::update_many()
        .col_expr(
            proposal::Column::ViewCount,
            Expr::col(proposal::Column::ViewCount).add(1),
        )
        .filter(proposal::Column::Id.eq(proposal_id))
        .exec(database)
        .await?;
    if result.rows_affected == 0 {
        return Err(ProposalError::NotFound(proposal_id));
    }

    proposal::Entity::find_by_id(proposal_id)
        .one(database)
        .await?
        .ok_or(ProposalError::NotFound(proposal_id))
}

pub async fn update_proposal(
    database: &DatabaseConnection,
    proposal_id: i64,
    user_id: i64,
    changes: ProposalChanges,
) -> Result<proposal::Model, ProposalError> {
    let title = changes
        .title
        .as_deref()
        .map(validation::canonicalize_title)
        .transpose()?;
    let description = changes
        .description
        .as_deref()
        .map(validation::canonicalize_description)
        .transpose()?;

    let txn = database.begin().await?;
    let existing = proposal::Entity::find_by_id(proposal_id)
        .one(&txn)
        .await?
        .ok_or(ProposalError::NotFound(proposal_id))?;

    if existing.author_id != user_id {
        return Err(ProposalError::NotAuthor {
            proposal_id,
            user_id,
        });
    }
    if existing.status != ProposalStatus::Active {
        return Err(ProposalError::NotEditable {
            proposal_id,
            status: existing.status,
        });
    }

    if let Some(category_id) = changes.category_id {
        category::Entity::find_by_id(category_id)
            .one(&txn)
            .await?
            .ok_or(ProposalError::CategoryNotFound(category_id))?;
    }

    let mut model = existing.into_active_model();
    if let Some(title) = title {
        model.title = Set(title);
    }
    if let Some(description) = description {
        model.description = Set(description);
    }
    if let Some(category_id) = changes.category_id {
        model.category_id = Set(category_id);
    }
    model.updated_at = Set(fixed_now());
    let updated = model.update(&txn).await?;
    txn.commit().await?;

    Ok(updated)
}

/// Moves a proposal through its lifecycle. Authors may archive their own
/// proposals; every other transition is reserved to moderators.
pub async fn change_status(
    database: &DatabaseConnection,
    proposal_id: i64,
    user_id: i64,
    next: ProposalStatus,
) -> Result<proposal::Model, ProposalError> {
    let txn = database.begin().await?;
    let existing = proposal::Entity::find_by_id(proposal_id)
        .one(&txn)
        .await?
        .ok_or(ProposalError::NotFound(proposal_id))?;
    let actor = user::Entity::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or(ProposalError::UserNotFound(user_id))?;

    let author_archiving = next == ProposalStatus::Archived && existing.author_id == user_id;
    if !actor.is_moderator && !author_archiving {
        return Err(ProposalError::NotModerator(user_id));
    }

    let previous = existing.status;
    if !previous.can_transition_to(next) {
        return Err(ProposalError::InvalidTransition {
            from: previous,
            to: next,
        });
    }

    let author_id = existing.author_id;
    let now = fixed_now();
    let mut model = existing.into_active_model();
    model.status = Set(next);
    model.updated_at = Set(now);
    if next.is_terminal() {
        model.closed_at = Set(Some(now));
    }
    let updated = model.update(&txn).await?;

    if next == ProposalStatus::Implemented {
        contribution::award(&txn, author_id, Reward::ProposalImplemented).await?;
    }
    txn.commit().await?;

    info!("Proposal {proposal_id} moved from {previous} to {next} by user {user_id}");
    Ok(updated)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Only(ProposalStatus),
    All,
}

impl StatusFilter {
    /// Missing status means active proposals only.
    pub fn parse(value: Option<&str>) -> Result<Self, ProposalError> {
        match value.map(str::trim) {
            None | Some("") => Ok(Self::Only(ProposalStatus::Active)),
            Some(raw) if raw.eq_ignore_ascii_case("all") => Ok(Self::All),
            Some(raw) => ProposalStatus::parse(raw)
                .map(Self::Only)
                .ok_or_else(|| ProposalError::UnknownStatus(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProposalSort {
    #[default]
    Recent,
    Popular,
    MostViewed,
}

impl ProposalSort {
    pub fn parse(value: Option<&str>) -> Result<Self, ProposalError> {
        match value.map(|raw| raw.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("recent") => Ok(Self::Recent),
            Some("popular") => Ok(Self::Popular),
            Some("most_viewed") | Some("views") => Ok(Self::MostViewed),
            Some(other) => Err(ProposalError::UnknownSort(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProposalFilter {
    pub status: StatusFilter,
    pub category_id: Option<i32>,
    pub author_id: Option<i64>,
    pub search: Option<String>,
    pub sort: ProposalSort,
    pub limit: u64,
    pub offset: u64,
}

impl Default for ProposalFilter {
    fn default() -> Self {
        Self {
            status: StatusFilter::Only(ProposalStatus::Active),
            category_id: None,
            author_id: None,
            search: None,
            sort: ProposalSort::Recent,
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }
}

pub async fn list_proposals(
    database: &DatabaseConnection,
    filter: &ProposalFilter,
) -> Result<Vec<proposal::Model>, ProposalError> {
    let limit = filter.limit.clamp(1, MAX_LIST_LIMIT);
    let offset = filter.offset.min(i64::MAX as u64);

    let mut select = proposal::Entity::find();
    if let StatusFilter::Only(status) = filter.status {
        select = select.filter(proposal::Column::Status.eq(status));
    }
    if let Some(category_id) = filter.category_id {
        select = select.filter(proposal::Column::CategoryId.eq(category_id));
    }
    if let Some(author_id) = filter.author_id {
        select = select.filter(proposal::Column::AuthorId.eq(author_id));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim) {
        if !search.is_empty() {
            let search: String = search.chars().take(MAX_SEARCH_LEN).collect();
            select = select.filter(proposal::Column::Title.contains(search));
        }
    }

    select = match filter.sort {
        ProposalSort::Recent => select,
        ProposalSort::Popular => select.order_by_desc(
            Expr::col(proposal::Column::VotesFor)
                .add(Expr::col(proposal::Column::VotesAgainst))
                .add(Expr::col(proposal::Column::VotesAbstain)),
        ),
        ProposalSort::MostViewed => select.order_by_desc(proposal::Column::ViewCount),
    };

    let proposals = select
        .order_by_desc(proposal::Column::CreatedAt)
        .order_by_desc(proposal::Column::Id)
        .limit(limit)
        .offset(offset)
        .all(database)
        .await?;

    assert!(
        proposals.len() <= limit as usize,
        "Returned more proposals than requested"
    );
    Ok(proposals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::vote::VoteType;
    use crate::test_support::{
        insert_category, insert_moderator, insert_proposal, insert_proposal_with_status,
        insert_user, setup_database,
    };
    use crate::voting::cast_vote;

    fn new_proposal(author_id: i64, category_id: i32) -> NewProposal {
        NewProposal {
            author_id,
            title: "  Taxer les superprofits  ".to_string(),
            description: "Une contribution exceptionnelle sur les bénéfices records.".to_string(),
            category_id,
        }
    }

    #[tokio::test]
    async fn create_trims_fields_and_rewards_author() {
        let db = setup_database().await;
        let category = insert_category(&db, "fiscalite").await;
        let author = insert_user(&db, "auteur", 0).await;

        let created = create_proposal(&db, new_proposal(author.id, category.id))
            .await
            .unwrap();
        assert_eq!(created.title, "Taxer les superprofits");
        assert_eq!(created.status, ProposalStatus::Active);
        assert_eq!(created.votes_for, 0);

        let rewarded = user::Entity::find_by_id(author.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            rewarded.reputation_score,
            Reward::ProposalSubmitted.points()
        );
    }

    #[tokio::test]
    async fn create_rejects_bad_input() {
        let db = setup_database().await;
        let category = insert_category(&db, "sante").await;
        let author = insert_user(&db, "auteur", 0).await;

        let mut short = new_proposal(author.id, category.id);
        short.description = "trop court".to_string();
        assert!(matches!(
            create_proposal(&db, short).await,
            Err(ProposalError::Validation(ValidationError::TooShort { .. }))
        ));
        assert!(matches!(
            create_proposal(&db, new_proposal(author.id, 999)).await,
            Err(ProposalError::CategoryNotFound(999))
        ));
        assert!(matches!(
            create_proposal(&db, new_proposal(999, category.id)).await,
            Err(ProposalError::UserNotFound(999))
        ));
    }

    #[tokio::test]
    async fn record_view_increments_counter() {
        let db = setup_database().await;
        let category = insert_category(&db, "culture").await;
        let author = insert_user(&db, "auteur", 0).await;
        let proposal = insert_proposal(&db, author.id, category.id, "Bibliothèques ouvertes").await;

        record_view(&db, proposal.id).await.unwrap();
        let viewed = record_view(&db, proposal.id).await.unwrap();
        assert_eq!(viewed.view_count, 2);
        assert!(matches!(
            record_view(&db, 4_242).await,
            Err(ProposalError::NotFound(4_242))
        ));
    }

    #[tokio::test]
    async fn only_author_edits_active_proposals() {
        let db = setup_database().await;
        let category = insert_category(&db, "education").await;
        let other = insert_category(&db, "autre").await;
        let author = insert_user(&db, "auteur", 0).await;
        let intruder = insert_user(&db, "intrus", 0).await;
        let proposal = insert_proposal(&db, author.id, category.id, "Classes de vingt").await;

        let changes = ProposalChanges {
            title: Some("Classes de quinze".to_string()),
            category_id: Some(other.id),
            ..ProposalChanges::default()
        };
        assert!(matches!(
            update_proposal(&db, proposal.id, intruder.id, changes.clone()).await,
            Err(ProposalError::NotAuthor { .. })
        ));

        let updated = update_proposal(&db, proposal.id, author.id, changes)
            .await
            .unwrap();
        assert_eq!(updated.title, "Classes de quinze");
        assert_eq!(updated.category_id, other.id);

        let closed =
            insert_proposal_with_status(&db, author.id, category.id, "Ancienne", ProposalStatus::Rejected)
                .await;
        assert!(matches!(
            update_proposal(&db, closed.id, author.id, ProposalChanges::default()).await,
            Err(ProposalError::NotEditable {
                status: ProposalStatus::Rejected,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn status_changes_need_a_moderator_except_author_archive() {
        let db = setup_database().await;
        let category = insert_category(&db, "retraites").await;
        let author = insert_user(&db, "auteur", 0).await;
        let moderator = insert_moderator(&db, "moderateur").await;
        let proposal = insert_proposal(&db, author.id, category.id, "Retraite à la carte").await;

        assert!(matches!(
            change_status(&db, proposal.id, author.id, ProposalStatus::UnderReview).await,
            Err(ProposalError::NotModerator(_))
        ));

        let reviewed = change_status(&db, proposal.id, moderator.id, ProposalStatus::UnderReview)
            .await
            .unwrap();
        assert_eq!(reviewed.status, ProposalStatus::UnderReview);
        assert!(reviewed.closed_at.is_none());

        let implemented =
            change_status(&db, proposal.id, moderator.id, ProposalStatus::Implemented)
                .await
                .unwrap();
        assert!(implemented.closed_at.is_some());
        let rewarded = user::Entity::find_by_id(author.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            rewarded.reputation_score,
            Reward::ProposalImplemented.points()
        );

        assert!(matches!(
            change_status(&db, proposal.id, moderator.id, ProposalStatus::Active).await,
            Err(ProposalError::InvalidTransition { .. })
        ));

        let archived = change_status(&db, proposal.id, author.id, ProposalStatus::Archived)
            .await
            .unwrap();
        assert_eq!(archived.status, ProposalStatus::Archived);
    }

    #[test]
    fn filters_parse_with_defaults() {
        assert_eq!(
            StatusFilter::parse(None).unwrap(),
            StatusFilter::Only(ProposalStatus::Active)
        );
        assert_eq!(StatusFilter::parse(Some("ALL")).unwrap(), StatusFilter::All);
        assert!(matches!(
            StatusFilter::parse(Some("draft")),
            Err(ProposalError::UnknownStatus(_))
        ));
        assert_eq!(ProposalSort::parse(None).unwrap(), ProposalSort::Recent);
        assert_eq!(
            ProposalSort::parse(Some("Popular")).unwrap(),
            ProposalSort::Popular
        );
        assert!(ProposalSort::parse(Some("random")).is_err());
    }

    #[tokio::test]
    async fn default_listing_hides_closed_proposals() {
        let db = setup_database().await;
        let category = insert_category(&db, "logement").await;
        let author = insert_user(&db, "auteur", 0).await;
        let open = insert_proposal(&db, author.id, category.id, "Logements vacants").await;
        insert_proposal_with_status(&db, author.id, category.id, "Rejetée", ProposalStatus::Rejected)
            .await;

        let listed = list_proposals(&db, &ProposalFilter::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, open.id);

        let everything = ProposalFilter {
            status: StatusFilter::All,
            ..ProposalFilter::default()
        };
        assert_eq!(list_proposals(&db, &everything).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn listing_filters_searches_and_sorts() {
        let db = setup_database().await;
        let fiscal = insert_category(&db, "fiscalite").await;
        let transport = insert_category(&db, "transports").await;
        let author = insert_user(&db, "auteur", 0).await;
        let voter_a = insert_user(&db, "votant_a", 0).await;
        let voter_b = insert_user(&db, "votant_b", 0).await;

        let quiet = insert_proposal(&db, author.id, fiscal.id, "Impôt plus simple").await;
        let busy = insert_proposal(&db, author.id, fiscal.id, "Impôt sur la fortune").await;
        insert_proposal(&db, author.id, transport.id, "Trains de nuit").await;

        cast_vote(&db, busy.id, voter_a.id, VoteType::For).await.unwrap();
        cast_vote(&db, busy.id, voter_b.id, VoteType::Abstain)
            .await
            .unwrap();
        record_view(&db, quiet.id).await.unwrap();

        let in_category = ProposalFilter {
            category_id: Some(fiscal.id),
            sort: ProposalSort::Popular,
            ..ProposalFilter::default()
        };
        let popular = list_proposals(&db, &in_category).await.unwrap();
        assert_eq!(popular.len(), 2);
        assert_eq!(popular[0].id, busy.id);

        let viewed = ProposalFilter {
            sort: ProposalSort::MostViewed,
            ..in_category.clone()
        };
        assert_eq!(list_proposals(&db, &viewed).await.unwrap()[0].id, quiet.id);

        let search = ProposalFilter {
            search: Some("Trains".to_string()),
            ..ProposalFilter::default()
        };
        let found = list_proposals(&db, &search).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].category_id, transport.id);

        let page = ProposalFilter {
            limit: 1,
            offset: 1,
            ..ProposalFilter::default()
        };
        assert_eq!(list_proposals(&db, &page).await.unwrap().len(), 1);
    }
}
