use std::fmt;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "proposals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_type = "String(StringLen::N(200))")]
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub category_id: i32,
    pub author_id: i64,
    pub status: ProposalStatus,
    /// Cached counts and weight sums; rewritten from the votes table after every vote change.
    pub votes_for: i64,
    pub votes_against: i64,
    pub votes_abstain: i64,
    pub weighted_for: i64,
    pub weighted_against: i64,
    pub view_count: i64,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub closed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "Restrict"
    )]
    Category,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id",
        on_delete = "Restrict"
    )]
    Author,
    #[sea_orm(has_many = "super::vote::Entity")]
    Vote,
    #[sea_orm(has_many = "super::comment::Entity")]
    Comment,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vote.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "under_review")]
    UnderReview,
    #[sea_orm(string_value = "implemented")]
    Implemented,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "archived")]
    Archived,
}

impl ProposalStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::UnderReview => "under_review",
            Self::Implemented => "implemented",
            Self::Rejected => "rejected",
            Self::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let status = match value.trim().to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            "under_review" | "review" => Self::UnderReview,
            "implemented" => Self::Implemented,
            "rejected" => Self::Rejected,
            "archived" => Self::Archived,
            _ => return None,
        };
        Some(status)
    }

    pub const fn accepts_votes(self) -> bool {
        matches!(self, Self::Active)
    }

    pub const fn accepts_comments(self) -> bool {
        matches!(self, Self::Active | Self::UnderReview)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Implemented | Self::Rejected | Self::Archived)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        use ProposalStatus::*;
        matches!(
            (self, next),
            (Active, UnderReview | Rejected | Archived)
                | (UnderReview, Active | Implemented | Rejected | Archived)
                | (Implemented, Archived)
                | (Rejected, Archived)
        )
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_lifecycle() {
        assert!(ProposalStatus::Active.can_transition_to(ProposalStatus::UnderReview));
        assert!(ProposalStatus::UnderReview.can_transition_to(ProposalStatus::Implemented));
        assert!(!ProposalStatus::Active.can_transition_to(ProposalStatus::Implemented));
        assert!(!ProposalStatus::Archived.can_transition_to(ProposalStatus::Active));
        assert!(!ProposalStatus::Active.can_transition_to(ProposalStatus::Active));
    }

    #[test]
    fn only_active_accepts_votes() {
        assert!(ProposalStatus::Active.accepts_votes());
        assert!(!ProposalStatus::UnderReview.accepts_votes());
        assert!(ProposalStatus::UnderReview.accepts_comments());
        assert!(!ProposalStatus::Rejected.accepts_comments());
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(
            ProposalStatus::parse(" Under_Review "),
            Some(ProposalStatus::UnderReview)
        );
        assert_eq!(ProposalStatus::parse("draft"), None);
    }
}
