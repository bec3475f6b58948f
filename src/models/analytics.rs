use serde::Serialize;

use crate::contribution::ContributionLevel;
use crate::ranking::FrustrationLevel;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingProposal {
    pub proposal_id: i64,
    pub title: String,
    pub category_id: i32,
    pub recent_votes: i64,
    pub recent_weight: i64,
    pub trending_score: f64,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControversialProposal {
    pub proposal_id: i64,
    pub title: String,
    pub category_id: i32,
    pub votes_for: i64,
    pub votes_against: i64,
    pub for_ratio: f64,
    pub controversy: f64,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContributorRanking {
    pub rank: u32,
    pub user_id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub contribution_level: ContributionLevel,
    pub reputation_score: i32,
    pub proposals_submitted: i64,
    pub votes_cast: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrustrationReading {
    pub for_weight: i64,
    pub against_weight: i64,
    pub index: f64,
    pub level: FrustrationLevel,
    pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryFrustration {
    pub category_id: i32,
    pub slug: String,
    pub name: String,
    pub reading: FrustrationReading,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrustrationBarometerView {
    pub window_days: i64,
    pub global: FrustrationReading,
    pub categories: Vec<CategoryFrustration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalStatsView {
    pub users: u64,
    pub proposals: u64,
    pub active_proposals: u64,
    pub votes: u64,
    pub comments: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryStatsView {
    pub category_id: i32,
    pub slug: String,
    pub name: String,
    pub proposals: i64,
    pub active_proposals: i64,
}
