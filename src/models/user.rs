use serde::{Deserialize, Serialize};

use crate::contribution::ContributionLevel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfileView {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub contribution_level: ContributionLevel,
    pub contribution_label: &'static str,
    pub vote_weight: i32,
    pub reputation_score: i32,
    pub next_level: Option<LevelProgress>,
    pub is_moderator: bool,
    pub proposals_submitted: i64,
    pub votes_cast: i64,
    pub comments_posted: i64,
    pub created_at: i64,
    pub last_active_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelProgress {
    pub level: ContributionLevel,
    pub label: &'static str,
    pub required_reputation: i32,
    pub missing_reputation: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistrationRequest {
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
}
