use serde::{Deserialize, Serialize};

use crate::entities::vote::{self, VoteType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteView {
    pub proposal_id: i64,
    pub user_id: i64,
    pub vote_type: VoteType,
    pub weight: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<vote::Model> for VoteView {
    fn from(v: vote::Model) -> Self {
        Self {
            proposal_id: v.proposal_id,
            user_id: v.user_id,
            vote_type: v.vote_type,
            weight: v.weight,
            created_at: v.created_at.timestamp(),
            updated_at: v.updated_at.timestamp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteHistoryEntry {
    pub proposal_id: i64,
    pub proposal_title: String,
    pub vote_type: VoteType,
    pub weight: i32,
    pub voted_at: i64,
}
