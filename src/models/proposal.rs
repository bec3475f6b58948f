use serde::{Deserialize, Serialize};

use crate::entities::proposal::{self, ProposalStatus};
use crate::entities::vote::VoteType;
use crate::models::vote::VoteView;
use crate::ranking;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalView {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category_id: i32,
    pub author_id: i64,
    pub status: ProposalStatus,
    pub votes_for: i64,
    pub votes_against: i64,
    pub votes_abstain: i64,
    pub weighted_for: i64,
    pub weighted_against: i64,
    pub for_ratio: Option<f64>,
    pub view_count: i64,
    pub comment_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub closed_at: Option<i64>,
    pub has_voted: Option<bool>,
    pub user_vote: Option<VoteView>,
}

impl ProposalView {
    pub fn new(model: proposal::Model, comment_count: i64) -> Self {
        Self {
            for_ratio: ranking::for_ratio(model.votes_for, model.votes_against),
            id: model.id,
            title: model.title,
            description: model.description,
            category_id: model.category_id,
            author_id: model.author_id,
            status: model.status,
            votes_for: model.votes_for,
            votes_against: model.votes_against,
            votes_abstain: model.votes_abstain,
            weighted_for: model.weighted_for,
            weighted_against: model.weighted_against,
            view_count: model.view_count,
            comment_count,
            created_at: model.created_at.timestamp(),
            updated_at: model.updated_at.timestamp(),
            closed_at: model.closed_at.map(|dt| dt.timestamp()),
            has_voted: None,
            user_vote: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalSummary {
    pub id: i64,
    pub title: String,
    pub category_id: i32,
    pub author_id: i64,
    pub status: ProposalStatus,
    pub votes_for: i64,
    pub votes_against: i64,
    pub votes_abstain: i64,
    pub popularity: i64,
    pub view_count: i64,
    pub created_at: i64,
}

impl From<proposal::Model> for ProposalSummary {
    fn from(p: proposal::Model) -> Self {
        Self {
            id: p.id,
            title: p.title,
            category_id: p.category_id,
            author_id: p.author_id,
            status: p.status,
            votes_for: p.votes_for,
            votes_against: p.votes_against,
            votes_abstain: p.votes_abstain,
            popularity: ranking::popularity(p.votes_for, p.votes_against, p.votes_abstain),
            view_count: p.view_count,
            created_at: p.created_at.timestamp(),
        }
    }
}

// Request types for the proposals HTTP API

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalCreateRequest {
    pub author_id: i64,
    pub title: String,
    pub description: String,
    pub category_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalUpdateRequest {
    pub user_id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChangeRequest {
    pub user_id: i64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSubmissionRequest {
    pub user_id: i64,
    /// "for", "against" or "abstain" (French and yes/no synonyms accepted)
    pub vote_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSubmissionResponse {
    pub proposal_id: i64,
    pub user_id: i64,
    pub vote_type: Option<VoteType>,
    pub weight: i32,
    pub votes_for: i64,
    pub votes_against: i64,
    pub votes_abstain: i64,
    pub weighted_for: i64,
    pub weighted_against: i64,
}
