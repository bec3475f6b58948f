use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentView {
    pub id: i64,
    pub proposal_id: i64,
    pub author_id: i64,
    pub author_username: Option<String>,
    pub parent_id: Option<i64>,
    pub content: String,
    pub like_count: i64,
    pub is_edited: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub replies: Vec<CommentView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentCreateRequest {
    pub user_id: i64,
    pub content: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentUpdateRequest {
    pub user_id: i64,
    pub content: String,
}
