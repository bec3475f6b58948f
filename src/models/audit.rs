use serde::Serialize;

use crate::entities::api_log;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiLogView {
    pub id: i64,
    pub method: String,
    pub path: String,
    pub status_code: i32,
    pub duration_ms: i64,
    pub user_id: Option<i64>,
    pub client_ip: Option<String>,
    pub created_at: i64,
}

impl From<api_log::Model> for ApiLogView {
    fn from(log: api_log::Model) -> Self {
        Self {
            id: log.id,
            method: log.method,
            path: log.path,
            status_code: log.status_code,
            duration_ms: log.duration_ms,
            user_id: log.user_id,
            client_ip: log.client_ip,
            created_at: log.created_at.timestamp(),
        }
    }
}
