//! Audit trail of API calls.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "api_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_type = "String(StringLen::N(8))")]
    pub method: String,
    #[sea_orm(column_type = "String(StringLen::N(512))")]
    pub path: String,
    pub status_code: i32,
    pub duration_ms: i64,
    /// Value of the `x-user-id` header, when the caller sent one
    pub user_id: Option<i64>,
    /// IP address of the caller, when connect info is available
    #[sea_orm(column_type = "String(StringLen::N(45))", nullable)]
    pub client_ip: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
