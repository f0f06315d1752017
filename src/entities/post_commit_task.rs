use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Post-commit side effects that must never unwind the primary fact they
/// follow. Each runs as its own retryable task with observable status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum PostCommitTaskKind {
    #[sea_orm(string_value = "RenderOrderDocument")]
    RenderOrderDocument,
    #[sea_orm(string_value = "NotifyStaff")]
    NotifyStaff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum PostCommitTaskStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Done")]
    Done,
    #[sea_orm(string_value = "Failed")]
    Failed,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "post_commit_tasks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub kind: PostCommitTaskKind,
    /// Purchase order the task refers to
    pub order_id: Uuid,
    pub status: PostCommitTaskStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_eligible_at: DateTimeUtc,
    pub last_error: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
