use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::DispatcherConfig,
    documents::DocumentRenderer,
    entities::{
        outbound_notification::Channel,
        post_commit_task::{
            self, Entity as TaskEntity, PostCommitTaskKind, PostCommitTaskStatus,
        },
        purchase_order::Entity as OrderEntity,
        purchase_order_line::{self, Entity as OrderLineEntity},
    },
    errors::ServiceError,
    messaging::{MessagingGateway, OutboundMessage},
};

/// Writes a task record inside the transaction of the fact it follows.
pub async fn enqueue_task<C: ConnectionTrait>(
    conn: &C,
    kind: PostCommitTaskKind,
    order_id: Uuid,
    max_attempts: i32,
) -> Result<post_commit_task::Model, ServiceError> {
    let now = Utc::now();
    let task = post_commit_task::ActiveModel {
        id: Set(Uuid::new_v4()),
        kind: Set(kind),
        order_id: Set(order_id),
        status: Set(PostCommitTaskStatus::Pending),
        attempts: Set(0),
        max_attempts: Set(max_attempts),
        next_eligible_at: Set(now),
        last_error: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;
    Ok(task)
}

/// Executes the best-effort side effects of order creation as individually
/// retryable tasks, so operators can see exactly which one failed and
/// replay it. Task failure never touches the order itself.
#[derive(Clone)]
pub struct PostCommitTaskService {
    db: Arc<DatabaseConnection>,
    renderer: Arc<dyn DocumentRenderer>,
    gateway: Arc<dyn MessagingGateway>,
    staff_email: String,
    config: DispatcherConfig,
}

impl PostCommitTaskService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        renderer: Arc<dyn DocumentRenderer>,
        gateway: Arc<dyn MessagingGateway>,
        staff_email: String,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            db,
            renderer,
            gateway,
            staff_email,
            config,
        }
    }

    /// Runs every task due at `now`; returns the number completed.
    #[instrument(skip(self))]
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<usize, ServiceError> {
        let due = TaskEntity::find()
            .filter(post_commit_task::Column::Status.eq(PostCommitTaskStatus::Pending))
            .filter(post_commit_task::Column::NextEligibleAt.lte(now))
            .order_by_asc(post_commit_task::Column::NextEligibleAt)
            .limit(self.config.batch_size)
            .all(&*self.db)
            .await?;

        let mut completed = 0usize;
        for task in due {
            match self.execute(&task).await {
                Ok(()) => {
                    let mut active: post_commit_task::ActiveModel = task.into();
                    active.status = Set(PostCommitTaskStatus::Done);
                    active.updated_at = Set(Utc::now());
                    active.update(&*self.db).await?;
                    completed += 1;
                }
                Err(e) => {
                    let attempts = task.attempts + 1;
                    let exhausted = attempts >= task.max_attempts;
                    warn!(
                        task_id = %task.id,
                        kind = ?task.kind,
                        order_id = %task.order_id,
                        attempts,
                        "post-commit task failed: {}",
                        e
                    );
                    let mut active: post_commit_task::ActiveModel = task.into();
                    active.attempts = Set(attempts);
                    active.last_error = Set(Some(e.to_string()));
                    active.updated_at = Set(Utc::now());
                    if exhausted {
                        active.status = Set(PostCommitTaskStatus::Failed);
                    } else {
                        active.next_eligible_at = Set(now + self.config.backoff_after(attempts));
                    }
                    active.update(&*self.db).await?;
                }
            }
        }
        if completed > 0 {
            info!(completed, "post-commit tasks completed");
        }
        Ok(completed)
    }

    async fn execute(&self, task: &post_commit_task::Model) -> Result<(), ServiceError> {
        let order = OrderEntity::find_by_id(task.order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("purchase order {} not found", task.order_id))
            })?;
        let lines = OrderLineEntity::find()
            .filter(purchase_order_line::Column::OrderId.eq(task.order_id))
            .all(&*self.db)
            .await?;

        match task.kind {
            PostCommitTaskKind::RenderOrderDocument => {
                let document = self
                    .renderer
                    .render_order_document(&order, &lines)
                    .await
                    .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;
                info!(
                    code = %order.code(),
                    bytes = document.len(),
                    "order document rendered"
                );
                Ok(())
            }
            PostCommitTaskKind::NotifyStaff => {
                // Staff mail bypasses the outbox: it carries no delivery
                // callback and retries through this task's own schedule.
                let body = format!(
                    "Purchase order {} was generated for supplier {} over {}.",
                    order.code(),
                    order.supplier_id,
                    order.total_amount
                );
                self.gateway
                    .send(OutboundMessage {
                        address: self.staff_email.clone(),
                        channel: Channel::Email,
                        subject: format!("New purchase order {}", order.code()),
                        body,
                        attachments: Vec::new(),
                    })
                    .await
                    .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;
                Ok(())
            }
        }
    }

    pub async fn for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<post_commit_task::Model>, ServiceError> {
        Ok(TaskEntity::find()
            .filter(post_commit_task::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?)
    }
}
