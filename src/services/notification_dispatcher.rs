use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::DispatcherConfig,
    entities::outbound_notification::{
        self, Channel, Entity as NotificationEntity, NotificationStatus, NotificationTargetKind,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    messaging::{MessagingGateway, OutboundMessage},
    services::{purchase_orders::PurchaseOrderService, supplier_quotes::SupplierQuoteService},
};

/// Parameters for a new outbox record.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub target_kind: NotificationTargetKind,
    pub target_id: Uuid,
    pub channel: Channel,
    pub address: String,
    pub subject: String,
    pub body_template: String,
    pub variables: serde_json::Value,
}

/// Writes an outbox record. Call inside the same transaction as the state
/// change that requires the message, so a crash can never lose it.
pub async fn enqueue_notification<C: ConnectionTrait>(
    conn: &C,
    config: &DispatcherConfig,
    notification: NewNotification,
) -> Result<outbound_notification::Model, ServiceError> {
    let now = Utc::now();
    let model = outbound_notification::ActiveModel {
        id: Set(Uuid::new_v4()),
        target_kind: Set(notification.target_kind),
        target_id: Set(notification.target_id),
        channel: Set(notification.channel),
        address: Set(notification.address),
        subject: Set(notification.subject),
        body_template: Set(notification.body_template),
        variables: Set(notification.variables),
        status: Set(NotificationStatus::Pending),
        attempts: Set(0),
        max_attempts: Set(config.max_attempts),
        next_eligible_at: Set(now),
        last_error: Set(None),
        sent_at: Set(None),
        provider_ref: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;
    Ok(model)
}

/// Outcome counters for one `run_due` pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: usize,
    pub retried: usize,
    pub failed: usize,
    /// Deferred to the next send-window opening; no attempt consumed
    pub deferred: usize,
}

/// Polls due outbox records and pushes them through the messaging gateway.
///
/// Delivery is at-least-once: a transport success after a local timeout can
/// produce a duplicate send, which the magic-link flow tolerates. Each
/// record gets at most one attempt per invocation.
#[derive(Clone)]
pub struct NotificationDispatcher {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn MessagingGateway>,
    config: DispatcherConfig,
    event_sender: Option<EventSender>,
    quotes: SupplierQuoteService,
    orders: PurchaseOrderService,
}

impl NotificationDispatcher {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn MessagingGateway>,
        config: DispatcherConfig,
        event_sender: Option<EventSender>,
        quotes: SupplierQuoteService,
        orders: PurchaseOrderService,
    ) -> Self {
        Self {
            db,
            gateway,
            config,
            event_sender,
            quotes,
            orders,
        }
    }

    /// Schedules a standalone notification outside a workflow transaction.
    pub async fn schedule(
        &self,
        notification: NewNotification,
    ) -> Result<outbound_notification::Model, ServiceError> {
        enqueue_notification(&*self.db, &self.config, notification).await
    }

    /// Processes every notification due at `now`.
    #[instrument(skip(self))]
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<DispatchSummary, ServiceError> {
        let due = NotificationEntity::find()
            .filter(outbound_notification::Column::Status.eq(NotificationStatus::Pending))
            .filter(outbound_notification::Column::NextEligibleAt.lte(now))
            .order_by_asc(outbound_notification::Column::NextEligibleAt)
            .limit(self.config.batch_size)
            .all(&*self.db)
            .await?;

        let mut summary = DispatchSummary::default();
        for notification in due {
            match self.process_one(notification, now).await {
                Ok(Outcome::Delivered) => summary.delivered += 1,
                Ok(Outcome::Retried) => summary.retried += 1,
                Ok(Outcome::Failed) => summary.failed += 1,
                Ok(Outcome::Deferred) => summary.deferred += 1,
                Err(e) => {
                    // A broken record must not stall its whole batch.
                    error!("dispatch error: {}", e);
                }
            }
        }
        if summary != DispatchSummary::default() {
            info!(
                delivered = summary.delivered,
                retried = summary.retried,
                failed = summary.failed,
                deferred = summary.deferred,
                "dispatch pass completed"
            );
        }
        Ok(summary)
    }

    async fn process_one(
        &self,
        notification: outbound_notification::Model,
        now: DateTime<Utc>,
    ) -> Result<Outcome, ServiceError> {
        let window = self.config.window_for(notification.channel);
        if !window.contains(now) {
            // Outside the permitted window: push to the next opening
            // without consuming an attempt.
            let next = window.next_open(now);
            let mut active: outbound_notification::ActiveModel = notification.into();
            active.next_eligible_at = Set(next);
            active.updated_at = Set(Utc::now());
            active.update(&*self.db).await?;
            return Ok(Outcome::Deferred);
        }

        let message = OutboundMessage {
            address: notification.address.clone(),
            channel: notification.channel,
            subject: notification.subject.clone(),
            body: notification.render_body(),
            attachments: Vec::new(),
        };

        let attempt_result = tokio::time::timeout(
            Duration::from_secs(self.config.delivery_timeout_secs),
            self.gateway.send(message),
        )
        .await;

        match attempt_result {
            Ok(Ok(delivery)) => {
                let target_kind = notification.target_kind;
                let target_id = notification.target_id;
                let mut active: outbound_notification::ActiveModel = notification.into();
                active.status = Set(NotificationStatus::Sent);
                active.sent_at = Set(Some(now));
                active.provider_ref = Set(delivery.provider_ref);
                active.last_error = Set(None);
                active.updated_at = Set(Utc::now());
                active.update(&*self.db).await?;

                self.on_delivered(target_kind, target_id).await;
                Ok(Outcome::Delivered)
            }
            Ok(Err(gateway_err)) => {
                self.record_failure(notification, now, gateway_err.to_string())
                    .await
            }
            Err(_elapsed) => {
                // The provider may still deliver after our timeout; the
                // retry then produces a duplicate, which consumers accept.
                self.record_failure(
                    notification,
                    now,
                    format!(
                        "delivery attempt timed out after {}s",
                        self.config.delivery_timeout_secs
                    ),
                )
                .await
            }
        }
    }

    async fn record_failure(
        &self,
        notification: outbound_notification::Model,
        now: DateTime<Utc>,
        detail: String,
    ) -> Result<Outcome, ServiceError> {
        let attempts = notification.attempts + 1;
        let exhausted = attempts >= notification.max_attempts;
        let notification_id = notification.id;
        let target_kind = notification.target_kind;
        let target_id = notification.target_id;

        let mut active: outbound_notification::ActiveModel = notification.into();
        active.attempts = Set(attempts);
        active.last_error = Set(Some(detail.clone()));
        active.updated_at = Set(Utc::now());
        if exhausted {
            active.status = Set(NotificationStatus::Failed);
            active.update(&*self.db).await?;

            warn!(%notification_id, attempts, "notification failed terminally: {}", detail);
            if let Some(sender) = &self.event_sender {
                sender
                    .send_or_log(Event::NotificationFailed {
                        notification_id,
                        attempts,
                        detail,
                    })
                    .await;
            }
            self.on_failed(target_kind, target_id).await;
            Ok(Outcome::Failed)
        } else {
            active.next_eligible_at = Set(now + self.config.backoff_after(attempts));
            active.update(&*self.db).await?;
            Ok(Outcome::Retried)
        }
    }

    /// Success callback into the owning aggregate. Errors here are logged:
    /// the delivery fact is already durable.
    async fn on_delivered(&self, kind: NotificationTargetKind, target_id: Uuid) {
        let result = match kind {
            NotificationTargetKind::SupplierQuote => {
                self.quotes.mark_sent(target_id).await.map(|_| ())
            }
            NotificationTargetKind::PurchaseOrder => {
                self.orders.mark_sent(target_id).await.map(|_| ())
            }
        };
        if let Err(e) = result {
            warn!(%target_id, "post-delivery callback failed: {}", e);
        }
    }

    async fn on_failed(&self, kind: NotificationTargetKind, target_id: Uuid) {
        let result = match kind {
            NotificationTargetKind::SupplierQuote => {
                self.quotes.mark_send_failed(target_id).await.map(|_| ())
            }
            NotificationTargetKind::PurchaseOrder => {
                self.orders.mark_send_failed(target_id).await.map(|_| ())
            }
        };
        if let Err(e) = result {
            warn!(%target_id, "terminal-failure callback failed: {}", e);
        }
    }

    pub async fn get(
        &self,
        notification_id: Uuid,
    ) -> Result<Option<outbound_notification::Model>, ServiceError> {
        Ok(NotificationEntity::find_by_id(notification_id)
            .one(&*self.db)
            .await?)
    }

    pub async fn for_target(
        &self,
        kind: NotificationTargetKind,
        target_id: Uuid,
    ) -> Result<Vec<outbound_notification::Model>, ServiceError> {
        Ok(NotificationEntity::find()
            .filter(outbound_notification::Column::TargetKind.eq(kind))
            .filter(outbound_notification::Column::TargetId.eq(target_id))
            .all(&*self.db)
            .await?)
    }
}

enum Outcome {
    Delivered,
    Retried,
    Failed,
    Deferred,
}
