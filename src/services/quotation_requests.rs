use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::DispatcherConfig,
    db::lock_for_update,
    entities::{
        outbound_notification::{
            self, Channel, Entity as NotificationEntity, NotificationStatus,
            NotificationTargetKind,
        },
        quotation_request::{self, Entity as RequestEntity, QuotationRequestStatus},
        quotation_request_line::{self, Entity as RequestLineEntity},
        supplier::Entity as SupplierEntity,
        supplier_quote::{self, Entity as SupplierQuoteEntity, SupplierQuoteStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::notification_dispatcher::{enqueue_notification, NewNotification},
    tokens::MagicLinkService,
};

const INVITE_SUBJECT: &str = "Quotation request {{code}}";
const INVITE_BODY: &str = "Hello {{supplier}},\n\n\
we would like a price quote for the items of request {{code}}.\n\
Reply through this link before {{expires}}:\n{{link}}\n\n\
Thank you.";

/// Line submitted when creating a quotation request.
#[derive(Debug, Clone)]
pub struct NewRequestLine {
    pub product_id: Uuid,
    pub suggested_quantity: Decimal,
    pub note: Option<String>,
}

/// Coordinates the quotation-request state machine.
///
/// All transitions mutate only through this service; side effects are
/// visible solely as outbound-notification records written in the same
/// transaction as the state change.
#[derive(Clone)]
pub struct QuotationRequestService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
    tokens: Arc<dyn MagicLinkService>,
    dispatcher_config: DispatcherConfig,
    portal_base_url: String,
}

impl QuotationRequestService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Option<EventSender>,
        tokens: Arc<dyn MagicLinkService>,
        dispatcher_config: DispatcherConfig,
        portal_base_url: String,
    ) -> Self {
        Self {
            db,
            event_sender,
            tokens,
            dispatcher_config,
            portal_base_url,
        }
    }

    /// Creates a new request in `Draft` with the given lines.
    #[instrument(skip(self, lines))]
    pub async fn create(
        &self,
        expires_at: DateTime<Utc>,
        note: Option<String>,
        lines: Vec<NewRequestLine>,
    ) -> Result<quotation_request::Model, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await?;
        let request = self.create_in(&txn, expires_at, note, lines).await?;
        txn.commit().await?;
        Ok(request)
    }

    /// Transaction-scoped create, shared with the stock monitor which
    /// builds several requests atomically in one run.
    pub async fn create_in(
        &self,
        txn: &DatabaseTransaction,
        expires_at: DateTime<Utc>,
        note: Option<String>,
        lines: Vec<NewRequestLine>,
    ) -> Result<quotation_request::Model, ServiceError> {
        let now = Utc::now();
        if expires_at <= now {
            return Err(ServiceError::ValidationError(
                "expiry date must be in the future".to_string(),
            ));
        }
        for line in &lines {
            if line.suggested_quantity <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "suggested quantity for product {} must be positive",
                    line.product_id
                )));
            }
        }

        // Codes are zero-padded, so the lexicographic maximum is the
        // numeric maximum. Deriving from the last code instead of a row
        // count keeps the sequence gap-tolerant after deletions; the
        // unique index on `code` backstops concurrent creators.
        let sequence = RequestEntity::find()
            .order_by_desc(quotation_request::Column::Code)
            .one(txn)
            .await?
            .and_then(|r| r.code.strip_prefix("QR-")?.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        let request = quotation_request::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(format!("QR-{:06}", sequence)),
            status: Set(QuotationRequestStatus::Draft),
            issued_on: Set(now),
            expires_at: Set(expires_at),
            note: Set(note),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await?;

        for line in lines {
            quotation_request_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                request_id: Set(request.id),
                product_id: Set(line.product_id),
                suggested_quantity: Set(line.suggested_quantity),
                note: Set(line.note),
                created_at: Set(now),
            }
            .insert(txn)
            .await?;
        }

        info!(code = %request.code, "quotation request created");
        Ok(request)
    }

    /// Draft -> Open. Requires at least one line.
    #[instrument(skip(self))]
    pub async fn open(&self, request_id: Uuid) -> Result<quotation_request::Model, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await?;

        let request = self.find_locked(&txn, request_id).await?;
        if request.status != QuotationRequestStatus::Draft {
            return Err(ServiceError::InvalidState(format!(
                "request {} is {:?}, only Draft requests can be opened",
                request.code, request.status
            )));
        }
        let line_count = RequestLineEntity::find()
            .filter(quotation_request_line::Column::RequestId.eq(request_id))
            .count(&txn)
            .await?;
        if line_count == 0 {
            return Err(ServiceError::ValidationError(format!(
                "request {} has no lines",
                request.code
            )));
        }

        let updated = self
            .set_status(&txn, request, QuotationRequestStatus::Open)
            .await?;
        txn.commit().await?;

        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::QuotationRequestOpened(request_id)).await;
        }
        Ok(updated)
    }

    /// Open -> Sent, or Sent -> Sent for supplementary sends. Requires at
    /// least one invited supplier still `Pending`; writes one notification
    /// per pending invitee per channel the supplier is reachable on, in the
    /// same transaction as the status change.
    #[instrument(skip(self))]
    pub async fn send(&self, request_id: Uuid) -> Result<quotation_request::Model, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await?;

        let request = self.find_locked(&txn, request_id).await?;
        if !matches!(
            request.status,
            QuotationRequestStatus::Open | QuotationRequestStatus::Sent
        ) {
            return Err(ServiceError::InvalidState(format!(
                "request {} is {:?}, only Open or Sent requests can be sent",
                request.code, request.status
            )));
        }

        let pending = SupplierQuoteEntity::find()
            .filter(supplier_quote::Column::RequestId.eq(request_id))
            .filter(supplier_quote::Column::Status.eq(SupplierQuoteStatus::Pending))
            .all(&txn)
            .await?;
        if pending.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "request {} has no pending invitees to send to",
                request.code
            )));
        }

        let mut invitations = 0usize;
        for quote in &pending {
            invitations += self.schedule_invitation(&txn, &request, quote).await?;
        }
        if invitations == 0 {
            return Err(ServiceError::ValidationError(format!(
                "no invited supplier of request {} is reachable on any channel",
                request.code
            )));
        }

        let updated = self
            .set_status(&txn, request, QuotationRequestStatus::Sent)
            .await?;
        txn.commit().await?;

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::QuotationRequestSent {
                    request_id,
                    invitations,
                })
                .await;
        }
        Ok(updated)
    }

    /// Open/Sent -> Closed. The normal exit once a purchase order exists.
    #[instrument(skip(self))]
    pub async fn close(&self, request_id: Uuid) -> Result<quotation_request::Model, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await?;

        let request = self.find_locked(&txn, request_id).await?;
        if !matches!(
            request.status,
            QuotationRequestStatus::Open | QuotationRequestStatus::Sent
        ) {
            return Err(ServiceError::InvalidState(format!(
                "request {} is {:?}, only Open or Sent requests can be closed",
                request.code, request.status
            )));
        }

        let updated = self
            .set_status(&txn, request, QuotationRequestStatus::Closed)
            .await?;
        self.cancel_pending_notifications(&txn, request_id).await?;
        txn.commit().await?;

        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::QuotationRequestClosed(request_id)).await;
        }
        Ok(updated)
    }

    /// Draft/Open/Sent -> Cancelled. A Sent request with at least one
    /// response must be closed instead, preserving the audit trail.
    #[instrument(skip(self))]
    pub async fn cancel(&self, request_id: Uuid) -> Result<quotation_request::Model, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await?;

        let request = self.find_locked(&txn, request_id).await?;
        match request.status {
            QuotationRequestStatus::Draft | QuotationRequestStatus::Open => {}
            QuotationRequestStatus::Sent => {
                let responded = SupplierQuoteEntity::find()
                    .filter(supplier_quote::Column::RequestId.eq(request_id))
                    .filter(supplier_quote::Column::Status.eq(SupplierQuoteStatus::Responded))
                    .count(&txn)
                    .await?;
                if responded > 0 {
                    return Err(ServiceError::InvalidState(format!(
                        "request {} already has responses; close it instead of cancelling",
                        request.code
                    )));
                }
            }
            _ => {
                return Err(ServiceError::InvalidState(format!(
                    "request {} is {:?} and cannot be cancelled",
                    request.code, request.status
                )));
            }
        }

        let updated = self
            .set_status(&txn, request, QuotationRequestStatus::Cancelled)
            .await?;
        self.cancel_pending_notifications(&txn, request_id).await?;
        txn.commit().await?;

        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::QuotationRequestCancelled(request_id)).await;
        }
        Ok(updated)
    }

    /// Periodic sweep: expires every Open/Sent request past its expiry
    /// date. Idempotent; terminal requests are never touched. Returns the
    /// number of requests expired.
    #[instrument(skip(self))]
    pub async fn expire_due(&self, now: DateTime<Utc>) -> Result<usize, ServiceError> {
        let db = &*self.db;
        let due = RequestEntity::find()
            .filter(
                quotation_request::Column::Status
                    .is_in([QuotationRequestStatus::Open, QuotationRequestStatus::Sent]),
            )
            .filter(quotation_request::Column::ExpiresAt.lt(now))
            .all(db)
            .await?;

        let mut expired = 0usize;
        for request in due {
            let txn = db.begin().await?;
            // Re-check under lock; another worker may have raced us.
            let current = self.find_locked(&txn, request.id).await?;
            if !current.is_expirable(now) {
                txn.rollback().await?;
                continue;
            }
            let request_id = current.id;
            self.set_status(&txn, current, QuotationRequestStatus::Expired)
                .await?;
            self.cancel_pending_notifications(&txn, request_id).await?;
            txn.commit().await?;
            expired += 1;

            if let Some(sender) = &self.event_sender {
                sender.send_or_log(Event::QuotationRequestExpired(request_id)).await;
            }
        }
        if expired > 0 {
            info!(expired, "expiry sweep completed");
        }
        Ok(expired)
    }

    pub async fn get(
        &self,
        request_id: Uuid,
    ) -> Result<Option<quotation_request::Model>, ServiceError> {
        Ok(RequestEntity::find_by_id(request_id).one(&*self.db).await?)
    }

    pub async fn lines(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<quotation_request_line::Model>, ServiceError> {
        Ok(RequestLineEntity::find()
            .filter(quotation_request_line::Column::RequestId.eq(request_id))
            .all(&*self.db)
            .await?)
    }

    pub async fn list_by_status(
        &self,
        status: QuotationRequestStatus,
    ) -> Result<Vec<quotation_request::Model>, ServiceError> {
        Ok(RequestEntity::find()
            .filter(quotation_request::Column::Status.eq(status))
            .all(&*self.db)
            .await?)
    }

    async fn find_locked(
        &self,
        txn: &DatabaseTransaction,
        request_id: Uuid,
    ) -> Result<quotation_request::Model, ServiceError> {
        lock_for_update(
            RequestEntity::find_by_id(request_id),
            txn.get_database_backend(),
        )
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("quotation request {} not found", request_id)))
    }

    async fn set_status(
        &self,
        txn: &DatabaseTransaction,
        request: quotation_request::Model,
        status: QuotationRequestStatus,
    ) -> Result<quotation_request::Model, ServiceError> {
        let mut active: quotation_request::ActiveModel = request.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        Ok(active.update(txn).await?)
    }

    /// Writes one notification per channel the supplier is reachable on.
    /// Returns the number of notifications written.
    async fn schedule_invitation(
        &self,
        txn: &DatabaseTransaction,
        request: &quotation_request::Model,
        quote: &supplier_quote::Model,
    ) -> Result<usize, ServiceError> {
        let supplier = SupplierEntity::find_by_id(quote.supplier_id)
            .one(txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("supplier {} not found", quote.supplier_id))
            })?;

        let token = self.tokens.issue(quote.id);
        let link = format!("{}/quotes/{}", self.portal_base_url, token);
        let variables = json!({
            "supplier": supplier.name,
            "code": request.code,
            "expires": request.expires_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            "link": link,
        });

        let mut written = 0usize;
        for channel in [Channel::Chat, Channel::Email] {
            let Some(address) = supplier.address_for(channel) else {
                continue;
            };
            enqueue_notification(
                txn,
                &self.dispatcher_config,
                NewNotification {
                    target_kind: NotificationTargetKind::SupplierQuote,
                    target_id: quote.id,
                    channel,
                    address: address.to_string(),
                    subject: INVITE_SUBJECT.replace("{{code}}", &request.code),
                    body_template: INVITE_BODY.to_string(),
                    variables: variables.clone(),
                },
            )
            .await?;
            written += 1;
        }
        if written == 0 {
            warn!(
                supplier = %supplier.name,
                request = %request.code,
                "invited supplier has no reachable channel"
            );
        }
        Ok(written)
    }

    /// Cancels the not-yet-delivered notifications of a request leaving the
    /// active part of its lifecycle. Already-sent ones are history and stay.
    async fn cancel_pending_notifications(
        &self,
        txn: &DatabaseTransaction,
        request_id: Uuid,
    ) -> Result<(), ServiceError> {
        let quotes = SupplierQuoteEntity::find()
            .filter(supplier_quote::Column::RequestId.eq(request_id))
            .all(txn)
            .await?;
        for quote in quotes {
            let pending = NotificationEntity::find()
                .filter(
                    outbound_notification::Column::TargetKind
                        .eq(NotificationTargetKind::SupplierQuote),
                )
                .filter(outbound_notification::Column::TargetId.eq(quote.id))
                .filter(outbound_notification::Column::Status.eq(NotificationStatus::Pending))
                .all(txn)
                .await?;
            for notification in pending {
                let mut active: outbound_notification::ActiveModel = notification.into();
                active.status = Set(NotificationStatus::Cancelled);
                active.updated_at = Set(Utc::now());
                active.update(txn).await?;
            }
        }
        Ok(())
    }
}
