use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    db::lock_for_update,
    entities::{
        quotation_request::{Entity as RequestEntity, QuotationRequestStatus},
        supplier::Entity as SupplierEntity,
        supplier_quote::{self, Entity as SupplierQuoteEntity, SupplierQuoteStatus},
        supplier_quote_line::{self, Entity as QuoteLineEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// One quoted product as submitted by a supplier through the portal.
#[derive(Debug, Clone)]
pub struct ResponseLine {
    pub product_id: Uuid,
    pub unit_price: Decimal,
    pub quantity_available: Decimal,
    pub lead_time_days: i32,
    pub note: Option<String>,
}

/// Manages the per-supplier sub-workflow of a quotation request.
#[derive(Clone)]
pub struct SupplierQuoteService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
}

impl SupplierQuoteService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Invites a supplier to a request, creating its `Pending` quote.
    /// Each supplier can be invited to a request only once.
    #[instrument(skip(self))]
    pub async fn invite(
        &self,
        request_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<supplier_quote::Model, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await?;
        let quote = self.invite_in(&txn, request_id, supplier_id).await?;
        txn.commit().await?;
        Ok(quote)
    }

    /// Transaction-scoped invite, shared with the stock monitor which
    /// builds requests and their invitations atomically in one run.
    pub async fn invite_in(
        &self,
        txn: &DatabaseTransaction,
        request_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<supplier_quote::Model, ServiceError> {
        let request = RequestEntity::find_by_id(request_id)
            .one(txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("quotation request {} not found", request_id))
            })?;
        if request.is_terminal() {
            return Err(ServiceError::InvalidState(format!(
                "request {} is {:?}; suppliers can no longer be invited",
                request.code, request.status
            )));
        }

        let supplier = SupplierEntity::find_by_id(supplier_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("supplier {} not found", supplier_id)))?;
        if !supplier.active {
            return Err(ServiceError::ValidationError(format!(
                "supplier {} is inactive",
                supplier.name
            )));
        }

        let existing = SupplierQuoteEntity::find()
            .filter(supplier_quote::Column::RequestId.eq(request_id))
            .filter(supplier_quote::Column::SupplierId.eq(supplier_id))
            .count(txn)
            .await?;
        if existing > 0 {
            return Err(ServiceError::Conflict(format!(
                "supplier {} is already invited to request {}",
                supplier.name, request.code
            )));
        }

        let now = Utc::now();
        let quote = supplier_quote::ActiveModel {
            id: Set(Uuid::new_v4()),
            request_id: Set(request_id),
            supplier_id: Set(supplier_id),
            status: Set(SupplierQuoteStatus::Pending),
            responded_at: Set(None),
            rejection_reason: Set(None),
            attempt: Set(1),
            processed: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await?;

        info!(request = %request.code, supplier = %supplier.name, "supplier invited");
        Ok(quote)
    }

    /// Marks an invitation as delivered. Idempotent: a duplicate delivery
    /// confirmation on an already-`Sent` (or already-terminal) quote is a
    /// no-op and creates no further notifications.
    #[instrument(skip(self))]
    pub async fn mark_sent(&self, quote_id: Uuid) -> Result<supplier_quote::Model, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await?;
        let quote = self.find_locked(&txn, quote_id).await?;

        let updated = match quote.status {
            SupplierQuoteStatus::Pending | SupplierQuoteStatus::SendFailed => {
                let mut active: supplier_quote::ActiveModel = quote.into();
                active.status = Set(SupplierQuoteStatus::Sent);
                active.updated_at = Set(Utc::now());
                active.update(&txn).await?
            }
            // Sent, Responded, Rejected: delivery confirmations may arrive
            // late or twice; nothing left to record.
            _ => quote,
        };
        txn.commit().await?;
        Ok(updated)
    }

    /// Terminal-failure callback from the dispatcher after retries are
    /// exhausted. A quote that has meanwhile responded keeps its response.
    #[instrument(skip(self))]
    pub async fn mark_send_failed(
        &self,
        quote_id: Uuid,
    ) -> Result<supplier_quote::Model, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await?;
        let quote = self.find_locked(&txn, quote_id).await?;

        let updated = match quote.status {
            SupplierQuoteStatus::Pending | SupplierQuoteStatus::Sent => {
                let mut active: supplier_quote::ActiveModel = quote.into();
                active.status = Set(SupplierQuoteStatus::SendFailed);
                active.updated_at = Set(Utc::now());
                active.update(&txn).await?
            }
            _ => quote,
        };
        txn.commit().await?;

        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::SupplierQuoteSendFailed { quote_id }).await;
        }
        Ok(updated)
    }

    /// Records the supplier's priced response. Requires the quote to be
    /// `Sent` and the parent request to still be running; responses after
    /// expiry get a clear "window closed" rejection.
    #[instrument(skip(self, lines))]
    pub async fn register_response(
        &self,
        quote_id: Uuid,
        lines: Vec<ResponseLine>,
    ) -> Result<supplier_quote::Model, ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "a quote response needs at least one line".to_string(),
            ));
        }
        for line in &lines {
            if line.unit_price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "negative unit price for product {}",
                    line.product_id
                )));
            }
            if line.quantity_available < Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "negative available quantity for product {}",
                    line.product_id
                )));
            }
        }

        let db = &*self.db;
        let txn = db.begin().await?;
        let quote = self.find_locked(&txn, quote_id).await?;
        self.ensure_respondable(&txn, &quote).await?;

        let now = Utc::now();
        for line in lines {
            supplier_quote_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                quote_id: Set(quote.id),
                product_id: Set(line.product_id),
                unit_price: Set(line.unit_price),
                quantity_available: Set(line.quantity_available),
                lead_time_days: Set(line.lead_time_days),
                note: Set(line.note),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        let request_id = quote.request_id;
        let mut active: supplier_quote::ActiveModel = quote.into();
        active.status = Set(SupplierQuoteStatus::Responded);
        active.responded_at = Set(Some(now));
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::SupplierQuoteResponded {
                    quote_id,
                    request_id,
                })
                .await;
        }
        Ok(updated)
    }

    /// Records the supplier's explicit "no offer". Requires a non-empty
    /// reason; same state guards as a response.
    #[instrument(skip(self))]
    pub async fn register_rejection(
        &self,
        quote_id: Uuid,
        reason: String,
    ) -> Result<supplier_quote::Model, ServiceError> {
        if reason.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "a rejection needs a reason".to_string(),
            ));
        }

        let db = &*self.db;
        let txn = db.begin().await?;
        let quote = self.find_locked(&txn, quote_id).await?;
        self.ensure_respondable(&txn, &quote).await?;

        let now = Utc::now();
        let request_id = quote.request_id;
        let mut active: supplier_quote::ActiveModel = quote.into();
        active.status = Set(SupplierQuoteStatus::Rejected);
        active.rejection_reason = Set(Some(reason));
        active.responded_at = Set(Some(now));
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::SupplierQuoteRejected {
                    quote_id,
                    request_id,
                })
                .await;
        }
        Ok(updated)
    }

    /// Resets a quote to `Pending` as a new attempt, clearing any previous
    /// response data. The next `send` on the request re-invites it.
    #[instrument(skip(self))]
    pub async fn resend(&self, quote_id: Uuid) -> Result<supplier_quote::Model, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await?;
        let quote = self.find_locked(&txn, quote_id).await?;

        let request = RequestEntity::find_by_id(quote.request_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("quotation request {} not found", quote.request_id))
            })?;
        if request.is_terminal() {
            return Err(ServiceError::InvalidState(format!(
                "request {} is {:?}; its quotes cannot be resent",
                request.code, request.status
            )));
        }
        if quote.status == SupplierQuoteStatus::Pending {
            return Err(ServiceError::InvalidState(
                "quote is already pending a send".to_string(),
            ));
        }
        if quote.processed {
            return Err(ServiceError::InvalidState(
                "quote already produced a purchase order".to_string(),
            ));
        }

        // Prior response data belongs to the previous attempt.
        QuoteLineEntity::delete_many()
            .filter(supplier_quote_line::Column::QuoteId.eq(quote.id))
            .exec(&txn)
            .await?;

        let attempt = quote.attempt + 1;
        let mut active: supplier_quote::ActiveModel = quote.into();
        active.status = Set(SupplierQuoteStatus::Pending);
        active.responded_at = Set(None);
        active.rejection_reason = Set(None);
        active.attempt = Set(attempt);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::SupplierQuoteResent { quote_id, attempt })
                .await;
        }
        Ok(updated)
    }

    pub async fn get(&self, quote_id: Uuid) -> Result<Option<supplier_quote::Model>, ServiceError> {
        Ok(SupplierQuoteEntity::find_by_id(quote_id).one(&*self.db).await?)
    }

    pub async fn lines(
        &self,
        quote_id: Uuid,
    ) -> Result<Vec<supplier_quote_line::Model>, ServiceError> {
        Ok(QuoteLineEntity::find()
            .filter(supplier_quote_line::Column::QuoteId.eq(quote_id))
            .all(&*self.db)
            .await?)
    }

    pub async fn for_request(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<supplier_quote::Model>, ServiceError> {
        Ok(SupplierQuoteEntity::find()
            .filter(supplier_quote::Column::RequestId.eq(request_id))
            .all(&*self.db)
            .await?)
    }

    async fn find_locked(
        &self,
        txn: &DatabaseTransaction,
        quote_id: Uuid,
    ) -> Result<supplier_quote::Model, ServiceError> {
        lock_for_update(
            SupplierQuoteEntity::find_by_id(quote_id),
            txn.get_database_backend(),
        )
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("supplier quote {} not found", quote_id)))
    }

    /// A quote accepts a response or rejection only while `Sent` and while
    /// its parent request is still running.
    async fn ensure_respondable(
        &self,
        txn: &DatabaseTransaction,
        quote: &supplier_quote::Model,
    ) -> Result<(), ServiceError> {
        let request = RequestEntity::find_by_id(quote.request_id)
            .one(txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("quotation request {} not found", quote.request_id))
            })?;
        match request.status {
            QuotationRequestStatus::Sent => {}
            QuotationRequestStatus::Expired => {
                return Err(ServiceError::ResponseWindowClosed(format!(
                    "request {} expired on {}",
                    request.code,
                    request.expires_at.format("%Y-%m-%d")
                )));
            }
            other => {
                return Err(ServiceError::InvalidState(format!(
                    "request {} is {:?} and no longer accepts responses",
                    request.code, other
                )));
            }
        }
        if quote.status != SupplierQuoteStatus::Sent {
            return Err(ServiceError::InvalidState(format!(
                "quote is {:?}; only Sent quotes accept a response",
                quote.status
            )));
        }
        Ok(())
    }
}
