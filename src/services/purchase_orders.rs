use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::DispatcherConfig,
    db::lock_for_update,
    entities::{
        audit_log,
        outbound_notification::{Channel, NotificationTargetKind},
        post_commit_task::PostCommitTaskKind,
        purchase_order::{self, Entity as OrderEntity, PurchaseOrderStatus},
        purchase_order_line::{self, Entity as OrderLineEntity},
        quotation_request_line::{self, Entity as RequestLineEntity},
        supplier::Entity as SupplierEntity,
        supplier_quote::{self, Entity as SupplierQuoteEntity, SupplierQuoteStatus},
        supplier_quote_line::{self, Entity as QuoteLineEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        notification_dispatcher::{enqueue_notification, NewNotification},
        post_commit_tasks::enqueue_task,
    },
};

const ORDER_SUBJECT: &str = "Purchase order {{code}}";
const ORDER_BODY: &str = "Hello {{supplier}},\n\n\
please find our purchase order {{code}} over a total of {{total}}.\n\
The order document follows separately.\n\n\
Thank you.";

/// Generates and advances purchase orders.
///
/// Generation runs under an exclusive lock on the supplier-quote row; the
/// unique index on `purchase_orders.quote_id` backs the 1:1 invariant if
/// two processes race past the in-transaction check anyway.
#[derive(Clone)]
pub struct PurchaseOrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
    dispatcher_config: DispatcherConfig,
}

impl PurchaseOrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Option<EventSender>,
        dispatcher_config: DispatcherConfig,
    ) -> Self {
        Self {
            db,
            event_sender,
            dispatcher_config,
        }
    }

    /// Creates a purchase order from a responded quote.
    ///
    /// `declared_total` is only consulted on the degraded path: a quote
    /// without structured lines gets its order lines from the parent
    /// request, with the declared total split evenly across them and the
    /// resulting unit prices marked as estimated.
    #[instrument(skip(self))]
    pub async fn generate_from_quote(
        &self,
        quote_id: Uuid,
        declared_total: Option<Decimal>,
        note: Option<String>,
        actor: &str,
    ) -> Result<purchase_order::Model, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await?;

        let quote = lock_for_update(
            SupplierQuoteEntity::find_by_id(quote_id),
            txn.get_database_backend(),
        )
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("supplier quote {} not found", quote_id)))?;

        let existing = OrderEntity::find()
            .filter(purchase_order::Column::QuoteId.eq(quote_id))
            .one(&txn)
            .await?;
        if let Some(order) = existing {
            return Err(ServiceError::Conflict(format!(
                "quote {} is already linked to purchase order {}",
                quote_id,
                order.code()
            )));
        }
        if quote.processed {
            return Err(ServiceError::Conflict(format!(
                "quote {} was already processed",
                quote_id
            )));
        }
        if quote.status != SupplierQuoteStatus::Responded {
            return Err(ServiceError::InvalidState(format!(
                "quote {} is {:?}, only Responded quotes can be ordered",
                quote_id, quote.status
            )));
        }

        let supplier = SupplierEntity::find_by_id(quote.supplier_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("supplier {} not found", quote.supplier_id))
            })?;

        let quote_lines = QuoteLineEntity::find()
            .filter(supplier_quote_line::Column::QuoteId.eq(quote_id))
            .all(&txn)
            .await?;
        let request_lines = RequestLineEntity::find()
            .filter(quotation_request_line::Column::RequestId.eq(quote.request_id))
            .all(&txn)
            .await?;

        let drafts = if quote_lines.is_empty() {
            self.even_split_lines(&quote, &request_lines, declared_total)?
        } else {
            structured_lines(&quote_lines, &request_lines)
        };
        if drafts.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "quote {} yields no orderable lines",
                quote_id
            )));
        }
        let total_amount: Decimal = drafts
            .iter()
            .map(|d| d.unit_price * d.quantity_ordered)
            .sum();

        let now = Utc::now();
        let last_number = OrderEntity::find()
            .order_by_desc(purchase_order::Column::Number)
            .one(&txn)
            .await?
            .map(|o| o.number)
            .unwrap_or(0);

        let order = purchase_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            number: Set(last_number + 1),
            supplier_id: Set(quote.supplier_id),
            quote_id: Set(quote_id),
            status: Set(PurchaseOrderStatus::Draft),
            total_amount: Set(total_amount),
            issued_on: Set(now),
            note: Set(note),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for draft in drafts {
            purchase_order_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                product_id: Set(draft.product_id),
                quantity_ordered: Set(draft.quantity_ordered),
                quantity_received: Set(Decimal::ZERO),
                unit_price: Set(draft.unit_price),
                price_estimated: Set(draft.price_estimated),
                note: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        let mut quote_active: supplier_quote::ActiveModel = quote.clone().into();
        quote_active.processed = Set(true);
        quote_active.updated_at = Set(now);
        quote_active.update(&txn).await?;

        self.schedule_order_notification(&txn, &order, &supplier)
            .await?;
        enqueue_task(
            &txn,
            PostCommitTaskKind::RenderOrderDocument,
            order.id,
            self.dispatcher_config.max_attempts,
        )
        .await?;
        enqueue_task(
            &txn,
            PostCommitTaskKind::NotifyStaff,
            order.id,
            self.dispatcher_config.max_attempts,
        )
        .await?;

        audit_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            aggregate_kind: Set("PurchaseOrder".to_string()),
            aggregate_id: Set(order.id),
            action: Set("generated".to_string()),
            actor: Set(actor.to_string()),
            detail: Set(Some(format!(
                "generated {} from quote {}",
                order.code(),
                quote_id
            ))),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(code = %order.code(), %quote_id, "purchase order generated");
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::PurchaseOrderGenerated {
                    order_id: order.id,
                    quote_id,
                    supplier_id: order.supplier_id,
                    total_amount,
                })
                .await;
        }
        Ok(order)
    }

    /// Delivery-success callback from the dispatcher. Idempotent; an order
    /// already past `Sent` keeps its state.
    pub async fn mark_sent(
        &self,
        order_id: Uuid,
    ) -> Result<purchase_order::Model, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await?;
        let order = self.find_locked(&txn, order_id).await?;
        if !matches!(
            order.status,
            PurchaseOrderStatus::Draft | PurchaseOrderStatus::DeliveryFailed
        ) {
            txn.rollback().await?;
            return Ok(order);
        }
        let updated = set_status(&txn, order, PurchaseOrderStatus::Sent).await?;
        txn.commit().await?;

        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::PurchaseOrderSent(order_id)).await;
        }
        Ok(updated)
    }

    /// Terminal-failure callback from the dispatcher. An order that already
    /// reached the supplier some other way is left alone.
    pub async fn mark_send_failed(
        &self,
        order_id: Uuid,
    ) -> Result<purchase_order::Model, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await?;
        let order = self.find_locked(&txn, order_id).await?;
        if order.status != PurchaseOrderStatus::Draft {
            txn.rollback().await?;
            return Ok(order);
        }
        let updated = set_status(&txn, order, PurchaseOrderStatus::DeliveryFailed).await?;
        txn.commit().await?;

        warn!(code = %updated.code(), "purchase order delivery failed terminally");
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::PurchaseOrderSendFailed(order_id))
                .await;
        }
        Ok(updated)
    }

    /// Operator confirmation that the supplier accepted the order.
    #[instrument(skip(self))]
    pub async fn mark_confirmed(
        &self,
        order_id: Uuid,
    ) -> Result<purchase_order::Model, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await?;
        let order = self.find_locked(&txn, order_id).await?;
        if order.status != PurchaseOrderStatus::Sent {
            return Err(ServiceError::InvalidState(format!(
                "order {} is {:?}, only Sent orders can be confirmed",
                order.code(),
                order.status
            )));
        }
        let updated = set_status(&txn, order, PurchaseOrderStatus::Confirmed).await?;
        txn.commit().await?;
        Ok(updated)
    }

    pub async fn get(
        &self,
        order_id: Uuid,
    ) -> Result<Option<purchase_order::Model>, ServiceError> {
        Ok(OrderEntity::find_by_id(order_id).one(&*self.db).await?)
    }

    pub async fn lines(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<purchase_order_line::Model>, ServiceError> {
        Ok(OrderLineEntity::find()
            .filter(purchase_order_line::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?)
    }

    pub async fn list_by_status(
        &self,
        status: PurchaseOrderStatus,
    ) -> Result<Vec<purchase_order::Model>, ServiceError> {
        Ok(OrderEntity::find()
            .filter(purchase_order::Column::Status.eq(status))
            .order_by_asc(purchase_order::Column::Number)
            .all(&*self.db)
            .await?)
    }

    async fn find_locked(
        &self,
        txn: &DatabaseTransaction,
        order_id: Uuid,
    ) -> Result<purchase_order::Model, ServiceError> {
        lock_for_update(
            OrderEntity::find_by_id(order_id),
            txn.get_database_backend(),
        )
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("purchase order {} not found", order_id)))
    }

    /// Degraded path for quotes without structured lines: order what the
    /// request asked for and spread `declared_total` evenly over the lines.
    fn even_split_lines(
        &self,
        quote: &supplier_quote::Model,
        request_lines: &[quotation_request_line::Model],
        declared_total: Option<Decimal>,
    ) -> Result<Vec<LineDraft>, ServiceError> {
        let total = declared_total.ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "quote {} has no structured lines; a declared total is required",
                quote.id
            ))
        })?;
        if request_lines.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "request {} has no lines to fall back to",
                quote.request_id
            )));
        }
        warn!(
            quote_id = %quote.id,
            "quote has no structured lines; splitting declared total evenly (estimated prices)"
        );

        let per_line = total / Decimal::from(request_lines.len());
        let drafts = request_lines
            .iter()
            .map(|line| LineDraft {
                product_id: line.product_id,
                quantity_ordered: line.suggested_quantity,
                unit_price: per_line / line.suggested_quantity,
                price_estimated: true,
            })
            .collect();
        Ok(drafts)
    }

    async fn schedule_order_notification(
        &self,
        txn: &DatabaseTransaction,
        order: &purchase_order::Model,
        supplier: &crate::entities::supplier::Model,
    ) -> Result<(), ServiceError> {
        let variables = json!({
            "supplier": supplier.name,
            "code": order.code(),
            "total": order.total_amount.to_string(),
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
                    target_kind: NotificationTargetKind::PurchaseOrder,
                    target_id: order.id,
                    channel,
                    address: address.to_string(),
                    subject: ORDER_SUBJECT.replace("{{code}}", &order.code()),
                    body_template: ORDER_BODY.to_string(),
                    variables: variables.clone(),
                },
            )
            .await?;
            written += 1;
        }
        if written == 0 {
            warn!(
                code = %order.code(),
                supplier = %supplier.name,
                "supplier has no reachable channel; order stays in Draft"
            );
        }
        Ok(())
    }
}

async fn set_status(
    txn: &DatabaseTransaction,
    order: purchase_order::Model,
    status: PurchaseOrderStatus,
) -> Result<purchase_order::Model, ServiceError> {
    let mut active: purchase_order::ActiveModel = order.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now());
    Ok(active.update(txn).await?)
}

struct LineDraft {
    product_id: Uuid,
    quantity_ordered: Decimal,
    unit_price: Decimal,
    price_estimated: bool,
}

/// One order line per quote line, with the ordered quantity bounded by the
/// quantity the request asked for. Quoted products the request never asked
/// for are skipped.
fn structured_lines(
    quote_lines: &[supplier_quote_line::Model],
    request_lines: &[quotation_request_line::Model],
) -> Vec<LineDraft> {
    quote_lines
        .iter()
        .filter_map(|quote_line| {
            let requested = request_lines
                .iter()
                .find(|r| r.product_id == quote_line.product_id)?
                .suggested_quantity;
            let quantity = requested.min(quote_line.quantity_available);
            if quantity <= Decimal::ZERO {
                return None;
            }
            Some(LineDraft {
                product_id: quote_line.product_id,
                quantity_ordered: quantity,
                unit_price: quote_line.unit_price,
                price_estimated: false,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote_line(product_id: Uuid, price: Decimal, available: Decimal) -> supplier_quote_line::Model {
        supplier_quote_line::Model {
            id: Uuid::new_v4(),
            quote_id: Uuid::new_v4(),
            product_id,
            unit_price: price,
            quantity_available: available,
            lead_time_days: 5,
            note: None,
            created_at: Utc::now(),
        }
    }

    fn request_line(product_id: Uuid, quantity: Decimal) -> quotation_request_line::Model {
        quotation_request_line::Model {
            id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
            product_id,
            suggested_quantity: quantity,
            note: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn structured_lines_bound_by_requested_quantity() {
        let product = Uuid::new_v4();
        let drafts = structured_lines(
            &[quote_line(product, dec!(4.00), dec!(100))],
            &[request_line(product, dec!(10))],
        );
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].quantity_ordered, dec!(10));
        assert_eq!(drafts[0].unit_price, dec!(4.00));
        assert!(!drafts[0].price_estimated);
    }

    #[test]
    fn structured_lines_skip_unrequested_products() {
        let requested = Uuid::new_v4();
        let unrequested = Uuid::new_v4();
        let drafts = structured_lines(
            &[
                quote_line(requested, dec!(4.00), dec!(10)),
                quote_line(unrequested, dec!(1.00), dec!(10)),
            ],
            &[request_line(requested, dec!(10))],
        );
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].product_id, requested);
    }
}
