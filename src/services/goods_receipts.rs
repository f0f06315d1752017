use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, TransactionTrait,
};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    db::lock_for_update,
    entities::{
        audit_log,
        goods_receipt::{self, Entity as ReceiptEntity, GoodsReceiptKind},
        goods_receipt_line::{self, Entity as ReceiptLineEntity},
        purchase_order::{self, Entity as OrderEntity, PurchaseOrderStatus},
        purchase_order_line::{self, Entity as OrderLineEntity},
        stock_movement::StockMovementKind,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::stock_ledger::StockLedgerService,
};

/// One submitted delivery line, addressed by order line.
#[derive(Debug, Clone)]
pub struct ReceiptLine {
    pub order_line_id: Uuid,
    pub quantity: Decimal,
    pub note: Option<String>,
}

/// Applies physical deliveries against purchase orders.
///
/// A receipt once recorded is never lost: the receipt record and its lines
/// are the transactional core, while the stock append, the order status
/// advance, and the audit entry are recoverable follow-ups whose failure is
/// logged and surfaced as an event instead of rolling anything back.
#[derive(Clone)]
pub struct GoodsReceiptService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
    stock_ledger: StockLedgerService,
}

impl GoodsReceiptService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Option<EventSender>,
        stock_ledger: StockLedgerService,
    ) -> Self {
        Self {
            db,
            event_sender,
            stock_ledger,
        }
    }

    /// Records a delivery against an order.
    ///
    /// Over- and negative quantities are rejected line-by-line before any
    /// write, with the exact pending amount in the error.
    #[instrument(skip(self, lines))]
    pub async fn receive(
        &self,
        order_id: Uuid,
        location_id: Uuid,
        lines: Vec<ReceiptLine>,
        note: Option<String>,
        received_by: &str,
    ) -> Result<goods_receipt::Model, ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "a goods receipt needs at least one line".to_string(),
            ));
        }

        let db = &*self.db;
        let txn = db.begin().await?;

        let order = lock_for_update(
            OrderEntity::find_by_id(order_id),
            txn.get_database_backend(),
        )
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("purchase order {} not found", order_id)))?;
        if !order.is_receivable() {
            return Err(ServiceError::InvalidState(format!(
                "order {} is {:?} and cannot receive goods",
                order.code(),
                order.status
            )));
        }

        let order_lines = OrderLineEntity::find()
            .filter(purchase_order_line::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;

        // Validate every submitted line before writing anything.
        let mut resolved: Vec<(purchase_order_line::Model, ReceiptLine)> = Vec::new();
        for line in lines {
            let order_line = order_lines
                .iter()
                .find(|ol| ol.id == line.order_line_id)
                .cloned()
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "order line {} does not belong to order {}",
                        line.order_line_id,
                        order.code()
                    ))
                })?;
            if line.quantity < Decimal::ZERO {
                return Err(ServiceError::NegativeQuantity {
                    order_line_id: line.order_line_id,
                    requested: line.quantity,
                });
            }
            if line.quantity == Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "received quantity for order line {} must be positive",
                    line.order_line_id
                )));
            }
            if resolved.iter().any(|(ol, _)| ol.id == order_line.id) {
                return Err(ServiceError::ValidationError(format!(
                    "order line {} appears twice in the same receipt",
                    order_line.id
                )));
            }
            let pending = order_line.pending();
            if line.quantity > pending {
                return Err(ServiceError::OverReceipt {
                    order_line_id: line.order_line_id,
                    pending,
                    requested: line.quantity,
                });
            }
            resolved.push((order_line, line));
        }

        // Classification looks at the whole order, not just submitted lines.
        let total_pending: Decimal = order_lines.iter().map(|ol| ol.pending()).sum();
        let submitted: Decimal = resolved.iter().map(|(_, l)| l.quantity).sum();
        let kind = if submitted >= total_pending {
            GoodsReceiptKind::Total
        } else {
            GoodsReceiptKind::Partial
        };

        let now = Utc::now();
        let receipt = goods_receipt::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            kind: Set(kind),
            received_at: Set(now),
            received_by: Set(received_by.to_string()),
            note: Set(note),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for (order_line, line) in &resolved {
            goods_receipt_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                receipt_id: Set(receipt.id),
                order_line_id: Set(order_line.id),
                quantity: Set(line.quantity),
                note: Set(line.note.clone()),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;

            let mut active: purchase_order_line::ActiveModel = order_line.clone().into();
            active.quantity_received = Set(order_line.quantity_received + line.quantity);
            active.updated_at = Set(now);
            active.update(&txn).await?;
        }

        // Stock updates are recoverable incidents when they fail; the
        // receipt itself must survive them. Each one runs in its own
        // savepoint so a failed statement cannot abort the outer
        // transaction on backends that poison it (Postgres).
        for (order_line, line) in &resolved {
            let step = txn.begin().await?;
            let appended = self
                .stock_ledger
                .append_in(
                    &step,
                    order_line.product_id,
                    location_id,
                    line.quantity,
                    StockMovementKind::Inbound,
                    Some("GoodsReceipt".to_string()),
                    Some(receipt.id),
                )
                .await;
            match appended {
                Ok(_) => step.commit().await?,
                Err(e) => {
                    if let Err(rollback_err) = step.rollback().await {
                        error!(receipt_id = %receipt.id, "savepoint rollback failed: {}", rollback_err);
                    }
                    error!(
                        receipt_id = %receipt.id,
                        order_line_id = %order_line.id,
                        "stock update failed, receipt kept: {}",
                        e
                    );
                    if let Some(sender) = &self.event_sender {
                        sender
                            .send_or_log(Event::StockUpdateFailed {
                                receipt_id: receipt.id,
                                order_line_id: order_line.id,
                                detail: e.to_string(),
                            })
                            .await;
                    }
                }
            }
        }

        let next_status = match kind {
            GoodsReceiptKind::Total => PurchaseOrderStatus::FullyReceived,
            GoodsReceiptKind::Partial => PurchaseOrderStatus::PartiallyReceived,
        };
        let mut order_active: purchase_order::ActiveModel = order.into();
        order_active.status = Set(next_status);
        order_active.updated_at = Set(now);
        let step = txn.begin().await?;
        match order_active.update(&step).await {
            Ok(_) => step.commit().await?,
            Err(e) => {
                if let Err(rollback_err) = step.rollback().await {
                    error!(%order_id, "savepoint rollback failed: {}", rollback_err);
                }
                error!(%order_id, "order status update failed, receipt kept: {}", e);
                if let Some(sender) = &self.event_sender {
                    sender
                        .send_or_log(Event::OrderStatusUpdateFailed {
                            order_id,
                            detail: e.to_string(),
                        })
                        .await;
                }
            }
        }

        let step = txn.begin().await?;
        let audit = audit_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            aggregate_kind: Set("GoodsReceipt".to_string()),
            aggregate_id: Set(receipt.id),
            action: Set("received".to_string()),
            actor: Set(received_by.to_string()),
            detail: Set(Some(format!("{:?} receipt against order {}", kind, order_id))),
            created_at: Set(now),
        }
        .insert(&step)
        .await;
        match audit {
            Ok(_) => step.commit().await?,
            Err(e) => {
                if let Err(rollback_err) = step.rollback().await {
                    error!(receipt_id = %receipt.id, "savepoint rollback failed: {}", rollback_err);
                }
                error!(receipt_id = %receipt.id, "audit write failed: {}", e);
                if let Some(sender) = &self.event_sender {
                    sender
                        .send_or_log(Event::AuditWriteFailed {
                            aggregate_id: receipt.id,
                            detail: e.to_string(),
                        })
                        .await;
                }
            }
        }

        txn.commit().await?;

        info!(
            receipt_id = %receipt.id,
            %order_id,
            ?kind,
            "goods receipt recorded"
        );
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::GoodsReceiptRecorded {
                    receipt_id: receipt.id,
                    order_id,
                    total: kind == GoodsReceiptKind::Total,
                })
                .await;
        }
        Ok(receipt)
    }

    pub async fn get(
        &self,
        receipt_id: Uuid,
    ) -> Result<Option<goods_receipt::Model>, ServiceError> {
        Ok(ReceiptEntity::find_by_id(receipt_id).one(&*self.db).await?)
    }

    pub async fn for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<goods_receipt::Model>, ServiceError> {
        Ok(ReceiptEntity::find()
            .filter(goods_receipt::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?)
    }

    pub async fn lines(
        &self,
        receipt_id: Uuid,
    ) -> Result<Vec<goods_receipt_line::Model>, ServiceError> {
        Ok(ReceiptLineEntity::find()
            .filter(goods_receipt_line::Column::ReceiptId.eq(receipt_id))
            .all(&*self.db)
            .await?)
    }
}
