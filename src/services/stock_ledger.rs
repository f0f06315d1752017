use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    db::lock_for_update,
    entities::{
        stock_level::{self, Entity as StockLevelEntity},
        stock_movement::{self, Entity as StockMovementEntity, StockMovementKind},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Authoritative inventory ledger.
///
/// All on-hand mutations go through [`StockLedgerService::append`]: it locks
/// the cached stock row for the product/location, writes the movement with
/// its resulting balance, and updates the cache to the same value inside
/// one transaction. No other code path may touch `stock_levels.on_hand`,
/// which keeps the `resulting_balance` chain monotonic per row.
#[derive(Clone)]
pub struct StockLedgerService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
}

impl StockLedgerService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Appends a movement and synchronizes the cached counter.
    #[instrument(skip(self))]
    pub async fn append(
        &self,
        product_id: Uuid,
        location_id: Uuid,
        quantity: Decimal,
        kind: StockMovementKind,
        reference_kind: Option<String>,
        reference_id: Option<Uuid>,
    ) -> Result<stock_movement::Model, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await?;
        let movement = self
            .append_in(&txn, product_id, location_id, quantity, kind, reference_kind, reference_id)
            .await?;
        txn.commit().await?;

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::StockMovementAppended {
                    product_id,
                    location_id,
                    quantity,
                    resulting_balance: movement.resulting_balance,
                })
                .await;
        }
        Ok(movement)
    }

    /// Appends a movement inside a caller-owned transaction. Used by the
    /// goods-receipt flow, which must keep the receipt and its movements in
    /// the same transaction.
    pub async fn append_in(
        &self,
        txn: &DatabaseTransaction,
        product_id: Uuid,
        location_id: Uuid,
        quantity: Decimal,
        kind: StockMovementKind,
        reference_kind: Option<String>,
        reference_id: Option<Uuid>,
    ) -> Result<stock_movement::Model, ServiceError> {
        if quantity == Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "stock movement quantity must be non-zero".to_string(),
            ));
        }
        let expected_sign_ok = match kind {
            StockMovementKind::Inbound | StockMovementKind::AdjustmentPositive => {
                quantity > Decimal::ZERO
            }
            StockMovementKind::Outbound | StockMovementKind::AdjustmentNegative => {
                quantity < Decimal::ZERO
            }
        };
        if !expected_sign_ok {
            return Err(ServiceError::ValidationError(format!(
                "movement kind {:?} does not match quantity sign {}",
                kind, quantity
            )));
        }

        let backend = txn.get_database_backend();
        let level = lock_for_update(
            StockLevelEntity::find()
                .filter(stock_level::Column::ProductId.eq(product_id))
                .filter(stock_level::Column::LocationId.eq(location_id)),
            backend,
        )
        .one(txn)
        .await?;

        let now = Utc::now();
        let (previous_balance, level_model) = match level {
            Some(level) => (level.on_hand, Some(level)),
            None => (Decimal::ZERO, None),
        };
        let resulting_balance = previous_balance + quantity;

        let movement = stock_movement::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            location_id: Set(location_id),
            quantity: Set(quantity),
            resulting_balance: Set(resulting_balance),
            kind: Set(kind),
            reference_kind: Set(reference_kind),
            reference_id: Set(reference_id),
            occurred_at: Set(now),
        }
        .insert(txn)
        .await?;

        // The cache must always equal the latest ledger balance.
        match level_model {
            Some(level) => {
                let mut active: stock_level::ActiveModel = level.into();
                active.on_hand = Set(resulting_balance);
                active.updated_at = Set(now);
                active.update(txn).await?;
            }
            None => {
                stock_level::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    product_id: Set(product_id),
                    location_id: Set(location_id),
                    on_hand: Set(resulting_balance),
                    reorder_threshold: Set(Decimal::ZERO),
                    reorder_quantity: Set(Decimal::ZERO),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(txn)
                .await?;
            }
        }

        info!(
            %product_id, %location_id, %quantity, %resulting_balance,
            "stock movement appended"
        );
        Ok(movement)
    }

    /// Current cached on-hand quantity; zero when no row exists yet.
    pub async fn on_hand(
        &self,
        product_id: Uuid,
        location_id: Uuid,
    ) -> Result<Decimal, ServiceError> {
        let level = StockLevelEntity::find()
            .filter(stock_level::Column::ProductId.eq(product_id))
            .filter(stock_level::Column::LocationId.eq(location_id))
            .one(&*self.db)
            .await?;
        Ok(level.map(|l| l.on_hand).unwrap_or(Decimal::ZERO))
    }

    /// Ledger balance for a product/location computed from the movement
    /// chain. By the ledger invariant this equals the latest movement's
    /// `resulting_balance`; summing avoids depending on timestamp ties.
    pub async fn ledger_balance(
        &self,
        product_id: Uuid,
        location_id: Uuid,
    ) -> Result<Decimal, ServiceError> {
        let movements = StockMovementEntity::find()
            .filter(stock_movement::Column::ProductId.eq(product_id))
            .filter(stock_movement::Column::LocationId.eq(location_id))
            .all(&*self.db)
            .await?;
        Ok(movements.iter().map(|m| m.quantity).sum())
    }

    /// Verifies the cached counter against the ledger for one row.
    pub async fn is_consistent(
        &self,
        product_id: Uuid,
        location_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let cached = self.on_hand(product_id, location_id).await?;
        let ledger = self.ledger_balance(product_id, location_id).await?;
        Ok(cached == ledger)
    }

    pub async fn movements_for(
        &self,
        product_id: Uuid,
        location_id: Uuid,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        let movements = StockMovementEntity::find()
            .filter(stock_movement::Column::ProductId.eq(product_id))
            .filter(stock_movement::Column::LocationId.eq(location_id))
            .order_by_asc(stock_movement::Column::OccurredAt)
            .all(&*self.db)
            .await?;
        Ok(movements)
    }
}
