use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, TransactionTrait,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::StockMonitorConfig,
    entities::{
        product::Entity as ProductEntity,
        quotation_request::{self, Entity as RequestEntity, QuotationRequestStatus},
        quotation_request_line::{self, Entity as RequestLineEntity},
        stock_level::{self, Entity as StockLevelEntity},
        supplier::{self, Entity as SupplierEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        quotation_requests::{NewRequestLine, QuotationRequestService},
        supplier_quotes::SupplierQuoteService,
    },
};

/// A product/location below its reorder threshold.
#[derive(Debug, Clone)]
pub struct ShortfallEntry {
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub on_hand: Decimal,
    pub threshold: Decimal,
    pub reorder_quantity: Decimal,
}

/// Outcome of one monitor run. Unprocessable products are reported, never
/// silently dropped.
#[derive(Debug, Default)]
pub struct MonitorReport {
    pub below_threshold: usize,
    pub skipped_already_requested: usize,
    pub requests_created: Vec<Uuid>,
    pub unprocessable: Vec<(Uuid, String)>,
}

/// Periodic scan that turns stock shortfalls into quotation requests.
///
/// One transaction per run: a crash mid-scan leaves either all newly
/// created requests or none, never partial duplicates.
#[derive(Clone)]
pub struct StockMonitorService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
    requests: QuotationRequestService,
    quotes: SupplierQuoteService,
    config: StockMonitorConfig,
}

impl StockMonitorService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Option<EventSender>,
        requests: QuotationRequestService,
        quotes: SupplierQuoteService,
        config: StockMonitorConfig,
    ) -> Self {
        Self {
            db,
            event_sender,
            requests,
            quotes,
            config,
        }
    }

    /// Scans every stock row with an enabled threshold and returns those
    /// below it. Rows with a zero threshold are unmonitored.
    pub async fn detect_below_threshold(&self) -> Result<Vec<ShortfallEntry>, ServiceError> {
        let levels = StockLevelEntity::find()
            .filter(stock_level::Column::ReorderThreshold.gt(Decimal::ZERO))
            .all(&*self.db)
            .await?;
        Ok(levels
            .into_iter()
            .filter(|l| l.is_below_threshold())
            .map(|l| ShortfallEntry {
                product_id: l.product_id,
                location_id: l.location_id,
                on_hand: l.on_hand,
                threshold: l.reorder_threshold,
                reorder_quantity: if l.reorder_quantity > Decimal::ZERO {
                    l.reorder_quantity
                } else {
                    l.reorder_threshold - l.on_hand
                },
            })
            .collect())
    }

    /// Full monitor pass: detect shortfalls, drop products that already sit
    /// on an Open/Sent request, group the rest by preferred supplier and
    /// create one request per group inside a single transaction.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<MonitorReport, ServiceError> {
        let shortfalls = self.detect_below_threshold().await?;
        let mut report = MonitorReport {
            below_threshold: shortfalls.len(),
            ..MonitorReport::default()
        };
        if shortfalls.is_empty() {
            return Ok(report);
        }

        for entry in &shortfalls {
            if let Some(sender) = &self.event_sender {
                sender
                    .send_or_log(Event::StockBelowThreshold {
                        product_id: entry.product_id,
                        location_id: entry.location_id,
                        on_hand: entry.on_hand,
                        threshold: entry.threshold,
                    })
                    .await;
            }
        }

        let db = &*self.db;
        let txn = db.begin().await?;

        let already_requested = self.products_on_running_requests(&txn).await?;
        let active_suppliers = SupplierEntity::find()
            .filter(supplier::Column::Active.eq(true))
            .all(&txn)
            .await?;
        let active_ids: HashSet<Uuid> = active_suppliers.iter().map(|s| s.id).collect();

        // Group shortfall products by preferred supplier; products without
        // one share the "none" group and go out to every active supplier.
        let mut groups: BTreeMap<Option<Uuid>, Vec<&ShortfallEntry>> = BTreeMap::new();
        for entry in &shortfalls {
            if already_requested.contains(&entry.product_id) {
                report.skipped_already_requested += 1;
                continue;
            }
            let product = ProductEntity::find_by_id(entry.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("product {} not found", entry.product_id))
                })?;
            if !product.active {
                self.report_unprocessable(
                    &mut report,
                    entry.product_id,
                    "product is inactive".to_string(),
                )
                .await;
                continue;
            }
            let group_key = match product.preferred_supplier_id {
                Some(supplier_id) if active_ids.contains(&supplier_id) => Some(supplier_id),
                Some(supplier_id) => {
                    self.report_unprocessable(
                        &mut report,
                        entry.product_id,
                        format!("preferred supplier {} is inactive", supplier_id),
                    )
                    .await;
                    continue;
                }
                None if active_suppliers.is_empty() => {
                    self.report_unprocessable(
                        &mut report,
                        entry.product_id,
                        "no preferred supplier and no active supplier to invite".to_string(),
                    )
                    .await;
                    continue;
                }
                None => None,
            };
            groups.entry(group_key).or_default().push(entry);
        }

        let expires_at = Utc::now() + Duration::days(self.config.request_validity_days);
        for (group, entries) in &groups {
            let lines = entries
                .iter()
                .map(|e| NewRequestLine {
                    product_id: e.product_id,
                    suggested_quantity: e.reorder_quantity,
                    note: None,
                })
                .collect();
            let request = self
                .requests
                .create_in(&txn, expires_at, Some("stock monitor".to_string()), lines)
                .await?;
            // Straight to Open so the next scan's dedup query sees it.
            let mut active: quotation_request::ActiveModel = request.clone().into();
            active.status = Set(QuotationRequestStatus::Open);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?;

            match group {
                Some(supplier_id) => {
                    self.quotes.invite_in(&txn, request.id, *supplier_id).await?;
                }
                None => {
                    for s in &active_suppliers {
                        self.quotes.invite_in(&txn, request.id, s.id).await?;
                    }
                }
            }
            report.requests_created.push(request.id);
        }

        txn.commit().await?;

        if !report.requests_created.is_empty() || !report.unprocessable.is_empty() {
            info!(
                below_threshold = report.below_threshold,
                created = report.requests_created.len(),
                skipped = report.skipped_already_requested,
                unprocessable = report.unprocessable.len(),
                "stock monitor run completed"
            );
        }
        Ok(report)
    }

    async fn report_unprocessable(
        &self,
        report: &mut MonitorReport,
        product_id: Uuid,
        reason: String,
    ) {
        warn!(%product_id, "product unprocessable: {}", reason);
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::ProductUnprocessable {
                    product_id,
                    reason: reason.clone(),
                })
                .await;
        }
        report.unprocessable.push((product_id, reason));
    }

    /// Products already covered by a line of any Open or Sent request.
    async fn products_on_running_requests(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<HashSet<Uuid>, ServiceError> {
        let running: Vec<Uuid> = RequestEntity::find()
            .filter(
                quotation_request::Column::Status
                    .is_in([QuotationRequestStatus::Open, QuotationRequestStatus::Sent]),
            )
            .all(txn)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();
        if running.is_empty() {
            return Ok(HashSet::new());
        }
        let lines = RequestLineEntity::find()
            .filter(quotation_request_line::Column::RequestId.is_in(running))
            .all(txn)
            .await?;
        Ok(lines.into_iter().map(|l| l.product_id).collect())
    }
}
