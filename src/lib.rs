//! Procurement workflow engine for a retail inventory.
//!
//! Watches stock levels, asks suppliers for quotes through magic links,
//! ranks their offers, turns the chosen offer into a purchase order and
//! applies incoming deliveries to an append-only stock ledger. Outbound
//! messages ride an outbox consumed by a window/backoff-aware dispatcher.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]

pub mod config;
pub mod db;
pub mod documents;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod messaging;
pub mod migrator;
pub mod services;
pub mod tokens;
pub mod workers;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::AppConfig,
    documents::DocumentRenderer,
    events::EventSender,
    messaging::MessagingGateway,
    services::{
        GoodsReceiptService, NotificationDispatcher, PostCommitTaskService, PurchaseOrderService,
        QuotationRequestService, QuoteRankingService, StockLedgerService, StockMonitorService,
        SupplierQuoteService,
    },
    tokens::{HmacTokenService, MagicLinkService},
};

const STAFF_EMAIL_FALLBACK: &str = "procurement@localhost";

/// Shared state handed to every handler and worker.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: AppConfig,
    pub event_sender: EventSender,
    pub tokens: Arc<dyn MagicLinkService>,
    pub quotation_requests: QuotationRequestService,
    pub supplier_quotes: SupplierQuoteService,
    pub quote_ranking: QuoteRankingService,
    pub purchase_orders: PurchaseOrderService,
    pub goods_receipts: GoodsReceiptService,
    pub stock_ledger: StockLedgerService,
    pub stock_monitor: StockMonitorService,
    pub dispatcher: NotificationDispatcher,
    pub post_commit_tasks: PostCommitTaskService,
}

impl AppState {
    /// Wires the full service graph over one connection pool. The gateway
    /// and renderer are the deployment-specific collaborators; everything
    /// else is owned here.
    pub fn build(
        db: Arc<DatabaseConnection>,
        config: AppConfig,
        event_sender: EventSender,
        gateway: Arc<dyn MessagingGateway>,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> Self {
        let tokens: Arc<dyn MagicLinkService> =
            Arc::new(HmacTokenService::new(config.token_secret.as_bytes()));

        let stock_ledger = StockLedgerService::new(db.clone(), Some(event_sender.clone()));
        let quotation_requests = QuotationRequestService::new(
            db.clone(),
            Some(event_sender.clone()),
            tokens.clone(),
            config.dispatcher.clone(),
            config.portal_base_url.clone(),
        );
        let supplier_quotes = SupplierQuoteService::new(db.clone(), Some(event_sender.clone()));
        let quote_ranking = QuoteRankingService::new(db.clone());
        let purchase_orders = PurchaseOrderService::new(
            db.clone(),
            Some(event_sender.clone()),
            config.dispatcher.clone(),
        );
        let goods_receipts = GoodsReceiptService::new(
            db.clone(),
            Some(event_sender.clone()),
            stock_ledger.clone(),
        );
        let stock_monitor = StockMonitorService::new(
            db.clone(),
            Some(event_sender.clone()),
            quotation_requests.clone(),
            supplier_quotes.clone(),
            config.stock_monitor.clone(),
        );
        let dispatcher = NotificationDispatcher::new(
            db.clone(),
            gateway.clone(),
            config.dispatcher.clone(),
            Some(event_sender.clone()),
            supplier_quotes.clone(),
            purchase_orders.clone(),
        );
        let staff_email = config
            .staff_email
            .clone()
            .unwrap_or_else(|| STAFF_EMAIL_FALLBACK.to_string());
        let post_commit_tasks = PostCommitTaskService::new(
            db.clone(),
            renderer,
            gateway,
            staff_email,
            config.dispatcher.clone(),
        );

        Self {
            db,
            config,
            event_sender,
            tokens,
            quotation_requests,
            supplier_quotes,
            quote_ranking,
            purchase_orders,
            goods_receipts,
            stock_ledger,
            stock_monitor,
            dispatcher,
            post_commit_tasks,
        }
    }
}

/// Builds the application router with its middleware stack.
pub fn app(state: Arc<AppState>) -> Router {
    handlers::routes()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
