use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use bottega_api::{
    config::AppConfig,
    db,
    documents::PlainTextRenderer,
    events,
    messaging::InMemoryGateway,
    migrator::Migrator,
    services::{
        quotation_requests::NewRequestLine, stock_ledger::StockLedgerService,
        supplier_quotes::ResponseLine,
    },
    AppState,
};

/// Application state over a fresh file-backed SQLite database, with the
/// in-memory gateway so tests can observe every outbound message.
pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<InMemoryGateway>,
    _event_task: tokio::task::JoinHandle<()>,
    _dir: tempfile::TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("bottega_test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());

        let pool = db::establish_connection(&url)
            .await
            .expect("failed to create test database");
        Migrator::up(&pool, None).await.expect("migrations");

        let (event_sender, event_task) = events::channel(256);
        let gateway = Arc::new(InMemoryGateway::new());
        let config = AppConfig::new(url);
        let state = AppState::build(
            Arc::new(pool),
            config,
            event_sender,
            gateway.clone(),
            Arc::new(PlainTextRenderer),
        );

        Self {
            state,
            gateway,
            _event_task: event_task,
            _dir: dir,
        }
    }

    pub async fn seed_supplier(&self, name: &str, email: Option<&str>) -> Uuid {
        seed::supplier(&self.state, name, email, true).await
    }

    pub async fn seed_supplier_with(&self, name: &str, email: Option<&str>, active: bool) -> Uuid {
        seed::supplier(&self.state, name, email, active).await
    }

    pub async fn seed_product(&self, sku: &str, preferred_supplier: Option<Uuid>) -> Uuid {
        seed::product(&self.state, sku, preferred_supplier).await
    }

    /// Creates a request with one line per (product, quantity), opens it,
    /// invites the suppliers and sends it. Returns the request id.
    pub async fn sent_request(
        &self,
        products: &[(Uuid, Decimal)],
        suppliers: &[Uuid],
    ) -> Uuid {
        let lines = products
            .iter()
            .map(|(product_id, quantity)| NewRequestLine {
                product_id: *product_id,
                suggested_quantity: *quantity,
                note: None,
            })
            .collect();
        let request = self
            .state
            .quotation_requests
            .create(Utc::now() + Duration::days(7), None, lines)
            .await
            .expect("create request");
        self.state
            .quotation_requests
            .open(request.id)
            .await
            .expect("open request");
        for supplier_id in suppliers {
            self.state
                .supplier_quotes
                .invite(request.id, *supplier_id)
                .await
                .expect("invite supplier");
        }
        self.state
            .quotation_requests
            .send(request.id)
            .await
            .expect("send request");
        request.id
    }

    /// Runs the dispatcher until quiet so every invitation is delivered and
    /// the quotes move to `Sent`.
    pub async fn deliver_all(&self) {
        loop {
            let summary = self
                .state
                .dispatcher
                .run_due(Utc::now())
                .await
                .expect("dispatch");
            if summary.delivered == 0 && summary.retried == 0 && summary.failed == 0 {
                break;
            }
        }
    }

    /// Responds to the given quote with one line per (product, price, qty).
    pub async fn respond(&self, quote_id: Uuid, lines: &[(Uuid, Decimal, Decimal)]) {
        let lines = lines
            .iter()
            .map(|(product_id, price, quantity)| ResponseLine {
                product_id: *product_id,
                unit_price: *price,
                quantity_available: *quantity,
                lead_time_days: 5,
                note: None,
            })
            .collect();
        self.state
            .supplier_quotes
            .register_response(quote_id, lines)
            .await
            .expect("register response");
    }

    pub fn ledger(&self) -> &StockLedgerService {
        &self.state.stock_ledger
    }
}

pub mod seed {
    use super::*;
    use sea_orm::{ActiveModelTrait, ActiveValue::Set};

    use bottega_api::entities::{product, stock_level, supplier};

    pub async fn supplier(
        state: &AppState,
        name: &str,
        email: Option<&str>,
        active: bool,
    ) -> Uuid {
        let now = Utc::now();
        let model = supplier::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            chat_address: Set(None),
            email_address: Set(email.map(|s| s.to_string())),
            active: Set(active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*state.db)
        .await
        .expect("seed supplier");
        model.id
    }

    pub async fn product(state: &AppState, sku: &str, preferred_supplier: Option<Uuid>) -> Uuid {
        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            sku: Set(sku.to_string()),
            name: Set(format!("Product {}", sku)),
            preferred_supplier_id: Set(preferred_supplier),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*state.db)
        .await
        .expect("seed product");
        model.id
    }

    pub async fn stock_level(
        state: &AppState,
        product_id: Uuid,
        location_id: Uuid,
        on_hand: Decimal,
        threshold: Decimal,
        reorder_quantity: Decimal,
    ) {
        let now = Utc::now();
        stock_level::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            location_id: Set(location_id),
            on_hand: Set(on_hand),
            reorder_threshold: Set(threshold),
            reorder_quantity: Set(reorder_quantity),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*state.db)
        .await
        .expect("seed stock level");
    }
}
