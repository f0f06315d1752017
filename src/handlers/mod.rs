pub mod goods_receipts;
pub mod health;
pub mod purchase_orders;
pub mod quotation_requests;
pub mod stock;
pub mod supplier_portal;

use axum::Router;
use std::sync::Arc;

use crate::AppState;

/// Assembles the full API surface.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health::routes())
        .nest("/quotation-requests", quotation_requests::routes())
        .nest("/purchase-orders", purchase_orders::routes())
        .nest("/goods-receipts", goods_receipts::routes())
        .nest("/stock", stock::routes())
        .nest("/portal", supplier_portal::routes())
}
