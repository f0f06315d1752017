use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    entities::{goods_receipt, goods_receipt_line},
    errors::ServiceError,
    services::goods_receipts::ReceiptLine,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct ReceiptLinePayload {
    pub order_line_id: Uuid,
    pub quantity: Decimal,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReceivePayload {
    pub order_id: Uuid,
    pub location_id: Uuid,
    pub lines: Vec<ReceiptLinePayload>,
    pub note: Option<String>,
    pub received_by: String,
}

async fn receive(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ReceivePayload>,
) -> Result<Json<goods_receipt::Model>, ServiceError> {
    let lines = payload
        .lines
        .into_iter()
        .map(|l| ReceiptLine {
            order_line_id: l.order_line_id,
            quantity: l.quantity,
            note: l.note,
        })
        .collect();
    let receipt = state
        .goods_receipts
        .receive(
            payload.order_id,
            payload.location_id,
            lines,
            payload.note,
            &payload.received_by,
        )
        .await?;
    Ok(Json(receipt))
}

async fn show(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<goods_receipt::Model>, ServiceError> {
    state
        .goods_receipts
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ServiceError::NotFound(format!("goods receipt {} not found", id)))
}

async fn lines(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<goods_receipt_line::Model>>, ServiceError> {
    Ok(Json(state.goods_receipts.lines(id).await?))
}

async fn for_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Vec<goods_receipt::Model>>, ServiceError> {
    Ok(Json(state.goods_receipts.for_order(order_id).await?))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(receive))
        .route("/:id", get(show))
        .route("/:id/lines", get(lines))
        .route("/order/:order_id", get(for_order))
}
