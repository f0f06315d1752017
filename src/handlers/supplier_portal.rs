//! Magic-link portal: the only surface an unauthenticated supplier can
//! reach. The token in the path is the capability; it resolves to exactly
//! one supplier quote or to nothing.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    entities::supplier_quote, errors::ServiceError,
    services::supplier_quotes::ResponseLine, AppState,
};

#[derive(Debug, Deserialize)]
pub struct ResponseLinePayload {
    pub product_id: Uuid,
    pub unit_price: Decimal,
    pub quantity_available: Decimal,
    pub lead_time_days: i32,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePayload {
    pub lines: Vec<ResponseLinePayload>,
}

#[derive(Debug, Deserialize)]
pub struct RejectionPayload {
    pub reason: String,
}

/// What the supplier sees when opening their link: the quote plus the
/// requested lines they are asked to price.
async fn show(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let quote_id = state.tokens.resolve(&token)?;
    let quote = state
        .supplier_quotes
        .get(quote_id)
        .await?
        .ok_or_else(|| ServiceError::InvalidToken("quote no longer exists".to_string()))?;
    let requested = state.quotation_requests.lines(quote.request_id).await?;
    Ok(Json(json!({
        "quote": quote,
        "requested_lines": requested,
    })))
}

async fn respond(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Json(payload): Json<ResponsePayload>,
) -> Result<Json<supplier_quote::Model>, ServiceError> {
    let quote_id = state.tokens.resolve(&token)?;
    let lines = payload
        .lines
        .into_iter()
        .map(|l| ResponseLine {
            product_id: l.product_id,
            unit_price: l.unit_price,
            quantity_available: l.quantity_available,
            lead_time_days: l.lead_time_days,
            note: l.note,
        })
        .collect();
    Ok(Json(
        state.supplier_quotes.register_response(quote_id, lines).await?,
    ))
}

async fn reject(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Json(payload): Json<RejectionPayload>,
) -> Result<Json<supplier_quote::Model>, ServiceError> {
    let quote_id = state.tokens.resolve(&token)?;
    Ok(Json(
        state
            .supplier_quotes
            .register_rejection(quote_id, payload.reason)
            .await?,
    ))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/quotes/:token", get(show))
        .route("/quotes/:token/response", post(respond))
        .route("/quotes/:token/rejection", post(reject))
}
