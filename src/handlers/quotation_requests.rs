use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    entities::{
        quotation_request, quotation_request_line, supplier_quote,
        quotation_request::QuotationRequestStatus,
    },
    errors::ServiceError,
    services::quotation_requests::NewRequestLine,
    services::quote_ranking::QuoteRankEntry,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateRequestLine {
    pub product_id: Uuid,
    pub suggested_quantity: Decimal,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRequestPayload {
    pub expires_at: DateTime<Utc>,
    pub note: Option<String>,
    pub lines: Vec<CreateRequestLine>,
}

#[derive(Debug, Deserialize)]
pub struct InvitePayload {
    pub supplier_id: Uuid,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub status: Option<QuotationRequestStatus>,
}

async fn create(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRequestPayload>,
) -> Result<Json<quotation_request::Model>, ServiceError> {
    let lines = payload
        .lines
        .into_iter()
        .map(|l| NewRequestLine {
            product_id: l.product_id,
            suggested_quantity: l.suggested_quantity,
            note: l.note,
        })
        .collect();
    let request = state
        .quotation_requests
        .create(payload.expires_at, payload.note, lines)
        .await?;
    Ok(Json(request))
}

async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<quotation_request::Model>>, ServiceError> {
    let status = query.status.unwrap_or(QuotationRequestStatus::Open);
    Ok(Json(state.quotation_requests.list_by_status(status).await?))
}

async fn show(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<quotation_request::Model>, ServiceError> {
    state
        .quotation_requests
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ServiceError::NotFound(format!("quotation request {} not found", id)))
}

async fn lines(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<quotation_request_line::Model>>, ServiceError> {
    Ok(Json(state.quotation_requests.lines(id).await?))
}

async fn open(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<quotation_request::Model>, ServiceError> {
    Ok(Json(state.quotation_requests.open(id).await?))
}

async fn send(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<quotation_request::Model>, ServiceError> {
    Ok(Json(state.quotation_requests.send(id).await?))
}

async fn close(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<quotation_request::Model>, ServiceError> {
    Ok(Json(state.quotation_requests.close(id).await?))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<quotation_request::Model>, ServiceError> {
    Ok(Json(state.quotation_requests.cancel(id).await?))
}

async fn invite(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<InvitePayload>,
) -> Result<Json<supplier_quote::Model>, ServiceError> {
    Ok(Json(
        state.supplier_quotes.invite(id, payload.supplier_id).await?,
    ))
}

async fn quotes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<supplier_quote::Model>>, ServiceError> {
    Ok(Json(state.supplier_quotes.for_request(id).await?))
}

async fn ranking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<QuoteRankEntry>>, ServiceError> {
    Ok(Json(state.quote_ranking.rank_request(id).await?))
}

async fn resend_quote(
    State(state): State<Arc<AppState>>,
    Path(quote_id): Path<Uuid>,
) -> Result<Json<supplier_quote::Model>, ServiceError> {
    Ok(Json(state.supplier_quotes.resend(quote_id).await?))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create).get(list))
        .route("/:id", get(show))
        .route("/:id/lines", get(lines))
        .route("/:id/open", post(open))
        .route("/:id/send", post(send))
        .route("/:id/close", post(close))
        .route("/:id/cancel", post(cancel))
        .route("/:id/invitations", post(invite))
        .route("/:id/quotes", get(quotes))
        .route("/:id/ranking", get(ranking))
        .route("/quotes/:id/resend", post(resend_quote))
}
