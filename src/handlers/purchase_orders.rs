use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    entities::{
        outbound_notification, post_commit_task, purchase_order,
        purchase_order::PurchaseOrderStatus, purchase_order_line,
    },
    errors::ServiceError,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct GeneratePayload {
    pub quote_id: Uuid,
    /// Supplier-declared total, only used when the quote has no lines
    pub declared_total: Option<Decimal>,
    pub note: Option<String>,
    pub actor: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub status: Option<PurchaseOrderStatus>,
}

async fn generate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GeneratePayload>,
) -> Result<Json<purchase_order::Model>, ServiceError> {
    let order = state
        .purchase_orders
        .generate_from_quote(
            payload.quote_id,
            payload.declared_total,
            payload.note,
            &payload.actor,
        )
        .await?;
    Ok(Json(order))
}

async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<purchase_order::Model>>, ServiceError> {
    let status = query.status.unwrap_or(PurchaseOrderStatus::Sent);
    Ok(Json(state.purchase_orders.list_by_status(status).await?))
}

async fn show(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<purchase_order::Model>, ServiceError> {
    state
        .purchase_orders
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ServiceError::NotFound(format!("purchase order {} not found", id)))
}

async fn lines(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<purchase_order_line::Model>>, ServiceError> {
    Ok(Json(state.purchase_orders.lines(id).await?))
}

async fn confirm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<purchase_order::Model>, ServiceError> {
    Ok(Json(state.purchase_orders.mark_confirmed(id).await?))
}

/// Delivery trail: every notification the dispatcher holds for this order.
async fn notifications(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<outbound_notification::Model>>, ServiceError> {
    Ok(Json(
        state
            .dispatcher
            .for_target(
                outbound_notification::NotificationTargetKind::PurchaseOrder,
                id,
            )
            .await?,
    ))
}

/// Post-commit side-effect trail for operators replaying failed tasks.
async fn tasks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<post_commit_task::Model>>, ServiceError> {
    Ok(Json(state.post_commit_tasks.for_order(id).await?))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(generate).get(list))
        .route("/:id", get(show))
        .route("/:id/lines", get(lines))
        .route("/:id/confirm", post(confirm))
        .route("/:id/notifications", get(notifications))
        .route("/:id/tasks", get(tasks))
}
