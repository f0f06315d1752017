use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::{entities::stock_movement, errors::ServiceError, AppState};

#[derive(Debug, Serialize)]
pub struct OnHandResponse {
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub on_hand: rust_decimal::Decimal,
}

async fn on_hand(
    State(state): State<Arc<AppState>>,
    Path((product_id, location_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<OnHandResponse>, ServiceError> {
    let on_hand = state.stock_ledger.on_hand(product_id, location_id).await?;
    Ok(Json(OnHandResponse {
        product_id,
        location_id,
        on_hand,
    }))
}

async fn movements(
    State(state): State<Arc<AppState>>,
    Path((product_id, location_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<stock_movement::Model>>, ServiceError> {
    Ok(Json(
        state
            .stock_ledger
            .movements_for(product_id, location_id)
            .await?,
    ))
}

/// Triggers a monitor pass outside its periodic schedule.
async fn run_monitor(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let report = state.stock_monitor.run().await?;
    Ok(Json(json!({
        "below_threshold": report.below_threshold,
        "skipped_already_requested": report.skipped_already_requested,
        "requests_created": report.requests_created,
        "unprocessable": report
            .unprocessable
            .iter()
            .map(|(product_id, reason)| json!({ "product_id": product_id, "reason": reason }))
            .collect::<Vec<_>>(),
    })))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:product_id/:location_id", get(on_hand))
        .route("/:product_id/:location_id/movements", get(movements))
        .route("/monitor/run", post(run_monitor))
}
