//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use ledger::{PaymentStatus, PurchaseLedger};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ledger: &'static str,
}

/// GET /health: reports whether the purchase ledger can be queried.
pub async fn check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    match state.ledger().count_by_status(PaymentStatus::Pending).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                ledger: "up",
            }),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "ledger health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    ledger: "down",
                }),
            )
        }
    }
}
