//! Purchase checkout and history endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use common::UserId;
use ledger::{Page, Purchase, PurchaseLedger};
use saga::PurchaseReceipt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

/// Header carrying the authenticated user, set by the upstream gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

const DEFAULT_PAGE_SIZE: u32 = 20;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseHistoryResponse {
    pub content: Vec<Purchase>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
}

// -- Handlers --

/// POST /api/purchases/{userId}: check out the user's cart.
///
/// The saga runs on its own task, so it still reaches a terminal state if
/// the client goes away before the response is written.
#[tracing::instrument(skip(state, headers))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<PurchaseReceipt>, ApiError> {
    let user_id = authorize(&user_id, &headers)?;
    let receipt = state
        .orchestrator()
        .create_purchase_detached(user_id, state.checkouts())
        .await?;
    Ok(Json(receipt))
}

/// GET /api/purchases/{userId}?page=&size=: the user's purchases, newest first.
#[tracing::instrument(skip(state, headers))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<PageParams>,
    headers: HeaderMap,
) -> Result<Json<PurchaseHistoryResponse>, ApiError> {
    let user_id = authorize(&user_id, &headers)?;
    let page = Page::new(
        params.page.unwrap_or(0),
        params.size.unwrap_or(DEFAULT_PAGE_SIZE),
    );

    let content = state.ledger().find_by_user(user_id, page).await?;
    let total_elements = state.ledger().count_by_user(user_id).await?;

    Ok(Json(PurchaseHistoryResponse {
        content,
        page: page.number,
        size: page.size,
        total_elements,
    }))
}

/// Resolves the path user and checks it against the acting user.
fn authorize(path_user: &str, headers: &HeaderMap) -> Result<UserId, ApiError> {
    let user_id = parse_user_id(path_user)
        .map_err(|e| ApiError::BadRequest(format!("Invalid user ID: {e}")))?;

    let acting = headers
        .get(USER_ID_HEADER)
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing {USER_ID_HEADER} header")))?
        .to_str()
        .map_err(|e| e.to_string())
        .and_then(|value| parse_user_id(value).map_err(|e| e.to_string()))
        .map_err(|e| ApiError::Unauthorized(format!("Invalid {USER_ID_HEADER} header: {e}")))?;

    if acting != user_id {
        tracing::warn!(%acting, requested = %user_id, "user attempted to act for another user");
        return Err(ApiError::Forbidden(
            "Cannot act on behalf of another user".to_string(),
        ));
    }
    Ok(user_id)
}

fn parse_user_id(value: &str) -> Result<UserId, uuid::Error> {
    Uuid::parse_str(value.trim()).map(UserId::from_uuid)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers_for(user: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(user).unwrap());
        headers
    }

    #[test]
    fn test_matching_user_is_authorized() {
        let user = UserId::new();
        let result = authorize(&user.to_string(), &headers_for(&user.to_string()));
        assert_eq!(result.unwrap(), user);
    }

    #[test]
    fn test_other_user_is_forbidden() {
        let user = UserId::new();
        let result = authorize(&user.to_string(), &headers_for(&UserId::new().to_string()));
        assert!(matches!(result, Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn test_missing_or_malformed_header_is_unauthorized() {
        let user = UserId::new().to_string();
        assert!(matches!(
            authorize(&user, &HeaderMap::new()),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            authorize(&user, &headers_for("someone")),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_malformed_path_user_is_bad_request() {
        let result = authorize("not-a-uuid", &headers_for(&UserId::new().to_string()));
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
