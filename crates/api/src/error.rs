//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ledger::LedgerError;
use saga::CheckoutError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),
    /// The acting user was not identified.
    #[error("{0}")]
    Unauthorized(String),
    /// The acting user may not act on the requested resource.
    #[error("{0}")]
    Forbidden(String),
    /// Checkout failed.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
    /// Purchase history could not be read.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ApiError {
    /// Returns the HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Checkout(err) => checkout_status(err),
            ApiError::Ledger(LedgerError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        metrics::counter!("api_request_errors", "status" => status.as_u16().to_string())
            .increment(1);
        match &self {
            ApiError::Checkout(err) if err.requires_reconciliation() => {
                tracing::error!(error = %err, "checkout needs manual reconciliation");
            }
            _ if status.is_server_error() => {
                tracing::error!(error = %self, %status, "request failed");
            }
            _ => {
                tracing::debug!(error = %self, %status, "request rejected");
            }
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_status(err: &CheckoutError) -> StatusCode {
    match err {
        CheckoutError::CartEmpty(_) | CheckoutError::CartTotalOverflow(_) => {
            StatusCode::BAD_REQUEST
        }
        CheckoutError::PriceMismatch(_) => StatusCode::CONFLICT,
        CheckoutError::InsufficientBalance(_) => StatusCode::PAYMENT_REQUIRED,
        CheckoutError::WalletNotFound(_) => StatusCode::NOT_FOUND,
        CheckoutError::CartUnavailable(_) | CheckoutError::ProductUnavailable { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        CheckoutError::WalletUnavailable(_) | CheckoutError::OrderCreationFailed(_) => {
            StatusCode::BAD_GATEWAY
        }
        CheckoutError::PurchasePersistenceFailed(_)
        | CheckoutError::CompensationFailed { .. }
        | CheckoutError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use common::{ProductId, UserId};
    use saga::GatewayError;

    use super::*;

    #[test]
    fn test_client_errors_map_to_4xx() {
        let user = UserId::new();
        let cases = [
            (CheckoutError::CartEmpty(user), StatusCode::BAD_REQUEST),
            (CheckoutError::CartTotalOverflow(user), StatusCode::BAD_REQUEST),
            (
                CheckoutError::PriceMismatch(ProductId::new(1)),
                StatusCode::CONFLICT,
            ),
            (
                CheckoutError::InsufficientBalance(user),
                StatusCode::PAYMENT_REQUIRED,
            ),
            (CheckoutError::WalletNotFound(user), StatusCode::NOT_FOUND),
        ];

        for (err, expected) in cases {
            assert!(err.is_client_error());
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_collaborator_failures_map_to_5xx() {
        let unavailable = CheckoutError::CartUnavailable(GatewayError::Transport("reset".into()));
        assert_eq!(
            ApiError::from(unavailable).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );

        let order = CheckoutError::OrderCreationFailed(GatewayError::Rejected {
            status: 503,
            body: String::new(),
        });
        assert_eq!(ApiError::from(order).status(), StatusCode::BAD_GATEWAY);

        let compensation = CheckoutError::CompensationFailed {
            source: Box::new(CheckoutError::PurchasePersistenceFailed(
                LedgerError::Unavailable("down".into()),
            )),
            failures: vec!["refund failed".into()],
        };
        assert_eq!(
            ApiError::from(compensation).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_access_errors() {
        assert_eq!(
            ApiError::Unauthorized("missing".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("mismatch".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::Ledger(LedgerError::Unavailable("down".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
