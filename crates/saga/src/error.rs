//! Checkout error types.

use std::time::Duration;

use common::{ProductId, UserId};
use ledger::LedgerError;
use thiserror::Error;

/// Failure of a single call to a collaborator service.
///
/// For side-effecting calls (debit, order creation, cart clear) a transient
/// failure means the outcome is unknown: the remote side may have applied
/// the change before the failure was observed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The call did not complete within its deadline.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The request could not be delivered or the connection broke.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The addressed resource does not exist.
    #[error("resource not found")]
    NotFound,

    /// The wallet refused a debit for lack of funds.
    #[error("insufficient funds")]
    InsufficientFunds,

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Returns true if retrying the call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Timeout(_) | GatewayError::Transport(_) => true,
            GatewayError::Rejected { status, .. } => *status >= 500,
            GatewayError::NotFound
            | GatewayError::InsufficientFunds
            | GatewayError::Decode(_) => false,
        }
    }
}

/// Errors surfaced by a checkout attempt.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The user's cart has no lines.
    #[error("Cart is empty for user: {0}")]
    CartEmpty(UserId),

    /// The cart service could not be reached or refused the request.
    #[error("Cart service unavailable: {0}")]
    CartUnavailable(GatewayError),

    /// A captured cart price no longer matches the catalog.
    #[error("Price mismatch for product ID: {0}")]
    PriceMismatch(ProductId),

    /// The cart total cannot be represented.
    #[error("Cart total overflows for user: {0}")]
    CartTotalOverflow(UserId),

    /// A product price could not be fetched.
    #[error("Product {product_id} unavailable: {reason}")]
    ProductUnavailable {
        product_id: ProductId,
        reason: GatewayError,
    },

    /// The wallet balance does not cover the cart total.
    #[error("Insufficient balance for user: {0}")]
    InsufficientBalance(UserId),

    /// The user has no wallet.
    #[error("Wallet with user ID {0} not found")]
    WalletNotFound(UserId),

    /// The wallet service could not be reached or failed.
    #[error("Wallet service unavailable: {0}")]
    WalletUnavailable(GatewayError),

    /// The order service did not create the order.
    #[error("Order creation failed: {0}")]
    OrderCreationFailed(GatewayError),

    /// The purchase could not be written to the local ledger.
    #[error("Purchase could not be recorded: {0}")]
    PurchasePersistenceFailed(#[from] LedgerError),

    /// Compensation did not complete; manual reconciliation is required.
    #[error("{source}; compensation failed: {}", .failures.join("; "))]
    CompensationFailed {
        source: Box<CheckoutError>,
        failures: Vec<String>,
    },

    /// The checkout task itself failed.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CheckoutError {
    /// Returns true for conditions the user can resolve (4xx-equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CheckoutError::CartEmpty(_)
                | CheckoutError::CartTotalOverflow(_)
                | CheckoutError::PriceMismatch(_)
                | CheckoutError::InsufficientBalance(_)
                | CheckoutError::WalletNotFound(_)
        )
    }

    /// Returns true if money or records may be out of sync and need reconciling.
    pub fn requires_reconciliation(&self) -> bool {
        matches!(self, CheckoutError::CompensationFailed { .. })
    }

    /// Returns the failure that started the unwinding.
    pub fn root_cause(&self) -> &CheckoutError {
        match self {
            CheckoutError::CompensationFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
