//! Purchase records and their payment status.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, PurchaseId, UserId};
use serde::{Deserialize, Serialize};

use crate::LedgerError;

/// Default free-text detail attached to purchases created at checkout.
pub const DEFAULT_DETAILS: &str = "Payment via wallet";

/// Payment status of a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Wallet debited and order created; settlement not yet confirmed.
    #[default]
    Pending,
    /// Payment settled.
    Completed,
    /// Payment failed after the purchase was recorded.
    Failed,
}

impl PaymentStatus {
    /// Returns the status as stored in the ledger.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "COMPLETED" => Ok(PaymentStatus::Completed),
            "FAILED" => Ok(PaymentStatus::Failed),
            other => Err(LedgerError::UnknownStatus(other.to_string())),
        }
    }
}

/// A purchase as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: PurchaseId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub payment_status: PaymentStatus,
    /// Amount debited from the wallet for this purchase.
    pub total_amount: Money,
    pub transaction_date: DateTime<Utc>,
    pub details: Option<String>,
}

/// A purchase that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPurchase {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub payment_status: PaymentStatus,
    pub total_amount: Money,
    pub transaction_date: DateTime<Utc>,
    pub details: Option<String>,
}

impl NewPurchase {
    /// Creates a pending purchase stamped with the current time.
    pub fn pending(order_id: OrderId, user_id: UserId, total_amount: Money) -> Self {
        Self {
            order_id,
            user_id,
            payment_status: PaymentStatus::Pending,
            total_amount,
            transaction_date: Utc::now(),
            details: Some(DEFAULT_DETAILS.to_string()),
        }
    }

    /// Sets the free-text details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Attaches the ledger-assigned identifier.
    pub fn into_purchase(self, id: PurchaseId) -> Purchase {
        Purchase {
            id,
            order_id: self.order_id,
            user_id: self.user_id,
            payment_status: self.payment_status,
            total_amount: self.total_amount,
            transaction_date: self.transaction_date,
            details: self.details,
        }
    }
}

/// Zero-based page request for listing purchases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    /// Largest page size a caller may request.
    pub const MAX_SIZE: u32 = 100;

    /// Creates a page request, clamping the size to `1..=MAX_SIZE`.
    pub fn new(number: u32, size: u32) -> Self {
        Self {
            number,
            size: size.clamp(1, Self::MAX_SIZE),
        }
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.number) * u64::from(self.size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, 20)
    }
}
