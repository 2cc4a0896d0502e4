//! Shared types for the purchase checkout services.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{OrderId, ProductId, PurchaseId, SagaId, UserId};
