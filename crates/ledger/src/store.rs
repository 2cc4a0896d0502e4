use std::sync::Arc;

use async_trait::async_trait;

use crate::{NewPurchase, OrderId, Page, PaymentStatus, Purchase, PurchaseId, Result, UserId};

/// Core trait for purchase ledger implementations.
///
/// The ledger records one row per successful checkout. All
/// implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait PurchaseLedger: Send + Sync {
    /// Writes a new purchase and returns it with its assigned ID.
    async fn save(&self, purchase: NewPurchase) -> Result<Purchase>;

    /// Deletes a purchase by ID.
    ///
    /// Returns false if no such purchase existed.
    async fn delete(&self, id: PurchaseId) -> Result<bool>;

    /// Deletes every purchase written for an order on behalf of a user.
    ///
    /// Used when compensating a checkout whose ledger write outcome is
    /// unknown. Returns the number of rows removed.
    async fn delete_for_order(&self, order_id: OrderId, user_id: UserId) -> Result<u64>;

    /// Loads a purchase by ID.
    async fn get(&self, id: PurchaseId) -> Result<Option<Purchase>>;

    /// Lists a user's purchases, newest first.
    async fn find_by_user(&self, user_id: UserId, page: Page) -> Result<Vec<Purchase>>;

    /// Counts a user's purchases.
    async fn count_by_user(&self, user_id: UserId) -> Result<u64>;

    /// Lists purchases linked to an order.
    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<Purchase>>;

    /// Lists purchases in a payment status, newest first.
    async fn find_by_status(&self, status: PaymentStatus, page: Page) -> Result<Vec<Purchase>>;

    /// Counts purchases in a payment status.
    async fn count_by_status(&self, status: PaymentStatus) -> Result<u64>;
}

#[async_trait]
impl<T: PurchaseLedger + ?Sized> PurchaseLedger for Arc<T> {
    async fn save(&self, purchase: NewPurchase) -> Result<Purchase> {
        (**self).save(purchase).await
    }

    async fn delete(&self, id: PurchaseId) -> Result<bool> {
        (**self).delete(id).await
    }

    async fn delete_for_order(&self, order_id: OrderId, user_id: UserId) -> Result<u64> {
        (**self).delete_for_order(order_id, user_id).await
    }

    async fn get(&self, id: PurchaseId) -> Result<Option<Purchase>> {
        (**self).get(id).await
    }

    async fn find_by_user(&self, user_id: UserId, page: Page) -> Result<Vec<Purchase>> {
        (**self).find_by_user(user_id, page).await
    }

    async fn count_by_user(&self, user_id: UserId) -> Result<u64> {
        (**self).count_by_user(user_id).await
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<Purchase>> {
        (**self).find_by_order(order_id).await
    }

    async fn find_by_status(&self, status: PaymentStatus, page: Page) -> Result<Vec<Purchase>> {
        (**self).find_by_status(status, page).await
    }

    async fn count_by_status(&self, status: PaymentStatus) -> Result<u64> {
        (**self).count_by_status(status).await
    }
}
