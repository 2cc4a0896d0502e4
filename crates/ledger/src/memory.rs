use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    LedgerError, NewPurchase, OrderId, Page, PaymentStatus, Purchase, PurchaseId, Result, UserId,
    store::PurchaseLedger,
};

/// How the in-memory ledger should misbehave on the next save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SaveFailure {
    #[default]
    None,
    /// Reject the write outright.
    Reject,
    /// Store the row, then report an error as if the acknowledgement was lost.
    AfterWrite,
}

#[derive(Debug, Default)]
struct LedgerState {
    purchases: BTreeMap<PurchaseId, Purchase>,
    next_id: i64,
    save_failure: SaveFailure,
    fail_on_delete: bool,
}

/// In-memory purchase ledger.
///
/// Provides the same interface as the PostgreSQL implementation and is used
/// for tests and for running the service without a database.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPurchaseLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryPurchaseLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent saves fail without writing anything.
    pub async fn set_fail_on_save(&self, fail: bool) {
        self.state.write().await.save_failure = if fail {
            SaveFailure::Reject
        } else {
            SaveFailure::None
        };
    }

    /// Makes subsequent saves write the row and then fail.
    pub async fn set_fail_after_save(&self, fail: bool) {
        self.state.write().await.save_failure = if fail {
            SaveFailure::AfterWrite
        } else {
            SaveFailure::None
        };
    }

    /// Makes subsequent deletes fail.
    pub async fn set_fail_on_delete(&self, fail: bool) {
        self.state.write().await.fail_on_delete = fail;
    }

    /// Returns the number of stored purchases.
    pub async fn purchase_count(&self) -> usize {
        self.state.read().await.purchases.len()
    }

    /// Returns every stored purchase in ID order.
    pub async fn all(&self) -> Vec<Purchase> {
        self.state.read().await.purchases.values().cloned().collect()
    }
}

fn newest_first(mut purchases: Vec<Purchase>, page: Page) -> Vec<Purchase> {
    purchases.sort_by(|a, b| {
        b.transaction_date
            .cmp(&a.transaction_date)
            .then(b.id.cmp(&a.id))
    });
    purchases
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.size as usize)
        .collect()
}

#[async_trait]
impl PurchaseLedger for InMemoryPurchaseLedger {
    async fn save(&self, purchase: NewPurchase) -> Result<Purchase> {
        let mut state = self.state.write().await;

        if state.save_failure == SaveFailure::Reject {
            return Err(LedgerError::Unavailable("write rejected".to_string()));
        }

        state.next_id += 1;
        let id = PurchaseId::new(state.next_id);
        let stored = purchase.into_purchase(id);
        state.purchases.insert(id, stored.clone());

        if state.save_failure == SaveFailure::AfterWrite {
            return Err(LedgerError::Unavailable(
                "write acknowledgement lost".to_string(),
            ));
        }

        Ok(stored)
    }

    async fn delete(&self, id: PurchaseId) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.fail_on_delete {
            return Err(LedgerError::Unavailable("delete rejected".to_string()));
        }
        Ok(state.purchases.remove(&id).is_some())
    }

    async fn delete_for_order(&self, order_id: OrderId, user_id: UserId) -> Result<u64> {
        let mut state = self.state.write().await;
        if state.fail_on_delete {
            return Err(LedgerError::Unavailable("delete rejected".to_string()));
        }
        let before = state.purchases.len();
        state
            .purchases
            .retain(|_, p| !(p.order_id == order_id && p.user_id == user_id));
        Ok((before - state.purchases.len()) as u64)
    }

    async fn get(&self, id: PurchaseId) -> Result<Option<Purchase>> {
        Ok(self.state.read().await.purchases.get(&id).cloned())
    }

    async fn find_by_user(&self, user_id: UserId, page: Page) -> Result<Vec<Purchase>> {
        let state = self.state.read().await;
        let matching = state
            .purchases
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(matching, page))
    }

    async fn count_by_user(&self, user_id: UserId) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state
            .purchases
            .values()
            .filter(|p| p.user_id == user_id)
            .count() as u64)
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<Purchase>> {
        let state = self.state.read().await;
        Ok(state
            .purchases
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn find_by_status(&self, status: PaymentStatus, page: Page) -> Result<Vec<Purchase>> {
        let state = self.state.read().await;
        let matching = state
            .purchases
            .values()
            .filter(|p| p.payment_status == status)
            .cloned()
            .collect();
        Ok(newest_first(matching, page))
    }

    async fn count_by_status(&self, status: PaymentStatus) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state
            .purchases
            .values()
            .filter(|p| p.payment_status == status)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;

    fn pending(order: i64, user: UserId) -> NewPurchase {
        NewPurchase::pending(OrderId::new(order), user, Money::from_cents(2500))
    }

    #[tokio::test]
    async fn test_save_assigns_sequential_ids() {
        let ledger = InMemoryPurchaseLedger::new();
        let user = UserId::new();

        let first = ledger.save(pending(1, user)).await.unwrap();
        let second = ledger.save(pending(2, user)).await.unwrap();

        assert_eq!(first.id, PurchaseId::new(1));
        assert_eq!(second.id, PurchaseId::new(2));
        assert_eq!(ledger.purchase_count().await, 2);
        assert_eq!(ledger.get(first.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_delete() {
        let ledger = InMemoryPurchaseLedger::new();
        let saved = ledger.save(pending(1, UserId::new())).await.unwrap();

        assert!(ledger.delete(saved.id).await.unwrap());
        assert!(!ledger.delete(saved.id).await.unwrap());
        assert_eq!(ledger.purchase_count().await, 0);
    }

    #[tokio::test]
    async fn test_delete_for_order_only_touches_matching_user() {
        let ledger = InMemoryPurchaseLedger::new();
        let alice = UserId::new();
        let bob = UserId::new();
        ledger.save(pending(7, alice)).await.unwrap();
        ledger.save(pending(7, bob)).await.unwrap();

        let removed = ledger.delete_for_order(OrderId::new(7), alice).await.unwrap();

        assert_eq!(removed, 1);
        assert_eq!(ledger.count_by_user(alice).await.unwrap(), 0);
        assert_eq!(ledger.count_by_user(bob).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fail_on_save_writes_nothing() {
        let ledger = InMemoryPurchaseLedger::new();
        ledger.set_fail_on_save(true).await;

        let result = ledger.save(pending(1, UserId::new())).await;

        assert!(matches!(result, Err(LedgerError::Unavailable(_))));
        assert_eq!(ledger.purchase_count().await, 0);
    }

    #[tokio::test]
    async fn test_fail_after_save_leaves_row_behind() {
        let ledger = InMemoryPurchaseLedger::new();
        ledger.set_fail_after_save(true).await;

        let result = ledger.save(pending(1, UserId::new())).await;

        assert!(result.is_err());
        assert_eq!(ledger.purchase_count().await, 1);
    }

    #[tokio::test]
    async fn test_find_by_user_pages_newest_first() {
        let ledger = InMemoryPurchaseLedger::new();
        let user = UserId::new();
        for order in 1..=5 {
            ledger.save(pending(order, user)).await.unwrap();
        }
        ledger.save(pending(99, UserId::new())).await.unwrap();

        let first_page = ledger.find_by_user(user, Page::new(0, 2)).await.unwrap();
        let last_page = ledger.find_by_user(user, Page::new(2, 2)).await.unwrap();

        assert_eq!(first_page.len(), 2);
        assert!(first_page[0].id > first_page[1].id);
        assert_eq!(last_page.len(), 1);
        assert_eq!(ledger.count_by_user(user).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_find_by_order_and_status() {
        let ledger = InMemoryPurchaseLedger::new();
        let user = UserId::new();
        ledger.save(pending(1, user)).await.unwrap();
        let mut completed = pending(2, user);
        completed.payment_status = PaymentStatus::Completed;
        ledger.save(completed).await.unwrap();

        assert_eq!(ledger.find_by_order(OrderId::new(1)).await.unwrap().len(), 1);
        assert_eq!(
            ledger
                .count_by_status(PaymentStatus::Pending)
                .await
                .unwrap(),
            1
        );
        let completed = ledger
            .find_by_status(PaymentStatus::Completed, Page::default())
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].order_id, OrderId::new(2));
    }
}
