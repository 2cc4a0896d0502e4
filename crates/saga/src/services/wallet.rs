//! Wallet gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, UserId};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// A user's wallet as reported by the wallet service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub user_id: UserId,
    pub balance: Money,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Trait for wallet operations.
///
/// Debit and credit are atomic at the wallet service. The orchestrator never
/// writes a balance it has read; it only asks the wallet to move money.
#[async_trait]
pub trait WalletGateway: Send + Sync {
    /// Reads the user's wallet.
    async fn get_balance(&self, user_id: UserId) -> Result<Wallet, GatewayError>;

    /// Debits a strictly positive amount.
    ///
    /// Fails with [`GatewayError::InsufficientFunds`] if the balance does not cover it.
    async fn debit(&self, user_id: UserId, amount: Money) -> Result<(), GatewayError>;

    /// Credits a strictly positive amount back to the wallet.
    async fn credit(&self, user_id: UserId, amount: Money) -> Result<(), GatewayError>;
}

#[async_trait]
impl<T: WalletGateway + ?Sized> WalletGateway for Arc<T> {
    async fn get_balance(&self, user_id: UserId) -> Result<Wallet, GatewayError> {
        (**self).get_balance(user_id).await
    }

    async fn debit(&self, user_id: UserId, amount: Money) -> Result<(), GatewayError> {
        (**self).debit(user_id, amount).await
    }

    async fn credit(&self, user_id: UserId, amount: Money) -> Result<(), GatewayError> {
        (**self).credit(user_id, amount).await
    }
}

#[derive(Debug, Default)]
struct InMemoryWalletState {
    balances: HashMap<UserId, Money>,
    debits: Vec<(UserId, Money)>,
    credits: Vec<(UserId, Money)>,
    fail_on_get: bool,
    fail_on_debit: bool,
    debit_times_out: bool,
    failing_credits: u32,
}

/// In-memory wallet service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWalletService {
    state: Arc<RwLock<InMemoryWalletState>>,
}

impl InMemoryWalletService {
    /// Creates a new in-memory wallet service.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> RwLockWriteGuard<'_, InMemoryWalletState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens (or overwrites) a wallet with the given balance.
    pub fn set_balance(&self, user_id: UserId, balance: Money) {
        self.state().balances.insert(user_id, balance);
    }

    /// Returns the current balance, if the wallet exists.
    pub fn balance(&self, user_id: UserId) -> Option<Money> {
        self.state().balances.get(&user_id).copied()
    }

    /// Configures get_balance calls to fail with a transport error.
    pub fn set_fail_on_get(&self, fail: bool) {
        self.state().fail_on_get = fail;
    }

    /// Configures debit calls to fail without moving money.
    pub fn set_fail_on_debit(&self, fail: bool) {
        self.state().fail_on_debit = fail;
    }

    /// Configures debit calls to apply the debit and then report a timeout.
    pub fn set_debit_times_out(&self, times_out: bool) {
        self.state().debit_times_out = times_out;
    }

    /// Makes the next `count` credit calls fail.
    pub fn fail_next_credits(&self, count: u32) {
        self.state().failing_credits = count;
    }

    /// Returns every applied debit.
    pub fn debits(&self) -> Vec<(UserId, Money)> {
        self.state().debits.clone()
    }

    /// Returns every applied credit.
    pub fn credits(&self) -> Vec<(UserId, Money)> {
        self.state().credits.clone()
    }
}

fn require_positive(amount: Money) -> Result<(), GatewayError> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(GatewayError::Rejected {
            status: 400,
            body: format!("amount must be positive, got {amount}"),
        })
    }
}

#[async_trait]
impl WalletGateway for InMemoryWalletService {
    async fn get_balance(&self, user_id: UserId) -> Result<Wallet, GatewayError> {
        let state = self.state();
        if state.fail_on_get {
            return Err(GatewayError::Transport("wallet service down".to_string()));
        }
        state
            .balances
            .get(&user_id)
            .map(|balance| Wallet {
                user_id,
                balance: *balance,
                updated_at: None,
            })
            .ok_or(GatewayError::NotFound)
    }

    async fn debit(&self, user_id: UserId, amount: Money) -> Result<(), GatewayError> {
        require_positive(amount)?;
        let mut state = self.state();

        if state.fail_on_debit {
            return Err(GatewayError::Rejected {
                status: 400,
                body: "debit rejected".to_string(),
            });
        }

        let balance = state
            .balances
            .get_mut(&user_id)
            .ok_or(GatewayError::NotFound)?;
        if *balance < amount {
            return Err(GatewayError::InsufficientFunds);
        }
        *balance -= amount;
        state.debits.push((user_id, amount));

        if state.debit_times_out {
            return Err(GatewayError::Timeout(Duration::from_secs(5)));
        }
        Ok(())
    }

    async fn credit(&self, user_id: UserId, amount: Money) -> Result<(), GatewayError> {
        require_positive(amount)?;
        let mut state = self.state();

        if state.failing_credits > 0 {
            state.failing_credits -= 1;
            return Err(GatewayError::Transport("wallet service down".to_string()));
        }

        let balance = state
            .balances
            .get_mut(&user_id)
            .ok_or(GatewayError::NotFound)?;
        *balance += amount;
        state.credits.push((user_id, amount));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_deserializes_wire_format() {
        let json = r#"{
            "userId": "6f1c2b1e-8f0e-4c51-9a55-3f7f4c2a9d10",
            "balance": 30.00,
            "updatedAt": "2024-03-01T10:00:00Z"
        }"#;
        let wallet: Wallet = serde_json::from_str(json).unwrap();
        assert_eq!(wallet.balance, Money::from_cents(3000));
        assert!(wallet.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_debit_and_credit() {
        let service = InMemoryWalletService::new();
        let user = UserId::new();
        service.set_balance(user, Money::from_cents(3000));

        service.debit(user, Money::from_cents(2500)).await.unwrap();
        assert_eq!(service.balance(user), Some(Money::from_cents(500)));

        service.credit(user, Money::from_cents(2500)).await.unwrap();
        assert_eq!(service.balance(user), Some(Money::from_cents(3000)));
        assert_eq!(service.debits().len(), 1);
        assert_eq!(service.credits().len(), 1);
    }

    #[tokio::test]
    async fn test_debit_rejects_insufficient_funds() {
        let service = InMemoryWalletService::new();
        let user = UserId::new();
        service.set_balance(user, Money::from_cents(2000));

        let result = service.debit(user, Money::from_cents(2500)).await;

        assert_eq!(result, Err(GatewayError::InsufficientFunds));
        assert_eq!(service.balance(user), Some(Money::from_cents(2000)));
    }

    #[tokio::test]
    async fn test_amounts_must_be_positive() {
        let service = InMemoryWalletService::new();
        let user = UserId::new();
        service.set_balance(user, Money::from_cents(2000));

        assert!(service.debit(user, Money::zero()).await.is_err());
        assert!(service.credit(user, Money::from_cents(-100)).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_wallet() {
        let service = InMemoryWalletService::new();
        let user = UserId::new();
        assert_eq!(service.get_balance(user).await, Err(GatewayError::NotFound));
        assert_eq!(
            service.debit(user, Money::from_cents(100)).await,
            Err(GatewayError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_debit_times_out_after_applying() {
        let service = InMemoryWalletService::new();
        let user = UserId::new();
        service.set_balance(user, Money::from_cents(3000));
        service.set_debit_times_out(true);

        let result = service.debit(user, Money::from_cents(1000)).await;

        assert!(matches!(result, Err(GatewayError::Timeout(_))));
        assert_eq!(service.balance(user), Some(Money::from_cents(2000)));
    }
}
