//! Cart gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use common::{Money, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// A single line of a cart, with the price captured when it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(rename = "priceAtTime")]
    pub price_at_capture: Money,
    pub quantity: u32,
}

impl CartLine {
    /// Creates a cart line.
    pub fn new(product_id: ProductId, price_at_capture: Money, quantity: u32) -> Self {
        Self {
            product_id,
            product_name: None,
            price_at_capture,
            quantity,
        }
    }

    /// Returns `price_at_capture × quantity`, or `None` on overflow.
    pub fn line_total(&self) -> Option<Money> {
        self.price_at_capture.checked_multiply(self.quantity)
    }
}

/// A user's cart as returned by the cart service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(default)]
    pub id: Option<i64>,
    /// Absent for anonymous carts.
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(rename = "items", default)]
    pub lines: Vec<CartLine>,
}

impl Cart {
    /// Creates a cart owned by `user_id`.
    pub fn for_user(user_id: UserId, lines: Vec<CartLine>) -> Self {
        Self {
            id: None,
            user_id: Some(user_id),
            lines,
        }
    }

    /// Returns true if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of all line totals at captured prices, or `None` if it does not
    /// fit in a decimal.
    pub fn total_amount(&self) -> Option<Money> {
        self.lines
            .iter()
            .try_fold(Money::zero(), |total, line| total.checked_add(line.line_total()?))
    }
}

/// Trait for cart service operations.
#[async_trait]
pub trait CartGateway: Send + Sync {
    /// Fetches the user's current cart.
    async fn get_cart(&self, user_id: UserId) -> Result<Cart, GatewayError>;

    /// Removes every line from the user's cart.
    ///
    /// Clearing an already-empty cart succeeds.
    async fn clear_cart(&self, user_id: UserId) -> Result<(), GatewayError>;
}

#[async_trait]
impl<T: CartGateway + ?Sized> CartGateway for Arc<T> {
    async fn get_cart(&self, user_id: UserId) -> Result<Cart, GatewayError> {
        (**self).get_cart(user_id).await
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<(), GatewayError> {
        (**self).clear_cart(user_id).await
    }
}

#[derive(Debug, Default)]
struct InMemoryCartState {
    carts: HashMap<UserId, Cart>,
    fail_on_get: bool,
    failing_clears: u32,
    clear_calls: u32,
}

/// In-memory cart service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartService {
    state: Arc<RwLock<InMemoryCartState>>,
}

impl InMemoryCartService {
    /// Creates a new in-memory cart service.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> RwLockWriteGuard<'_, InMemoryCartState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the user's cart with the given lines.
    pub fn put_cart(&self, user_id: UserId, lines: Vec<CartLine>) {
        self.state()
            .carts
            .insert(user_id, Cart::for_user(user_id, lines));
    }

    /// Configures get_cart calls to fail with a transport error.
    pub fn set_fail_on_get(&self, fail: bool) {
        self.state().fail_on_get = fail;
    }

    /// Makes the next `count` clear_cart calls fail.
    pub fn fail_next_clears(&self, count: u32) {
        self.state().failing_clears = count;
    }

    /// Returns the lines currently in the user's cart.
    pub fn lines(&self, user_id: UserId) -> Vec<CartLine> {
        self.state()
            .carts
            .get(&user_id)
            .map(|cart| cart.lines.clone())
            .unwrap_or_default()
    }

    /// Returns how many times clear_cart has been called.
    pub fn clear_calls(&self) -> u32 {
        self.state().clear_calls
    }
}

#[async_trait]
impl CartGateway for InMemoryCartService {
    async fn get_cart(&self, user_id: UserId) -> Result<Cart, GatewayError> {
        let state = self.state();
        if state.fail_on_get {
            return Err(GatewayError::Transport("cart service down".to_string()));
        }
        Ok(state
            .carts
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| Cart::for_user(user_id, Vec::new())))
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<(), GatewayError> {
        let mut state = self.state();
        state.clear_calls += 1;

        if state.failing_clears > 0 {
            state.failing_clears -= 1;
            return Err(GatewayError::Rejected {
                status: 503,
                body: "cart service unavailable".to_string(),
            });
        }

        if let Some(cart) = state.carts.get_mut(&user_id) {
            cart.lines.clear();
        }
        Ok(())
    }
}
