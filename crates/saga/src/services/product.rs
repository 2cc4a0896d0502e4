//! Product pricing gateway trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// The authoritative current price of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPrice {
    #[serde(rename = "id")]
    pub product_id: ProductId,
    #[serde(rename = "price")]
    pub current_price: Money,
}

/// Trait for reading current product prices.
#[async_trait]
pub trait ProductGateway: Send + Sync {
    /// Fetches the current price of a product.
    async fn get_product_price(&self, product_id: ProductId) -> Result<ProductPrice, GatewayError>;
}

#[async_trait]
impl<T: ProductGateway + ?Sized> ProductGateway for Arc<T> {
    async fn get_product_price(&self, product_id: ProductId) -> Result<ProductPrice, GatewayError> {
        (**self).get_product_price(product_id).await
    }
}

#[derive(Debug, Default)]
struct InMemoryProductState {
    prices: HashMap<ProductId, Money>,
    unavailable: HashSet<ProductId>,
    lookups: u32,
}

/// In-memory product catalog for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductService {
    state: Arc<RwLock<InMemoryProductState>>,
}

impl InMemoryProductService {
    /// Creates a new in-memory product catalog.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> RwLockWriteGuard<'_, InMemoryProductState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the current price of a product.
    pub fn set_price(&self, product_id: ProductId, price: Money) {
        self.state().prices.insert(product_id, price);
    }

    /// Makes lookups for a product fail with a transport error.
    pub fn set_unavailable(&self, product_id: ProductId) {
        self.state().unavailable.insert(product_id);
    }

    /// Returns the number of price lookups served.
    pub fn lookup_count(&self) -> u32 {
        self.state().lookups
    }
}

#[async_trait]
impl ProductGateway for InMemoryProductService {
    async fn get_product_price(&self, product_id: ProductId) -> Result<ProductPrice, GatewayError> {
        let mut state = self.state();
        state.lookups += 1;

        if state.unavailable.contains(&product_id) {
            return Err(GatewayError::Transport("product service down".to_string()));
        }

        state
            .prices
            .get(&product_id)
            .map(|price| ProductPrice {
                product_id,
                current_price: *price,
            })
            .ok_or(GatewayError::NotFound)
    }
}
