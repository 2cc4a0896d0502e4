//! Order gateway trait and in-memory implementation.

use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// A line sent to the order service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Validated unit price. The order service reprices on its side, so this
    /// is informational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Money>,
}

impl OrderLine {
    pub fn new(product_id: ProductId, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id,
            quantity,
            unit_price: Some(unit_price),
        }
    }
}

/// Body of a create-order request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: UserId,
    pub items: Vec<OrderLine>,
}

/// An order as returned by the order service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    #[serde(default)]
    pub order_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub total_amount: Option<Money>,
}

/// Trait for order service operations.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Creates an order for the user's lines and returns it with its new id.
    async fn create_order(
        &self,
        user_id: UserId,
        lines: Vec<OrderLine>,
    ) -> Result<Order, GatewayError>;
}

#[async_trait]
impl<T: OrderGateway + ?Sized> OrderGateway for Arc<T> {
    async fn create_order(
        &self,
        user_id: UserId,
        lines: Vec<OrderLine>,
    ) -> Result<Order, GatewayError> {
        (**self).create_order(user_id, lines).await
    }
}

#[derive(Debug, Default)]
struct InMemoryOrderState {
    orders: Vec<CreateOrderRequest>,
    next_id: i64,
    create_calls: u32,
    failing_creates: u32,
    reject_creates: bool,
    delay: Option<Duration>,
}

/// In-memory order service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderService {
    state: Arc<RwLock<InMemoryOrderState>>,
}

impl InMemoryOrderService {
    /// Creates a new in-memory order service.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> RwLockWriteGuard<'_, InMemoryOrderState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the next `count` create calls fail with a 503.
    pub fn fail_next_creates(&self, count: u32) {
        self.state().failing_creates = count;
    }

    /// Configures create calls to be refused with a 400.
    pub fn set_reject_creates(&self, reject: bool) {
        self.state().reject_creates = reject;
    }

    /// Delays every create call before it is served.
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = Some(delay);
    }

    /// Returns how many create calls were received.
    pub fn create_calls(&self) -> u32 {
        self.state().create_calls
    }

    /// Returns the number of orders created.
    pub fn order_count(&self) -> usize {
        self.state().orders.len()
    }

    /// Returns every accepted create request.
    pub fn orders(&self) -> Vec<CreateOrderRequest> {
        self.state().orders.clone()
    }
}

#[async_trait]
impl OrderGateway for InMemoryOrderService {
    async fn create_order(
        &self,
        user_id: UserId,
        lines: Vec<OrderLine>,
    ) -> Result<Order, GatewayError> {
        let delay = self.state().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state.create_calls += 1;

        if state.reject_creates {
            return Err(GatewayError::Rejected {
                status: 400,
                body: "order rejected".to_string(),
            });
        }
        if state.failing_creates > 0 {
            state.failing_creates -= 1;
            return Err(GatewayError::Rejected {
                status: 503,
                body: "order service unavailable".to_string(),
            });
        }

        state.next_id += 1;
        let id = OrderId::new(state.next_id);
        let total_amount = lines
            .iter()
            .filter_map(|line| line.unit_price.map(|price| price.multiply(line.quantity)))
            .sum();
        state.orders.push(CreateOrderRequest {
            user_id,
            items: lines,
        });

        Ok(Order {
            id,
            user_id,
            order_date: Some(Utc::now()),
            status: Some("PENDING".to_string()),
            total_amount: Some(total_amount),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_wire_format() {
        let user = UserId::new();
        let request = CreateOrderRequest {
            user_id: user,
            items: vec![OrderLine {
                product_id: ProductId::new(7),
                quantity: 2,
                unit_price: None,
            }],
        };

        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["userId"], user.to_string());
        assert_eq!(json["items"][0]["productId"], 7);
        assert_eq!(json["items"][0]["quantity"], 2);
        assert!(json["items"][0].get("unitPrice").is_none());
    }

    #[test]
    fn test_order_deserializes_wire_format() {
        let json = r#"{
            "id": 41,
            "userId": "6f1c2b1e-8f0e-4c51-9a55-3f7f4c2a9d10",
            "orderDate": "2024-03-01T10:00:00Z",
            "status": "PENDING",
            "totalAmount": 25.00,
            "items": []
        }"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.id, OrderId::new(41));
        assert_eq!(order.total_amount, Some(Money::from_cents(2500)));
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let service = InMemoryOrderService::new();
        let user = UserId::new();
        let lines = vec![OrderLine::new(ProductId::new(1), 2, Money::from_cents(1000))];

        let first = service.create_order(user, lines.clone()).await.unwrap();
        let second = service.create_order(user, lines).await.unwrap();

        assert_eq!(first.id, OrderId::new(1));
        assert_eq!(second.id, OrderId::new(2));
        assert_eq!(first.total_amount, Some(Money::from_cents(2000)));
        assert_eq!(service.order_count(), 2);
    }

    #[tokio::test]
    async fn test_fail_next_creates_is_transient() {
        let service = InMemoryOrderService::new();
        service.fail_next_creates(1);

        let err = service
            .create_order(UserId::new(), Vec::new())
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(service.order_count(), 0);
        assert_eq!(service.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_rejected_create_is_permanent() {
        let service = InMemoryOrderService::new();
        service.set_reject_creates(true);

        let err = service
            .create_order(UserId::new(), Vec::new())
            .await
            .unwrap_err();

        assert!(!err.is_transient());
    }
}
