use async_trait::async_trait;
use common::UserId;

use super::{HttpGatewayConfig, ServiceClient, check_status, decode};
use crate::error::GatewayError;
use crate::services::order::{CreateOrderRequest, Order, OrderGateway, OrderLine};

/// Order service client: `POST {base_url}`.
#[derive(Debug, Clone)]
pub struct HttpOrderGateway {
    client: ServiceClient,
}

impl HttpOrderGateway {
    pub fn new(base_url: impl Into<String>, config: &HttpGatewayConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            client: ServiceClient::new(base_url, config)?,
        })
    }
}

#[async_trait]
impl OrderGateway for HttpOrderGateway {
    #[tracing::instrument(skip(self, lines), fields(line_count = lines.len()))]
    async fn create_order(
        &self,
        user_id: UserId,
        lines: Vec<OrderLine>,
    ) -> Result<Order, GatewayError> {
        let body = CreateOrderRequest {
            user_id,
            items: lines,
        };
        let request = self
            .client
            .authorized(self.client.client.post(&self.client.base_url))
            .json(&body);
        let response = check_status(self.client.send(request).await?).await?;
        decode(response).await
    }
}
