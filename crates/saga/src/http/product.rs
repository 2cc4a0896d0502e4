use async_trait::async_trait;
use common::ProductId;

use super::{HttpGatewayConfig, ServiceClient, check_status, decode};
use crate::error::GatewayError;
use crate::services::product::{ProductGateway, ProductPrice};

/// Product service client: `GET {base_url}/{productId}`.
#[derive(Debug, Clone)]
pub struct HttpProductGateway {
    client: ServiceClient,
}

impl HttpProductGateway {
    pub fn new(base_url: impl Into<String>, config: &HttpGatewayConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            client: ServiceClient::new(base_url, config)?,
        })
    }
}

#[async_trait]
impl ProductGateway for HttpProductGateway {
    #[tracing::instrument(skip(self))]
    async fn get_product_price(&self, product_id: ProductId) -> Result<ProductPrice, GatewayError> {
        // Product reads are public; no token is sent.
        let request = self.client.client.get(self.client.url(product_id));
        let response = check_status(self.client.send(request).await?).await?;
        decode(response).await
    }
}
