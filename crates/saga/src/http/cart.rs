use async_trait::async_trait;
use common::UserId;

use super::{HttpGatewayConfig, ServiceClient, check_status, decode};
use crate::error::GatewayError;
use crate::services::cart::{Cart, CartGateway};

const USER_ID_HEADER: &str = "X-User-Id";

/// Cart service client: `GET`/`DELETE {base_url}/{userId}`.
#[derive(Debug, Clone)]
pub struct HttpCartGateway {
    client: ServiceClient,
}

impl HttpCartGateway {
    pub fn new(base_url: impl Into<String>, config: &HttpGatewayConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            client: ServiceClient::new(base_url, config)?,
        })
    }
}

#[async_trait]
impl CartGateway for HttpCartGateway {
    #[tracing::instrument(skip(self))]
    async fn get_cart(&self, user_id: UserId) -> Result<Cart, GatewayError> {
        let request = self
            .client
            .authorized(self.client.client.get(self.client.url(user_id)))
            .header(USER_ID_HEADER, user_id.to_string());
        let response = check_status(self.client.send(request).await?).await?;
        decode(response).await
    }

    #[tracing::instrument(skip(self))]
    async fn clear_cart(&self, user_id: UserId) -> Result<(), GatewayError> {
        let request = self
            .client
            .authorized(self.client.client.delete(self.client.url(user_id)))
            .header(USER_ID_HEADER, user_id.to_string());
        match check_status(self.client.send(request).await?).await {
            // No cart means nothing left to clear.
            Ok(_) | Err(GatewayError::NotFound) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
