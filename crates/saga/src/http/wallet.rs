use async_trait::async_trait;
use common::{Money, UserId};
use serde::Serialize;

use super::{HttpGatewayConfig, ServiceClient, check_status, decode};
use crate::error::GatewayError;
use crate::services::wallet::{Wallet, WalletGateway};

#[derive(Debug, Serialize)]
struct AmountRequest {
    amount: Money,
}

/// Wallet service client.
///
/// `GET {base_url}/{userId}` reads the balance; `PUT {base_url}/{userId}/debit`
/// and `/credit` move money.
#[derive(Debug, Clone)]
pub struct HttpWalletGateway {
    client: ServiceClient,
}

impl HttpWalletGateway {
    pub fn new(base_url: impl Into<String>, config: &HttpGatewayConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            client: ServiceClient::new(base_url, config)?,
        })
    }

    async fn adjust(&self, user_id: UserId, action: &str, amount: Money) -> Result<(), GatewayError> {
        let request = self
            .client
            .authorized(
                self.client
                    .client
                    .put(self.client.url(format!("{user_id}/{action}"))),
            )
            .json(&AmountRequest { amount });
        check_status(self.client.send(request).await?).await?;
        Ok(())
    }
}

/// The wallet reports a refused debit as a generic error whose body names the cause.
fn is_insufficient_balance(body: &str) -> bool {
    body.to_ascii_lowercase().contains("insufficient balance")
}

#[async_trait]
impl WalletGateway for HttpWalletGateway {
    #[tracing::instrument(skip(self))]
    async fn get_balance(&self, user_id: UserId) -> Result<Wallet, GatewayError> {
        let request = self
            .client
            .authorized(self.client.client.get(self.client.url(user_id)));
        let response = check_status(self.client.send(request).await?).await?;
        decode(response).await
    }

    #[tracing::instrument(skip(self))]
    async fn debit(&self, user_id: UserId, amount: Money) -> Result<(), GatewayError> {
        match self.adjust(user_id, "debit", amount).await {
            Err(GatewayError::Rejected { body, .. }) if is_insufficient_balance(&body) => {
                Err(GatewayError::InsufficientFunds)
            }
            other => other,
        }
    }

    #[tracing::instrument(skip(self))]
    async fn credit(&self, user_id: UserId, amount: Money) -> Result<(), GatewayError> {
        self.adjust(user_id, "credit", amount).await
    }
}
