//! Application configuration loaded from environment variables.

use std::time::Duration;

use saga::{HttpGatewayConfig, OrchestratorConfig};

const DEFAULT_CART_SERVICE_URL: &str = "http://cart-service:8080/api/cart";
const DEFAULT_PRODUCT_SERVICE_URL: &str = "http://product-detail:8080/api/products";
const DEFAULT_WALLET_SERVICE_URL: &str = "http://wallet-service:8080/api/wallets";
const DEFAULT_ORDER_SERVICE_URL: &str = "http://order-service:8080/api/orders";
const DEFAULT_CALL_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_PRICE_CHECK_CONCURRENCY: usize = 8;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL ledger; unset keeps purchases in memory
/// - `CART_SERVICE_URL`, `PRODUCT_SERVICE_URL`, `WALLET_SERVICE_URL`,
///   `ORDER_SERVICE_URL`: collaborator base URLs
/// - `SERVICE_AUTH_TOKEN`: bearer token forwarded to the cart, wallet and order services
/// - `CALL_TIMEOUT_MS`: per-call timeout for collaborator calls (default: `5000`)
/// - `PRICE_CHECK_CONCURRENCY`: concurrent price lookups per checkout (default: `8`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub cart_service_url: String,
    pub product_service_url: String,
    pub wallet_service_url: String,
    pub order_service_url: String,
    pub service_auth_token: Option<String>,
    pub call_timeout: Duration,
    pub price_check_concurrency: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from `lookup`, falling back to defaults for
    /// missing, empty or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: var("DATABASE_URL"),
            cart_service_url: var("CART_SERVICE_URL").unwrap_or(defaults.cart_service_url),
            product_service_url: var("PRODUCT_SERVICE_URL")
                .unwrap_or(defaults.product_service_url),
            wallet_service_url: var("WALLET_SERVICE_URL").unwrap_or(defaults.wallet_service_url),
            order_service_url: var("ORDER_SERVICE_URL").unwrap_or(defaults.order_service_url),
            service_auth_token: var("SERVICE_AUTH_TOKEN"),
            call_timeout: var("CALL_TIMEOUT_MS")
                .and_then(|ms| ms.parse().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.call_timeout),
            price_check_concurrency: var("PRICE_CHECK_CONCURRENCY")
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.price_check_concurrency),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Settings for the HTTP gateways.
    pub fn gateway_config(&self) -> HttpGatewayConfig {
        HttpGatewayConfig {
            timeout: self.call_timeout,
            auth_token: self.service_auth_token.clone(),
        }
    }

    /// Orchestrator settings derived from this configuration.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::default()
            .with_call_timeout(self.call_timeout)
            .with_price_check_concurrency(self.price_check_concurrency)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            cart_service_url: DEFAULT_CART_SERVICE_URL.to_string(),
            product_service_url: DEFAULT_PRODUCT_SERVICE_URL.to_string(),
            wallet_service_url: DEFAULT_WALLET_SERVICE_URL.to_string(),
            order_service_url: DEFAULT_ORDER_SERVICE_URL.to_string(),
            service_auth_token: None,
            call_timeout: Duration::from_millis(DEFAULT_CALL_TIMEOUT_MS),
            price_check_concurrency: DEFAULT_PRICE_CHECK_CONCURRENCY,
        }
    }
}
