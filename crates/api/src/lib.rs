//! HTTP API server for purchase checkout.
//!
//! Exposes the checkout saga and the purchase history over REST, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use ledger::PurchaseLedger;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    CartGateway, GatewayError, HttpCartGateway, HttpOrderGateway, HttpProductGateway,
    HttpWalletGateway, OrchestratorConfig, OrderGateway, ProductGateway, PurchaseOrchestrator,
    WalletGateway,
};
use tokio_util::task::TaskTracker;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Orchestrator wired to type-erased collaborators, so HTTP gateways and
/// in-memory fakes are interchangeable.
pub type Orchestrator = PurchaseOrchestrator<
    Arc<dyn CartGateway>,
    Arc<dyn ProductGateway>,
    Arc<dyn WalletGateway>,
    Arc<dyn OrderGateway>,
    Arc<dyn PurchaseLedger>,
>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    orchestrator: Orchestrator,
    checkouts: TaskTracker,
}

impl AppState {
    /// Creates the state from its collaborators.
    pub fn new(
        cart: Arc<dyn CartGateway>,
        products: Arc<dyn ProductGateway>,
        wallet: Arc<dyn WalletGateway>,
        orders: Arc<dyn OrderGateway>,
        ledger: Arc<dyn PurchaseLedger>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            orchestrator: PurchaseOrchestrator::with_config(
                cart, products, wallet, orders, ledger, config,
            ),
            checkouts: TaskTracker::new(),
        }
    }

    /// Returns the checkout orchestrator.
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Returns the tracker owning every in-flight checkout task.
    pub fn checkouts(&self) -> &TaskTracker {
        &self.checkouts
    }

    /// Returns the purchase ledger.
    pub fn ledger(&self) -> &Arc<dyn PurchaseLedger> {
        self.orchestrator.ledger()
    }
}

/// Creates the application state with HTTP gateways to the configured services.
pub fn create_state(
    config: &Config,
    ledger: Arc<dyn PurchaseLedger>,
) -> Result<Arc<AppState>, GatewayError> {
    let gateway_config = config.gateway_config();
    let cart = HttpCartGateway::new(config.cart_service_url.as_str(), &gateway_config)?;
    let products = HttpProductGateway::new(config.product_service_url.as_str(), &gateway_config)?;
    let wallet = HttpWalletGateway::new(config.wallet_service_url.as_str(), &gateway_config)?;
    let orders = HttpOrderGateway::new(config.order_service_url.as_str(), &gateway_config)?;

    Ok(Arc::new(AppState::new(
        Arc::new(cart),
        Arc::new(products),
        Arc::new(wallet),
        Arc::new(orders),
        ledger,
        config.orchestrator_config(),
    )))
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/api/purchases/{user_id}",
            get(routes::purchases::list).post(routes::purchases::create),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
