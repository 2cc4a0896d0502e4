//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use ledger::{InMemoryPurchaseLedger, PostgresPurchaseLedger, PurchaseLedger};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Open the purchase ledger
    let ledger: Arc<dyn PurchaseLedger> = match &config.database_url {
        Some(url) => {
            let ledger = PostgresPurchaseLedger::connect(url, DATABASE_MAX_CONNECTIONS)
                .await
                .expect("failed to open PostgreSQL ledger");
            tracing::info!("using PostgreSQL purchase ledger");
            Arc::new(ledger)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, purchases are kept in memory");
            Arc::new(InMemoryPurchaseLedger::new())
        }
    };

    // 4. Wire the collaborator gateways and build the application
    let state = api::create_state(&config, ledger).expect("failed to build service gateways");
    let checkouts = state.checkouts().clone();
    let app = api::create_app(state, metrics_handle);

    // 5. Start server
    let addr = config.addr();
    tracing::info!(
        %addr,
        cart = %config.cart_service_url,
        product = %config.product_service_url,
        wallet = %config.wallet_service_url,
        order = %config.order_service_url,
        call_timeout_ms = config.call_timeout.as_millis() as u64,
        "starting purchase API server"
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 6. Let checkouts that already debited a wallet reach a terminal state
    checkouts.close();
    if !checkouts.is_empty() {
        tracing::info!(in_flight = checkouts.len(), "waiting for in-flight checkouts");
    }
    checkouts.wait().await;

    tracing::info!("server shut down gracefully");
}
