//! Purchase checkout saga.
//!
//! Turns a user's cart into a paid order by coordinating the cart, product,
//! wallet and order services, none of which share a transaction. The saga
//! runs these steps strictly in order:
//! 1. Fetch the cart
//! 2. Validate every captured price against the catalog
//! 3. Check the balance and debit the wallet
//! 4. Create the order
//! 5. Record the purchase in the local ledger
//! 6. Clear the cart (best effort)
//!
//! If a step after the debit fails, committed steps are compensated in
//! reverse order and the wallet is credited back.

pub mod aggregate;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod http;
pub mod purchase_checkout;
pub mod retry;
pub mod services;
pub mod state;

pub use aggregate::PurchaseSaga;
pub use coordinator::{OrchestratorConfig, PurchaseOrchestrator, PurchaseReceipt, SagaOutcome};
pub use error::{CheckoutError, GatewayError};
pub use events::SagaEvent;
pub use http::{
    HttpCartGateway, HttpGatewayConfig, HttpOrderGateway, HttpProductGateway, HttpWalletGateway,
};
pub use retry::RetryPolicy;
pub use services::{
    Cart, CartGateway, CartLine, InMemoryCartService, InMemoryOrderService,
    InMemoryProductService, InMemoryWalletService, Order, OrderGateway, OrderLine, ProductGateway,
    ProductPrice, Wallet, WalletGateway,
};
pub use state::SagaState;
