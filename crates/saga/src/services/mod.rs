//! Collaborator service traits and in-memory implementations for checkout steps.

pub mod cart;
pub mod order;
pub mod product;
pub mod wallet;

pub use cart::{Cart, CartGateway, CartLine, InMemoryCartService};
pub use order::{CreateOrderRequest, InMemoryOrderService, Order, OrderGateway, OrderLine};
pub use product::{InMemoryProductService, ProductGateway, ProductPrice};
pub use wallet::{InMemoryWalletService, Wallet, WalletGateway};
