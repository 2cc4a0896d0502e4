//! Local purchase ledger.
//!
//! The ledger is the only state the checkout orchestrator owns outright.
//! A purchase row is written once the wallet has been debited and the order
//! created, and removed again when the saga has to compensate.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod purchase;
pub mod store;

pub use common::{OrderId, PurchaseId, UserId};
pub use error::{LedgerError, Result};
pub use memory::InMemoryPurchaseLedger;
pub use postgres::PostgresPurchaseLedger;
pub use purchase::{NewPurchase, Page, PaymentStatus, Purchase};
pub use store::PurchaseLedger;
