//! Purchase checkout saga constants.

/// The saga type identifier for purchase checkout.
pub const SAGA_TYPE: &str = "PurchaseCheckout";

/// Step name: Fetch the user's cart.
pub const STEP_FETCH_CART: &str = "fetch_cart";

/// Step name: Re-confirm every captured price.
pub const STEP_VALIDATE_PRICES: &str = "validate_prices";

/// Step name: Debit the cart total from the wallet.
pub const STEP_DEBIT_WALLET: &str = "debit_wallet";

/// Step name: Create the order.
pub const STEP_CREATE_ORDER: &str = "create_order";

/// Step name: Write the purchase to the ledger.
pub const STEP_RECORD_PURCHASE: &str = "record_purchase";

/// Step name: Empty the user's cart.
pub const STEP_CLEAR_CART: &str = "clear_cart";
