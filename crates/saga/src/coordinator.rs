//! Purchase orchestrator driving the checkout saga.

use std::future::Future;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use common::{Money, OrderId, SagaId, UserId};
use futures_util::{StreamExt, TryStreamExt, future, stream};
use ledger::{LedgerError, NewPurchase, PaymentStatus, Purchase, PurchaseLedger};
use serde::{Deserialize, Serialize};
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::aggregate::PurchaseSaga;
use crate::error::{CheckoutError, GatewayError, Result};
use crate::events::SagaEvent;
use crate::purchase_checkout::{
    self, STEP_CLEAR_CART, STEP_CREATE_ORDER, STEP_DEBIT_WALLET, STEP_FETCH_CART,
    STEP_RECORD_PURCHASE, STEP_VALIDATE_PRICES,
};
use crate::retry::{RetryPolicy, retry_call};
use crate::services::cart::{CartGateway, CartLine};
use crate::services::order::{OrderGateway, OrderLine};
use crate::services::product::ProductGateway;
use crate::services::wallet::WalletGateway;

/// Tunables for the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Deadline applied to every single collaborator or ledger call.
    pub call_timeout: Duration,
    /// Maximum number of price lookups in flight at once.
    pub price_check_concurrency: usize,
    /// Retries for idempotent reads (cart, prices, balance).
    pub read_retry: RetryPolicy,
    /// Retries for order creation on transient failures.
    pub order_retry: RetryPolicy,
    /// Retries for the best-effort cart clear.
    pub cart_clear_retry: RetryPolicy,
    /// Retries for compensating credits and ledger deletes.
    pub compensation_retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
            price_check_concurrency: 8,
            read_retry: RetryPolicy::quick(),
            order_retry: RetryPolicy::quick(),
            cart_clear_retry: RetryPolicy::default(),
            compensation_retry: RetryPolicy::aggressive(),
        }
    }
}

impl OrchestratorConfig {
    /// Same retry counts as the default, with every backoff set to zero.
    pub fn without_backoff() -> Self {
        let defaults = Self::default();
        Self {
            read_retry: RetryPolicy::immediate(defaults.read_retry.max_retries),
            order_retry: RetryPolicy::immediate(defaults.order_retry.max_retries),
            cart_clear_retry: RetryPolicy::immediate(defaults.cart_clear_retry.max_retries),
            compensation_retry: RetryPolicy::immediate(defaults.compensation_retry.max_retries),
            ..defaults
        }
    }

    /// Overrides the per-call timeout.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Overrides the price check fan-out width.
    pub fn with_price_check_concurrency(mut self, concurrency: usize) -> Self {
        self.price_check_concurrency = concurrency.max(1);
        self
    }
}

/// What a successful checkout hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub total_amount: Money,
    pub payment_status: PaymentStatus,
    pub transaction_date: DateTime<Utc>,
}

impl From<&Purchase> for PurchaseReceipt {
    fn from(purchase: &Purchase) -> Self {
        Self {
            order_id: purchase.order_id,
            user_id: purchase.user_id,
            total_amount: purchase.total_amount,
            payment_status: purchase.payment_status,
            transaction_date: purchase.transaction_date,
        }
    }
}

/// A finished saga together with its result.
#[derive(Debug)]
pub struct SagaOutcome {
    pub saga: PurchaseSaga,
    pub result: Result<PurchaseReceipt>,
}

/// Orchestrates purchase checkouts across the cart, product, wallet and order
/// services, recording each purchase in the local ledger.
///
/// Steps run strictly in order. Money is debited before the order is created,
/// so any failure after the debit is unwound by crediting the total back.
#[derive(Clone)]
pub struct PurchaseOrchestrator<C, P, W, O, L>
where
    C: CartGateway,
    P: ProductGateway,
    W: WalletGateway,
    O: OrderGateway,
    L: PurchaseLedger,
{
    cart: C,
    products: P,
    wallet: W,
    orders: O,
    ledger: L,
    config: OrchestratorConfig,
}

impl<C, P, W, O, L> PurchaseOrchestrator<C, P, W, O, L>
where
    C: CartGateway,
    P: ProductGateway,
    W: WalletGateway,
    O: OrderGateway,
    L: PurchaseLedger,
{
    /// Creates an orchestrator with the default configuration.
    pub fn new(cart: C, products: P, wallet: W, orders: O, ledger: L) -> Self {
        Self::with_config(cart, products, wallet, orders, ledger, OrchestratorConfig::default())
    }

    /// Creates an orchestrator with an explicit configuration.
    pub fn with_config(
        cart: C,
        products: P,
        wallet: W,
        orders: O,
        ledger: L,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            cart,
            products,
            wallet,
            orders,
            ledger,
            config,
        }
    }

    /// Returns the orchestrator's configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Returns the purchase ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Checks out the user's cart.
    pub async fn create_purchase(&self, user_id: UserId) -> Result<PurchaseReceipt> {
        self.execute_saga(user_id).await.result
    }

    /// Runs one checkout saga to a terminal state and returns it with its result.
    #[tracing::instrument(skip(self), fields(saga_type = purchase_checkout::SAGA_TYPE))]
    pub async fn execute_saga(&self, user_id: UserId) -> SagaOutcome {
        metrics::counter!("purchase_saga_started").increment(1);
        let saga_start = Instant::now();

        let saga_id = SagaId::new();
        let mut saga = PurchaseSaga::default();
        saga.apply(SagaEvent::saga_started(
            saga_id,
            user_id,
            purchase_checkout::SAGA_TYPE,
        ));

        let result = match self.run_steps(&mut saga, user_id).await {
            Ok(receipt) => {
                saga.apply(SagaEvent::SagaCompleted);
                metrics::counter!("purchase_saga_completed").increment(1);
                tracing::info!(
                    %saga_id,
                    order_id = %receipt.order_id,
                    total = %receipt.total_amount,
                    "purchase completed"
                );
                Ok(receipt)
            }
            Err(err) => Err(self.unwind(&mut saga, user_id, err).await),
        };

        metrics::histogram!("purchase_saga_duration_seconds")
            .record(saga_start.elapsed().as_secs_f64());
        SagaOutcome { saga, result }
    }

    async fn run_steps(&self, saga: &mut PurchaseSaga, user_id: UserId) -> Result<PurchaseReceipt> {
        // 1. Fetch the cart
        begin_step(saga, STEP_FETCH_CART);
        let cart = match self.read(STEP_FETCH_CART, || self.cart.get_cart(user_id)).await {
            Ok(cart) => cart,
            Err(GatewayError::NotFound) => {
                return Err(fail_step(saga, STEP_FETCH_CART, CheckoutError::CartEmpty(user_id)));
            }
            Err(e) => {
                return Err(fail_step(saga, STEP_FETCH_CART, CheckoutError::CartUnavailable(e)));
            }
        };
        if cart.is_empty() {
            return Err(fail_step(saga, STEP_FETCH_CART, CheckoutError::CartEmpty(user_id)));
        }
        saga.apply(SagaEvent::cart_loaded(cart.lines.len()));

        // 2. Re-confirm every captured price, then total at those prices
        begin_step(saga, STEP_VALIDATE_PRICES);
        if let Err(e) = self.validate_prices(&cart.lines).await {
            return Err(fail_step(saga, STEP_VALIDATE_PRICES, e));
        }
        let Some(total) = cart.total_amount() else {
            return Err(fail_step(
                saga,
                STEP_VALIDATE_PRICES,
                CheckoutError::CartTotalOverflow(user_id),
            ));
        };
        saga.apply(SagaEvent::prices_validated(total));

        // 3. Check the balance, then debit
        begin_step(saga, STEP_DEBIT_WALLET);
        self.debit_wallet(saga, user_id, total).await?;

        // 4. Create the order
        begin_step(saga, STEP_CREATE_ORDER);
        let lines: Vec<OrderLine> = cart
            .lines
            .iter()
            .map(|line| OrderLine::new(line.product_id, line.quantity, line.price_at_capture))
            .collect();
        let order = match retry_call(
            &self.config.order_retry,
            STEP_CREATE_ORDER,
            GatewayError::is_transient,
            || self.call(self.orders.create_order(user_id, lines.clone())),
        )
        .await
        {
            Ok(order) => order,
            Err(e) if e.is_transient() => {
                saga.apply(SagaEvent::step_outcome_unknown(STEP_CREATE_ORDER, e.to_string()));
                return Err(CheckoutError::OrderCreationFailed(e));
            }
            Err(e) => {
                return Err(fail_step(saga, STEP_CREATE_ORDER, CheckoutError::OrderCreationFailed(e)));
            }
        };
        saga.apply(SagaEvent::order_created(order.id));

        // 5. Record the purchase
        begin_step(saga, STEP_RECORD_PURCHASE);
        let pending = NewPurchase::pending(order.id, user_id, total);
        let purchase = match self.ledger_call(self.ledger.save(pending)).await {
            Ok(purchase) => purchase,
            Err(e) => {
                // A failed write may still have left a row behind.
                saga.apply(SagaEvent::step_outcome_unknown(STEP_RECORD_PURCHASE, e.to_string()));
                return Err(CheckoutError::PurchasePersistenceFailed(e));
            }
        };
        saga.apply(SagaEvent::purchase_recorded(purchase.id));

        // 6. Clear the cart; failure leaves the purchase in place
        begin_step(saga, STEP_CLEAR_CART);
        match retry_call(
            &self.config.cart_clear_retry,
            STEP_CLEAR_CART,
            GatewayError::is_transient,
            || self.call(self.cart.clear_cart(user_id)),
        )
        .await
        {
            Ok(()) => saga.apply(SagaEvent::cart_cleared(STEP_CLEAR_CART)),
            Err(e) => {
                metrics::counter!("purchase_cart_clear_deferred").increment(1);
                tracing::warn!(
                    %user_id,
                    order_id = %order.id,
                    error = %e,
                    "cart could not be cleared after purchase"
                );
                saga.apply(SagaEvent::cart_clear_deferred(STEP_CLEAR_CART, e.to_string()));
            }
        }

        Ok(PurchaseReceipt::from(&purchase))
    }

    async fn validate_prices(&self, lines: &[CartLine]) -> Result<()> {
        stream::iter(lines.to_vec())
            .map(|line| async move {
                let current = self
                    .read(STEP_VALIDATE_PRICES, || {
                        self.products.get_product_price(line.product_id)
                    })
                    .await
                    .map_err(|reason| CheckoutError::ProductUnavailable {
                        product_id: line.product_id,
                        reason,
                    })?;
                if current.current_price != line.price_at_capture {
                    tracing::info!(
                        product_id = %line.product_id,
                        captured = %line.price_at_capture,
                        current = %current.current_price,
                        "price changed since capture"
                    );
                    return Err(CheckoutError::PriceMismatch(line.product_id));
                }
                Ok::<(), CheckoutError>(())
            })
            .buffer_unordered(self.config.price_check_concurrency.max(1))
            .try_for_each(|()| future::ready(Ok(())))
            .await
    }

    async fn debit_wallet(&self, saga: &mut PurchaseSaga, user_id: UserId, total: Money) -> Result<()> {
        let wallet = match self
            .read(STEP_DEBIT_WALLET, || self.wallet.get_balance(user_id))
            .await
        {
            Ok(wallet) => wallet,
            Err(GatewayError::NotFound) => {
                return Err(fail_step(saga, STEP_DEBIT_WALLET, CheckoutError::WalletNotFound(user_id)));
            }
            Err(e) => {
                return Err(fail_step(saga, STEP_DEBIT_WALLET, CheckoutError::WalletUnavailable(e)));
            }
        };
        if wallet.balance < total {
            return Err(fail_step(
                saga,
                STEP_DEBIT_WALLET,
                CheckoutError::InsufficientBalance(user_id),
            ));
        }

        if total.is_zero() {
            tracing::info!(%user_id, "cart total is zero, no debit issued");
            saga.apply(SagaEvent::wallet_debited(total));
            return Ok(());
        }

        // Never retried: a lost response would turn one debit into two.
        match self.call(self.wallet.debit(user_id, total)).await {
            Ok(()) => {
                saga.apply(SagaEvent::wallet_debited(total));
                Ok(())
            }
            Err(GatewayError::InsufficientFunds) => Err(fail_step(
                saga,
                STEP_DEBIT_WALLET,
                CheckoutError::InsufficientBalance(user_id),
            )),
            Err(GatewayError::NotFound) => Err(fail_step(
                saga,
                STEP_DEBIT_WALLET,
                CheckoutError::WalletNotFound(user_id),
            )),
            Err(e) if e.is_transient() => {
                tracing::warn!(%user_id, error = %e, "debit outcome unknown");
                saga.apply(SagaEvent::step_outcome_unknown(STEP_DEBIT_WALLET, e.to_string()));
                Err(CheckoutError::WalletUnavailable(e))
            }
            Err(e) => Err(fail_step(
                saga,
                STEP_DEBIT_WALLET,
                CheckoutError::WalletUnavailable(e),
            )),
        }
    }

    /// Ends a failed saga: aborts if nothing was committed, otherwise compensates.
    async fn unwind(
        &self,
        saga: &mut PurchaseSaga,
        user_id: UserId,
        err: CheckoutError,
    ) -> CheckoutError {
        if saga.completed_steps().is_empty() {
            saga.apply(SagaEvent::saga_aborted(err.to_string()));
            metrics::counter!("purchase_saga_aborted").increment(1);
            if err.is_client_error() {
                tracing::info!(%user_id, error = %err, "purchase rejected");
            } else {
                tracing::warn!(%user_id, error = %err, "purchase aborted");
            }
            return err;
        }

        let failed_step = saga.failed_step().unwrap_or("unknown").to_string();
        saga.apply(SagaEvent::compensation_started(&failed_step));
        let failures = self.compensate(saga, user_id).await;

        if failures.is_empty() {
            saga.apply(SagaEvent::saga_compensated(err.to_string()));
            metrics::counter!("purchase_saga_compensated").increment(1);
            tracing::warn!(%user_id, step = %failed_step, error = %err, "purchase compensated");
            return err;
        }

        saga.apply(SagaEvent::saga_failed(format!(
            "{err}; compensation failed: {}",
            failures.join("; ")
        )));
        metrics::counter!("purchase_saga_compensation_failed").increment(1);
        tracing::error!(
            %user_id,
            saga_id = ?saga.id(),
            total = ?saga.total(),
            order_id = ?saga.order_id(),
            step = %failed_step,
            error = %err,
            failures = ?failures,
            "compensation failed, manual reconciliation required"
        );
        CheckoutError::CompensationFailed {
            source: Box::new(err),
            failures,
        }
    }

    /// Runs compensating actions in reverse order of committed steps.
    ///
    /// Returns a description of each compensation that did not complete.
    #[tracing::instrument(skip(self, saga))]
    async fn compensate(&self, saga: &mut PurchaseSaga, user_id: UserId) -> Vec<String> {
        let mut failures = Vec::new();
        let completed: Vec<String> = saga.completed_steps().to_vec();

        for step in completed.iter().rev() {
            let outcome = match step.as_str() {
                STEP_RECORD_PURCHASE => self.remove_purchase(saga, user_id).await,
                STEP_CREATE_ORDER => {
                    metrics::counter!("purchase_orphaned_orders").increment(1);
                    tracing::warn!(
                        %user_id,
                        order_id = ?saga.order_id(),
                        "order cannot be cancelled and is left for reconciliation"
                    );
                    continue;
                }
                STEP_DEBIT_WALLET => self.refund(saga, user_id).await,
                _ => continue,
            };

            match outcome {
                Ok(()) => saga.apply(SagaEvent::compensation_step_completed(step)),
                Err(error) => {
                    failures.push(format!("{step}: {error}"));
                    saga.apply(SagaEvent::compensation_step_failed(step, error));
                }
            }
        }

        failures
    }

    async fn remove_purchase(
        &self,
        saga: &PurchaseSaga,
        user_id: UserId,
    ) -> std::result::Result<(), String> {
        let policy = &self.config.compensation_retry;
        let removed = match (saga.purchase_id(), saga.order_id()) {
            (Some(purchase_id), _) => retry_call(policy, "delete_purchase", |_| true, || {
                self.ledger_call(self.ledger.delete(purchase_id))
            })
            .await
            .map(u64::from),
            (None, Some(order_id)) => retry_call(policy, "delete_purchase", |_| true, || {
                self.ledger_call(self.ledger.delete_for_order(order_id, user_id))
            })
            .await,
            (None, None) => Ok(0),
        };

        match removed {
            Ok(rows) => {
                tracing::info!(%user_id, rows, "purchase row removed");
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    async fn refund(&self, saga: &PurchaseSaga, user_id: UserId) -> std::result::Result<(), String> {
        let amount = saga.total().unwrap_or_default();
        if !amount.is_positive() {
            return Ok(());
        }

        retry_call(
            &self.config.compensation_retry,
            "credit_wallet",
            GatewayError::is_transient,
            || self.call(self.wallet.credit(user_id, amount)),
        )
        .await
        .map(|()| tracing::info!(%user_id, %amount, "wallet credited back"))
        .map_err(|e| e.to_string())
    }

    /// Retried, time-limited idempotent read.
    async fn read<T, F, Fut>(&self, operation: &str, mut f: F) -> std::result::Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, GatewayError>>,
    {
        retry_call(
            &self.config.read_retry,
            operation,
            GatewayError::is_transient,
            || self.call(f()),
        )
        .await
    }

    /// Applies the per-call timeout to a collaborator call.
    async fn call<T, F>(&self, fut: F) -> std::result::Result<T, GatewayError>
    where
        F: Future<Output = std::result::Result<T, GatewayError>>,
    {
        tokio::time::timeout(self.config.call_timeout, fut)
            .await
            .unwrap_or(Err(GatewayError::Timeout(self.config.call_timeout)))
    }

    /// Applies the per-call timeout to a ledger call.
    async fn ledger_call<T, F>(&self, fut: F) -> ledger::Result<T>
    where
        F: Future<Output = ledger::Result<T>>,
    {
        let timeout = self.config.call_timeout;
        tokio::time::timeout(timeout, fut).await.unwrap_or_else(|_| {
            Err(LedgerError::Unavailable(format!(
                "ledger call timed out after {timeout:?}"
            )))
        })
    }
}

impl<C, P, W, O, L> PurchaseOrchestrator<C, P, W, O, L>
where
    C: CartGateway + Clone + 'static,
    P: ProductGateway + Clone + 'static,
    W: WalletGateway + Clone + 'static,
    O: OrderGateway + Clone + 'static,
    L: PurchaseLedger + Clone + 'static,
{
    /// Checks out the user's cart on a task spawned through `tasks`.
    ///
    /// The saga keeps running to a terminal state even if the returned future
    /// is dropped, e.g. when an HTTP client disconnects mid-checkout. Waiting
    /// on the tracker after closing it lets in-flight sagas finish before the
    /// runtime shuts down.
    pub async fn create_purchase_detached(
        &self,
        user_id: UserId,
        tasks: &TaskTracker,
    ) -> Result<PurchaseReceipt> {
        let orchestrator = self.clone();
        let task = tasks.spawn(
            async move { orchestrator.create_purchase(user_id).await }
                .instrument(tracing::Span::current()),
        );
        task.await
            .map_err(|e| CheckoutError::Internal(format!("checkout task failed: {e}")))?
    }
}

fn begin_step(saga: &mut PurchaseSaga, step: &'static str) {
    tracing::info!(step, "saga step started");
    saga.apply(SagaEvent::step_started(step));
}

fn fail_step(saga: &mut PurchaseSaga, step: &'static str, err: CheckoutError) -> CheckoutError {
    saga.apply(SagaEvent::step_failed(step, err.to_string()));
    err
}
