//! Checkout saga instance.

use chrono::Utc;
use common::{Money, OrderId, PurchaseId, SagaId, UserId};
use serde::{Deserialize, Serialize};

use crate::events::{RecordedEvent, SagaEvent};
use crate::purchase_checkout;
use crate::state::SagaState;

/// A single checkout saga execution.
///
/// The instance is rebuilt purely from the events applied to it. It tracks the
/// committed steps that compensation must undo and the context gathered along
/// the way (total, order id, purchase id).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PurchaseSaga {
    id: Option<SagaId>,
    user_id: Option<UserId>,
    saga_type: String,
    state: SagaState,
    current_step: Option<String>,
    /// Steps whose effect may exist remotely, in commit order.
    completed_steps: Vec<String>,
    line_count: usize,
    total: Option<Money>,
    order_id: Option<OrderId>,
    purchase_id: Option<PurchaseId>,
    failed_step: Option<String>,
    failure_reason: Option<String>,
    compensation_failures: Vec<String>,
    cart_clear_deferred: bool,
    completed: bool,
    history: Vec<RecordedEvent>,
}

impl PurchaseSaga {
    /// Applies an event, advancing the state machine.
    ///
    /// A transition the machine does not allow is logged and the state is
    /// left unchanged; the event is still kept in the history.
    pub fn apply(&mut self, event: SagaEvent) {
        if let Some(next) = self.next_state(&event) {
            if self.state.can_transition_to(next) {
                self.state = next;
            } else {
                tracing::error!(
                    saga_id = ?self.id,
                    from = %self.state,
                    to = %next,
                    event = event.event_type(),
                    "invalid saga transition"
                );
            }
        }

        match &event {
            SagaEvent::SagaStarted(data) => {
                self.id = Some(data.saga_id);
                self.user_id = Some(data.user_id);
                self.saga_type = data.saga_type.clone();
            }
            SagaEvent::StepStarted(data) => {
                self.current_step = Some(data.step_name.clone());
            }
            SagaEvent::CartLoaded(data) => {
                self.line_count = data.line_count;
            }
            SagaEvent::PricesValidated(data) => {
                self.total = Some(data.amount);
            }
            SagaEvent::WalletDebited(_) => {
                self.completed_steps
                    .push(purchase_checkout::STEP_DEBIT_WALLET.to_string());
            }
            SagaEvent::OrderCreated(data) => {
                self.order_id = Some(data.order_id);
                self.completed_steps
                    .push(purchase_checkout::STEP_CREATE_ORDER.to_string());
            }
            SagaEvent::PurchaseRecorded(data) => {
                self.purchase_id = Some(data.purchase_id);
                self.completed_steps
                    .push(purchase_checkout::STEP_RECORD_PURCHASE.to_string());
            }
            SagaEvent::CartCleared(_) => {}
            SagaEvent::CartClearDeferred(_) => {
                self.cart_clear_deferred = true;
            }
            SagaEvent::StepOutcomeUnknown(data) => {
                // The effect may exist remotely, so it must be undone like a commit.
                self.completed_steps.push(data.step_name.clone());
                self.failed_step = Some(data.step_name.clone());
                self.failure_reason = Some(data.error.clone());
            }
            SagaEvent::StepFailed(data) => {
                self.failed_step = Some(data.step_name.clone());
                self.failure_reason = Some(data.error.clone());
            }
            SagaEvent::CompensationStarted(_) | SagaEvent::CompensationStepCompleted(_) => {}
            SagaEvent::CompensationStepFailed(data) => {
                self.compensation_failures
                    .push(format!("{}: {}", data.step_name, data.error));
            }
            SagaEvent::SagaCompleted => {
                self.completed = true;
            }
            SagaEvent::SagaAborted(data)
            | SagaEvent::SagaCompensated(data)
            | SagaEvent::SagaFailed(data) => {
                self.failure_reason = Some(data.reason.clone());
            }
        }

        tracing::debug!(
            saga_id = ?self.id,
            event = event.event_type(),
            state = %self.state,
            "saga event applied"
        );
        self.history.push(RecordedEvent {
            recorded_at: Utc::now(),
            event,
        });
    }

    fn next_state(&self, event: &SagaEvent) -> Option<SagaState> {
        match event {
            SagaEvent::SagaStarted(_) => Some(SagaState::Started),
            SagaEvent::PricesValidated(_) => Some(SagaState::Priced),
            SagaEvent::WalletDebited(_) => Some(SagaState::Debited),
            SagaEvent::OrderCreated(_) => Some(SagaState::Ordered),
            SagaEvent::PurchaseRecorded(_) => Some(SagaState::Recorded),
            SagaEvent::CartCleared(_) => Some(SagaState::Cleared),
            SagaEvent::CompensationStarted(_) => Some(SagaState::Compensating),
            SagaEvent::SagaAborted(_) => Some(SagaState::Aborted),
            SagaEvent::SagaCompensated(_) => Some(SagaState::Compensated),
            SagaEvent::SagaFailed(_) => Some(SagaState::Failed),
            SagaEvent::StepStarted(_)
            | SagaEvent::CartLoaded(_)
            | SagaEvent::CartClearDeferred(_)
            | SagaEvent::StepOutcomeUnknown(_)
            | SagaEvent::StepFailed(_)
            | SagaEvent::CompensationStepCompleted(_)
            | SagaEvent::CompensationStepFailed(_)
            | SagaEvent::SagaCompleted => None,
        }
    }
}

// Query methods
impl PurchaseSaga {
    /// Returns the saga ID, once started.
    pub fn id(&self) -> Option<SagaId> {
        self.id
    }

    /// Returns the user this checkout belongs to.
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Returns the saga type.
    pub fn saga_type(&self) -> &str {
        &self.saga_type
    }

    /// Returns the saga state.
    pub fn state(&self) -> SagaState {
        self.state
    }

    /// Returns the step currently (or last) executing.
    pub fn current_step(&self) -> Option<&str> {
        self.current_step.as_deref()
    }

    /// Returns the steps that must be undone on failure, in commit order.
    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }

    /// Returns the number of cart lines checked out.
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Returns the validated total, once prices were checked.
    pub fn total(&self) -> Option<Money> {
        self.total
    }

    /// Returns the created order's ID, if any.
    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    /// Returns the recorded purchase's ID, if any.
    pub fn purchase_id(&self) -> Option<PurchaseId> {
        self.purchase_id
    }

    /// Returns the step whose failure started the unwinding.
    pub fn failed_step(&self) -> Option<&str> {
        self.failed_step.as_deref()
    }

    /// Returns the failure reason, if any.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Returns a description of every compensation that failed.
    pub fn compensation_failures(&self) -> &[String] {
        &self.compensation_failures
    }

    /// Returns true if the cart still needs clearing.
    pub fn cart_clear_deferred(&self) -> bool {
        self.cart_clear_deferred
    }

    /// Returns true once the purchase has gone through.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Returns every applied event, in order.
    pub fn history(&self) -> &[RecordedEvent] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::purchase_checkout::{
        SAGA_TYPE, STEP_CLEAR_CART, STEP_CREATE_ORDER, STEP_DEBIT_WALLET, STEP_FETCH_CART,
        STEP_RECORD_PURCHASE, STEP_VALIDATE_PRICES,
    };

    fn started() -> (PurchaseSaga, SagaId, UserId) {
        let mut saga = PurchaseSaga::default();
        let saga_id = SagaId::new();
        let user_id = UserId::new();
        saga.apply(SagaEvent::saga_started(saga_id, user_id, SAGA_TYPE));
        (saga, saga_id, user_id)
    }

    #[test]
    fn test_default_saga_instance() {
        let saga = PurchaseSaga::default();
        assert!(saga.id().is_none());
        assert_eq!(saga.state(), SagaState::NotStarted);
        assert!(saga.completed_steps().is_empty());
        assert!(saga.history().is_empty());
    }

    #[test]
    fn test_apply_saga_started() {
        let (saga, saga_id, user_id) = started();

        assert_eq!(saga.id(), Some(saga_id));
        assert_eq!(saga.user_id(), Some(user_id));
        assert_eq!(saga.saga_type(), SAGA_TYPE);
        assert_eq!(saga.state(), SagaState::Started);
    }

    #[test]
    fn test_apply_full_lifecycle() {
        let (mut saga, _, _) = started();

        saga.apply(SagaEvent::step_started(STEP_FETCH_CART));
        saga.apply(SagaEvent::cart_loaded(2));
        saga.apply(SagaEvent::step_started(STEP_VALIDATE_PRICES));
        saga.apply(SagaEvent::prices_validated(Money::from_cents(2500)));
        assert_eq!(saga.state(), SagaState::Priced);
        assert_eq!(saga.total(), Some(Money::from_cents(2500)));

        saga.apply(SagaEvent::step_started(STEP_DEBIT_WALLET));
        saga.apply(SagaEvent::wallet_debited(Money::from_cents(2500)));
        saga.apply(SagaEvent::step_started(STEP_CREATE_ORDER));
        saga.apply(SagaEvent::order_created(OrderId::new(7)));
        saga.apply(SagaEvent::step_started(STEP_RECORD_PURCHASE));
        saga.apply(SagaEvent::purchase_recorded(PurchaseId::new(1)));
        assert_eq!(saga.state(), SagaState::Recorded);

        saga.apply(SagaEvent::step_started(STEP_CLEAR_CART));
        saga.apply(SagaEvent::cart_cleared(STEP_CLEAR_CART));
        saga.apply(SagaEvent::SagaCompleted);

        assert_eq!(saga.state(), SagaState::Cleared);
        assert!(saga.state().is_terminal());
        assert!(saga.is_completed());
        assert_eq!(saga.line_count(), 2);
        assert_eq!(saga.order_id(), Some(OrderId::new(7)));
        assert_eq!(saga.purchase_id(), Some(PurchaseId::new(1)));
        assert_eq!(
            saga.completed_steps(),
            &[STEP_DEBIT_WALLET, STEP_CREATE_ORDER, STEP_RECORD_PURCHASE]
        );
        assert_eq!(saga.current_step(), Some(STEP_CLEAR_CART));
        // SagaStarted plus the 13 events applied above
        assert_eq!(saga.history().len(), 14);
        assert!(matches!(
            saga.history().first().map(|e| &e.event),
            Some(SagaEvent::SagaStarted(_))
        ));
        assert!(matches!(
            saga.history().last().map(|e| &e.event),
            Some(SagaEvent::SagaCompleted)
        ));
    }

    #[test]
    fn test_deferred_cart_clear_stays_recorded() {
        let (mut saga, _, _) = started();
        saga.apply(SagaEvent::prices_validated(Money::from_cents(100)));
        saga.apply(SagaEvent::wallet_debited(Money::from_cents(100)));
        saga.apply(SagaEvent::order_created(OrderId::new(1)));
        saga.apply(SagaEvent::purchase_recorded(PurchaseId::new(1)));
        saga.apply(SagaEvent::cart_clear_deferred(STEP_CLEAR_CART, "503"));
        saga.apply(SagaEvent::SagaCompleted);

        assert_eq!(saga.state(), SagaState::Recorded);
        assert!(saga.state().is_success());
        assert!(saga.cart_clear_deferred());
        assert!(saga.is_completed());
    }

    #[test]
    fn test_unknown_debit_outcome_is_compensable() {
        let (mut saga, _, _) = started();
        saga.apply(SagaEvent::prices_validated(Money::from_cents(100)));
        saga.apply(SagaEvent::step_outcome_unknown(
            STEP_DEBIT_WALLET,
            "call timed out",
        ));

        assert_eq!(saga.state(), SagaState::Priced);
        assert_eq!(saga.completed_steps(), &[STEP_DEBIT_WALLET]);
        assert_eq!(saga.failed_step(), Some(STEP_DEBIT_WALLET));

        saga.apply(SagaEvent::compensation_started(STEP_DEBIT_WALLET));
        assert_eq!(saga.state(), SagaState::Compensating);
        saga.apply(SagaEvent::compensation_step_completed(STEP_DEBIT_WALLET));
        saga.apply(SagaEvent::saga_compensated("wallet unavailable"));
        assert_eq!(saga.state(), SagaState::Compensated);
    }

    #[test]
    fn test_compensation_failure_is_tracked() {
        let (mut saga, _, _) = started();
        saga.apply(SagaEvent::prices_validated(Money::from_cents(100)));
        saga.apply(SagaEvent::wallet_debited(Money::from_cents(100)));
        saga.apply(SagaEvent::step_failed(STEP_CREATE_ORDER, "rejected"));
        saga.apply(SagaEvent::compensation_started(STEP_CREATE_ORDER));

        saga.apply(SagaEvent::compensation_step_failed(
            STEP_DEBIT_WALLET,
            "wallet down",
        ));
        // Still compensating; compensation failures don't stop the chain
        assert_eq!(saga.state(), SagaState::Compensating);

        saga.apply(SagaEvent::saga_failed("order rejected"));
        assert_eq!(saga.state(), SagaState::Failed);
        assert_eq!(saga.compensation_failures(), &["debit_wallet: wallet down"]);
        assert_eq!(saga.failure_reason(), Some("order rejected"));
    }

    #[test]
    fn test_abort_before_commit() {
        let (mut saga, _, _) = started();
        saga.apply(SagaEvent::step_failed(STEP_FETCH_CART, "cart is empty"));
        saga.apply(SagaEvent::saga_aborted("cart is empty"));

        assert_eq!(saga.state(), SagaState::Aborted);
        assert!(saga.completed_steps().is_empty());
    }

    #[test]
    fn test_invalid_transition_is_ignored() {
        let (mut saga, _, _) = started();

        saga.apply(SagaEvent::order_created(OrderId::new(1)));

        assert_eq!(saga.state(), SagaState::Started);
        assert_eq!(saga.history().len(), 2);
    }

    #[test]
    fn test_serialization() {
        let (mut saga, saga_id, _) = started();
        saga.apply(SagaEvent::prices_validated(Money::from_cents(100)));

        let json = serde_json::to_string(&saga).unwrap();
        let deserialized: PurchaseSaga = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.id(), Some(saga_id));
        assert_eq!(deserialized.state(), SagaState::Priced);
        assert_eq!(deserialized.total(), Some(Money::from_cents(100)));
    }
}
