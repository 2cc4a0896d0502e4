//! Checkout saga events.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, PurchaseId, SagaId, UserId};
use serde::{Deserialize, Serialize};

/// Events that can occur during a checkout saga.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SagaEvent {
    /// Saga execution started.
    SagaStarted(SagaStartedData),

    /// A step started execution.
    StepStarted(StepData),

    /// The cart was fetched and is not empty.
    CartLoaded(CartLoadedData),

    /// Every captured price matched the current price.
    PricesValidated(AmountData),

    /// The wallet accepted the debit.
    WalletDebited(AmountData),

    /// The order service created the order.
    OrderCreated(OrderCreatedData),

    /// The purchase row was written.
    PurchaseRecorded(PurchaseRecordedData),

    /// The cart was cleared.
    CartCleared(StepData),

    /// The cart could not be cleared; the purchase stands.
    CartClearDeferred(StepFailedData),

    /// A side-effecting step failed in a way that may have applied it.
    StepOutcomeUnknown(StepFailedData),

    /// A step failed.
    StepFailed(StepFailedData),

    /// Compensation started after a step failure.
    CompensationStarted(CompensationData),

    /// A compensation step completed successfully.
    CompensationStepCompleted(StepData),

    /// A compensation step failed (logged, compensation continues).
    CompensationStepFailed(StepFailedData),

    /// Saga completed successfully.
    SagaCompleted,

    /// Saga stopped before anything was committed.
    SagaAborted(ReasonData),

    /// Saga failed and every committed step was undone.
    SagaCompensated(ReasonData),

    /// Saga failed and at least one compensation did not complete.
    SagaFailed(ReasonData),
}

impl SagaEvent {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::SagaStarted(_) => "SagaStarted",
            SagaEvent::StepStarted(_) => "StepStarted",
            SagaEvent::CartLoaded(_) => "CartLoaded",
            SagaEvent::PricesValidated(_) => "PricesValidated",
            SagaEvent::WalletDebited(_) => "WalletDebited",
            SagaEvent::OrderCreated(_) => "OrderCreated",
            SagaEvent::PurchaseRecorded(_) => "PurchaseRecorded",
            SagaEvent::CartCleared(_) => "CartCleared",
            SagaEvent::CartClearDeferred(_) => "CartClearDeferred",
            SagaEvent::StepOutcomeUnknown(_) => "StepOutcomeUnknown",
            SagaEvent::StepFailed(_) => "StepFailed",
            SagaEvent::CompensationStarted(_) => "CompensationStarted",
            SagaEvent::CompensationStepCompleted(_) => "CompensationStepCompleted",
            SagaEvent::CompensationStepFailed(_) => "CompensationStepFailed",
            SagaEvent::SagaCompleted => "SagaCompleted",
            SagaEvent::SagaAborted(_) => "SagaAborted",
            SagaEvent::SagaCompensated(_) => "SagaCompensated",
            SagaEvent::SagaFailed(_) => "SagaFailed",
        }
    }
}

/// Data for SagaStarted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaStartedData {
    pub saga_id: SagaId,
    /// The user checking out.
    pub user_id: UserId,
    /// The type of saga (e.g., "PurchaseCheckout").
    pub saga_type: String,
}

/// Data for events that only carry a step name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepData {
    pub step_name: String,
}

/// Data for CartLoaded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLoadedData {
    pub line_count: usize,
}

/// Data for events carrying an amount of money.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountData {
    pub amount: Money,
}

/// Data for OrderCreated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreatedData {
    pub order_id: OrderId,
}

/// Data for PurchaseRecorded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRecordedData {
    pub purchase_id: PurchaseId,
}

/// Data for step failure events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailedData {
    /// The step that failed.
    pub step_name: String,
    /// Error message describing the failure.
    pub error: String,
}

/// Data for CompensationStarted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationData {
    /// The step that triggered compensation.
    pub from_step: String,
}

/// Data for the saga's final failure events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonData {
    pub reason: String,
}

/// An event as it was applied to a saga, with the time it was applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub recorded_at: DateTime<Utc>,
    pub event: SagaEvent,
}

// Convenience constructors
impl SagaEvent {
    /// Creates a SagaStarted event.
    pub fn saga_started(saga_id: SagaId, user_id: UserId, saga_type: impl Into<String>) -> Self {
        SagaEvent::SagaStarted(SagaStartedData {
            saga_id,
            user_id,
            saga_type: saga_type.into(),
        })
    }

    /// Creates a StepStarted event.
    pub fn step_started(step_name: impl Into<String>) -> Self {
        SagaEvent::StepStarted(StepData {
            step_name: step_name.into(),
        })
    }

    /// Creates a CartLoaded event.
    pub fn cart_loaded(line_count: usize) -> Self {
        SagaEvent::CartLoaded(CartLoadedData { line_count })
    }

    /// Creates a PricesValidated event carrying the computed total.
    pub fn prices_validated(total: Money) -> Self {
        SagaEvent::PricesValidated(AmountData { amount: total })
    }

    /// Creates a WalletDebited event.
    pub fn wallet_debited(amount: Money) -> Self {
        SagaEvent::WalletDebited(AmountData { amount })
    }

    /// Creates an OrderCreated event.
    pub fn order_created(order_id: OrderId) -> Self {
        SagaEvent::OrderCreated(OrderCreatedData { order_id })
    }

    /// Creates a PurchaseRecorded event.
    pub fn purchase_recorded(purchase_id: PurchaseId) -> Self {
        SagaEvent::PurchaseRecorded(PurchaseRecordedData { purchase_id })
    }

    /// Creates a CartCleared event.
    pub fn cart_cleared(step_name: impl Into<String>) -> Self {
        SagaEvent::CartCleared(StepData {
            step_name: step_name.into(),
        })
    }

    /// Creates a CartClearDeferred event.
    pub fn cart_clear_deferred(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        SagaEvent::CartClearDeferred(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    /// Creates a StepOutcomeUnknown event.
    pub fn step_outcome_unknown(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        SagaEvent::StepOutcomeUnknown(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    /// Creates a StepFailed event.
    pub fn step_failed(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        SagaEvent::StepFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    /// Creates a CompensationStarted event.
    pub fn compensation_started(from_step: impl Into<String>) -> Self {
        SagaEvent::CompensationStarted(CompensationData {
            from_step: from_step.into(),
        })
    }

    /// Creates a CompensationStepCompleted event.
    pub fn compensation_step_completed(step_name: impl Into<String>) -> Self {
        SagaEvent::CompensationStepCompleted(StepData {
            step_name: step_name.into(),
        })
    }

    /// Creates a CompensationStepFailed event.
    pub fn compensation_step_failed(
        step_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        SagaEvent::CompensationStepFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    /// Creates a SagaAborted event.
    pub fn saga_aborted(reason: impl Into<String>) -> Self {
        SagaEvent::SagaAborted(ReasonData {
            reason: reason.into(),
        })
    }

    /// Creates a SagaCompensated event.
    pub fn saga_compensated(reason: impl Into<String>) -> Self {
        SagaEvent::SagaCompensated(ReasonData {
            reason: reason.into(),
        })
    }

    /// Creates a SagaFailed event.
    pub fn saga_failed(reason: impl Into<String>) -> Self {
        SagaEvent::SagaFailed(ReasonData {
            reason: reason.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type() {
        assert_eq!(
            SagaEvent::saga_started(SagaId::new(), UserId::new(), "PurchaseCheckout").event_type(),
            "SagaStarted"
        );
        assert_eq!(
            SagaEvent::wallet_debited(Money::from_cents(100)).event_type(),
            "WalletDebited"
        );
        assert_eq!(
            SagaEvent::step_outcome_unknown("debit_wallet", "timed out").event_type(),
            "StepOutcomeUnknown"
        );
        assert_eq!(
            SagaEvent::cart_clear_deferred("clear_cart", "503").event_type(),
            "CartClearDeferred"
        );
        assert_eq!(SagaEvent::SagaCompleted.event_type(), "SagaCompleted");
        assert_eq!(
            SagaEvent::saga_compensated("order failed").event_type(),
            "SagaCompensated"
        );
    }

    #[test]
    fn test_adjacent_tagging() {
        let event = SagaEvent::order_created(OrderId::new(12));

        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "OrderCreated");
        assert_eq!(json["data"]["order_id"], 12);
    }

    #[test]
    fn test_saga_started_data() {
        let saga_id = SagaId::new();
        let user_id = UserId::new();
        let event = SagaEvent::saga_started(saga_id, user_id, "PurchaseCheckout");

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: SagaEvent = serde_json::from_str(&json).unwrap();

        if let SagaEvent::SagaStarted(data) = deserialized {
            assert_eq!(data.saga_id, saga_id);
            assert_eq!(data.user_id, user_id);
            assert_eq!(data.saga_type, "PurchaseCheckout");
        } else {
            panic!("Expected SagaStarted event");
        }
    }
}
