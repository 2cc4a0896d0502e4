//! Checkout saga state machine.

use serde::{Deserialize, Serialize};

/// The state of a checkout saga in its lifecycle.
///
/// State transitions:
/// ```text
/// NotStarted ──► Started ──► Priced ──► Debited ──► Ordered ──► Recorded ──► Cleared
///                   │           │          │           │
///                   └───────────┴─► Aborted│           │
///                               │          │           │
///                               └──────────┴───────────┴──► Compensating ──┬──► Compensated
///                                                                          └──► Failed
/// ```
///
/// `Recorded` is also a successful end state when the cart clear is deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    /// Saga has not started yet.
    #[default]
    NotStarted,

    /// The cart is being loaded.
    Started,

    /// Every cart line matched the current catalog price.
    Priced,

    /// The wallet was debited (or the debit outcome is unknown).
    Debited,

    /// The order service created the order.
    Ordered,

    /// The purchase row was written to the ledger.
    Recorded,

    /// The cart was cleared (terminal state).
    Cleared,

    /// Failed before anything was committed (terminal state).
    Aborted,

    /// A step failed after a commit and compensating actions are running.
    Compensating,

    /// Every compensating action succeeded (terminal state).
    Compensated,

    /// A compensating action failed; manual reconciliation needed (terminal state).
    Failed,
}

impl SagaState {
    /// Returns true if the machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: SagaState) -> bool {
        use SagaState::*;
        matches!(
            (self, next),
            (NotStarted, Started)
                | (Started, Priced)
                | (Started, Aborted)
                | (Priced, Debited)
                | (Priced, Aborted)
                | (Priced, Compensating)
                | (Debited, Ordered)
                | (Debited, Compensating)
                | (Ordered, Recorded)
                | (Ordered, Compensating)
                | (Recorded, Cleared)
                | (Compensating, Compensated)
                | (Compensating, Failed)
        )
    }

    /// Returns true if this is a terminal state.
    ///
    /// `Recorded` is not terminal here even though a saga may finish in it;
    /// see [`SagaState::is_success`].
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaState::Cleared | SagaState::Aborted | SagaState::Compensated | SagaState::Failed
        )
    }

    /// Returns true if the purchase went through.
    pub fn is_success(&self) -> bool {
        matches!(self, SagaState::Recorded | SagaState::Cleared)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::NotStarted => "NotStarted",
            SagaState::Started => "Started",
            SagaState::Priced => "Priced",
            SagaState::Debited => "Debited",
            SagaState::Ordered => "Ordered",
            SagaState::Recorded => "Recorded",
            SagaState::Cleared => "Cleared",
            SagaState::Aborted => "Aborted",
            SagaState::Compensating => "Compensating",
            SagaState::Compensated => "Compensated",
            SagaState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SagaState; 11] = [
        SagaState::NotStarted,
        SagaState::Started,
        SagaState::Priced,
        SagaState::Debited,
        SagaState::Ordered,
        SagaState::Recorded,
        SagaState::Cleared,
        SagaState::Aborted,
        SagaState::Compensating,
        SagaState::Compensated,
        SagaState::Failed,
    ];

    #[test]
    fn test_default_state_is_not_started() {
        assert_eq!(SagaState::default(), SagaState::NotStarted);
    }

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            SagaState::NotStarted,
            SagaState::Started,
            SagaState::Priced,
            SagaState::Debited,
            SagaState::Ordered,
            SagaState::Recorded,
            SagaState::Cleared,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_abort_only_before_commit() {
        assert!(SagaState::Started.can_transition_to(SagaState::Aborted));
        assert!(SagaState::Priced.can_transition_to(SagaState::Aborted));
        assert!(!SagaState::Debited.can_transition_to(SagaState::Aborted));
        assert!(!SagaState::Ordered.can_transition_to(SagaState::Aborted));
    }

    #[test]
    fn test_compensation_transitions() {
        assert!(SagaState::Priced.can_transition_to(SagaState::Compensating));
        assert!(SagaState::Debited.can_transition_to(SagaState::Compensating));
        assert!(SagaState::Ordered.can_transition_to(SagaState::Compensating));
        assert!(!SagaState::Recorded.can_transition_to(SagaState::Compensating));
        assert!(!SagaState::Started.can_transition_to(SagaState::Compensating));
        assert!(SagaState::Compensating.can_transition_to(SagaState::Compensated));
        assert!(SagaState::Compensating.can_transition_to(SagaState::Failed));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in ALL.iter().filter(|state| state.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_success_states() {
        assert!(SagaState::Recorded.is_success());
        assert!(SagaState::Cleared.is_success());
        assert!(!SagaState::Compensated.is_success());
        assert!(!SagaState::Aborted.is_success());
    }

    #[test]
    fn test_display() {
        assert_eq!(SagaState::Debited.to_string(), "Debited");
        assert_eq!(SagaState::Compensating.to_string(), "Compensating");
    }

    #[test]
    fn test_serialization() {
        let state = SagaState::Ordered;
        let json = serde_json::to_string(&state).unwrap();
        let deserialized: SagaState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
