// service/escrow.rs
//
// Escrow lifecycle of a project payment:
//
//   none -> held -> released
//                -> refunded
//
// `held` is entered only by settling a verified project payment. Release and
// refund are mutually exclusive terminal transitions; repeating a release is
// a tolerated no-op so flaky clients can retry safely.

use crate::models::paymentmodels::EscrowStatus;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EscrowAction {
    Release,
    Refund,
}

impl EscrowAction {
    pub fn to_str(&self) -> &str {
        match self {
            EscrowAction::Release => "release",
            EscrowAction::Refund => "refund",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EscrowPlan {
    /// The transition is valid; perform the guarded write and wallet move.
    Apply,
    /// Retry of an already-applied release: succeed without touching anything.
    AlreadySettled,
    /// Out-of-order or conflicting transition; reject without side effects.
    Invalid,
}

pub fn plan_transition(current: EscrowStatus, action: EscrowAction) -> EscrowPlan {
    match (current, action) {
        (EscrowStatus::Held, _) => EscrowPlan::Apply,
        (EscrowStatus::Released, EscrowAction::Release) => EscrowPlan::AlreadySettled,
        (EscrowStatus::Released, EscrowAction::Refund)
        | (EscrowStatus::Refunded, _)
        | (EscrowStatus::None, _) => EscrowPlan::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_funds_can_release_or_refund() {
        assert_eq!(plan_transition(EscrowStatus::Held, EscrowAction::Release), EscrowPlan::Apply);
        assert_eq!(plan_transition(EscrowStatus::Held, EscrowAction::Refund), EscrowPlan::Apply);
    }

    #[test]
    fn repeat_release_is_a_noop() {
        assert_eq!(
            plan_transition(EscrowStatus::Released, EscrowAction::Release),
            EscrowPlan::AlreadySettled
        );
    }

    #[test]
    fn refund_after_release_is_invalid() {
        assert_eq!(
            plan_transition(EscrowStatus::Released, EscrowAction::Refund),
            EscrowPlan::Invalid
        );
    }

    #[test]
    fn refunded_is_terminal_for_both_actions() {
        assert_eq!(
            plan_transition(EscrowStatus::Refunded, EscrowAction::Release),
            EscrowPlan::Invalid
        );
        assert_eq!(
            plan_transition(EscrowStatus::Refunded, EscrowAction::Refund),
            EscrowPlan::Invalid
        );
    }

    #[test]
    fn unheld_payments_cannot_transition() {
        assert_eq!(
            plan_transition(EscrowStatus::None, EscrowAction::Release),
            EscrowPlan::Invalid
        );
        assert_eq!(
            plan_transition(EscrowStatus::None, EscrowAction::Refund),
            EscrowPlan::Invalid
        );
    }
}
