//! Engine error taxonomy.
//!
//! Every user-visible failure carries a stable machine-readable kind and a
//! human message; raw storage errors never leak past the store layer.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors surfaced by the investment engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Amount is zero or negative.
    #[error("invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Amount falls outside the plan's configured range.
    #[error("amount {amount} is outside plan range [{min}, {max}]")]
    AmountOutOfRange {
        amount: Decimal,
        min: Decimal,
        max: Decimal,
    },

    /// No plan with that name exists (or it is soft-deleted).
    #[error("investment plan not found: {0}")]
    PlanNotFound(String),

    /// The plan exists but is not accepting investments.
    #[error("investment plan is inactive: {0}")]
    PlanInactive(String),

    /// A debit would push a ledger field negative.
    #[error("insufficient balance in {field}: have {available}, need {requested}")]
    InsufficientBalance {
        field: String,
        available: Decimal,
        requested: Decimal,
    },

    /// Illegal lifecycle transition (e.g. approving twice).
    #[error("invalid transition for investment {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: &'static str,
        to: &'static str,
    },

    /// Operation not valid in the investment's current state (e.g. accruing
    /// profit after expiry).
    #[error("invalid state for investment {id}: {detail}")]
    InvalidState { id: String, detail: String },

    /// A referenced user or investment does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Lock conflict or connection hiccup; retried internally before
    /// surfacing.
    #[error("transient storage error: {0}")]
    Transient(String),

    /// Non-transient storage failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    /// Stable kind identifier for API surfaces and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_)
            | Self::AmountOutOfRange { .. }
            | Self::PlanNotFound(_)
            | Self::PlanInactive(_) => "validation",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::InvalidTransition { .. } | Self::InvalidState { .. } => "state",
            Self::NotFound { .. } => "not_found",
            Self::Transient(_) => "transient",
            Self::Storage(_) => "storage",
        }
    }

    /// True for failures worth retrying with backoff.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Shorthand for a missing user.
    #[must_use]
    pub fn user_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "user",
            id: id.into(),
        }
    }

    /// Shorthand for a missing investment.
    #[must_use]
    pub fn investment_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "investment",
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_kinds_are_stable() {
        assert_eq!(EngineError::InvalidAmount(dec!(-1)).kind(), "validation");
        assert_eq!(
            EngineError::PlanNotFound("starter".into()).kind(),
            "validation"
        );
        assert_eq!(
            EngineError::InsufficientBalance {
                field: "usdt_available".into(),
                available: dec!(1),
                requested: dec!(2),
            }
            .kind(),
            "insufficient_balance"
        );
        assert_eq!(
            EngineError::InvalidTransition {
                id: "inv".into(),
                from: "approved",
                to: "approved",
            }
            .kind(),
            "state"
        );
        assert_eq!(
            EngineError::InvalidState {
                id: "inv".into(),
                detail: "expired".into(),
            }
            .kind(),
            "state"
        );
        assert_eq!(EngineError::user_not_found("u").kind(), "not_found");
        assert_eq!(EngineError::Transient("conflict".into()).kind(), "transient");
        assert_eq!(EngineError::Storage("boom".into()).kind(), "storage");
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(EngineError::Transient("lock".into()).is_transient());
        assert!(!EngineError::Storage("io".into()).is_transient());
        assert!(!EngineError::investment_not_found("x").is_transient());
    }

    #[test]
    fn test_messages_are_human_readable() {
        let err = EngineError::AmountOutOfRange {
            amount: dec!(50),
            min: dec!(100),
            max: dec!(1000),
        };
        assert_eq!(
            err.to_string(),
            "amount 50 is outside plan range [100, 1000]"
        );
    }
}
