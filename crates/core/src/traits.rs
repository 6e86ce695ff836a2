//! Storage seams between the engine and its persistence layer.
//!
//! `coinvault-data` implements these against PostgreSQL; the engine crate
//! ships an in-memory implementation for simulation and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::balance::{BalanceMutation, UserBalances};
use crate::error::EngineError;
use crate::investment::{Investment, InvestmentStatus};
use crate::plan::InvestmentPlan;
use crate::referral::ReferralEdge;
use crate::transaction::{NewTransaction, TransactionRecord};

/// Outcome of claiming one investment's accrual day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccrualClaim {
    /// The day was claimed; `previous` is the prior `last_profit_update`,
    /// needed to compensate if the ledger credit fails afterwards.
    Claimed { previous: Option<DateTime<Utc>> },
    /// An accrual already ran during this UTC day.
    AlreadyAccrued,
    /// The investment is not in an accruable state.
    NotAccruable,
}

/// Per-user balance ledger persistence.
///
/// Implementations must serialize concurrent mutations on the same user
/// (row lock or equivalent) and commit the audit record together with the
/// balance update, atomically.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Current balances for a user.
    async fn balances(&self, user_id: &str) -> Result<UserBalances, EngineError>;

    /// Applies a mutation batch and its paired audit record as one atomic
    /// unit, returning the post-mutation balances.
    async fn apply_mutations(
        &self,
        user_id: &str,
        mutations: &[BalanceMutation],
        audit: NewTransaction,
    ) -> Result<UserBalances, EngineError>;
}

/// Read access to the plan catalog, plus the seeding write.
#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn plan_by_name(&self, name: &str) -> Result<Option<InvestmentPlan>, EngineError>;

    async fn upsert_plan(&self, plan: &InvestmentPlan) -> Result<(), EngineError>;
}

/// Investment persistence and its conditional state transitions.
#[async_trait]
pub trait InvestmentStore: Send + Sync {
    async fn insert_investment(&self, investment: &Investment) -> Result<(), EngineError>;

    async fn investment(&self, id: &str) -> Result<Option<Investment>, EngineError>;

    /// Compare-and-swap status transition. Returns `false` when the current
    /// status does not match `from` (the caller maps that to a state error).
    async fn transition_status(
        &self,
        id: &str,
        from: InvestmentStatus,
        to: InvestmentStatus,
        remarks: Option<&str>,
    ) -> Result<bool, EngineError>;

    /// Atomically claims the accrual day for `now`: bumps `accrued_profit`
    /// by `profit` and sets `last_profit_update = now`, only when the
    /// investment is approved and no accrual ran this UTC day.
    async fn claim_daily_accrual(
        &self,
        id: &str,
        profit: Decimal,
        now: DateTime<Utc>,
    ) -> Result<AccrualClaim, EngineError>;

    /// Reverses a claimed accrual after a downstream failure.
    async fn revert_daily_accrual(
        &self,
        id: &str,
        profit: Decimal,
        previous: Option<DateTime<Utc>>,
    ) -> Result<(), EngineError>;

    /// Every approved investment, for the scheduler sweep.
    async fn list_approved(&self) -> Result<Vec<Investment>, EngineError>;
}

/// Referral graph persistence.
#[async_trait]
pub trait ReferralStore: Send + Sync {
    /// The level-1 edge whose referred side is `user_id`, if any.
    async fn direct_referrer_of(
        &self,
        user_id: &str,
    ) -> Result<Option<ReferralEdge>, EngineError>;

    async fn edge(
        &self,
        referrer_id: &str,
        referred_id: &str,
        level: i16,
    ) -> Result<Option<ReferralEdge>, EngineError>;

    async fn insert_edge(&self, edge: &ReferralEdge) -> Result<(), EngineError>;

    /// Increments an edge's cumulative commission, activates it, and marks
    /// commission as paid.
    async fn record_commission(
        &self,
        referrer_id: &str,
        referred_id: &str,
        level: i16,
        amount: Decimal,
    ) -> Result<(), EngineError>;
}

/// Append-only audit trail access.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Appends a standalone record (one not paired with a ledger mutation,
    /// e.g. investment creation).
    async fn append_transaction(
        &self,
        tx: NewTransaction,
    ) -> Result<TransactionRecord, EngineError>;

    /// A user's records, newest first.
    async fn transactions_for_user(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<TransactionRecord>, EngineError>;
}

/// Everything the engine needs from storage.
pub trait EngineStore:
    LedgerStore + PlanStore + InvestmentStore + ReferralStore + TransactionStore
{
}

impl<S> EngineStore for S where
    S: LedgerStore + PlanStore + InvestmentStore + ReferralStore + TransactionStore
{
}
