//! In-memory store: the engine's simulation and test double.
//!
//! Implements every storage trait against process memory. A single write
//! lock serializes mutations, which trivially satisfies the per-user
//! serialization requirement; the PostgreSQL implementation in
//! `coinvault-data` uses row locks instead. Ledger failure injection is
//! exposed so batch jobs can be exercised against failing users.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coinvault_core::balance::{BalanceMutation, UserBalances};
use coinvault_core::investment::{Investment, InvestmentStatus};
use coinvault_core::plan::InvestmentPlan;
use coinvault_core::referral::ReferralEdge;
use coinvault_core::traits::{
    AccrualClaim, InvestmentStore, LedgerStore, PlanStore, ReferralStore, TransactionStore,
};
use coinvault_core::transaction::{NewTransaction, TransactionRecord};
use coinvault_core::EngineError;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryState {
    users: HashMap<String, UserBalances>,
    plans: HashMap<String, InvestmentPlan>,
    investments: HashMap<String, Investment>,
    referrals: HashMap<(String, String, i16), ReferralEdge>,
    transactions: Vec<TransactionRecord>,
    failing_ledgers: HashSet<String>,
}

/// Process-memory implementation of the engine's storage traits.
#[derive(Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user with a zeroed ledger.
    pub async fn add_user(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        let mut state = self.state.write().await;
        state
            .users
            .entry(user_id.clone())
            .or_insert_with(|| UserBalances::new(user_id));
    }

    /// Makes every ledger mutation for `user_id` fail with a storage error
    /// until cleared. For exercising continue-on-error paths.
    pub async fn set_ledger_failure(&self, user_id: impl Into<String>, failing: bool) {
        let user_id = user_id.into();
        let mut state = self.state.write().await;
        if failing {
            state.failing_ledgers.insert(user_id);
        } else {
            state.failing_ledgers.remove(&user_id);
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn balances(&self, user_id: &str) -> Result<UserBalances, EngineError> {
        let state = self.state.read().await;
        state
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| EngineError::user_not_found(user_id))
    }

    async fn apply_mutations(
        &self,
        user_id: &str,
        mutations: &[BalanceMutation],
        audit: NewTransaction,
    ) -> Result<UserBalances, EngineError> {
        // One critical section covers the balance update and the audit
        // append, mirroring the SQL transaction in the Postgres store.
        let mut state = self.state.write().await;
        if state.failing_ledgers.contains(user_id) {
            return Err(EngineError::Storage(format!(
                "injected ledger failure for user {user_id}"
            )));
        }
        let balances = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| EngineError::user_not_found(user_id))?;
        balances.apply_all(mutations)?;
        let updated = balances.clone();
        state.transactions.push(audit.into_record(Utc::now()));
        Ok(updated)
    }
}

#[async_trait]
impl PlanStore for MemoryStore {
    async fn plan_by_name(&self, name: &str) -> Result<Option<InvestmentPlan>, EngineError> {
        let state = self.state.read().await;
        Ok(state.plans.get(name).cloned())
    }

    async fn upsert_plan(&self, plan: &InvestmentPlan) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        state.plans.insert(plan.name.clone(), plan.clone());
        Ok(())
    }
}

#[async_trait]
impl InvestmentStore for MemoryStore {
    async fn insert_investment(&self, investment: &Investment) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        state
            .investments
            .insert(investment.id.clone(), investment.clone());
        Ok(())
    }

    async fn investment(&self, id: &str) -> Result<Option<Investment>, EngineError> {
        let state = self.state.read().await;
        Ok(state.investments.get(id).cloned())
    }

    async fn transition_status(
        &self,
        id: &str,
        from: InvestmentStatus,
        to: InvestmentStatus,
        remarks: Option<&str>,
    ) -> Result<bool, EngineError> {
        let mut state = self.state.write().await;
        let investment = state
            .investments
            .get_mut(id)
            .ok_or_else(|| EngineError::investment_not_found(id))?;
        if investment.status != from {
            return Ok(false);
        }
        investment.status = to;
        if let Some(remarks) = remarks {
            investment.remarks = Some(remarks.to_string());
        }
        Ok(true)
    }

    async fn claim_daily_accrual(
        &self,
        id: &str,
        profit: Decimal,
        now: DateTime<Utc>,
    ) -> Result<AccrualClaim, EngineError> {
        let mut state = self.state.write().await;
        let investment = state
            .investments
            .get_mut(id)
            .ok_or_else(|| EngineError::investment_not_found(id))?;
        if investment.status != InvestmentStatus::Approved {
            return Ok(AccrualClaim::NotAccruable);
        }
        if investment.accrued_on_day(now) {
            return Ok(AccrualClaim::AlreadyAccrued);
        }
        let previous = investment.last_profit_update;
        investment.accrued_profit += profit;
        investment.last_profit_update = Some(now);
        Ok(AccrualClaim::Claimed { previous })
    }

    async fn revert_daily_accrual(
        &self,
        id: &str,
        profit: Decimal,
        previous: Option<DateTime<Utc>>,
    ) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        let investment = state
            .investments
            .get_mut(id)
            .ok_or_else(|| EngineError::investment_not_found(id))?;
        investment.accrued_profit -= profit;
        investment.last_profit_update = previous;
        Ok(())
    }

    async fn list_approved(&self) -> Result<Vec<Investment>, EngineError> {
        let state = self.state.read().await;
        let mut approved: Vec<Investment> = state
            .investments
            .values()
            .filter(|i| i.status == InvestmentStatus::Approved)
            .cloned()
            .collect();
        approved.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(approved)
    }
}

#[async_trait]
impl ReferralStore for MemoryStore {
    async fn direct_referrer_of(
        &self,
        user_id: &str,
    ) -> Result<Option<ReferralEdge>, EngineError> {
        let state = self.state.read().await;
        Ok(state
            .referrals
            .values()
            .find(|e| e.referred_id == user_id && e.level == 1)
            .cloned())
    }

    async fn edge(
        &self,
        referrer_id: &str,
        referred_id: &str,
        level: i16,
    ) -> Result<Option<ReferralEdge>, EngineError> {
        let state = self.state.read().await;
        Ok(state
            .referrals
            .get(&(referrer_id.to_string(), referred_id.to_string(), level))
            .cloned())
    }

    async fn insert_edge(&self, edge: &ReferralEdge) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        state.referrals.insert(
            (
                edge.referrer_id.clone(),
                edge.referred_id.clone(),
                edge.level,
            ),
            edge.clone(),
        );
        Ok(())
    }

    async fn record_commission(
        &self,
        referrer_id: &str,
        referred_id: &str,
        level: i16,
        amount: Decimal,
    ) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        let key = (referrer_id.to_string(), referred_id.to_string(), level);
        let edge = state.referrals.get_mut(&key).ok_or(EngineError::NotFound {
            entity: "referral edge",
            id: format!("{referrer_id}->{referred_id} level {level}"),
        })?;
        edge.record_commission(amount);
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn append_transaction(
        &self,
        tx: NewTransaction,
    ) -> Result<TransactionRecord, EngineError> {
        let mut state = self.state.write().await;
        let record = tx.into_record(Utc::now());
        state.transactions.push(record.clone());
        Ok(record)
    }

    async fn transactions_for_user(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<TransactionRecord>, EngineError> {
        let state = self.state.read().await;
        let mut records: Vec<TransactionRecord> = state
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        records.reverse();
        records.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(records)
    }
}
