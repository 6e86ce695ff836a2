//! Multi-level referral commission cascade.
//!
//! Runs once per investment approval: an iterative walk up the referrer
//! chain, capped at the configured depth and guarded by a visited set
//! against referral cycles. A failing level is logged and recorded in the
//! outcome; it never aborts completed levels or the approval itself.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use coinvault_core::balance::BalanceField;
use coinvault_core::config::ReferralConfig;
use coinvault_core::investment::Investment;
use coinvault_core::referral::ReferralEdge;
use coinvault_core::traits::{LedgerStore, ReferralStore};
use coinvault_core::transaction::TransactionType;
use coinvault_core::{EngineError, SETTLEMENT_CURRENCY};
use rust_decimal::Decimal;
use tracing::warn;

use crate::ledger::Ledger;

/// One commission successfully credited during a cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaidCommission {
    pub level: i16,
    pub referrer_id: String,
    pub amount: Decimal,
}

/// One level that failed; swallowed at the approval boundary.
#[derive(Debug, Clone)]
pub struct CascadeFailure {
    pub level: i16,
    pub referrer_id: String,
    pub error: String,
}

/// Aggregate result of one cascade run.
#[derive(Debug, Clone, Default)]
pub struct CascadeOutcome {
    pub paid: Vec<PaidCommission>,
    pub failures: Vec<CascadeFailure>,
}

impl CascadeOutcome {
    /// Total commission credited across all levels.
    #[must_use]
    pub fn total_paid(&self) -> Decimal {
        self.paid.iter().map(|p| p.amount).sum()
    }
}

/// Walks the upline and credits per-level commissions.
pub struct ReferralCascade<S> {
    store: Arc<S>,
    ledger: Ledger<S>,
    config: ReferralConfig,
}

impl<S> Clone for ReferralCascade<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            ledger: self.ledger.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: LedgerStore + ReferralStore> ReferralCascade<S> {
    #[must_use]
    pub fn new(store: Arc<S>, config: ReferralConfig) -> Self {
        let ledger = Ledger::new(store.clone());
        Self {
            store,
            ledger,
            config,
        }
    }

    /// Runs the cascade for an approved investment. Never fails: per-level
    /// errors are collected into the outcome and logged.
    pub async fn run(&self, investment: &Investment) -> CascadeOutcome {
        let mut outcome = CascadeOutcome::default();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(investment.user_id.clone());

        let mut current = match self.upline_of(&investment.user_id, 1, &mut outcome).await {
            Some(referrer_id) => Some(referrer_id),
            None => return outcome,
        };

        let mut level: i16 = 1;
        while let Some(referrer_id) = current {
            if usize::try_from(level).unwrap_or(usize::MAX) > self.config.max_depth {
                break;
            }
            // A user appearing twice in one walk is a referral cycle; abort
            // the branch rather than loop.
            if !visited.insert(referrer_id.clone()) {
                warn!(
                    "referral cycle detected at {referrer_id} while cascading investment {}",
                    investment.id
                );
                break;
            }
            let Some(rate) = self.config.rate_for_level(usize::try_from(level).unwrap_or(0))
            else {
                break;
            };

            match self.pay_level(investment, &referrer_id, level, rate).await {
                Ok(amount) => outcome.paid.push(PaidCommission {
                    level,
                    referrer_id: referrer_id.clone(),
                    amount,
                }),
                Err(err) => {
                    warn!(
                        "referral commission level {level} for investment {} failed: {err}",
                        investment.id
                    );
                    outcome.failures.push(CascadeFailure {
                        level,
                        referrer_id: referrer_id.clone(),
                        error: err.to_string(),
                    });
                }
            }

            level += 1;
            current = if usize::try_from(level).unwrap_or(usize::MAX) <= self.config.max_depth {
                self.upline_of(&referrer_id, level, &mut outcome).await
            } else {
                None
            };
        }

        outcome
    }

    /// Credits one referrer, ensuring the edge back to the original
    /// investor exists first, then recording the commission against it.
    async fn pay_level(
        &self,
        investment: &Investment,
        referrer_id: &str,
        level: i16,
        rate: Decimal,
    ) -> Result<Decimal, EngineError> {
        let commission = investment.amount * rate / Decimal::ONE_HUNDRED;
        if commission <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }

        if self
            .store
            .edge(referrer_id, &investment.user_id, level)
            .await?
            .is_none()
        {
            let edge = ReferralEdge::new(referrer_id, &investment.user_id, level, Utc::now());
            self.store.insert_edge(&edge).await?;
        }

        self.ledger
            .credit(
                referrer_id,
                BalanceField::Available(SETTLEMENT_CURRENCY),
                commission,
                TransactionType::ReferralCommission,
                format!(
                    "level {level} referral commission from investment {}",
                    investment.id
                ),
            )
            .await?;

        self.store
            .record_commission(referrer_id, &investment.user_id, level, commission)
            .await?;

        Ok(commission)
    }

    /// The direct referrer of `user_id`, or `None`; lookup failures are
    /// recorded against `level` and end the walk.
    async fn upline_of(
        &self,
        user_id: &str,
        level: i16,
        outcome: &mut CascadeOutcome,
    ) -> Option<String> {
        match self.store.direct_referrer_of(user_id).await {
            Ok(edge) => edge.map(|e| e.referrer_id),
            Err(err) => {
                warn!("referrer lookup for {user_id} failed: {err}");
                outcome.failures.push(CascadeFailure {
                    level,
                    referrer_id: user_id.to_string(),
                    error: err.to_string(),
                });
                None
            }
        }
    }
}
