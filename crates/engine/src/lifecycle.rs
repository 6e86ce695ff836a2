//! Investment lifecycle manager.
//!
//! Owns the `pending -> approved -> completed` / `pending -> cancelled`
//! state machine. Transitions are claimed with compare-and-swap status
//! updates; when the subsequent ledger batch fails the claim is compensated
//! back, so no intermediate status is ever observable.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use coinvault_core::balance::{BalanceField, BalanceMutation};
use coinvault_core::config::ReferralConfig;
use coinvault_core::investment::{Investment, InvestmentStatus, PaymentMethod};
use coinvault_core::notify::{Notification, Notifier};
use coinvault_core::traits::{AccrualClaim, EngineStore};
use coinvault_core::transaction::{NewTransaction, TransactionType};
use coinvault_core::EngineError;
use rust_decimal::Decimal;
use tracing::{error, warn};

use crate::catalog::PlanCatalog;
use crate::ledger::Ledger;
use crate::referral::{CascadeOutcome, ReferralCascade};

/// Result of one daily accrual attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccrualOutcome {
    /// Profit was credited.
    Accrued { amount: Decimal },
    /// An accrual already ran during this UTC day; nothing was credited.
    AlreadyAccrued,
}

/// Drives investments through their lifecycle against a storage backend.
pub struct LifecycleService<S, N> {
    store: Arc<S>,
    catalog: PlanCatalog<S>,
    ledger: Ledger<S>,
    cascade: ReferralCascade<S>,
    notifier: Arc<N>,
}

impl<S, N> Clone for LifecycleService<S, N> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            catalog: self.catalog.clone(),
            ledger: self.ledger.clone(),
            cascade: self.cascade.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

impl<S: EngineStore, N: Notifier> LifecycleService<S, N> {
    #[must_use]
    pub fn new(store: Arc<S>, referral: ReferralConfig, notifier: Arc<N>) -> Self {
        Self {
            catalog: PlanCatalog::new(store.clone()),
            ledger: Ledger::new(store.clone()),
            cascade: ReferralCascade::new(store.clone(), referral),
            store,
            notifier,
        }
    }

    /// Creates a pending investment. Funds are not reserved until approval.
    ///
    /// # Errors
    /// Catalog and amount validation errors, or storage failures.
    pub async fn create(
        &self,
        user_id: &str,
        plan_name: &str,
        payment_method: PaymentMethod,
        amount: Decimal,
    ) -> Result<Investment, EngineError> {
        self.create_at(user_id, plan_name, payment_method, amount, Utc::now())
            .await
    }

    /// [`Self::create`] with an explicit clock, for deterministic callers.
    ///
    /// # Errors
    /// As for `create`.
    pub async fn create_at(
        &self,
        user_id: &str,
        plan_name: &str,
        payment_method: PaymentMethod,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Investment, EngineError> {
        let plan = self.catalog.active_plan(plan_name).await?;
        PlanCatalog::<S>::validate_amount(&plan, amount)?;

        let investment = Investment::new(user_id, &plan, payment_method, amount, now);
        self.store.insert_investment(&investment).await?;
        self.store
            .append_transaction(NewTransaction::completed(
                user_id,
                TransactionType::Investment,
                payment_method.currency(),
                amount,
                format!("investment in plan {plan_name}"),
            ))
            .await?;
        Ok(investment)
    }

    /// Approves a pending investment: moves funds, fires the referral
    /// cascade exactly once, and notifies.
    ///
    /// # Errors
    /// `InvalidTransition` unless the investment is pending (a concurrent
    /// duplicate approval loses the status claim and gets this error), plus
    /// ledger errors, after which the investment is back in `pending`.
    pub async fn approve(&self, investment_id: &str) -> Result<Investment, EngineError> {
        let investment = self.require(investment_id).await?;

        // Claim the transition first; the CAS is what makes approval (and
        // the cascade behind it) exactly-once under concurrency.
        if !self
            .store
            .transition_status(
                investment_id,
                InvestmentStatus::Pending,
                InvestmentStatus::Approved,
                None,
            )
            .await?
        {
            return Err(self.transition_error(investment_id, "approved").await);
        }

        let mutations = Self::approval_mutations(&investment);
        let audit = NewTransaction::completed(
            &investment.user_id,
            TransactionType::Investment,
            investment.payment_method.currency(),
            investment.amount,
            format!(
                "approval of investment {} (plan {})",
                investment.id, investment.plan_name
            ),
        );
        if let Err(err) = self
            .ledger
            .apply(&investment.user_id, &mutations, audit)
            .await
        {
            self.compensate_transition(
                investment_id,
                InvestmentStatus::Approved,
                InvestmentStatus::Pending,
            )
            .await;
            return Err(err);
        }

        let outcome = self.cascade.run(&investment).await;
        self.notify_cascade(&investment, &outcome).await;
        self.notify(Notification::InvestmentApproved {
            user_id: investment.user_id.clone(),
            investment_id: investment.id.clone(),
            amount: investment.amount,
        })
        .await;

        self.require(investment_id).await
    }

    /// Credits one day of profit on an approved, unexpired investment.
    /// Idempotent per UTC calendar day.
    ///
    /// # Errors
    /// `InvalidState` outside the accrual window, plus ledger errors,
    /// after which the day's claim has been reverted.
    pub async fn accrue_daily_profit(
        &self,
        investment_id: &str,
    ) -> Result<AccrualOutcome, EngineError> {
        self.accrue_daily_profit_at(investment_id, Utc::now()).await
    }

    /// [`Self::accrue_daily_profit`] with an explicit clock.
    ///
    /// # Errors
    /// As for `accrue_daily_profit`.
    pub async fn accrue_daily_profit_at(
        &self,
        investment_id: &str,
        now: DateTime<Utc>,
    ) -> Result<AccrualOutcome, EngineError> {
        let investment = self.require(investment_id).await?;
        if !investment.is_approved() {
            return Err(EngineError::InvalidState {
                id: investment_id.to_string(),
                detail: format!(
                    "cannot accrue profit while {}",
                    investment.status.as_str()
                ),
            });
        }
        if investment.is_expired(now) {
            return Err(EngineError::InvalidState {
                id: investment_id.to_string(),
                detail: "cannot accrue profit after expiry".to_string(),
            });
        }

        let profit = investment.daily_profit();
        match self
            .store
            .claim_daily_accrual(investment_id, profit, now)
            .await?
        {
            AccrualClaim::AlreadyAccrued => Ok(AccrualOutcome::AlreadyAccrued),
            AccrualClaim::NotAccruable => Err(EngineError::InvalidState {
                id: investment_id.to_string(),
                detail: "investment left the approved state".to_string(),
            }),
            AccrualClaim::Claimed { previous } => {
                if profit > Decimal::ZERO {
                    let audit = NewTransaction::completed(
                        &investment.user_id,
                        TransactionType::Profit,
                        None,
                        profit,
                        format!(
                            "daily profit on investment {} (plan {})",
                            investment.id, investment.plan_name
                        ),
                    );
                    let mutations = [
                        BalanceMutation::credit(
                            BalanceField::Available(coinvault_core::SETTLEMENT_CURRENCY),
                            profit,
                        ),
                        BalanceMutation::credit(BalanceField::TotalEarnings, profit),
                    ];
                    if let Err(err) = self
                        .ledger
                        .apply(&investment.user_id, &mutations, audit)
                        .await
                    {
                        if let Err(revert_err) = self
                            .store
                            .revert_daily_accrual(investment_id, profit, previous)
                            .await
                        {
                            error!(
                                "failed to revert accrual claim on {investment_id}: {revert_err}"
                            );
                        }
                        return Err(err);
                    }
                }

                self.notify(Notification::ProfitAccrued {
                    user_id: investment.user_id.clone(),
                    investment_id: investment.id.clone(),
                    amount: profit,
                })
                .await;
                Ok(AccrualOutcome::Accrued { amount: profit })
            }
        }
    }

    /// Matures an approved investment whose term has elapsed.
    ///
    /// # Errors
    /// `InvalidTransition` unless approved, `InvalidState` before expiry,
    /// plus ledger errors, after which the investment is approved again.
    pub async fn complete(&self, investment_id: &str) -> Result<Investment, EngineError> {
        self.complete_at(investment_id, Utc::now()).await
    }

    /// [`Self::complete`] with an explicit clock.
    ///
    /// # Errors
    /// As for `complete`.
    pub async fn complete_at(
        &self,
        investment_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Investment, EngineError> {
        let investment = self.require(investment_id).await?;
        if !investment.is_approved() {
            return Err(self.transition_error(investment_id, "completed").await);
        }
        if !investment.is_expired(now) {
            return Err(EngineError::InvalidState {
                id: investment_id.to_string(),
                detail: "cannot complete before expiry".to_string(),
            });
        }

        if !self
            .store
            .transition_status(
                investment_id,
                InvestmentStatus::Approved,
                InvestmentStatus::Completed,
                None,
            )
            .await?
        {
            return Err(self.transition_error(investment_id, "completed").await);
        }

        let mut mutations = vec![BalanceMutation::debit(
            BalanceField::ActiveDeposit,
            investment.amount,
        )];
        // The running total added during accrual is reversed at maturity.
        if investment.accrued_profit > Decimal::ZERO {
            mutations.push(BalanceMutation::debit(
                BalanceField::TotalEarnings,
                investment.accrued_profit,
            ));
        }
        let audit = NewTransaction::completed(
            &investment.user_id,
            TransactionType::InvestmentCompleted,
            None,
            investment.amount,
            format!(
                "completion of investment {} (plan {})",
                investment.id, investment.plan_name
            ),
        );
        if let Err(err) = self
            .ledger
            .apply(&investment.user_id, &mutations, audit)
            .await
        {
            self.compensate_transition(
                investment_id,
                InvestmentStatus::Completed,
                InvestmentStatus::Approved,
            )
            .await;
            return Err(err);
        }

        self.notify(Notification::InvestmentCompleted {
            user_id: investment.user_id.clone(),
            investment_id: investment.id.clone(),
            amount: investment.amount,
        })
        .await;

        self.require(investment_id).await
    }

    /// Cancels a pending investment with a reason. No ledger effect.
    ///
    /// # Errors
    /// `InvalidTransition` unless the investment is pending.
    pub async fn reject(
        &self,
        investment_id: &str,
        reason: &str,
    ) -> Result<Investment, EngineError> {
        if !self
            .store
            .transition_status(
                investment_id,
                InvestmentStatus::Pending,
                InvestmentStatus::Cancelled,
                Some(reason),
            )
            .await?
        {
            return Err(self.transition_error(investment_id, "cancelled").await);
        }
        self.require(investment_id).await
    }

    /// The ledger batch an approval applies, by payment method.
    fn approval_mutations(investment: &Investment) -> Vec<BalanceMutation> {
        match investment.payment_method.currency() {
            // Platform balance pays for the principal.
            None => vec![
                BalanceMutation::debit_available_spread(investment.amount),
                BalanceMutation::credit(BalanceField::ActiveDeposit, investment.amount),
            ],
            // External deposit: the amount lands in that currency's
            // available balance alongside the active-deposit lock.
            Some(currency) => vec![
                BalanceMutation::credit(BalanceField::Available(currency), investment.amount),
                BalanceMutation::credit(BalanceField::ActiveDeposit, investment.amount),
            ],
        }
    }

    async fn require(&self, investment_id: &str) -> Result<Investment, EngineError> {
        self.store
            .investment(investment_id)
            .await?
            .ok_or_else(|| EngineError::investment_not_found(investment_id))
    }

    /// Builds the transition error from the investment's current status.
    async fn transition_error(&self, investment_id: &str, to: &'static str) -> EngineError {
        match self.require(investment_id).await {
            Ok(investment) => EngineError::InvalidTransition {
                id: investment_id.to_string(),
                from: investment.status.as_str(),
                to,
            },
            Err(err) => err,
        }
    }

    /// Reverts a claimed status after a failed ledger batch. A failing
    /// revert is logged loudly; the retry-capable caller sees the original
    /// error either way.
    async fn compensate_transition(
        &self,
        investment_id: &str,
        from: InvestmentStatus,
        to: InvestmentStatus,
    ) {
        match self
            .store
            .transition_status(investment_id, from, to, None)
            .await
        {
            Ok(true) => {}
            Ok(false) => error!(
                "compensating transition for investment {investment_id} found unexpected status"
            ),
            Err(err) => error!(
                "failed to compensate transition for investment {investment_id}: {err}"
            ),
        }
    }

    async fn notify(&self, notification: Notification) {
        if let Err(err) = self.notifier.notify(notification).await {
            warn!("notification failed (ignored): {err}");
        }
    }

    async fn notify_cascade(&self, investment: &Investment, outcome: &CascadeOutcome) {
        for paid in &outcome.paid {
            self.notify(Notification::CommissionPaid {
                user_id: paid.referrer_id.clone(),
                from_user_id: investment.user_id.clone(),
                level: paid.level,
                amount: paid.amount,
            })
            .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use coinvault_core::balance::Currency;
    use coinvault_core::notify::LogNotifier;
    use coinvault_core::plan::InvestmentPlan;
    use coinvault_core::referral::ReferralEdge;
    use coinvault_core::traits::{
        InvestmentStore, LedgerStore, PlanStore, ReferralStore, TransactionStore,
    };
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    type Service = LifecycleService<MemoryStore, LogNotifier>;

    fn sample_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    async fn service() -> (Arc<MemoryStore>, Service) {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_plan(&InvestmentPlan::new(
                "Starter",
                dec!(100),
                dec!(1000),
                dec!(6),
                3,
            ))
            .await
            .unwrap();
        store.add_user("investor").await;
        let service = LifecycleService::new(
            store.clone(),
            ReferralConfig::default(),
            Arc::new(LogNotifier),
        );
        (store, service)
    }

    async fn fund_available(store: &Arc<MemoryStore>, user: &str, amount: Decimal) {
        Ledger::new(store.clone())
            .credit(
                user,
                BalanceField::Available(Currency::Usdt),
                amount,
                TransactionType::Deposit,
                "seed deposit",
            )
            .await
            .unwrap();
    }

    // =========================================================================
    // create
    // =========================================================================

    #[tokio::test]
    async fn test_create_pending_with_snapshot_and_audit() {
        let (store, service) = service().await;
        let investment = service
            .create_at(
                "investor",
                "Starter",
                PaymentMethod::Balance,
                dec!(500),
                sample_now(),
            )
            .await
            .unwrap();

        assert_eq!(investment.status, InvestmentStatus::Pending);
        assert_eq!(investment.daily_profit_percent, dec!(6));
        assert_eq!(investment.expires_at, sample_now() + Duration::days(3));

        // No funds reserved at creation.
        let balances = store.balances("investor").await.unwrap();
        assert_eq!(balances.available_balance(), dec!(0));
        assert_eq!(balances.active_deposit(), dec!(0));

        let records = store.transactions_for_user("investor", 10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tx_type, TransactionType::Investment);
    }

    #[tokio::test]
    async fn test_create_validates_plan_and_amount() {
        let (_store, service) = service().await;

        let err = service
            .create("investor", "Ghost", PaymentMethod::Balance, dec!(500))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PlanNotFound(_)));

        let err = service
            .create("investor", "Starter", PaymentMethod::Balance, dec!(50))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AmountOutOfRange { .. }));
    }

    // =========================================================================
    // approve
    // =========================================================================

    #[tokio::test]
    async fn test_approve_balance_payment_moves_funds() {
        let (store, service) = service().await;
        fund_available(&store, "investor", dec!(800)).await;
        let investment = service
            .create_at(
                "investor",
                "Starter",
                PaymentMethod::Balance,
                dec!(500),
                sample_now(),
            )
            .await
            .unwrap();

        let approved = service.approve(&investment.id).await.unwrap();
        assert_eq!(approved.status, InvestmentStatus::Approved);

        let balances = store.balances("investor").await.unwrap();
        assert_eq!(balances.available_balance(), dec!(300));
        assert_eq!(balances.active_deposit(), dec!(500));
        assert!(balances.invariants_hold());
    }

    #[tokio::test]
    async fn test_approve_external_payment_credits_available() {
        let (store, service) = service().await;
        let investment = service
            .create("investor", "Starter", PaymentMethod::Bitcoin, dec!(500))
            .await
            .unwrap();

        service.approve(&investment.id).await.unwrap();

        let balances = store.balances("investor").await.unwrap();
        assert_eq!(balances.currency(Currency::Bitcoin).available, dec!(500));
        assert_eq!(balances.active_deposit(), dec!(500));
        assert!(balances.invariants_hold());
    }

    #[tokio::test]
    async fn test_double_approve_is_state_error_and_single_commission() {
        let (store, service) = service().await;
        store.add_user("referrer").await;
        store
            .insert_edge(&ReferralEdge::new("referrer", "investor", 1, Utc::now()))
            .await
            .unwrap();
        let investment = service
            .create("investor", "Starter", PaymentMethod::Usdt, dec!(1000))
            .await
            .unwrap();

        service.approve(&investment.id).await.unwrap();
        let err = service.approve(&investment.id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition {
                from: "approved",
                to: "approved",
                ..
            }
        ));

        // Commission credited exactly once: 10% of 1000.
        let balances = store.balances("referrer").await.unwrap();
        assert_eq!(balances.available_balance(), dec!(100));
    }

    #[tokio::test]
    async fn test_approve_insufficient_balance_compensates_claim() {
        let (store, service) = service().await;
        fund_available(&store, "investor", dec!(100)).await;
        let investment = service
            .create("investor", "Starter", PaymentMethod::Balance, dec!(500))
            .await
            .unwrap();

        let err = service.approve(&investment.id).await.unwrap_err();
        assert_eq!(err.kind(), "insufficient_balance");

        // Back to pending, balances untouched.
        let stored = store.investment(&investment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvestmentStatus::Pending);
        let balances = store.balances("investor").await.unwrap();
        assert_eq!(balances.available_balance(), dec!(100));
        assert_eq!(balances.active_deposit(), dec!(0));
    }

    #[tokio::test]
    async fn test_approve_referral_scenario() {
        let (store, service) = service().await;
        store.add_user("referrer").await;
        store
            .insert_edge(&ReferralEdge::new("referrer", "investor", 1, Utc::now()))
            .await
            .unwrap();
        let investment = service
            .create("investor", "Starter", PaymentMethod::Usdt, dec!(1000))
            .await
            .unwrap();

        service.approve(&investment.id).await.unwrap();

        assert_eq!(
            store.balances("referrer").await.unwrap().available_balance(),
            dec!(100)
        );
        let edge = store.edge("referrer", "investor", 1).await.unwrap().unwrap();
        assert_eq!(edge.status, coinvault_core::ReferralStatus::Active);
    }

    // =========================================================================
    // accrue_daily_profit
    // =========================================================================

    async fn approved_balance_investment(
        store: &Arc<MemoryStore>,
        service: &Service,
    ) -> Investment {
        fund_available(store, "investor", dec!(500)).await;
        let investment = service
            .create_at(
                "investor",
                "Starter",
                PaymentMethod::Balance,
                dec!(500),
                sample_now(),
            )
            .await
            .unwrap();
        service.approve(&investment.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_accrual_credits_profit_once_per_day() {
        let (store, service) = service().await;
        let investment = approved_balance_investment(&store, &service).await;
        let day_one = sample_now() + Duration::days(1);

        let outcome = service
            .accrue_daily_profit_at(&investment.id, day_one)
            .await
            .unwrap();
        assert_eq!(outcome, AccrualOutcome::Accrued { amount: dec!(30) });

        // Second call the same day accrues nothing.
        let outcome = service
            .accrue_daily_profit_at(&investment.id, day_one + Duration::hours(3))
            .await
            .unwrap();
        assert_eq!(outcome, AccrualOutcome::AlreadyAccrued);

        let balances = store.balances("investor").await.unwrap();
        // 500 invested from balance, then 30 profit.
        assert_eq!(balances.available_balance(), dec!(30));
        assert_eq!(balances.total_earnings(), dec!(30));

        let stored = store.investment(&investment.id).await.unwrap().unwrap();
        assert_eq!(stored.accrued_profit, dec!(30));
    }

    #[tokio::test]
    async fn test_accrual_next_day_accrues_again() {
        let (store, service) = service().await;
        let investment = approved_balance_investment(&store, &service).await;

        service
            .accrue_daily_profit_at(&investment.id, sample_now() + Duration::days(1))
            .await
            .unwrap();
        service
            .accrue_daily_profit_at(&investment.id, sample_now() + Duration::days(2))
            .await
            .unwrap();

        let balances = store.balances("investor").await.unwrap();
        assert_eq!(balances.total_earnings(), dec!(60));
    }

    #[tokio::test]
    async fn test_accrual_rejected_outside_window() {
        let (store, service) = service().await;
        let investment = approved_balance_investment(&store, &service).await;

        // After expiry.
        let err = service
            .accrue_daily_profit_at(&investment.id, sample_now() + Duration::days(3))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "state");

        // Not approved.
        let pending = service
            .create("investor", "Starter", PaymentMethod::Bitcoin, dec!(100))
            .await
            .unwrap();
        let err = service
            .accrue_daily_profit_at(&pending.id, sample_now())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "state");
        assert_eq!(store.balances("investor").await.unwrap().total_earnings(), dec!(0));
    }

    #[tokio::test]
    async fn test_accrual_ledger_failure_reverts_claim() {
        let (store, service) = service().await;
        let investment = approved_balance_investment(&store, &service).await;
        store.set_ledger_failure("investor", true).await;

        let day_one = sample_now() + Duration::days(1);
        let err = service
            .accrue_daily_profit_at(&investment.id, day_one)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "storage");

        // The day is claimable again once the ledger recovers.
        store.set_ledger_failure("investor", false).await;
        let outcome = service
            .accrue_daily_profit_at(&investment.id, day_one)
            .await
            .unwrap();
        assert_eq!(outcome, AccrualOutcome::Accrued { amount: dec!(30) });
        let stored = store.investment(&investment.id).await.unwrap().unwrap();
        assert_eq!(stored.accrued_profit, dec!(30));
    }

    // =========================================================================
    // complete
    // =========================================================================

    #[tokio::test]
    async fn test_starter_scenario_full_lifecycle() {
        let (store, service) = service().await;
        let investment = approved_balance_investment(&store, &service).await;

        for day in 1..3 {
            service
                .accrue_daily_profit_at(&investment.id, sample_now() + Duration::days(day))
                .await
                .unwrap();
        }

        let completed = service
            .complete_at(&investment.id, sample_now() + Duration::days(3))
            .await
            .unwrap();
        assert_eq!(completed.status, InvestmentStatus::Completed);

        let balances = store.balances("investor").await.unwrap();
        assert_eq!(balances.active_deposit(), dec!(0));
        // Observed accounting: accrued profit is reversed out of the
        // running total at maturity.
        assert_eq!(balances.total_earnings(), dec!(0));
        // Daily profits stay paid out: 2 days * 30.
        assert_eq!(balances.available_balance(), dec!(60));
        assert!(balances.invariants_hold());
    }

    #[tokio::test]
    async fn test_complete_before_expiry_rejected() {
        let (store, service) = service().await;
        let investment = approved_balance_investment(&store, &service).await;

        let err = service
            .complete_at(&investment.id, sample_now() + Duration::days(2))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "state");
        let stored = store.investment(&investment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvestmentStatus::Approved);
    }

    #[tokio::test]
    async fn test_complete_twice_is_state_error() {
        let (store, service) = service().await;
        let investment = approved_balance_investment(&store, &service).await;
        let expiry = sample_now() + Duration::days(3);

        service.complete_at(&investment.id, expiry).await.unwrap();
        let err = service
            .complete_at(&investment.id, expiry)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));

        // Active deposit debited once.
        let balances = store.balances("investor").await.unwrap();
        assert_eq!(balances.active_deposit(), dec!(0));
    }

    #[tokio::test]
    async fn test_complete_ledger_failure_compensates_claim() {
        let (store, service) = service().await;
        let investment = approved_balance_investment(&store, &service).await;
        store.set_ledger_failure("investor", true).await;

        let err = service
            .complete_at(&investment.id, sample_now() + Duration::days(3))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "storage");
        let stored = store.investment(&investment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvestmentStatus::Approved);
    }

    // =========================================================================
    // reject
    // =========================================================================

    #[tokio::test]
    async fn test_reject_pending_records_reason() {
        let (store, service) = service().await;
        let investment = service
            .create("investor", "Starter", PaymentMethod::Usdt, dec!(500))
            .await
            .unwrap();

        let rejected = service
            .reject(&investment.id, "payment never arrived")
            .await
            .unwrap();
        assert_eq!(rejected.status, InvestmentStatus::Cancelled);
        assert_eq!(rejected.remarks.as_deref(), Some("payment never arrived"));

        // No ledger effect.
        let balances = store.balances("investor").await.unwrap();
        assert_eq!(balances.available_balance(), dec!(0));
    }

    #[tokio::test]
    async fn test_reject_approved_is_state_error() {
        let (store, service) = service().await;
        let investment = approved_balance_investment(&store, &service).await;

        let err = service.reject(&investment.id, "too late").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
        let stored = store.investment(&investment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvestmentStatus::Approved);
    }

    #[tokio::test]
    async fn test_unknown_investment_not_found() {
        let (_store, service) = service().await;
        let err = service.approve("missing").await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
