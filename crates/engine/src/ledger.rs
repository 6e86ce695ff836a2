//! Ledger operations: atomic balance mutations paired with audit records.

use std::sync::Arc;

use coinvault_core::balance::{BalanceField, BalanceMutation, UserBalances};
use coinvault_core::traits::LedgerStore;
use coinvault_core::transaction::{NewTransaction, TransactionType};
use coinvault_core::EngineError;
use rust_decimal::Decimal;

use crate::retry::{with_retry, RetryPolicy};

/// Balance mutation front-end over a [`LedgerStore`].
///
/// Every operation commits as one atomic unit with exactly one audit
/// transaction record; transient storage failures are retried with bounded
/// backoff before surfacing.
pub struct Ledger<S> {
    store: Arc<S>,
    retry: RetryPolicy,
}

impl<S> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            retry: self.retry.clone(),
        }
    }
}

impl<S: LedgerStore> Ledger<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(store: Arc<S>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Current balances for a user.
    ///
    /// # Errors
    /// `NotFound` when the user has no ledger row.
    pub async fn balances(&self, user_id: &str) -> Result<UserBalances, EngineError> {
        self.store.balances(user_id).await
    }

    /// Increases `field` by `amount`.
    ///
    /// # Errors
    /// `InvalidAmount` for non-positive amounts.
    pub async fn credit(
        &self,
        user_id: &str,
        field: BalanceField,
        amount: Decimal,
        tx_type: TransactionType,
        description: impl Into<String>,
    ) -> Result<UserBalances, EngineError> {
        let audit = Self::audit_for(user_id, Some(field), amount, tx_type, description);
        self.apply(user_id, &[BalanceMutation::credit(field, amount)], audit)
            .await
    }

    /// Decreases `field` by `amount`.
    ///
    /// # Errors
    /// `InvalidAmount` for non-positive amounts, `InsufficientBalance` when
    /// the field holds less than `amount`.
    pub async fn debit(
        &self,
        user_id: &str,
        field: BalanceField,
        amount: Decimal,
        tx_type: TransactionType,
        description: impl Into<String>,
    ) -> Result<UserBalances, EngineError> {
        let audit = Self::audit_for(user_id, Some(field), amount, tx_type, description);
        self.apply(user_id, &[BalanceMutation::debit(field, amount)], audit)
            .await
    }

    /// Debits `from` and credits `to` as one atomic batch: either side
    /// failing leaves both untouched.
    ///
    /// # Errors
    /// `InvalidAmount` or `InsufficientBalance` as for the individual steps.
    pub async fn move_between_fields(
        &self,
        user_id: &str,
        from: BalanceField,
        to: BalanceField,
        amount: Decimal,
        tx_type: TransactionType,
        description: impl Into<String>,
    ) -> Result<UserBalances, EngineError> {
        let audit = Self::audit_for(user_id, None, amount, tx_type, description);
        self.apply(
            user_id,
            &[
                BalanceMutation::debit(from, amount),
                BalanceMutation::credit(to, amount),
            ],
            audit,
        )
        .await
    }

    /// Drains the aggregate available balance across currencies in fixed
    /// order.
    ///
    /// # Errors
    /// `InsufficientBalance` when the aggregate is short of `amount`.
    pub async fn debit_available(
        &self,
        user_id: &str,
        amount: Decimal,
        tx_type: TransactionType,
        description: impl Into<String>,
    ) -> Result<UserBalances, EngineError> {
        let audit = Self::audit_for(user_id, None, amount, tx_type, description);
        self.apply(
            user_id,
            &[BalanceMutation::debit_available_spread(amount)],
            audit,
        )
        .await
    }

    /// Applies an arbitrary mutation batch with its paired audit record,
    /// retrying transient failures.
    ///
    /// # Errors
    /// Validation and balance errors from the batch, or the final storage
    /// error once retries are exhausted.
    pub async fn apply(
        &self,
        user_id: &str,
        mutations: &[BalanceMutation],
        audit: NewTransaction,
    ) -> Result<UserBalances, EngineError> {
        for mutation in mutations {
            if mutation.amount() <= Decimal::ZERO {
                return Err(EngineError::InvalidAmount(mutation.amount()));
            }
        }
        with_retry(&self.retry, "ledger apply", || {
            let audit = audit.clone();
            async move { self.store.apply_mutations(user_id, mutations, audit).await }
        })
        .await
    }

    fn audit_for(
        user_id: &str,
        field: Option<BalanceField>,
        amount: Decimal,
        tx_type: TransactionType,
        description: impl Into<String>,
    ) -> NewTransaction {
        let currency = match field {
            Some(BalanceField::Available(c) | BalanceField::Pending(c)) => Some(c),
            _ => None,
        };
        NewTransaction::completed(user_id, tx_type, currency, amount, description)
    }
}
