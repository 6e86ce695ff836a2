//! Per-user balance ledger state.
//!
//! All balance mutations go through [`UserBalances::apply_all`], which
//! validates a whole batch against a scratch copy before committing, so a
//! failing batch leaves the balances untouched. Fields are private: there is
//! no way to push a balance negative or to drift the aggregate
//! `available_balance` away from the per-currency sum.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Supported deposit currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    Bitcoin,
    Ethereum,
    Usdt,
}

/// Currency the platform settles profit and commission credits in.
pub const SETTLEMENT_CURRENCY: Currency = Currency::Usdt;

impl Currency {
    /// All currencies, in the fixed order aggregate drains walk them.
    pub const ALL: [Currency; 3] = [Currency::Bitcoin, Currency::Ethereum, Currency::Usdt];

    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bitcoin => "bitcoin",
            Self::Ethereum => "ethereum",
            Self::Usdt => "usdt",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bitcoin" => Some(Self::Bitcoin),
            "ethereum" => Some(Self::Ethereum),
            "usdt" => Some(Self::Usdt),
            _ => None,
        }
    }
}

/// A ledger field, keyed by enum rather than by field-name strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceField {
    /// Withdrawable funds in one currency.
    Available(Currency),
    /// Funds in transit (e.g. awaiting withdrawal approval).
    Pending(Currency),
    /// Principal locked in approved, unexpired investments.
    ActiveDeposit,
    /// Running total of profit credited to the user.
    TotalEarnings,
}

impl BalanceField {
    /// Stable label used in audit descriptions and error messages.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Available(c) => format!("{}_available", c.as_str()),
            Self::Pending(c) => format!("{}_pending", c.as_str()),
            Self::ActiveDeposit => "active_deposit".to_string(),
            Self::TotalEarnings => "total_earnings".to_string(),
        }
    }
}

/// One step of an atomic balance batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceMutation {
    /// Increase a field. Fails on non-positive amounts.
    Credit { field: BalanceField, amount: Decimal },
    /// Decrease a field. Fails on non-positive amounts or insufficient funds.
    Debit { field: BalanceField, amount: Decimal },
    /// Drain the aggregate available balance across currencies in
    /// [`Currency::ALL`] order. Fails when the aggregate is short; never
    /// leaves a partial drain.
    DebitAvailableSpread { amount: Decimal },
}

impl BalanceMutation {
    #[must_use]
    pub fn credit(field: BalanceField, amount: Decimal) -> Self {
        Self::Credit { field, amount }
    }

    #[must_use]
    pub fn debit(field: BalanceField, amount: Decimal) -> Self {
        Self::Debit { field, amount }
    }

    #[must_use]
    pub fn debit_available_spread(amount: Decimal) -> Self {
        Self::DebitAvailableSpread { amount }
    }

    /// The amount this mutation moves.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        match self {
            Self::Credit { amount, .. }
            | Self::Debit { amount, .. }
            | Self::DebitAvailableSpread { amount } => *amount,
        }
    }
}

/// Available/pending pair for a single currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyBalance {
    pub available: Decimal,
    pub pending: Decimal,
}

/// The full balance ledger for one user.
///
/// Invariants, enforced by construction:
/// - no field is ever negative;
/// - `available_balance` always equals the sum of per-currency available
///   balances (recomputed on every mutation, never assigned).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBalances {
    user_id: String,
    available_balance: Decimal,
    active_deposit: Decimal,
    total_earnings: Decimal,
    bitcoin: CurrencyBalance,
    ethereum: CurrencyBalance,
    usdt: CurrencyBalance,
}

impl UserBalances {
    /// Creates a zeroed ledger for a user.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            available_balance: Decimal::ZERO,
            active_deposit: Decimal::ZERO,
            total_earnings: Decimal::ZERO,
            bitcoin: CurrencyBalance::default(),
            ethereum: CurrencyBalance::default(),
            usdt: CurrencyBalance::default(),
        }
    }

    /// Rebuilds a ledger from persisted field values.
    ///
    /// # Errors
    /// Returns `Storage` if any persisted field is negative or the aggregate
    /// does not match the per-currency sum (corrupt row).
    pub fn from_parts(
        user_id: impl Into<String>,
        available_balance: Decimal,
        active_deposit: Decimal,
        total_earnings: Decimal,
        bitcoin: CurrencyBalance,
        ethereum: CurrencyBalance,
        usdt: CurrencyBalance,
    ) -> Result<Self, EngineError> {
        let balances = Self {
            user_id: user_id.into(),
            available_balance,
            active_deposit,
            total_earnings,
            bitcoin,
            ethereum,
            usdt,
        };
        if !balances.invariants_hold() {
            return Err(EngineError::Storage(format!(
                "corrupt balance row for user {}",
                balances.user_id
            )));
        }
        Ok(balances)
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Aggregate withdrawable balance (sum of per-currency availables).
    #[must_use]
    pub fn available_balance(&self) -> Decimal {
        self.available_balance
    }

    #[must_use]
    pub fn active_deposit(&self) -> Decimal {
        self.active_deposit
    }

    #[must_use]
    pub fn total_earnings(&self) -> Decimal {
        self.total_earnings
    }

    #[must_use]
    pub fn currency(&self, currency: Currency) -> &CurrencyBalance {
        match currency {
            Currency::Bitcoin => &self.bitcoin,
            Currency::Ethereum => &self.ethereum,
            Currency::Usdt => &self.usdt,
        }
    }

    /// Current value of a ledger field.
    #[must_use]
    pub fn get(&self, field: BalanceField) -> Decimal {
        match field {
            BalanceField::Available(c) => self.currency(c).available,
            BalanceField::Pending(c) => self.currency(c).pending,
            BalanceField::ActiveDeposit => self.active_deposit,
            BalanceField::TotalEarnings => self.total_earnings,
        }
    }

    /// Applies a whole batch atomically: every step is validated against a
    /// scratch copy first, and on any failure `self` is left untouched.
    ///
    /// # Errors
    /// `InvalidAmount` for a non-positive step amount, `InsufficientBalance`
    /// when a debit would push a field negative.
    pub fn apply_all(&mut self, mutations: &[BalanceMutation]) -> Result<(), EngineError> {
        let mut scratch = self.clone();
        for mutation in mutations {
            scratch.apply_one(mutation)?;
        }
        *self = scratch;
        Ok(())
    }

    /// Applies a single mutation. See [`Self::apply_all`] for batches.
    ///
    /// # Errors
    /// `InvalidAmount` or `InsufficientBalance` as for `apply_all`.
    pub fn apply_one(&mut self, mutation: &BalanceMutation) -> Result<(), EngineError> {
        let amount = mutation.amount();
        if amount <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount(amount));
        }

        match mutation {
            BalanceMutation::Credit { field, amount } => {
                self.set(*field, self.get(*field) + *amount);
            }
            BalanceMutation::Debit { field, amount } => {
                let current = self.get(*field);
                if current < *amount {
                    return Err(EngineError::InsufficientBalance {
                        field: field.label(),
                        available: current,
                        requested: *amount,
                    });
                }
                self.set(*field, current - *amount);
            }
            BalanceMutation::DebitAvailableSpread { amount } => {
                if self.available_balance < *amount {
                    return Err(EngineError::InsufficientBalance {
                        field: "available_balance".to_string(),
                        available: self.available_balance,
                        requested: *amount,
                    });
                }
                let mut remaining = *amount;
                for currency in Currency::ALL {
                    if remaining == Decimal::ZERO {
                        break;
                    }
                    let take = self.currency(currency).available.min(remaining);
                    if take > Decimal::ZERO {
                        let field = BalanceField::Available(currency);
                        self.set(field, self.get(field) - take);
                        remaining -= take;
                    }
                }
            }
        }
        Ok(())
    }

    /// True when both ledger invariants hold.
    #[must_use]
    pub fn invariants_hold(&self) -> bool {
        let fields_non_negative = self.active_deposit >= Decimal::ZERO
            && self.total_earnings >= Decimal::ZERO
            && Currency::ALL.iter().all(|c| {
                let b = self.currency(*c);
                b.available >= Decimal::ZERO && b.pending >= Decimal::ZERO
            });
        fields_non_negative && self.available_balance == self.currency_available_sum()
    }

    fn currency_available_sum(&self) -> Decimal {
        Currency::ALL
            .iter()
            .map(|c| self.currency(*c).available)
            .sum()
    }

    fn currency_mut(&mut self, currency: Currency) -> &mut CurrencyBalance {
        match currency {
            Currency::Bitcoin => &mut self.bitcoin,
            Currency::Ethereum => &mut self.ethereum,
            Currency::Usdt => &mut self.usdt,
        }
    }

    fn set(&mut self, field: BalanceField, value: Decimal) {
        match field {
            BalanceField::Available(c) => {
                self.currency_mut(c).available = value;
                self.available_balance = self.currency_available_sum();
            }
            BalanceField::Pending(c) => self.currency_mut(c).pending = value,
            BalanceField::ActiveDeposit => self.active_deposit = value,
            BalanceField::TotalEarnings => self.total_earnings = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn funded() -> UserBalances {
        let mut balances = UserBalances::new("user-1");
        balances
            .apply_all(&[
                BalanceMutation::credit(BalanceField::Available(Currency::Bitcoin), dec!(300)),
                BalanceMutation::credit(BalanceField::Available(Currency::Usdt), dec!(200)),
            ])
            .unwrap();
        balances
    }

    // =========================================================================
    // Currency / BalanceField
    // =========================================================================

    #[test]
    fn test_currency_round_trip() {
        for currency in Currency::ALL {
            assert_eq!(Currency::parse(currency.as_str()), Some(currency));
        }
        assert_eq!(Currency::parse("BITCOIN"), Some(Currency::Bitcoin));
        assert_eq!(Currency::parse("doge"), None);
    }

    #[test]
    fn test_field_labels() {
        assert_eq!(
            BalanceField::Available(Currency::Bitcoin).label(),
            "bitcoin_available"
        );
        assert_eq!(BalanceField::Pending(Currency::Usdt).label(), "usdt_pending");
        assert_eq!(BalanceField::ActiveDeposit.label(), "active_deposit");
        assert_eq!(BalanceField::TotalEarnings.label(), "total_earnings");
    }

    // =========================================================================
    // Credits and debits
    // =========================================================================

    #[test]
    fn test_credit_updates_aggregate() {
        let balances = funded();
        assert_eq!(balances.available_balance(), dec!(500));
        assert_eq!(balances.currency(Currency::Bitcoin).available, dec!(300));
        assert_eq!(balances.currency(Currency::Usdt).available, dec!(200));
        assert!(balances.invariants_hold());
    }

    #[test]
    fn test_credit_non_available_field_leaves_aggregate() {
        let mut balances = funded();
        balances
            .apply_all(&[BalanceMutation::credit(BalanceField::ActiveDeposit, dec!(50))])
            .unwrap();
        assert_eq!(balances.available_balance(), dec!(500));
        assert_eq!(balances.active_deposit(), dec!(50));
    }

    #[test]
    fn test_debit_rejects_insufficient() {
        let mut balances = funded();
        let err = balances
            .apply_all(&[BalanceMutation::debit(
                BalanceField::Available(Currency::Usdt),
                dec!(201),
            )])
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientBalance { .. }));
        // Untouched on failure.
        assert_eq!(balances, funded());
    }

    #[test]
    fn test_zero_and_negative_amounts_rejected() {
        let mut balances = funded();
        for amount in [dec!(0), dec!(-5)] {
            let err = balances
                .apply_all(&[BalanceMutation::credit(
                    BalanceField::TotalEarnings,
                    amount,
                )])
                .unwrap_err();
            assert!(matches!(err, EngineError::InvalidAmount(_)));
        }
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let mut balances = funded();
        let err = balances.apply_all(&[
            BalanceMutation::debit(BalanceField::Available(Currency::Bitcoin), dec!(100)),
            BalanceMutation::debit(BalanceField::ActiveDeposit, dec!(1)),
        ]);
        assert!(err.is_err());
        // First debit must not have landed.
        assert_eq!(balances.currency(Currency::Bitcoin).available, dec!(300));
        assert!(balances.invariants_hold());
    }

    // =========================================================================
    // Aggregate drain
    // =========================================================================

    #[test]
    fn test_spread_debit_drains_in_fixed_order() {
        let mut balances = funded();
        balances
            .apply_all(&[BalanceMutation::debit_available_spread(dec!(350))])
            .unwrap();
        // Bitcoin drained first, remainder from usdt.
        assert_eq!(balances.currency(Currency::Bitcoin).available, dec!(0));
        assert_eq!(balances.currency(Currency::Usdt).available, dec!(150));
        assert_eq!(balances.available_balance(), dec!(150));
        assert!(balances.invariants_hold());
    }

    #[test]
    fn test_spread_debit_checks_aggregate() {
        let mut balances = funded();
        let err = balances
            .apply_all(&[BalanceMutation::debit_available_spread(dec!(501))])
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientBalance { .. }));
        assert_eq!(balances.available_balance(), dec!(500));
    }

    // =========================================================================
    // Persistence round-trip
    // =========================================================================

    #[test]
    fn test_from_parts_accepts_consistent_row() {
        let balances = UserBalances::from_parts(
            "user-2",
            dec!(150),
            dec!(40),
            dec!(12),
            CurrencyBalance {
                available: dec!(100),
                pending: dec!(5),
            },
            CurrencyBalance::default(),
            CurrencyBalance {
                available: dec!(50),
                pending: dec!(0),
            },
        )
        .unwrap();
        assert_eq!(balances.get(BalanceField::ActiveDeposit), dec!(40));
    }

    #[test]
    fn test_from_parts_rejects_drifted_aggregate() {
        let result = UserBalances::from_parts(
            "user-2",
            dec!(999),
            dec!(0),
            dec!(0),
            CurrencyBalance {
                available: dec!(100),
                pending: dec!(0),
            },
            CurrencyBalance::default(),
            CurrencyBalance::default(),
        );
        assert!(matches!(result, Err(EngineError::Storage(_))));
    }

    #[test]
    fn test_from_parts_rejects_negative_field() {
        let result = UserBalances::from_parts(
            "user-2",
            dec!(0),
            dec!(-1),
            dec!(0),
            CurrencyBalance::default(),
            CurrencyBalance::default(),
            CurrencyBalance::default(),
        );
        assert!(matches!(result, Err(EngineError::Storage(_))));
    }
}
