//! Database row types and their conversions into domain models.
//!
//! Enum-typed columns are stored as text; parsing failures surface as
//! storage errors rather than panics, so a corrupt row never takes the
//! engine down with it.

use chrono::{DateTime, Utc};
use coinvault_core::balance::{Currency, CurrencyBalance, UserBalances};
use coinvault_core::investment::{Investment, InvestmentStatus, PaymentMethod};
use coinvault_core::plan::{InvestmentPlan, PlanStatus};
use coinvault_core::referral::{ReferralEdge, ReferralStatus};
use coinvault_core::transaction::{TransactionRecord, TransactionStatus, TransactionType};
use coinvault_core::EngineError;
use rust_decimal::Decimal;

fn bad_column(table: &str, column: &str, value: &str) -> EngineError {
    EngineError::Storage(format!("invalid {table}.{column} value: {value}"))
}

#[derive(Debug, sqlx::FromRow)]
pub struct UserBalanceRow {
    pub user_id: String,
    pub available_balance: Decimal,
    pub active_deposit: Decimal,
    pub total_earnings: Decimal,
    pub bitcoin_available: Decimal,
    pub bitcoin_pending: Decimal,
    pub ethereum_available: Decimal,
    pub ethereum_pending: Decimal,
    pub usdt_available: Decimal,
    pub usdt_pending: Decimal,
}

impl UserBalanceRow {
    /// Converts into the domain ledger, re-validating its invariants.
    ///
    /// # Errors
    /// `Storage` when the row is internally inconsistent.
    pub fn into_balances(self) -> Result<UserBalances, EngineError> {
        UserBalances::from_parts(
            self.user_id,
            self.available_balance,
            self.active_deposit,
            self.total_earnings,
            CurrencyBalance {
                available: self.bitcoin_available,
                pending: self.bitcoin_pending,
            },
            CurrencyBalance {
                available: self.ethereum_available,
                pending: self.ethereum_pending,
            },
            CurrencyBalance {
                available: self.usdt_available,
                pending: self.usdt_pending,
            },
        )
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PlanRow {
    pub name: String,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub daily_profit_percent: Decimal,
    pub duration_days: i64,
    pub status: String,
    pub deleted: bool,
}

impl PlanRow {
    /// # Errors
    /// `Storage` on an unparseable status column.
    pub fn into_plan(self) -> Result<InvestmentPlan, EngineError> {
        let status = PlanStatus::parse(&self.status)
            .ok_or_else(|| bad_column("plans", "status", &self.status))?;
        Ok(InvestmentPlan {
            name: self.name,
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            daily_profit_percent: self.daily_profit_percent,
            duration_days: self.duration_days,
            status,
            deleted: self.deleted,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct InvestmentRow {
    pub id: String,
    pub user_id: String,
    pub plan_name: String,
    pub payment_method: String,
    pub amount: Decimal,
    pub daily_profit_percent: Decimal,
    pub duration_days: i64,
    pub accrued_profit: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_profit_update: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
}

impl InvestmentRow {
    /// # Errors
    /// `Storage` on an unparseable status or payment-method column.
    pub fn into_investment(self) -> Result<Investment, EngineError> {
        let payment_method = PaymentMethod::parse(&self.payment_method).ok_or_else(|| {
            bad_column("investments", "payment_method", &self.payment_method)
        })?;
        let status = InvestmentStatus::parse(&self.status)
            .ok_or_else(|| bad_column("investments", "status", &self.status))?;
        Ok(Investment {
            id: self.id,
            user_id: self.user_id,
            plan_name: self.plan_name,
            payment_method,
            amount: self.amount,
            daily_profit_percent: self.daily_profit_percent,
            duration_days: self.duration_days,
            accrued_profit: self.accrued_profit,
            status,
            created_at: self.created_at,
            expires_at: self.expires_at,
            last_profit_update: self.last_profit_update,
            remarks: self.remarks,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ReferralRow {
    pub referrer_id: String,
    pub referred_id: String,
    pub level: i16,
    pub commission: Decimal,
    pub status: String,
    pub commission_paid: bool,
    pub created_at: DateTime<Utc>,
}

impl ReferralRow {
    /// # Errors
    /// `Storage` on an unparseable status column.
    pub fn into_edge(self) -> Result<ReferralEdge, EngineError> {
        let status = ReferralStatus::parse(&self.status)
            .ok_or_else(|| bad_column("referrals", "status", &self.status))?;
        Ok(ReferralEdge {
            referrer_id: self.referrer_id,
            referred_id: self.referred_id,
            level: self.level,
            commission: self.commission,
            status,
            commission_paid: self.commission_paid,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct TransactionRow {
    pub id: String,
    pub user_id: String,
    pub tx_type: String,
    pub currency: Option<String>,
    pub amount: Decimal,
    pub status: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl TransactionRow {
    /// # Errors
    /// `Storage` on an unparseable type, currency, or status column.
    pub fn into_record(self) -> Result<TransactionRecord, EngineError> {
        let tx_type = TransactionType::parse(&self.tx_type)
            .ok_or_else(|| bad_column("transactions", "tx_type", &self.tx_type))?;
        let currency = match &self.currency {
            Some(raw) => Some(
                Currency::parse(raw)
                    .ok_or_else(|| bad_column("transactions", "currency", raw))?,
            ),
            None => None,
        };
        let status = TransactionStatus::parse(&self.status)
            .ok_or_else(|| bad_column("transactions", "status", &self.status))?;
        Ok(TransactionRecord {
            id: self.id,
            user_id: self.user_id,
            tx_type,
            currency,
            amount: self.amount,
            status,
            description: self.description,
            created_at: self.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balance_row_round_trip() {
        let row = UserBalanceRow {
            user_id: "user-1".into(),
            available_balance: dec!(150),
            active_deposit: dec!(40),
            total_earnings: dec!(12),
            bitcoin_available: dec!(100),
            bitcoin_pending: dec!(0),
            ethereum_available: dec!(0),
            ethereum_pending: dec!(0),
            usdt_available: dec!(50),
            usdt_pending: dec!(5),
        };
        let balances = row.into_balances().unwrap();
        assert_eq!(balances.available_balance(), dec!(150));
        assert_eq!(balances.currency(Currency::Usdt).pending, dec!(5));
    }

    #[test]
    fn test_balance_row_rejects_drift() {
        let row = UserBalanceRow {
            user_id: "user-1".into(),
            available_balance: dec!(999),
            active_deposit: dec!(0),
            total_earnings: dec!(0),
            bitcoin_available: dec!(100),
            bitcoin_pending: dec!(0),
            ethereum_available: dec!(0),
            ethereum_pending: dec!(0),
            usdt_available: dec!(0),
            usdt_pending: dec!(0),
        };
        assert!(matches!(
            row.into_balances(),
            Err(EngineError::Storage(_))
        ));
    }

    #[test]
    fn test_plan_row_parses_status() {
        let row = PlanRow {
            name: "Starter".into(),
            min_amount: dec!(100),
            max_amount: dec!(1000),
            daily_profit_percent: dec!(6),
            duration_days: 3,
            status: "active".into(),
            deleted: false,
        };
        let plan = row.into_plan().unwrap();
        assert_eq!(plan.status, PlanStatus::Active);
    }

    #[test]
    fn test_investment_row_rejects_unknown_status() {
        let row = InvestmentRow {
            id: "inv-1".into(),
            user_id: "user-1".into(),
            plan_name: "Starter".into(),
            payment_method: "balance".into(),
            amount: dec!(500),
            daily_profit_percent: dec!(6),
            duration_days: 3,
            accrued_profit: dec!(0),
            status: "weird".into(),
            created_at: Utc::now(),
            expires_at: Utc::now(),
            last_profit_update: None,
            remarks: None,
        };
        let err = row.into_investment().unwrap_err();
        assert_eq!(err.kind(), "storage");
    }

    #[test]
    fn test_transaction_row_parses_optional_currency() {
        let base = TransactionRow {
            id: "tx-1".into(),
            user_id: "user-1".into(),
            tx_type: "profit".into(),
            currency: None,
            amount: dec!(30),
            status: "completed".into(),
            description: "daily profit".into(),
            created_at: Utc::now(),
        };
        let record = base.into_record().unwrap();
        assert_eq!(record.tx_type, TransactionType::Profit);
        assert_eq!(record.currency, None);

        let with_currency = TransactionRow {
            id: "tx-2".into(),
            user_id: "user-1".into(),
            tx_type: "deposit".into(),
            currency: Some("bitcoin".into()),
            amount: dec!(1),
            status: "completed".into(),
            description: "btc deposit".into(),
            created_at: Utc::now(),
        };
        assert_eq!(
            with_currency.into_record().unwrap().currency,
            Some(Currency::Bitcoin)
        );
    }
}
