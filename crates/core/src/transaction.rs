//! Append-only audit transaction records.
//!
//! Every ledger mutation commits together with exactly one transaction
//! record; records are never mutated after creation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::balance::Currency;

/// What a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Investment,
    Profit,
    ReferralCommission,
    InvestmentCompleted,
}

impl TransactionType {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Investment => "investment",
            Self::Profit => "profit",
            Self::ReferralCommission => "referral_commission",
            Self::InvestmentCompleted => "investment_completed",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "deposit" => Some(Self::Deposit),
            "withdrawal" => Some(Self::Withdrawal),
            "investment" => Some(Self::Investment),
            "profit" => Some(Self::Profit),
            "referral_commission" => Some(Self::ReferralCommission),
            "investment_completed" => Some(Self::InvestmentCompleted),
            _ => None,
        }
    }
}

/// Settlement state of a record. Ledger-paired records are completed at
/// creation; pending exists for records awaiting manual review (withdrawals,
/// handled outside this engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Completed,
}

impl TransactionStatus {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// A transaction waiting to be appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub user_id: String,
    pub tx_type: TransactionType,
    /// Currency the amount is denominated in, when one applies.
    pub currency: Option<Currency>,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub description: String,
}

impl NewTransaction {
    /// A completed record, the common case for ledger-paired entries.
    #[must_use]
    pub fn completed(
        user_id: impl Into<String>,
        tx_type: TransactionType,
        currency: Option<Currency>,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            tx_type,
            currency,
            amount,
            status: TransactionStatus::Completed,
            description: description.into(),
        }
    }

    /// Stamps the record with an id and timestamp for persistence.
    #[must_use]
    pub fn into_record(self, now: DateTime<Utc>) -> TransactionRecord {
        TransactionRecord {
            id: Uuid::new_v4().to_string(),
            user_id: self.user_id,
            tx_type: self.tx_type,
            currency: self.currency,
            amount: self.amount,
            status: self.status,
            description: self.description,
            created_at: now,
        }
    }
}

/// A persisted, immutable audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub user_id: String,
    pub tx_type: TransactionType,
    pub currency: Option<Currency>,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn sample_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_type_round_trip() {
        for tx_type in [
            TransactionType::Deposit,
            TransactionType::Withdrawal,
            TransactionType::Investment,
            TransactionType::Profit,
            TransactionType::ReferralCommission,
            TransactionType::InvestmentCompleted,
        ] {
            assert_eq!(TransactionType::parse(tx_type.as_str()), Some(tx_type));
        }
        assert_eq!(TransactionType::parse("refund"), None);
    }

    #[test]
    fn test_completed_builder_and_record() {
        let record = NewTransaction::completed(
            "user-1",
            TransactionType::Profit,
            Some(Currency::Usdt),
            dec!(30),
            "daily profit",
        )
        .into_record(sample_now());

        assert!(!record.id.is_empty());
        assert_eq!(record.user_id, "user-1");
        assert_eq!(record.tx_type, TransactionType::Profit);
        assert_eq!(record.status, TransactionStatus::Completed);
        assert_eq!(record.amount, dec!(30));
        assert_eq!(record.created_at, sample_now());
    }

    #[test]
    fn test_record_ids_are_unique() {
        let make = || {
            NewTransaction::completed(
                "u",
                TransactionType::Deposit,
                None,
                dec!(1),
                "d",
            )
            .into_record(sample_now())
        };
        assert_ne!(make().id, make().id);
    }
}
