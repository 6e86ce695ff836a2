//! Investment records and their lifecycle state machine.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::balance::Currency;
use crate::plan::InvestmentPlan;

/// How an investment is funded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Bitcoin,
    Ethereum,
    Usdt,
    /// Paid out of the user's platform balance.
    Balance,
}

impl PaymentMethod {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bitcoin => "bitcoin",
            Self::Ethereum => "ethereum",
            Self::Usdt => "usdt",
            Self::Balance => "balance",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bitcoin" => Some(Self::Bitcoin),
            "ethereum" => Some(Self::Ethereum),
            "usdt" => Some(Self::Usdt),
            "balance" => Some(Self::Balance),
            _ => None,
        }
    }

    /// The deposit currency for external payment methods, `None` for
    /// balance-funded investments.
    #[must_use]
    pub fn currency(&self) -> Option<Currency> {
        match self {
            Self::Bitcoin => Some(Currency::Bitcoin),
            Self::Ethereum => Some(Currency::Ethereum),
            Self::Usdt => Some(Currency::Usdt),
            Self::Balance => None,
        }
    }
}

/// Lifecycle status. Legal transitions are `pending -> approved ->
/// completed` and `pending -> cancelled`; the terminal states admit none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvestmentStatus {
    Pending,
    Approved,
    Completed,
    Cancelled,
}

impl InvestmentStatus {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// True for states no transition leaves.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// True when `self -> to` is a legal transition.
    #[must_use]
    pub fn can_transition_to(&self, to: InvestmentStatus) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Cancelled)
                | (Self::Approved, Self::Completed)
        )
    }
}

/// One user investment. The plan's rate and duration are snapshotted at
/// creation so later catalog edits cannot change a running investment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Investment {
    pub id: String,
    pub user_id: String,
    /// Plan referenced by name; the snapshot below survives plan
    /// rename or deletion.
    pub plan_name: String,
    pub payment_method: PaymentMethod,
    pub amount: Decimal,
    /// Snapshot of the plan's daily rate at creation.
    pub daily_profit_percent: Decimal,
    /// Snapshot of the plan's term at creation.
    pub duration_days: i64,
    /// Profit accrued so far while approved.
    pub accrued_profit: Decimal,
    pub status: InvestmentStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Timestamp of the most recent daily accrual.
    pub last_profit_update: Option<DateTime<Utc>>,
    /// Rejection reason, when cancelled.
    pub remarks: Option<String>,
}

impl Investment {
    /// Creates a pending investment against a plan, snapshotting its terms.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        plan: &InvestmentPlan,
        payment_method: PaymentMethod,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            plan_name: plan.name.clone(),
            payment_method,
            amount,
            daily_profit_percent: plan.daily_profit_percent,
            duration_days: plan.duration_days,
            accrued_profit: Decimal::ZERO,
            status: InvestmentStatus::Pending,
            created_at: now,
            expires_at: now + Duration::days(plan.duration_days),
            last_profit_update: None,
            remarks: None,
        }
    }

    /// Profit credited per accrual day: `amount * rate / 100`.
    #[must_use]
    pub fn daily_profit(&self) -> Decimal {
        self.amount * self.daily_profit_percent / Decimal::ONE_HUNDRED
    }

    /// True once the term has elapsed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// True when a daily accrual already ran during `now`'s UTC day.
    #[must_use]
    pub fn accrued_on_day(&self, now: DateTime<Utc>) -> bool {
        self.last_profit_update
            .is_some_and(|t| t.date_naive() == now.date_naive())
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == InvestmentStatus::Pending
    }

    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.status == InvestmentStatus::Approved
    }
}
