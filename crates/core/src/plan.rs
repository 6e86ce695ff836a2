//! Investment plan catalog types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Whether a plan accepts new investments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStatus {
    Active,
    Inactive,
}

impl PlanStatus {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

/// An investment plan. Running investments snapshot the rate and duration at
/// creation, so editing or deleting a plan never changes them retroactively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestmentPlan {
    /// Unique plan name; investments reference plans by name.
    pub name: String,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    /// Daily profit rate in percent, 0 to 100.
    pub daily_profit_percent: Decimal,
    /// Investment term in days, at least 1.
    pub duration_days: i64,
    pub status: PlanStatus,
    /// Soft-delete flag; deleted plans are invisible to the catalog.
    pub deleted: bool,
}

impl InvestmentPlan {
    /// Creates an active, non-deleted plan.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        min_amount: Decimal,
        max_amount: Decimal,
        daily_profit_percent: Decimal,
        duration_days: i64,
    ) -> Self {
        Self {
            name: name.into(),
            min_amount,
            max_amount,
            daily_profit_percent,
            duration_days,
            status: PlanStatus::Active,
            deleted: false,
        }
    }

    /// Checks the plan's structural constraints.
    ///
    /// # Errors
    /// Returns a validation error when `min_amount > max_amount`, the daily
    /// rate is outside [0, 100], or the duration is shorter than one day.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.min_amount > self.max_amount || self.min_amount < Decimal::ZERO {
            return Err(EngineError::AmountOutOfRange {
                amount: self.min_amount,
                min: Decimal::ZERO,
                max: self.max_amount,
            });
        }
        if self.daily_profit_percent < Decimal::ZERO
            || self.daily_profit_percent > Decimal::ONE_HUNDRED
        {
            return Err(EngineError::InvalidAmount(self.daily_profit_percent));
        }
        if self.duration_days < 1 {
            return Err(EngineError::InvalidAmount(Decimal::from(self.duration_days)));
        }
        Ok(())
    }

    /// True when the plan is visible and accepting investments.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.status == PlanStatus::Active && !self.deleted
    }

    /// True when `amount` lies within the plan's range.
    #[must_use]
    pub fn contains_amount(&self, amount: Decimal) -> bool {
        amount >= self.min_amount && amount <= self.max_amount
    }
}
