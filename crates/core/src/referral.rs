//! Referral edges between users.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Edge status; flips to active on the referred user's first approved
/// investment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferralStatus {
    Pending,
    Active,
}

impl ReferralStatus {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            _ => None,
        }
    }
}

/// A referrer -> referred relationship at a given upline level.
///
/// Level 1 is the direct referrer; levels 2 and 3 are created lazily the
/// first time a cascade walks that far up from the referred user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralEdge {
    pub referrer_id: String,
    pub referred_id: String,
    /// Upline depth, 1 to the configured maximum.
    pub level: i16,
    /// Cumulative commission credited along this edge.
    pub commission: Decimal,
    pub status: ReferralStatus,
    pub commission_paid: bool,
    pub created_at: DateTime<Utc>,
}

impl ReferralEdge {
    /// Creates a pending edge with no commission history.
    #[must_use]
    pub fn new(
        referrer_id: impl Into<String>,
        referred_id: impl Into<String>,
        level: i16,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            referrer_id: referrer_id.into(),
            referred_id: referred_id.into(),
            level,
            commission: Decimal::ZERO,
            status: ReferralStatus::Pending,
            commission_paid: false,
            created_at: now,
        }
    }

    /// Accumulates a paid commission and activates the edge.
    pub fn record_commission(&mut self, amount: Decimal) {
        self.commission += amount;
        self.status = ReferralStatus::Active;
        self.commission_paid = true;
    }
}
