//! Post-commit notification seam.
//!
//! The engine emits a notification after a state transition commits,
//! fire-and-forget: a failing notifier is logged and never rolls back the
//! transition. Email delivery lives behind this trait, outside the engine.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

/// A committed state change worth telling the user about.
#[derive(Debug, Clone)]
pub enum Notification {
    InvestmentApproved {
        user_id: String,
        investment_id: String,
        amount: Decimal,
    },
    ProfitAccrued {
        user_id: String,
        investment_id: String,
        amount: Decimal,
    },
    InvestmentCompleted {
        user_id: String,
        investment_id: String,
        amount: Decimal,
    },
    CommissionPaid {
        user_id: String,
        from_user_id: String,
        level: i16,
        amount: Decimal,
    },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> anyhow::Result<()>;
}

/// Notifier that only logs; the default wiring.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) -> anyhow::Result<()> {
        match notification {
            Notification::InvestmentApproved {
                user_id,
                investment_id,
                amount,
            } => info!("investment {investment_id} approved for {user_id}: {amount}"),
            Notification::ProfitAccrued {
                user_id,
                investment_id,
                amount,
            } => info!("profit {amount} accrued on {investment_id} for {user_id}"),
            Notification::InvestmentCompleted {
                user_id,
                investment_id,
                amount,
            } => info!("investment {investment_id} completed for {user_id}: {amount}"),
            Notification::CommissionPaid {
                user_id,
                from_user_id,
                level,
                amount,
            } => info!(
                "commission {amount} paid to {user_id} (level {level}, from {from_user_id})"
            ),
        }
        Ok(())
    }
}
