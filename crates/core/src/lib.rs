pub mod balance;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod investment;
pub mod notify;
pub mod plan;
pub mod referral;
pub mod traits;
pub mod transaction;

pub use balance::{
    BalanceField, BalanceMutation, Currency, CurrencyBalance, UserBalances, SETTLEMENT_CURRENCY,
};
pub use config::{AppConfig, DatabaseConfig, ReferralConfig, SchedulerConfig};
pub use config_loader::ConfigLoader;
pub use error::EngineError;
pub use investment::{Investment, InvestmentStatus, PaymentMethod};
pub use notify::{LogNotifier, Notification, Notifier};
pub use plan::{InvestmentPlan, PlanStatus};
pub use referral::{ReferralEdge, ReferralStatus};
pub use traits::{
    AccrualClaim, EngineStore, InvestmentStore, LedgerStore, PlanStore, ReferralStore,
    TransactionStore,
};
pub use transaction::{NewTransaction, TransactionRecord, TransactionStatus, TransactionType};
