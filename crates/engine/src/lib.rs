//! Investment lifecycle and ledger engine.
//!
//! This crate owns the money-moving core of the platform:
//! - [`ledger::Ledger`]: atomic balance mutations paired with audit records
//! - [`catalog::PlanCatalog`]: read-side plan registry
//! - [`lifecycle::LifecycleService`]: the investment state machine
//! - [`referral::ReferralCascade`]: multi-level commission propagation
//! - [`memory::MemoryStore`]: in-memory storage for simulation and tests

pub mod catalog;
pub mod ledger;
pub mod lifecycle;
pub mod memory;
pub mod referral;
pub mod retry;

pub use catalog::PlanCatalog;
pub use ledger::Ledger;
pub use lifecycle::{AccrualOutcome, LifecycleService};
pub use memory::MemoryStore;
pub use referral::{CascadeFailure, CascadeOutcome, PaidCommission, ReferralCascade};
pub use retry::{with_retry, RetryPolicy};
