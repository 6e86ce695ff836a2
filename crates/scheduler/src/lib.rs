//! Daily profit distribution scheduler.
//!
//! Runs a periodic sweep over every approved investment: expired ones are
//! matured, the rest receive their daily profit accrual. The sweep is safe
//! to re-run (per-day accrual idempotency) and continues past individual
//! failures.

pub mod scheduler;

pub use scheduler::{ProfitScheduler, SweepStats};
