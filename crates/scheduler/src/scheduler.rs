use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use coinvault_core::config::SchedulerConfig;
use coinvault_core::notify::Notifier;
use coinvault_core::traits::EngineStore;
use coinvault_engine::{AccrualOutcome, LifecycleService};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

/// Aggregate outcome of one sweep over the approved investments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Investments matured in this run.
    pub completed: usize,
    /// Investments that received a daily profit credit.
    pub accrued: usize,
    /// Investments skipped because today's accrual already ran.
    pub already_accrued: usize,
    /// Investments whose processing failed; the sweep continued past them.
    pub failed: usize,
}

impl SweepStats {
    /// Total investments the sweep looked at.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.completed + self.accrued + self.already_accrued + self.failed
    }
}

pub struct ProfitScheduler<S, N> {
    config: SchedulerConfig,
    store: Arc<S>,
    lifecycle: LifecycleService<S, N>,
}

impl<S, N> ProfitScheduler<S, N>
where
    S: EngineStore + 'static,
    N: Notifier + 'static,
{
    /// Creates a new profit distribution scheduler.
    #[must_use]
    pub fn new(config: SchedulerConfig, store: Arc<S>, lifecycle: LifecycleService<S, N>) -> Self {
        Self {
            config,
            store,
            lifecycle,
        }
    }

    /// Starts the scheduler and runs according to the cron schedule.
    ///
    /// # Errors
    /// Returns an error if the scheduler fails to start or if job scheduling
    /// fails.
    pub async fn start(self) -> Result<()> {
        if !self.config.enabled {
            info!("Profit scheduler is disabled");
            return Ok(());
        }

        info!(
            "Starting profit scheduler with cron: {}",
            self.config.cron_schedule
        );

        let scheduler = JobScheduler::new().await?;
        let store = self.store.clone();
        let lifecycle = self.lifecycle.clone();
        let cron_schedule = self.config.cron_schedule.clone();

        let job = Job::new_async(cron_schedule.as_str(), move |_uuid, _lock| {
            let store = store.clone();
            let lifecycle = lifecycle.clone();
            Box::pin(async move {
                if let Err(e) = run_sweep(store, lifecycle, Utc::now()).await {
                    error!("Profit distribution sweep failed: {}", e);
                }
            })
        })?;

        scheduler.add(job).await?;
        scheduler.start().await?;

        info!("Profit scheduler started successfully");

        // Keep scheduler running
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(60)).await;
        }
    }

    /// Runs one sweep manually (one-time execution).
    ///
    /// # Errors
    /// Returns an error if the approved-investment query fails; per-item
    /// failures are counted, not propagated.
    pub async fn run_once(&self) -> Result<SweepStats> {
        run_sweep(self.store.clone(), self.lifecycle.clone(), Utc::now()).await
    }

    /// [`Self::run_once`] with an explicit clock, for deterministic callers.
    ///
    /// # Errors
    /// As for `run_once`.
    pub async fn run_once_at(&self, now: DateTime<Utc>) -> Result<SweepStats> {
        run_sweep(self.store.clone(), self.lifecycle.clone(), now).await
    }
}

/// Walks every approved investment once: matures the expired ones and
/// accrues daily profit on the rest. A failure on one investment never
/// blocks the others.
async fn run_sweep<S, N>(
    store: Arc<S>,
    lifecycle: LifecycleService<S, N>,
    now: DateTime<Utc>,
) -> Result<SweepStats>
where
    S: EngineStore + 'static,
    N: Notifier + 'static,
{
    // One query up front; each investment is processed at most once per run.
    let investments = store.list_approved().await?;

    info!(
        "Running profit distribution sweep over {} approved investments",
        investments.len()
    );

    let mut stats = SweepStats::default();
    for investment in &investments {
        if investment.is_expired(now) {
            match lifecycle.complete_at(&investment.id, now).await {
                Ok(completed) => {
                    info!(
                        "Investment {} completed for {}: principal {}",
                        completed.id, completed.user_id, completed.amount
                    );
                    stats.completed += 1;
                }
                Err(e) => {
                    error!("Completion failed for investment {}: {}", investment.id, e);
                    stats.failed += 1;
                }
            }
        } else {
            match lifecycle.accrue_daily_profit_at(&investment.id, now).await {
                Ok(AccrualOutcome::Accrued { amount }) => {
                    info!(
                        "Accrued {} profit on investment {} for {}",
                        amount, investment.id, investment.user_id
                    );
                    stats.accrued += 1;
                }
                Ok(AccrualOutcome::AlreadyAccrued) => {
                    stats.already_accrued += 1;
                }
                Err(e) => {
                    error!("Accrual failed for investment {}: {}", investment.id, e);
                    stats.failed += 1;
                }
            }
        }
    }

    info!(
        "Sweep finished: {} completed, {} accrued, {} already accrued, {} failed",
        stats.completed, stats.accrued, stats.already_accrued, stats.failed
    );

    Ok(stats)
}
