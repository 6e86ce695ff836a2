use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use coinvault_core::notify::LogNotifier;
use coinvault_core::plan::InvestmentPlan;
use coinvault_core::traits::{LedgerStore, PlanStore, TransactionStore};
use coinvault_core::{AppConfig, ConfigLoader};
use coinvault_data::{DatabaseClient, PgStore};
use coinvault_engine::LifecycleService;
use coinvault_scheduler::ProfitScheduler;
use rust_decimal_macros::dec;
use tracing::info;

#[derive(Parser)]
#[command(name = "coinvault")]
#[command(about = "Investment lifecycle and ledger engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daily profit distribution scheduler
    Run,
    /// Run one profit distribution sweep and exit
    Sweep,
    /// Seed the default investment plans
    SeedPlans,
    /// Print a user's balance ledger
    Balances {
        /// User identifier
        #[arg(long)]
        user: String,
    },
    /// Print a user's recent transactions
    Transactions {
        /// User identifier
        #[arg(long)]
        user: String,
        /// Maximum number of records
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::load()?;

    match cli.command {
        Commands::Run => run_scheduler(&config).await,
        Commands::Sweep => run_sweep(&config).await,
        Commands::SeedPlans => seed_plans(&config).await,
        Commands::Balances { user } => print_balances(&config, &user).await,
        Commands::Transactions { user, limit } => print_transactions(&config, &user, limit).await,
    }
}

async fn connect(config: &AppConfig) -> Result<Arc<PgStore>> {
    let db = DatabaseClient::new(&config.database.url, config.database.max_connections).await?;
    Ok(Arc::new(PgStore::new(db.pool().clone())))
}

fn lifecycle(
    store: Arc<PgStore>,
    config: &AppConfig,
) -> LifecycleService<PgStore, LogNotifier> {
    LifecycleService::new(store, config.referral.clone(), Arc::new(LogNotifier))
}

async fn run_scheduler(config: &AppConfig) -> Result<()> {
    let store = connect(config).await?;
    let service = lifecycle(store.clone(), config);
    let scheduler = ProfitScheduler::new(config.scheduler.clone(), store, service);
    scheduler.start().await
}

async fn run_sweep(config: &AppConfig) -> Result<()> {
    let store = connect(config).await?;
    let service = lifecycle(store.clone(), config);
    let scheduler = ProfitScheduler::new(config.scheduler.clone(), store, service);
    let stats = scheduler.run_once().await?;
    info!(
        "Sweep done: {} completed, {} accrued, {} already accrued, {} failed",
        stats.completed, stats.accrued, stats.already_accrued, stats.failed
    );
    Ok(())
}

async fn seed_plans(config: &AppConfig) -> Result<()> {
    let store = connect(config).await?;
    let plans = [
        InvestmentPlan::new("Starter", dec!(100), dec!(1000), dec!(6), 3),
        InvestmentPlan::new("Silver", dec!(1000), dec!(10000), dec!(8), 7),
        InvestmentPlan::new("Gold", dec!(10000), dec!(100000), dec!(10), 14),
    ];
    for plan in &plans {
        plan.validate()?;
        store.upsert_plan(plan).await?;
        info!("Seeded plan {}", plan.name);
    }
    Ok(())
}

async fn print_balances(config: &AppConfig, user: &str) -> Result<()> {
    let store = connect(config).await?;
    let balances = store.balances(user).await?;
    println!("{}", serde_json::to_string_pretty(&balances)?);
    Ok(())
}

async fn print_transactions(config: &AppConfig, user: &str, limit: i64) -> Result<()> {
    let store = connect(config).await?;
    let records = store.transactions_for_user(user, limit).await?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
