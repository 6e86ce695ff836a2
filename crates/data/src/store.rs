//! `PostgreSQL` implementation of the engine's storage traits.
//!
//! Ledger mutations run inside one SQL transaction: the user row is taken
//! with `SELECT ... FOR UPDATE` (serializing concurrent mutations on the
//! same user), the batch is applied through the domain ledger type, and the
//! updated balances commit together with their audit record. Status changes
//! are conditional updates, so concurrent transitions race safely.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coinvault_core::balance::{BalanceMutation, UserBalances};
use coinvault_core::investment::{Investment, InvestmentStatus};
use coinvault_core::plan::InvestmentPlan;
use coinvault_core::referral::ReferralEdge;
use coinvault_core::traits::{
    AccrualClaim, InvestmentStore, LedgerStore, PlanStore, ReferralStore, TransactionStore,
};
use coinvault_core::transaction::{NewTransaction, TransactionRecord};
use coinvault_core::EngineError;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use crate::rows::{InvestmentRow, PlanRow, ReferralRow, TransactionRow, UserBalanceRow};

const SELECT_INVESTMENT: &str = r"
    SELECT id, user_id, plan_name, payment_method, amount,
           daily_profit_percent, duration_days, accrued_profit, status,
           created_at, expires_at, last_profit_update, remarks
    FROM investments
";

const SELECT_REFERRAL: &str = r"
    SELECT referrer_id, referred_id, level, commission, status,
           commission_paid, created_at
    FROM referrals
";

/// Maps driver errors into the engine taxonomy; lock conflicts and
/// connection hiccups become retryable transients.
fn map_sqlx(err: sqlx::Error) -> EngineError {
    match &err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            EngineError::Transient(err.to_string())
        }
        sqlx::Error::Database(db) => match db.code().as_deref() {
            // serialization_failure, deadlock_detected, lock_not_available
            Some("40001" | "40P01" | "55P03") => EngineError::Transient(err.to_string()),
            _ => EngineError::Storage(err.to_string()),
        },
        _ => EngineError::Storage(err.to_string()),
    }
}

/// `PostgreSQL`-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Registers a user with a zeroed ledger row, if absent.
    ///
    /// # Errors
    /// Returns a storage error if the insert fails.
    pub async fn create_user(&self, user_id: &str) -> Result<(), EngineError> {
        sqlx::query(
            r"
            INSERT INTO users (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO NOTHING
            ",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn lock_balances(
        tx: &mut Transaction<'_, Postgres>,
        user_id: &str,
    ) -> Result<UserBalances, EngineError> {
        let row = sqlx::query_as::<_, UserBalanceRow>(
            r"
            SELECT user_id, available_balance, active_deposit, total_earnings,
                   bitcoin_available, bitcoin_pending,
                   ethereum_available, ethereum_pending,
                   usdt_available, usdt_pending
            FROM users
            WHERE user_id = $1
            FOR UPDATE
            ",
        )
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx)?
        .ok_or_else(|| EngineError::user_not_found(user_id))?;

        row.into_balances()
    }

    async fn write_balances(
        tx: &mut Transaction<'_, Postgres>,
        balances: &UserBalances,
    ) -> Result<(), EngineError> {
        sqlx::query(
            r"
            UPDATE users
            SET available_balance = $2,
                active_deposit = $3,
                total_earnings = $4,
                bitcoin_available = $5,
                bitcoin_pending = $6,
                ethereum_available = $7,
                ethereum_pending = $8,
                usdt_available = $9,
                usdt_pending = $10,
                updated_at = NOW()
            WHERE user_id = $1
            ",
        )
        .bind(balances.user_id())
        .bind(balances.available_balance())
        .bind(balances.active_deposit())
        .bind(balances.total_earnings())
        .bind(balances.currency(coinvault_core::Currency::Bitcoin).available)
        .bind(balances.currency(coinvault_core::Currency::Bitcoin).pending)
        .bind(balances.currency(coinvault_core::Currency::Ethereum).available)
        .bind(balances.currency(coinvault_core::Currency::Ethereum).pending)
        .bind(balances.currency(coinvault_core::Currency::Usdt).available)
        .bind(balances.currency(coinvault_core::Currency::Usdt).pending)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn insert_record(
        tx: &mut Transaction<'_, Postgres>,
        record: &TransactionRecord,
    ) -> Result<(), EngineError> {
        sqlx::query(
            r"
            INSERT INTO transactions
                (id, user_id, tx_type, currency, amount, status, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(record.tx_type.as_str())
        .bind(record.currency.map(|c| c.as_str()))
        .bind(record.amount)
        .bind(record.status.as_str())
        .bind(&record.description)
        .bind(record.created_at)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn investment_exists(&self, id: &str) -> Result<bool, EngineError> {
        let row: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM investments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn balances(&self, user_id: &str) -> Result<UserBalances, EngineError> {
        let row = sqlx::query_as::<_, UserBalanceRow>(
            r"
            SELECT user_id, available_balance, active_deposit, total_earnings,
                   bitcoin_available, bitcoin_pending,
                   ethereum_available, ethereum_pending,
                   usdt_available, usdt_pending
            FROM users
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?
        .ok_or_else(|| EngineError::user_not_found(user_id))?;

        row.into_balances()
    }

    async fn apply_mutations(
        &self,
        user_id: &str,
        mutations: &[BalanceMutation],
        audit: NewTransaction,
    ) -> Result<UserBalances, EngineError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let mut balances = Self::lock_balances(&mut tx, user_id).await?;
        balances.apply_all(mutations)?;
        Self::write_balances(&mut tx, &balances).await?;
        Self::insert_record(&mut tx, &audit.into_record(Utc::now())).await?;

        tx.commit().await.map_err(map_sqlx)?;
        Ok(balances)
    }
}

#[async_trait]
impl PlanStore for PgStore {
    async fn plan_by_name(&self, name: &str) -> Result<Option<InvestmentPlan>, EngineError> {
        let row = sqlx::query_as::<_, PlanRow>(
            r"
            SELECT name, min_amount, max_amount, daily_profit_percent,
                   duration_days, status, deleted
            FROM plans
            WHERE name = $1
            ",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        row.map(PlanRow::into_plan).transpose()
    }

    async fn upsert_plan(&self, plan: &InvestmentPlan) -> Result<(), EngineError> {
        sqlx::query(
            r"
            INSERT INTO plans
                (name, min_amount, max_amount, daily_profit_percent,
                 duration_days, status, deleted)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (name) DO UPDATE
            SET min_amount = EXCLUDED.min_amount,
                max_amount = EXCLUDED.max_amount,
                daily_profit_percent = EXCLUDED.daily_profit_percent,
                duration_days = EXCLUDED.duration_days,
                status = EXCLUDED.status,
                deleted = EXCLUDED.deleted
            ",
        )
        .bind(&plan.name)
        .bind(plan.min_amount)
        .bind(plan.max_amount)
        .bind(plan.daily_profit_percent)
        .bind(plan.duration_days)
        .bind(plan.status.as_str())
        .bind(plan.deleted)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }
}

#[async_trait]
impl InvestmentStore for PgStore {
    async fn insert_investment(&self, investment: &Investment) -> Result<(), EngineError> {
        sqlx::query(
            r"
            INSERT INTO investments
                (id, user_id, plan_name, payment_method, amount,
                 daily_profit_percent, duration_days, accrued_profit, status,
                 created_at, expires_at, last_profit_update, remarks)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(&investment.id)
        .bind(&investment.user_id)
        .bind(&investment.plan_name)
        .bind(investment.payment_method.as_str())
        .bind(investment.amount)
        .bind(investment.daily_profit_percent)
        .bind(investment.duration_days)
        .bind(investment.accrued_profit)
        .bind(investment.status.as_str())
        .bind(investment.created_at)
        .bind(investment.expires_at)
        .bind(investment.last_profit_update)
        .bind(&investment.remarks)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn investment(&self, id: &str) -> Result<Option<Investment>, EngineError> {
        let row = sqlx::query_as::<_, InvestmentRow>(&format!("{SELECT_INVESTMENT} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        row.map(InvestmentRow::into_investment).transpose()
    }

    async fn transition_status(
        &self,
        id: &str,
        from: InvestmentStatus,
        to: InvestmentStatus,
        remarks: Option<&str>,
    ) -> Result<bool, EngineError> {
        let result = sqlx::query(
            r"
            UPDATE investments
            SET status = $3,
                remarks = COALESCE($4, remarks)
            WHERE id = $1 AND status = $2
            ",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(remarks)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        // Distinguish a lost race from a missing row.
        if self.investment_exists(id).await? {
            Ok(false)
        } else {
            Err(EngineError::investment_not_found(id))
        }
    }

    async fn claim_daily_accrual(
        &self,
        id: &str,
        profit: Decimal,
        now: DateTime<Utc>,
    ) -> Result<AccrualClaim, EngineError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let row: Option<(String, Option<DateTime<Utc>>)> = sqlx::query_as(
            r"
            SELECT status, last_profit_update
            FROM investments
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        let Some((status, previous)) = row else {
            return Err(EngineError::investment_not_found(id));
        };
        if InvestmentStatus::parse(&status) != Some(InvestmentStatus::Approved) {
            return Ok(AccrualClaim::NotAccruable);
        }
        if previous.is_some_and(|t| t.date_naive() == now.date_naive()) {
            return Ok(AccrualClaim::AlreadyAccrued);
        }

        sqlx::query(
            r"
            UPDATE investments
            SET accrued_profit = accrued_profit + $2,
                last_profit_update = $3
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(profit)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)?;
        Ok(AccrualClaim::Claimed { previous })
    }

    async fn revert_daily_accrual(
        &self,
        id: &str,
        profit: Decimal,
        previous: Option<DateTime<Utc>>,
    ) -> Result<(), EngineError> {
        sqlx::query(
            r"
            UPDATE investments
            SET accrued_profit = accrued_profit - $2,
                last_profit_update = $3
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(profit)
        .bind(previous)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn list_approved(&self) -> Result<Vec<Investment>, EngineError> {
        let rows = sqlx::query_as::<_, InvestmentRow>(&format!(
            "{SELECT_INVESTMENT} WHERE status = 'approved' ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.into_iter()
            .map(InvestmentRow::into_investment)
            .collect()
    }
}

#[async_trait]
impl ReferralStore for PgStore {
    async fn direct_referrer_of(
        &self,
        user_id: &str,
    ) -> Result<Option<ReferralEdge>, EngineError> {
        let row = sqlx::query_as::<_, ReferralRow>(&format!(
            "{SELECT_REFERRAL} WHERE referred_id = $1 AND level = 1 LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        row.map(ReferralRow::into_edge).transpose()
    }

    async fn edge(
        &self,
        referrer_id: &str,
        referred_id: &str,
        level: i16,
    ) -> Result<Option<ReferralEdge>, EngineError> {
        let row = sqlx::query_as::<_, ReferralRow>(&format!(
            "{SELECT_REFERRAL} WHERE referrer_id = $1 AND referred_id = $2 AND level = $3"
        ))
        .bind(referrer_id)
        .bind(referred_id)
        .bind(level)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        row.map(ReferralRow::into_edge).transpose()
    }

    async fn insert_edge(&self, edge: &ReferralEdge) -> Result<(), EngineError> {
        sqlx::query(
            r"
            INSERT INTO referrals
                (referrer_id, referred_id, level, commission, status,
                 commission_paid, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (referrer_id, referred_id, level) DO NOTHING
            ",
        )
        .bind(&edge.referrer_id)
        .bind(&edge.referred_id)
        .bind(edge.level)
        .bind(edge.commission)
        .bind(edge.status.as_str())
        .bind(edge.commission_paid)
        .bind(edge.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn record_commission(
        &self,
        referrer_id: &str,
        referred_id: &str,
        level: i16,
        amount: Decimal,
    ) -> Result<(), EngineError> {
        let result = sqlx::query(
            r"
            UPDATE referrals
            SET commission = commission + $4,
                status = 'active',
                commission_paid = TRUE
            WHERE referrer_id = $1 AND referred_id = $2 AND level = $3
            ",
        )
        .bind(referrer_id)
        .bind(referred_id)
        .bind(level)
        .bind(amount)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(EngineError::NotFound {
                entity: "referral edge",
                id: format!("{referrer_id}->{referred_id} level {level}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for PgStore {
    async fn append_transaction(
        &self,
        tx: NewTransaction,
    ) -> Result<TransactionRecord, EngineError> {
        let record = tx.into_record(Utc::now());
        sqlx::query(
            r"
            INSERT INTO transactions
                (id, user_id, tx_type, currency, amount, status, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(record.tx_type.as_str())
        .bind(record.currency.map(|c| c.as_str()))
        .bind(record.amount)
        .bind(record.status.as_str())
        .bind(&record.description)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(record)
    }

    async fn transactions_for_user(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<TransactionRecord>, EngineError> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r"
            SELECT id, user_id, tx_type, currency, amount, status, description, created_at
            FROM transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            ",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.into_iter().map(TransactionRow::into_record).collect()
    }
}
