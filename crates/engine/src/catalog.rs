//! Read-side plan catalog.

use std::sync::Arc;

use coinvault_core::plan::{InvestmentPlan, PlanStatus};
use coinvault_core::traits::PlanStore;
use coinvault_core::EngineError;
use rust_decimal::Decimal;

/// Read-mostly view over the plan registry. Plan CRUD is an admin concern
/// outside the engine; the lifecycle only ever reads through here.
pub struct PlanCatalog<S> {
    store: Arc<S>,
}

impl<S> Clone for PlanCatalog<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: PlanStore> PlanCatalog<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Looks up a plan that is visible and accepting investments.
    ///
    /// # Errors
    /// `PlanNotFound` for unknown or soft-deleted names, `PlanInactive` when
    /// the plan exists but is switched off.
    pub async fn active_plan(&self, name: &str) -> Result<InvestmentPlan, EngineError> {
        let plan = self
            .store
            .plan_by_name(name)
            .await?
            .filter(|p| !p.deleted)
            .ok_or_else(|| EngineError::PlanNotFound(name.to_string()))?;
        if plan.status != PlanStatus::Active {
            return Err(EngineError::PlanInactive(name.to_string()));
        }
        Ok(plan)
    }

    /// Validates an investment amount against a plan's range.
    ///
    /// # Errors
    /// `InvalidAmount` for non-positive amounts, `AmountOutOfRange` outside
    /// `[min_amount, max_amount]`.
    pub fn validate_amount(plan: &InvestmentPlan, amount: Decimal) -> Result<(), EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount(amount));
        }
        if !plan.contains_amount(amount) {
            return Err(EngineError::AmountOutOfRange {
                amount,
                min: plan.min_amount,
                max: plan.max_amount,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use rust_decimal_macros::dec;

    async fn catalog_with(plan: InvestmentPlan) -> PlanCatalog<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.upsert_plan(&plan).await.unwrap();
        PlanCatalog::new(store)
    }

    fn starter() -> InvestmentPlan {
        InvestmentPlan::new("Starter", dec!(100), dec!(1000), dec!(6), 3)
    }

    #[tokio::test]
    async fn test_active_plan_found() {
        let catalog = catalog_with(starter()).await;
        let plan = catalog.active_plan("Starter").await.unwrap();
        assert_eq!(plan.daily_profit_percent, dec!(6));
    }

    #[tokio::test]
    async fn test_unknown_plan_not_found() {
        let catalog = catalog_with(starter()).await;
        let err = catalog.active_plan("Premium").await.unwrap_err();
        assert!(matches!(err, EngineError::PlanNotFound(_)));
    }

    #[tokio::test]
    async fn test_soft_deleted_plan_not_found() {
        let mut plan = starter();
        plan.deleted = true;
        let catalog = catalog_with(plan).await;
        let err = catalog.active_plan("Starter").await.unwrap_err();
        assert!(matches!(err, EngineError::PlanNotFound(_)));
    }

    #[tokio::test]
    async fn test_inactive_plan_rejected() {
        let mut plan = starter();
        plan.status = PlanStatus::Inactive;
        let catalog = catalog_with(plan).await;
        let err = catalog.active_plan("Starter").await.unwrap_err();
        assert!(matches!(err, EngineError::PlanInactive(_)));
    }

    #[test]
    fn test_validate_amount_range() {
        let plan = starter();
        assert!(PlanCatalog::<MemoryStore>::validate_amount(&plan, dec!(100)).is_ok());
        assert!(PlanCatalog::<MemoryStore>::validate_amount(&plan, dec!(1000)).is_ok());

        let err = PlanCatalog::<MemoryStore>::validate_amount(&plan, dec!(50)).unwrap_err();
        assert!(matches!(err, EngineError::AmountOutOfRange { .. }));

        let err = PlanCatalog::<MemoryStore>::validate_amount(&plan, dec!(0)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
    }
}
