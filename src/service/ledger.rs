use std::sync::Arc;

use tracing::debug;

use crate::{
    error::{AppError, AppResult},
    model::{
        leave_balance::{LeaveBalance, STANDARD_HOLIDAYS, STANDARD_PERMITS},
        leave_request::RequestType,
    },
    store::Store,
};

/// Per-user leave balance. All writes go through the store's locked
/// adjustment, so the zero floor holds under concurrent callers.
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn Store>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get(&self, user_id: u64) -> AppResult<Option<LeaveBalance>> {
        self.store.find_balance(user_id).await
    }

    /// Seeds the standard annual entitlement unless a row already exists.
    pub async fn initialize(&self, user_id: u64) -> AppResult<LeaveBalance> {
        debug!(user_id, "Initializing leave balance");
        self.store
            .insert_balance_if_absent(user_id, STANDARD_HOLIDAYS, STANDARD_PERMITS)
            .await
    }

    pub async fn get_or_initialize(&self, user_id: u64) -> AppResult<LeaveBalance> {
        match self.get(user_id).await? {
            Some(balance) => Ok(balance),
            None => self.initialize(user_id).await,
        }
    }

    pub async fn adjust(
        &self,
        user_id: u64,
        holidays_delta: f64,
        permits_delta: f64,
    ) -> AppResult<LeaveBalance> {
        let balance = self
            .store
            .adjust_balance(user_id, holidays_delta, permits_delta)
            .await?;
        debug!(
            user_id,
            holidays_delta,
            permits_delta,
            holidays = balance.accumulated_holidays,
            permits = balance.accumulated_permits,
            "Leave balance adjusted"
        );
        Ok(balance)
    }

    pub async fn deduct(
        &self,
        user_id: u64,
        request_type: RequestType,
        days: f64,
    ) -> AppResult<LeaveBalance> {
        let (holidays, permits) = request_type.deduction(days);
        self.adjust(user_id, holidays, permits).await
    }

    pub async fn restore(
        &self,
        user_id: u64,
        request_type: RequestType,
        days: f64,
    ) -> AppResult<LeaveBalance> {
        let (holidays, permits) = request_type.deduction(days);
        self.adjust(user_id, -holidays, -permits).await
    }

    /// Credits a yearly allotment on top of whatever is left.
    pub async fn add_annual_entitlement(
        &self,
        user_id: u64,
        holidays: f64,
        permits: f64,
    ) -> AppResult<LeaveBalance> {
        if !holidays.is_finite() || !permits.is_finite() || holidays < 0.0 || permits < 0.0 {
            return Err(AppError::validation(
                "Entitlement amounts must be non-negative numbers",
            ));
        }
        self.adjust(user_id, holidays, permits).await
    }

    /// Days available in the counter matching `request_type`, seeding the
    /// balance first when the user has none.
    pub async fn available(&self, user_id: u64, request_type: RequestType) -> AppResult<f64> {
        let balance = self.get_or_initialize(user_id).await?;
        Ok(match request_type {
            RequestType::Holiday => balance.accumulated_holidays,
            RequestType::Permit => balance.accumulated_permits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn ledger() -> LedgerService {
        LedgerService::new(Arc::new(MemoryStore::new()))
    }

    #[actix_web::test]
    async fn initialize_is_idempotent() {
        let ledger = ledger();
        assert!(ledger.get(1).await.unwrap().is_none());
        let first = ledger.initialize(1).await.unwrap();
        assert_eq!(first.accumulated_holidays, STANDARD_HOLIDAYS);
        ledger.deduct(1, RequestType::Holiday, 2.0).await.unwrap();
        let again = ledger.initialize(1).await.unwrap();
        assert_eq!(again.accumulated_holidays, STANDARD_HOLIDAYS - 2.0);
    }

    #[actix_web::test]
    async fn deduct_and_restore_hit_the_matching_counter() {
        let ledger = ledger();
        ledger.initialize(3).await.unwrap();

        let after = ledger.deduct(3, RequestType::Permit, 1.0).await.unwrap();
        assert_eq!(after.accumulated_permits, 3.0);
        assert_eq!(after.accumulated_holidays, STANDARD_HOLIDAYS);

        let restored = ledger.restore(3, RequestType::Permit, 1.0).await.unwrap();
        assert_eq!(restored.accumulated_permits, STANDARD_PERMITS);
    }

    #[actix_web::test]
    async fn overdraft_is_rejected_and_leaves_balance() {
        let ledger = ledger();
        ledger.initialize(4).await.unwrap();
        let err = ledger.deduct(4, RequestType::Permit, 5.0).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientBalance(_)));
        assert_eq!(
            ledger.get(4).await.unwrap().unwrap().accumulated_permits,
            STANDARD_PERMITS
        );
    }

    #[actix_web::test]
    async fn concurrent_deductions_never_go_negative() {
        let ledger = ledger();
        ledger.initialize(5).await.unwrap();

        let attempts = (0..40).map(|_| {
            let ledger = ledger.clone();
            actix_web::rt::spawn(async move { ledger.deduct(5, RequestType::Holiday, 1.0).await })
        });
        let results = futures::future::join_all(attempts).await;
        let succeeded = results
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();

        assert_eq!(succeeded, STANDARD_HOLIDAYS as usize);
        assert_eq!(ledger.get(5).await.unwrap().unwrap().accumulated_holidays, 0.0);
    }

    #[actix_web::test]
    async fn entitlement_credit_rejects_negative_amounts() {
        let ledger = ledger();
        assert!(matches!(
            ledger.add_annual_entitlement(6, -1.0, 0.0).await,
            Err(AppError::Validation(_))
        ));
        let credited = ledger.add_annual_entitlement(6, 22.0, 4.0).await.unwrap();
        assert_eq!(credited.accumulated_holidays, 22.0);
    }

    #[actix_web::test]
    async fn available_seeds_missing_balance() {
        let ledger = ledger();
        assert_eq!(ledger.available(8, RequestType::Permit).await.unwrap(), STANDARD_PERMITS);
        assert!(ledger.get(8).await.unwrap().is_some());
    }
}
