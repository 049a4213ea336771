use std::sync::Arc;

use tracing::info;

use crate::{
    error::{AppError, AppResult},
    model::approval::{
        Approval, ApprovalStatistics, ApprovalStatus, Decision, RequestApprovalSummary,
    },
    store::{Page, Store},
};

pub const DEFAULT_REVOKE_COMMENT: &str = "Approval revoked";

/// Decisions and the balance movement they cause are applied by the store in
/// one unit, see `ApprovalRepository::decide`.
#[derive(Clone)]
pub struct ApprovalService {
    store: Arc<dyn Store>,
}

impl ApprovalService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn decided(&self, request_id: u64, decision: Decision) -> AppResult<Approval> {
        self.store
            .decide(request_id, decision)
            .await?
            .ok_or_else(|| AppError::internal("decision wrote no approval"))
    }

    pub async fn create(
        &self,
        approver_id: u64,
        request_id: u64,
        status: ApprovalStatus,
        comment: Option<String>,
    ) -> AppResult<Approval> {
        let approval = self
            .decided(
                request_id,
                Decision::Create {
                    approver_id,
                    status,
                    comment,
                },
            )
            .await?;
        info!(approval_id = approval.id, request_id, approver_id, status = %status, "Approval created");
        Ok(approval)
    }

    pub async fn update_status(
        &self,
        id: u64,
        approver_id: u64,
        status: ApprovalStatus,
        comment: Option<String>,
    ) -> AppResult<Approval> {
        let current = self.get(id).await?;
        let approval = self
            .decided(
                current.request_id,
                Decision::Update {
                    id,
                    approver_id,
                    status,
                    comment,
                },
            )
            .await?;
        info!(approval_id = id, from = %current.status, to = %status, "Approval updated");
        Ok(approval)
    }

    pub async fn revoke(
        &self,
        id: u64,
        approver_id: u64,
        reason: Option<String>,
    ) -> AppResult<Approval> {
        let comment = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REVOKE_COMMENT.to_string());

        self.update_status(id, approver_id, ApprovalStatus::Revoked, Some(comment))
            .await
    }

    pub async fn delete(&self, id: u64, approver_id: u64) -> AppResult<()> {
        let current = self.get(id).await?;
        self.store
            .decide(current.request_id, Decision::Delete { id, approver_id })
            .await?;
        info!(approval_id = id, "Approval deleted");
        Ok(())
    }

    pub async fn get(&self, id: u64) -> AppResult<Approval> {
        self.store
            .find_approval(id)
            .await?
            .ok_or_else(|| AppError::not_found("Approval not found"))
    }

    pub async fn by_request(&self, request_id: u64) -> AppResult<Vec<Approval>> {
        self.store
            .find_request(request_id)
            .await?
            .ok_or_else(|| AppError::not_found("Request not found"))?;
        self.store.list_approvals_by_request(request_id).await
    }

    pub async fn by_approver(&self, approver_id: u64, page: Page) -> AppResult<Vec<Approval>> {
        self.store.list_approvals_by_approver(approver_id, page).await
    }

    pub async fn by_status(&self, status: ApprovalStatus, page: Page) -> AppResult<Vec<Approval>> {
        self.store.list_approvals_by_status(status, page).await
    }

    pub async fn all(&self, page: Page) -> AppResult<Vec<Approval>> {
        self.store.list_approvals(page).await
    }

    pub async fn statistics(&self) -> AppResult<ApprovalStatistics> {
        let accepted = self
            .store
            .count_approvals_by_status(ApprovalStatus::Accepted)
            .await?;
        let rejected = self
            .store
            .count_approvals_by_status(ApprovalStatus::Rejected)
            .await?;
        let revoked = self
            .store
            .count_approvals_by_status(ApprovalStatus::Revoked)
            .await?;
        Ok(ApprovalStatistics::from_counts(accepted, rejected, revoked))
    }

    pub async fn request_summary(&self, request_id: u64) -> AppResult<RequestApprovalSummary> {
        let approvals = self.by_request(request_id).await?;
        Ok(RequestApprovalSummary::new(request_id, approvals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{
            approval::RequestStatus,
            leave_balance::STANDARD_HOLIDAYS,
            leave_request::{LeaveRequest, RequestDraft},
        },
        service::{AppState, testing},
    };
    use chrono::Duration;

    struct Fixture {
        state: AppState,
        employee: u64,
        manager: u64,
        other_manager: u64,
        request: LeaveRequest,
    }

    /// Employee with a 3-working-day HOLIDAY request and two managers.
    async fn fixture() -> Fixture {
        let state = testing::state().await;
        let employee = testing::register(&state, "emp@x.io", 2).await.id;
        let manager = testing::register(&state, "boss@x.io", 1).await.id;
        let other_manager = testing::register(&state, "boss2@x.io", 1).await.id;

        let start = testing::next_monday();
        let request = state
            .requests
            .create(
                employee,
                RequestDraft {
                    start_date: start,
                    end_date: start + Duration::days(2),
                    request_type: "HOLIDAY".into(),
                    notes: None,
                },
            )
            .await
            .unwrap();

        Fixture {
            state,
            employee,
            manager,
            other_manager,
            request,
        }
    }

    async fn holidays(f: &Fixture) -> f64 {
        f.state
            .ledger
            .get(f.employee)
            .await
            .unwrap()
            .unwrap()
            .accumulated_holidays
    }

    #[actix_web::test]
    async fn self_approval_is_forbidden() {
        let f = fixture().await;
        let err = f
            .state
            .approvals
            .create(f.employee, f.request.id, ApprovalStatus::Accepted, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[actix_web::test]
    async fn one_decision_per_approver() {
        let f = fixture().await;
        let approvals = &f.state.approvals;
        approvals
            .create(f.manager, f.request.id, ApprovalStatus::Rejected, None)
            .await
            .unwrap();
        assert!(matches!(
            approvals
                .create(f.manager, f.request.id, ApprovalStatus::Accepted, None)
                .await,
            Err(AppError::Conflict(_))
        ));
    }

    #[actix_web::test]
    async fn cannot_start_revoked_or_target_missing_request() {
        let f = fixture().await;
        assert!(matches!(
            f.state
                .approvals
                .create(f.manager, f.request.id, ApprovalStatus::Revoked, None)
                .await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            f.state
                .approvals
                .create(f.manager, 9999, ApprovalStatus::Accepted, None)
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[actix_web::test]
    async fn accept_deducts_and_revoke_restores() {
        let f = fixture().await;
        let approvals = &f.state.approvals;

        let accepted = approvals
            .create(f.manager, f.request.id, ApprovalStatus::Accepted, None)
            .await
            .unwrap();
        assert_eq!(holidays(&f).await, STANDARD_HOLIDAYS - 3.0);

        let revoked = approvals.revoke(accepted.id, f.manager, None).await.unwrap();
        assert_eq!(revoked.status, ApprovalStatus::Revoked);
        assert_eq!(revoked.comment.as_deref(), Some(DEFAULT_REVOKE_COMMENT));
        assert_eq!(holidays(&f).await, STANDARD_HOLIDAYS);
    }

    #[actix_web::test]
    async fn revoke_twice_conflicts() {
        let f = fixture().await;
        let approvals = &f.state.approvals;
        let accepted = approvals
            .create(f.manager, f.request.id, ApprovalStatus::Accepted, None)
            .await
            .unwrap();

        approvals
            .revoke(accepted.id, f.manager, Some("changed plans".into()))
            .await
            .unwrap();
        assert!(matches!(
            approvals.revoke(accepted.id, f.manager, None).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[actix_web::test]
    async fn accepted_cannot_be_rejected_directly() {
        let f = fixture().await;
        let approvals = &f.state.approvals;
        let accepted = approvals
            .create(f.manager, f.request.id, ApprovalStatus::Accepted, None)
            .await
            .unwrap();

        assert!(matches!(
            approvals
                .update_status(accepted.id, f.manager, ApprovalStatus::Rejected, None)
                .await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            approvals
                .update_status(accepted.id, f.other_manager, ApprovalStatus::Revoked, None)
                .await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[actix_web::test]
    async fn rejection_by_second_approver_restores_balance() {
        let f = fixture().await;
        let approvals = &f.state.approvals;
        approvals
            .create(f.manager, f.request.id, ApprovalStatus::Accepted, None)
            .await
            .unwrap();
        assert_eq!(holidays(&f).await, STANDARD_HOLIDAYS - 3.0);

        let rejected = approvals
            .create(f.other_manager, f.request.id, ApprovalStatus::Rejected, None)
            .await
            .unwrap();
        assert_eq!(holidays(&f).await, STANDARD_HOLIDAYS);

        // dropping the rejection puts the request back to APPROVED
        approvals.delete(rejected.id, f.other_manager).await.unwrap();
        assert_eq!(holidays(&f).await, STANDARD_HOLIDAYS - 3.0);
    }

    #[actix_web::test]
    async fn insufficient_balance_blocks_acceptance() {
        let f = fixture().await;
        f.state
            .ledger
            .adjust(f.employee, -(STANDARD_HOLIDAYS - 1.0), 0.0)
            .await
            .unwrap();

        let err = f
            .state
            .approvals
            .create(f.manager, f.request.id, ApprovalStatus::Accepted, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientBalance(_)));
        assert!(f.state.approvals.by_request(f.request.id).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn accepted_cannot_be_deleted() {
        let f = fixture().await;
        let approvals = &f.state.approvals;
        let accepted = approvals
            .create(f.manager, f.request.id, ApprovalStatus::Accepted, None)
            .await
            .unwrap();
        assert!(matches!(
            approvals.delete(accepted.id, f.manager).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_acceptances_deduct_once() {
        let f = fixture().await;
        let mut managers = Vec::new();
        for i in 0..8 {
            let email = format!("lead{i}@x.io");
            managers.push(testing::register(&f.state, &email, 1).await.id);
        }

        let attempts = managers.into_iter().map(|manager| {
            let approvals = f.state.approvals.clone();
            let request_id = f.request.id;
            tokio::spawn(async move {
                approvals
                    .create(manager, request_id, ApprovalStatus::Accepted, None)
                    .await
            })
        });
        let results = futures::future::join_all(attempts).await;

        assert!(results.iter().all(|r| matches!(r, Ok(Ok(_)))));
        assert_eq!(holidays(&f).await, STANDARD_HOLIDAYS - 3.0);
        let summary = f.state.approvals.request_summary(f.request.id).await.unwrap();
        assert_eq!(summary.accepted_count, 8);
        assert_eq!(summary.final_status, RequestStatus::Approved);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_accept_and_reject_settle_to_final_status() {
        let f = fixture().await;
        let accept = {
            let approvals = f.state.approvals.clone();
            let (manager, request_id) = (f.manager, f.request.id);
            tokio::spawn(async move {
                approvals
                    .create(manager, request_id, ApprovalStatus::Accepted, None)
                    .await
            })
        };
        let reject = {
            let approvals = f.state.approvals.clone();
            let (manager, request_id) = (f.other_manager, f.request.id);
            tokio::spawn(async move {
                approvals
                    .create(manager, request_id, ApprovalStatus::Rejected, None)
                    .await
            })
        };
        accept.await.unwrap().unwrap();
        reject.await.unwrap().unwrap();

        // whichever order ran, a REJECTED request holds no deduction
        let summary = f.state.approvals.request_summary(f.request.id).await.unwrap();
        assert_eq!(summary.final_status, RequestStatus::Rejected);
        assert_eq!(holidays(&f).await, STANDARD_HOLIDAYS);
    }

    #[actix_web::test]
    async fn statistics_and_summary() {
        let f = fixture().await;
        let approvals = &f.state.approvals;
        approvals
            .create(f.manager, f.request.id, ApprovalStatus::Accepted, None)
            .await
            .unwrap();
        approvals
            .create(f.other_manager, f.request.id, ApprovalStatus::Rejected, None)
            .await
            .unwrap();

        let stats = approvals.statistics().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.acceptance_rate, 50.0);

        let summary = approvals.request_summary(f.request.id).await.unwrap();
        assert_eq!(summary.final_status, RequestStatus::Rejected);
        assert!(summary.has_accepted && summary.has_rejected);

        let mine = approvals.by_approver(f.manager, Page::default()).await.unwrap();
        assert_eq!(mine.len(), 1);
        let rejected = approvals
            .by_status(ApprovalStatus::Rejected, Page::default())
            .await
            .unwrap();
        assert_eq!(rejected[0].approver_id, f.other_manager);
    }
}
