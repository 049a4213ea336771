use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::info;

use crate::{
    error::{AppError, AppResult},
    model::{
        approval::{ApprovalStatus, derive_status},
        leave_request::{
            LeaveRequest, NewLeaveRequest, RequestDraft, RequestType, RequestWithApprovals,
            working_days,
        },
    },
    service::ledger::LedgerService,
    store::{Page, Store},
};

/// Owns leave and permit requests and their lifecycle rules.
#[derive(Clone)]
pub struct RequestService {
    store: Arc<dyn Store>,
    ledger: LedgerService,
}

fn check_dates(start: NaiveDate, end: NaiveDate) -> AppResult<()> {
    if start > end {
        return Err(AppError::validation("Start date must not be after end date"));
    }
    if start < Utc::now().date_naive() {
        return Err(AppError::validation("Start date cannot be in the past"));
    }
    Ok(())
}

fn parse_type(raw: &str) -> AppResult<RequestType> {
    raw.trim()
        .to_uppercase()
        .parse()
        .map_err(|_| AppError::validation("Request type must be HOLIDAY or PERMIT"))
}

fn clean_notes(notes: Option<String>) -> Option<String> {
    notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

impl RequestService {
    pub fn new(store: Arc<dyn Store>, ledger: LedgerService) -> Self {
        Self { store, ledger }
    }

    /// Validates in a fixed order; the first failing rule is reported.
    pub async fn create(&self, user_id: u64, draft: RequestDraft) -> AppResult<LeaveRequest> {
        check_dates(draft.start_date, draft.end_date)?;
        let request_type = parse_type(&draft.request_type)?;

        let days = working_days(draft.start_date, draft.end_date);
        if days == 0 {
            return Err(AppError::validation(
                "The selected period contains no working days",
            ));
        }
        let max = request_type.max_working_days();
        if days > max {
            return Err(AppError::validation(format!(
                "{request_type} requests cannot exceed {max} working days (requested {days})"
            )));
        }

        if self
            .store
            .has_overlap(user_id, draft.start_date, draft.end_date, None)
            .await?
        {
            return Err(AppError::conflict("A request already exists for this period"));
        }

        let available = self.ledger.available(user_id, request_type).await?;
        if available < days as f64 {
            return Err(AppError::insufficient(format!(
                "Insufficient {} balance: {days} working days requested, {available:.1} available",
                request_type.as_ref().to_lowercase()
            )));
        }

        let request = self
            .store
            .insert_request(NewLeaveRequest {
                user_id,
                start_date: draft.start_date,
                end_date: draft.end_date,
                request_type,
                notes: clean_notes(draft.notes),
            })
            .await?;

        info!(request_id = request.id, user_id, days, request_type = %request_type, "Request created");
        Ok(request)
    }

    async fn load_owned(&self, id: u64, user_id: u64) -> AppResult<LeaveRequest> {
        let request = self.get(id).await?;
        if request.user_id != user_id {
            return Err(AppError::forbidden("You can only modify your own requests"));
        }
        Ok(request)
    }

    /// Only requests nobody has decided on yet can be edited.
    pub async fn update(&self, id: u64, user_id: u64, draft: RequestDraft) -> AppResult<LeaveRequest> {
        let current = self.load_owned(id, user_id).await?;

        // repeated by the store under the request lock
        if !self.store.list_approvals_by_request(id).await?.is_empty() {
            return Err(AppError::conflict(
                "Cannot modify a request that already has approvals",
            ));
        }

        check_dates(draft.start_date, draft.end_date)?;
        let request_type = parse_type(&draft.request_type)?;

        if self
            .store
            .has_overlap(user_id, draft.start_date, draft.end_date, Some(id))
            .await?
        {
            return Err(AppError::conflict(
                "New dates overlap with another existing request",
            ));
        }

        let updated = self
            .store
            .update_request(&LeaveRequest {
                start_date: draft.start_date,
                end_date: draft.end_date,
                request_type,
                notes: clean_notes(draft.notes),
                ..current
            })
            .await?;

        info!(request_id = id, user_id, "Request updated");
        Ok(updated)
    }

    /// Removes the request and its decisions, unless one of them is ACCEPTED.
    pub async fn delete(&self, id: u64, user_id: u64) -> AppResult<()> {
        self.load_owned(id, user_id).await?;

        // repeated by the store under the request lock
        let approvals = self.store.list_approvals_by_request(id).await?;
        if approvals.iter().any(|a| a.status == ApprovalStatus::Accepted) {
            return Err(AppError::conflict(
                "Cannot delete a request with an accepted approval",
            ));
        }

        self.store.delete_request_cascade(id).await?;
        info!(request_id = id, user_id, removed_approvals = approvals.len(), "Request deleted");
        Ok(())
    }

    pub async fn get(&self, id: u64) -> AppResult<LeaveRequest> {
        self.store
            .find_request(id)
            .await?
            .ok_or_else(|| AppError::not_found("Request not found"))
    }

    pub async fn with_approvals(&self, id: u64) -> AppResult<RequestWithApprovals> {
        let request = self.get(id).await?;
        let approvals = self.store.list_approvals_by_request(id).await?;

        Ok(RequestWithApprovals {
            status: derive_status(approvals.iter().map(|a| &a.status)),
            request,
            approvals,
        })
    }

    pub async fn list_all(&self, page: Page) -> AppResult<Vec<LeaveRequest>> {
        self.store.list_requests(page).await
    }

    pub async fn list_own(&self, user_id: u64, page: Page) -> AppResult<Vec<LeaveRequest>> {
        self.store.list_requests_by_user(user_id, page).await
    }

    pub async fn in_range(&self, start: NaiveDate, end: NaiveDate) -> AppResult<Vec<LeaveRequest>> {
        if start > end {
            return Err(AppError::validation("Start date must not be after end date"));
        }
        self.store.list_requests_in_range(start, end).await
    }

    /// Requests without any decision; exactly those whose derived status is
    /// PENDING.
    pub async fn pending(&self) -> AppResult<Vec<LeaveRequest>> {
        self.store.list_unapproved_requests().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{approval::RequestStatus, leave_balance::STANDARD_PERMITS},
        service::{AppState, testing},
    };
    use chrono::Duration;

    fn draft(start: NaiveDate, end: NaiveDate, kind: &str) -> RequestDraft {
        RequestDraft {
            start_date: start,
            end_date: end,
            request_type: kind.into(),
            notes: Some("  family trip ".into()),
        }
    }

    async fn setup() -> (AppState, u64) {
        let state = testing::state().await;
        let user = testing::register(&state, "emp@x.io", 2).await;
        (state, user.id)
    }

    #[actix_web::test]
    async fn three_day_holiday_is_created() {
        let (state, user) = setup().await;
        let monday = testing::next_monday();
        let request = state
            .requests
            .create(user, draft(monday, monday + Duration::days(2), "HOLIDAY"))
            .await
            .unwrap();
        assert_eq!(request.working_days(), 3);
        assert_eq!(request.notes.as_deref(), Some("family trip"));
        // balance is only seeded, not deducted, at creation
        let balance = state.ledger.get(user).await.unwrap().unwrap();
        assert_eq!(balance.accumulated_permits, STANDARD_PERMITS);
    }

    #[actix_web::test]
    async fn validations_fail_in_order() {
        let (state, user) = setup().await;
        let monday = testing::next_monday();
        let yesterday = Utc::now().date_naive() - Duration::days(1);
        let requests = &state.requests;

        let reversed = requests
            .create(user, draft(monday + Duration::days(1), monday, "SICK"))
            .await;
        assert!(matches!(reversed, Err(AppError::Validation(m)) if m.contains("after")));

        let past = requests.create(user, draft(yesterday, monday, "SICK")).await;
        assert!(matches!(past, Err(AppError::Validation(m)) if m.contains("past")));

        let bad_type = requests.create(user, draft(monday, monday, "SICK")).await;
        assert!(matches!(bad_type, Err(AppError::Validation(m)) if m.contains("HOLIDAY")));

        let saturday = monday + Duration::days(5);
        let weekend = requests
            .create(user, draft(saturday, saturday + Duration::days(1), "HOLIDAY"))
            .await;
        assert!(matches!(weekend, Err(AppError::Validation(m)) if m.contains("no working days")));
    }

    #[actix_web::test]
    async fn caps_per_type() {
        let (state, user) = setup().await;
        let monday = testing::next_monday();

        // seven weeks = 35 working days
        let long = state
            .requests
            .create(user, draft(monday, monday + Duration::days(46), "HOLIDAY"))
            .await;
        assert!(matches!(long, Err(AppError::Validation(_))));

        let permit = state
            .requests
            .create(user, draft(monday, monday + Duration::days(7), "permit"))
            .await;
        assert!(matches!(permit, Err(AppError::Validation(_))));
    }

    #[actix_web::test]
    async fn overlapping_requests_conflict() {
        let (state, user) = setup().await;
        let monday = testing::next_monday();
        state
            .requests
            .create(user, draft(monday, monday + Duration::days(2), "HOLIDAY"))
            .await
            .unwrap();

        let overlap = state
            .requests
            .create(user, draft(monday + Duration::days(2), monday + Duration::days(3), "PERMIT"))
            .await;
        assert!(matches!(overlap, Err(AppError::Conflict(_))));

        let adjacent = state
            .requests
            .create(user, draft(monday + Duration::days(3), monday + Duration::days(4), "PERMIT"))
            .await;
        assert!(adjacent.is_ok());
    }

    #[actix_web::test]
    async fn insufficient_balance_rejects_request() {
        let (state, user) = setup().await;
        state.ledger.initialize(user).await.unwrap();
        state.ledger.adjust(user, 0.0, -STANDARD_PERMITS).await.unwrap();

        let monday = testing::next_monday();
        let err = state
            .requests
            .create(user, draft(monday, monday, "PERMIT"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientBalance(_)));
    }

    #[actix_web::test]
    async fn update_rules() {
        let (state, user) = setup().await;
        let other = testing::register(&state, "other@x.io", 2).await.id;
        let manager = testing::register(&state, "boss@x.io", 1).await.id;
        let monday = testing::next_monday();
        let requests = &state.requests;

        let first = requests
            .create(user, draft(monday, monday + Duration::days(1), "HOLIDAY"))
            .await
            .unwrap();
        let second = requests
            .create(user, draft(monday + Duration::days(7), monday + Duration::days(8), "HOLIDAY"))
            .await
            .unwrap();

        assert!(matches!(
            requests
                .update(first.id, other, draft(monday, monday, "HOLIDAY"))
                .await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            requests
                .update(first.id, user, draft(monday, monday + Duration::days(7), "HOLIDAY"))
                .await,
            Err(AppError::Conflict(_))
        ));

        let moved = requests
            .update(first.id, user, draft(monday + Duration::days(2), monday + Duration::days(3), "PERMIT"))
            .await
            .unwrap();
        assert_eq!(moved.request_type, RequestType::Permit);

        state
            .approvals
            .create(manager, second.id, ApprovalStatus::Rejected, None)
            .await
            .unwrap();
        assert!(matches!(
            requests
                .update(second.id, user, draft(monday + Duration::days(9), monday + Duration::days(9), "HOLIDAY"))
                .await,
            Err(AppError::Conflict(_))
        ));
    }

    #[actix_web::test]
    async fn delete_cascades_unless_accepted() {
        let (state, user) = setup().await;
        let manager = testing::register(&state, "boss@x.io", 1).await.id;
        let monday = testing::next_monday();

        let rejected = state
            .requests
            .create(user, draft(monday, monday, "HOLIDAY"))
            .await
            .unwrap();
        state
            .approvals
            .create(manager, rejected.id, ApprovalStatus::Rejected, None)
            .await
            .unwrap();
        state.requests.delete(rejected.id, user).await.unwrap();
        assert!(matches!(state.requests.get(rejected.id).await, Err(AppError::NotFound(_))));

        let accepted = state
            .requests
            .create(user, draft(monday, monday, "HOLIDAY"))
            .await
            .unwrap();
        state
            .approvals
            .create(manager, accepted.id, ApprovalStatus::Accepted, None)
            .await
            .unwrap();
        assert!(matches!(
            state.requests.delete(accepted.id, user).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[actix_web::test]
    async fn pending_and_derived_status_agree() {
        let (state, user) = setup().await;
        let manager = testing::register(&state, "boss@x.io", 1).await.id;
        let monday = testing::next_monday();

        let decided = state
            .requests
            .create(user, draft(monday, monday, "HOLIDAY"))
            .await
            .unwrap();
        let open = state
            .requests
            .create(user, draft(monday + Duration::days(1), monday + Duration::days(1), "HOLIDAY"))
            .await
            .unwrap();
        state
            .approvals
            .create(manager, decided.id, ApprovalStatus::Accepted, None)
            .await
            .unwrap();

        let pending = state.requests.pending().await.unwrap();
        assert_eq!(pending.iter().map(|r| r.id).collect::<Vec<_>>(), vec![open.id]);

        let view = state.requests.with_approvals(open.id).await.unwrap();
        assert_eq!(view.status, RequestStatus::Pending);
        let view = state.requests.with_approvals(decided.id).await.unwrap();
        assert_eq!(view.status, RequestStatus::Approved);
        assert_eq!(view.approvals.len(), 1);
    }

    #[actix_web::test]
    async fn range_listing() {
        let (state, user) = setup().await;
        let monday = testing::next_monday();
        state
            .requests
            .create(user, draft(monday, monday + Duration::days(2), "HOLIDAY"))
            .await
            .unwrap();

        let hit = state
            .requests
            .in_range(monday + Duration::days(2), monday + Duration::days(10))
            .await
            .unwrap();
        assert_eq!(hit.len(), 1);
        let miss = state
            .requests
            .in_range(monday + Duration::days(3), monday + Duration::days(10))
            .await
            .unwrap();
        assert!(miss.is_empty());
        assert!(matches!(
            state.requests.in_range(monday, monday - Duration::days(1)).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn delete_racing_acceptance_leaves_one_outcome() {
        for _ in 0..20 {
            let (state, user) = setup().await;
            let manager = testing::register(&state, "boss@x.io", 1).await.id;
            let monday = testing::next_monday();
            let request = state
                .requests
                .create(user, draft(monday, monday + Duration::days(2), "HOLIDAY"))
                .await
                .unwrap();

            let accept = {
                let approvals = state.approvals.clone();
                let id = request.id;
                tokio::spawn(async move {
                    approvals
                        .create(manager, id, ApprovalStatus::Accepted, None)
                        .await
                })
            };
            let delete = {
                let requests = state.requests.clone();
                let id = request.id;
                tokio::spawn(async move { requests.delete(id, user).await })
            };
            let accepted = accept.await.unwrap();
            let deleted = delete.await.unwrap();

            let holidays = state
                .ledger
                .get(user)
                .await
                .unwrap()
                .unwrap()
                .accumulated_holidays;
            match (accepted, deleted) {
                (Ok(_), Err(AppError::Conflict(_))) => {
                    assert_eq!(holidays, 19.0);
                    assert!(state.requests.get(request.id).await.is_ok());
                }
                (Err(AppError::NotFound(_)), Ok(())) => {
                    assert_eq!(holidays, 22.0);
                    assert!(matches!(
                        state.requests.get(request.id).await,
                        Err(AppError::NotFound(_))
                    ));
                }
                other => panic!("both sides claimed the request: {other:?}"),
            }
        }
    }
}
