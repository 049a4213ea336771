use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::model::leave_request::LeaveRequest;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Accepted,
    Rejected,
    Revoked,
}

impl ApprovalStatus {
    /// Initial decision an approver may record.
    pub fn check_initial(self) -> AppResult<()> {
        match self {
            ApprovalStatus::Accepted | ApprovalStatus::Rejected => Ok(()),
            ApprovalStatus::Revoked => Err(AppError::validation(
                "A decision must start as ACCEPTED or REJECTED",
            )),
        }
    }

    /// ACCEPTED only moves to REVOKED; REVOKED is final; REJECTED may be
    /// re-decided but never revoked.
    pub fn check_transition(self, next: ApprovalStatus) -> AppResult<()> {
        use ApprovalStatus::*;
        match (self, next) {
            (Accepted, Revoked) => Ok(()),
            (Accepted, _) => Err(AppError::conflict(
                "An accepted approval can only be revoked",
            )),
            (Revoked, _) => Err(AppError::conflict("A revoked approval cannot change")),
            (Rejected, Revoked) => Err(AppError::conflict(
                "Only accepted approvals can be revoked",
            )),
            (Rejected, _) => Ok(()),
        }
    }
}

/// Outcome of a request, projected from its approvals on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Revoked,
}

/// REJECTED > ACCEPTED-without-revoke > REVOKED > PENDING.
pub fn derive_status<'a, I>(statuses: I) -> RequestStatus
where
    I: IntoIterator<Item = &'a ApprovalStatus>,
{
    let (mut accepted, mut rejected, mut revoked) = (false, false, false);
    for status in statuses {
        match status {
            ApprovalStatus::Accepted => accepted = true,
            ApprovalStatus::Rejected => rejected = true,
            ApprovalStatus::Revoked => revoked = true,
        }
    }

    if rejected {
        RequestStatus::Rejected
    } else if accepted && !revoked {
        RequestStatus::Approved
    } else if revoked {
        RequestStatus::Revoked
    } else {
        RequestStatus::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Approval {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 10)]
    pub request_id: u64,
    #[schema(example = 2)]
    pub approver_id: u64,
    pub status: ApprovalStatus,
    pub comment: Option<String>,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub decided_at: DateTime<Utc>,
}

/// One change to the decision set of a request.
#[derive(Debug, Clone)]
pub enum Decision {
    Create {
        approver_id: u64,
        status: ApprovalStatus,
        comment: Option<String>,
    },
    Update {
        id: u64,
        approver_id: u64,
        status: ApprovalStatus,
        comment: Option<String>,
    },
    Delete {
        id: u64,
        approver_id: u64,
    },
}

/// Effect of a validated decision on its request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionPlan {
    pub before: RequestStatus,
    pub after: RequestStatus,
    /// Signed (holidays, permits) movement on the requester's balance, set
    /// only when the derived status enters or leaves APPROVED.
    pub balance_delta: Option<(f64, f64)>,
}

fn owned_by(approvals: &[Approval], id: u64, approver_id: u64) -> AppResult<&Approval> {
    let approval = approvals
        .iter()
        .find(|a| a.id == id)
        .ok_or_else(|| AppError::not_found("Approval not found"))?;
    if approval.approver_id != approver_id {
        return Err(AppError::forbidden(
            "Only the original approver can change this decision",
        ));
    }
    Ok(approval)
}

impl Decision {
    /// Validates the decision against the request's current approvals.
    ///
    /// Callers must hold whatever lock keeps `approvals` current until the
    /// plan is written.
    pub fn plan(&self, request: &LeaveRequest, approvals: &[Approval]) -> AppResult<DecisionPlan> {
        let before = derive_status(approvals.iter().map(|a| &a.status));
        let after = match self {
            Decision::Create {
                approver_id,
                status,
                ..
            } => {
                status.check_initial()?;
                if request.user_id == *approver_id {
                    return Err(AppError::forbidden("You cannot decide on your own request"));
                }
                if approvals.iter().any(|a| a.approver_id == *approver_id) {
                    return Err(AppError::conflict(
                        "Approver already decided on this request",
                    ));
                }
                derive_status(approvals.iter().map(|a| &a.status).chain([status]))
            }
            Decision::Update {
                id,
                approver_id,
                status,
                ..
            } => {
                owned_by(approvals, *id, *approver_id)?
                    .status
                    .check_transition(*status)?;
                derive_status(
                    approvals
                        .iter()
                        .map(|a| if a.id == *id { status } else { &a.status }),
                )
            }
            Decision::Delete { id, approver_id } => {
                if owned_by(approvals, *id, *approver_id)?.status == ApprovalStatus::Accepted {
                    return Err(AppError::conflict(
                        "Accepted approvals must be revoked, not deleted",
                    ));
                }
                derive_status(approvals.iter().filter(|a| a.id != *id).map(|a| &a.status))
            }
        };

        let (holidays, permits) = request
            .request_type
            .deduction(request.working_days() as f64);
        let balance_delta = match (before, after) {
            (b, RequestStatus::Approved) if b != RequestStatus::Approved => {
                Some((holidays, permits))
            }
            (RequestStatus::Approved, a) if a != RequestStatus::Approved => {
                Some((-holidays, -permits))
            }
            _ => None,
        };

        Ok(DecisionPlan {
            before,
            after,
            balance_delta,
        })
    }
}

/// Aggregate counts across all decisions. Rates are percentages of `total`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ApprovalStatistics {
    pub total: i64,
    pub accepted: i64,
    pub rejected: i64,
    pub revoked: i64,
    pub acceptance_rate: f64,
    pub rejection_rate: f64,
    pub revocation_rate: f64,
}

impl ApprovalStatistics {
    pub fn from_counts(accepted: i64, rejected: i64, revoked: i64) -> Self {
        let total = accepted + rejected + revoked;
        let rate = |n: i64| {
            if total == 0 {
                0.0
            } else {
                n as f64 * 100.0 / total as f64
            }
        };

        ApprovalStatistics {
            total,
            accepted,
            rejected,
            revoked,
            acceptance_rate: rate(accepted),
            rejection_rate: rate(rejected),
            revocation_rate: rate(revoked),
        }
    }
}

/// Per-request view of its decisions and the derived outcome.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RequestApprovalSummary {
    pub request_id: u64,
    pub total_approvals: usize,
    pub accepted_count: usize,
    pub rejected_count: usize,
    pub revoked_count: usize,
    pub has_accepted: bool,
    pub has_rejected: bool,
    pub has_revoked: bool,
    pub final_status: RequestStatus,
    pub approvals: Vec<Approval>,
}

impl RequestApprovalSummary {
    pub fn new(request_id: u64, approvals: Vec<Approval>) -> Self {
        let count = |status: ApprovalStatus| approvals.iter().filter(|a| a.status == status).count();
        let accepted_count = count(ApprovalStatus::Accepted);
        let rejected_count = count(ApprovalStatus::Rejected);
        let revoked_count = count(ApprovalStatus::Revoked);

        RequestApprovalSummary {
            request_id,
            total_approvals: approvals.len(),
            accepted_count,
            rejected_count,
            revoked_count,
            has_accepted: accepted_count > 0,
            has_rejected: rejected_count > 0,
            has_revoked: revoked_count > 0,
            final_status: derive_status(approvals.iter().map(|a| &a.status)),
            approvals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ApprovalStatus::*;

    #[test]
    fn derived_status_precedence() {
        assert_eq!(derive_status(&[]), RequestStatus::Pending);
        assert_eq!(derive_status(&[Accepted]), RequestStatus::Approved);
        assert_eq!(derive_status(&[Accepted, Rejected]), RequestStatus::Rejected);
        assert_eq!(derive_status(&[Revoked, Rejected]), RequestStatus::Rejected);
        assert_eq!(derive_status(&[Accepted, Revoked]), RequestStatus::Revoked);
        assert_eq!(derive_status(&[Revoked]), RequestStatus::Revoked);
        assert_eq!(derive_status(&[Accepted, Accepted]), RequestStatus::Approved);
    }

    #[test]
    fn only_empty_sets_are_pending() {
        for set in [vec![Accepted], vec![Rejected], vec![Revoked], vec![Accepted, Revoked]] {
            assert_ne!(derive_status(&set), RequestStatus::Pending);
        }
    }

    #[test]
    fn accepted_is_terminal_except_revoke() {
        assert!(Accepted.check_transition(Revoked).is_ok());
        assert!(matches!(Accepted.check_transition(Rejected), Err(AppError::Conflict(_))));
        assert!(matches!(Accepted.check_transition(Accepted), Err(AppError::Conflict(_))));
    }

    #[test]
    fn revoke_requires_accepted() {
        assert!(matches!(Revoked.check_transition(Revoked), Err(AppError::Conflict(_))));
        assert!(matches!(Rejected.check_transition(Revoked), Err(AppError::Conflict(_))));
        assert!(Rejected.check_transition(Accepted).is_ok());
    }

    #[test]
    fn decisions_cannot_start_revoked() {
        assert!(Accepted.check_initial().is_ok());
        assert!(Rejected.check_initial().is_ok());
        assert!(matches!(Revoked.check_initial(), Err(AppError::Validation(_))));
    }

    #[test]
    fn statistics_rates_are_percentages() {
        let stats = ApprovalStatistics::from_counts(3, 1, 0);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.acceptance_rate, 75.0);
        assert_eq!(stats.rejection_rate, 25.0);
        assert_eq!(stats.revocation_rate, 0.0);
        assert_eq!(ApprovalStatistics::from_counts(0, 0, 0).acceptance_rate, 0.0);
    }

    fn three_day_holiday() -> LeaveRequest {
        let start = chrono::NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        LeaveRequest {
            id: 9,
            user_id: 1,
            start_date: start,
            end_date: start + chrono::Duration::days(2),
            request_type: crate::model::leave_request::RequestType::Holiday,
            notes: None,
            created_at: chrono::Utc::now(),
        }
    }

    fn decided(id: u64, approver_id: u64, status: ApprovalStatus) -> Approval {
        Approval {
            id,
            request_id: 9,
            approver_id,
            status,
            comment: None,
            decided_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn plan_moves_balance_only_across_approved() {
        let request = three_day_holiday();
        let accept = |approver_id| Decision::Create {
            approver_id,
            status: Accepted,
            comment: None,
        };

        let first = accept(2).plan(&request, &[]).unwrap();
        assert_eq!(first.after, RequestStatus::Approved);
        assert_eq!(first.balance_delta, Some((-3.0, 0.0)));

        // a second acceptance leaves the request APPROVED and moves nothing
        let second = accept(3).plan(&request, &[decided(20, 2, Accepted)]).unwrap();
        assert_eq!(second.balance_delta, None);

        let revoke = Decision::Update {
            id: 20,
            approver_id: 2,
            status: Revoked,
            comment: None,
        };
        let plan = revoke.plan(&request, &[decided(20, 2, Accepted)]).unwrap();
        assert_eq!(plan.after, RequestStatus::Revoked);
        assert_eq!(plan.balance_delta, Some((3.0, 0.0)));
    }

    #[test]
    fn plan_rejects_invalid_decisions() {
        let request = three_day_holiday();
        let existing = [decided(20, 2, Accepted), decided(21, 3, Rejected)];

        let own = Decision::Create { approver_id: 1, status: Accepted, comment: None };
        assert!(matches!(own.plan(&request, &[]), Err(AppError::Forbidden(_))));

        let again = Decision::Create { approver_id: 2, status: Rejected, comment: None };
        assert!(matches!(again.plan(&request, &existing), Err(AppError::Conflict(_))));

        let foreign = Decision::Update { id: 20, approver_id: 3, status: Revoked, comment: None };
        assert!(matches!(foreign.plan(&request, &existing), Err(AppError::Forbidden(_))));

        let missing = Decision::Delete { id: 99, approver_id: 2 };
        assert!(matches!(missing.plan(&request, &existing), Err(AppError::NotFound(_))));

        let accepted = Decision::Delete { id: 20, approver_id: 2 };
        assert!(matches!(accepted.plan(&request, &existing), Err(AppError::Conflict(_))));

        let rejected = Decision::Delete { id: 21, approver_id: 3 };
        let plan = rejected.plan(&request, &existing).unwrap();
        assert_eq!((plan.before, plan.after), (RequestStatus::Rejected, RequestStatus::Approved));
        assert_eq!(plan.balance_delta, Some((-3.0, 0.0)));
    }

    #[test]
    fn summary_counts_and_flags() {
        let approval = |id, status| Approval {
            id,
            request_id: 9,
            approver_id: id,
            status,
            comment: None,
            decided_at: chrono::Utc::now(),
        };
        let summary = RequestApprovalSummary::new(9, vec![approval(1, Accepted), approval(2, Revoked)]);
        assert_eq!(summary.total_approvals, 2);
        assert_eq!(summary.accepted_count, 1);
        assert!(summary.has_revoked && !summary.has_rejected);
        assert_eq!(summary.final_status, RequestStatus::Revoked);
    }
}
