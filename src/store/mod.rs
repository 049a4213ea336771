//! Persistence capability.
//!
//! Services only see `Arc<dyn Store>`; the MySQL backend is used in
//! production and the in-memory backend for local runs and tests. Every
//! method that spans more than one statement is atomic in both backends.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::AppResult;
use crate::model::{
    approval::{Approval, ApprovalStatus, Decision},
    attendance::{AttendanceEvent, NewAttendanceEvent},
    credential::{Credential, LoginOutcome},
    leave_balance::LeaveBalance,
    leave_request::{LeaveRequest, NewLeaveRequest},
    role::Role,
    user::{LoginRecord, NewUser, User, UserProfile},
};

pub mod memory;
pub mod mysql;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// Pagination query parameters (1-based page).
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    /// Items per page (max 100)
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub fn from_query(query: PageQuery) -> Self {
        let per_page = match query.per_page {
            Some(n) if n > 0 && n <= MAX_PER_PAGE => n,
            _ => DEFAULT_PER_PAGE,
        };
        let page = query.page.unwrap_or(1).max(1);
        Page {
            limit: per_page,
            offset: (page - 1).saturating_mul(per_page),
        }
    }

    pub fn page_number(&self) -> u32 {
        self.offset / self.limit.max(1) + 1
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::from_query(PageQuery::default())
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn email_exists(&self, email: &str) -> AppResult<bool>;

    async fn user_exists(&self, user_id: u64) -> AppResult<bool>;

    async fn find_login_record(&self, email: &str) -> AppResult<Option<LoginRecord>>;

    /// Inserts user and credential together; neither row survives a failure.
    async fn create_user_with_credential(
        &self,
        user: NewUser,
        password_hash: &str,
        salt: &str,
    ) -> AppResult<User>;

    async fn find_credential(&self, user_id: u64) -> AppResult<Option<Credential>>;

    /// NotFound when the user has no credential row.
    async fn update_credential(&self, user_id: u64, password_hash: &str, salt: &str)
    -> AppResult<()>;

    async fn find_profile(&self, user_id: u64) -> AppResult<Option<UserProfile>>;
}

#[async_trait]
pub trait LoginAttemptRepository: Send + Sync {
    async fn record_attempt(&self, user_id: u64, outcome: LoginOutcome) -> AppResult<()>;

    async fn count_failures_since(&self, user_id: u64, since: DateTime<Utc>) -> AppResult<i64>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn insert_role(&self, name: &str, hierarchy_level: i32) -> AppResult<Role>;

    async fn list_roles(&self) -> AppResult<Vec<Role>>;

    async fn find_role(&self, id: u64) -> AppResult<Option<Role>>;

    async fn find_role_by_level(&self, hierarchy_level: i32) -> AppResult<Option<Role>>;

    async fn update_role(&self, role: &Role) -> AppResult<Role>;

    async fn delete_role(&self, id: u64) -> AppResult<()>;

    async fn role_is_assigned(&self, id: u64) -> AppResult<bool>;
}

#[async_trait]
pub trait LeaveBalanceRepository: Send + Sync {
    async fn find_balance(&self, user_id: u64) -> AppResult<Option<LeaveBalance>>;

    /// Seeds the row unless one exists; returns whichever row is stored.
    async fn insert_balance_if_absent(
        &self,
        user_id: u64,
        holidays: f64,
        permits: f64,
    ) -> AppResult<LeaveBalance>;

    /// Read-lock-compute-write under an exclusive row lock. The floor check
    /// runs inside the lock; a rejected adjustment leaves the row untouched.
    async fn adjust_balance(
        &self,
        user_id: u64,
        holidays_delta: f64,
        permits_delta: f64,
    ) -> AppResult<LeaveBalance>;
}

#[async_trait]
pub trait RequestRepository: Send + Sync {
    /// Conflict if the owner already has an overlapping request.
    async fn insert_request(&self, request: NewLeaveRequest) -> AppResult<LeaveRequest>;

    async fn find_request(&self, id: u64) -> AppResult<Option<LeaveRequest>>;

    async fn list_requests(&self, page: Page) -> AppResult<Vec<LeaveRequest>>;

    async fn list_requests_by_user(&self, user_id: u64, page: Page)
    -> AppResult<Vec<LeaveRequest>>;

    /// Requests whose interval intersects `[start, end]`.
    async fn list_requests_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<LeaveRequest>>;

    /// Requests with no approval records.
    async fn list_unapproved_requests(&self) -> AppResult<Vec<LeaveRequest>>;

    async fn has_overlap(
        &self,
        user_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        exclude_id: Option<u64>,
    ) -> AppResult<bool>;

    /// Holds the request lock while checking that no approval exists and
    /// that the new interval does not overlap another request of the owner.
    async fn update_request(&self, request: &LeaveRequest) -> AppResult<LeaveRequest>;

    /// Deletes the request and its approvals in one unit. Conflict if an
    /// ACCEPTED approval is present when the request lock is taken.
    async fn delete_request_cascade(&self, id: u64) -> AppResult<()>;
}

#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    /// Applies one decision as a unit: locks the request, validates the
    /// decision against the approvals read under that lock, moves the
    /// requester's balance when the derived status crosses APPROVED and
    /// writes the approval. Returns the written approval, `None` after a
    /// delete.
    async fn decide(&self, request_id: u64, decision: Decision) -> AppResult<Option<Approval>>;

    async fn find_approval(&self, id: u64) -> AppResult<Option<Approval>>;

    async fn list_approvals(&self, page: Page) -> AppResult<Vec<Approval>>;

    async fn list_approvals_by_request(&self, request_id: u64) -> AppResult<Vec<Approval>>;

    async fn list_approvals_by_approver(
        &self,
        approver_id: u64,
        page: Page,
    ) -> AppResult<Vec<Approval>>;

    async fn list_approvals_by_status(
        &self,
        status: ApprovalStatus,
        page: Page,
    ) -> AppResult<Vec<Approval>>;

    async fn count_approvals_by_status(&self, status: ApprovalStatus) -> AppResult<i64>;
}

#[async_trait]
pub trait AttendanceRepository: Send + Sync {
    /// Appends the event after re-checking the alternation against the
    /// user's latest event under lock.
    async fn append_event(&self, event: NewAttendanceEvent) -> AppResult<AttendanceEvent>;

    async fn last_event(&self, user_id: u64) -> AppResult<Option<AttendanceEvent>>;

    async fn list_events_by_user(&self, user_id: u64, page: Page)
    -> AppResult<Vec<AttendanceEvent>>;

    async fn list_events_by_user_on(
        &self,
        user_id: u64,
        date: NaiveDate,
    ) -> AppResult<Vec<AttendanceEvent>>;

    async fn list_events(&self, page: Page) -> AppResult<Vec<AttendanceEvent>>;

    async fn delete_event(&self, id: u64) -> AppResult<()>;
}

pub trait Store:
    UserRepository
    + LoginAttemptRepository
    + RoleRepository
    + LeaveBalanceRepository
    + RequestRepository
    + ApprovalRepository
    + AttendanceRepository
{
}

impl<T> Store for T where
    T: UserRepository
        + LoginAttemptRepository
        + RoleRepository
        + LeaveBalanceRepository
        + RequestRepository
        + ApprovalRepository
        + AttendanceRepository
{
}
