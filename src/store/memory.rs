//! In-process backend. A single mutex guards all tables, so every method is
//! trivially atomic; no lock is held across an await point.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use tracing::debug;

use super::{
    ApprovalRepository, AttendanceRepository, LeaveBalanceRepository, LoginAttemptRepository,
    Page, RequestRepository, RoleRepository, UserRepository,
};
use crate::error::{AppError, AppResult};
use crate::model::{
    approval::{Approval, ApprovalStatus, Decision},
    attendance::{AttendanceEvent, NewAttendanceEvent},
    credential::{Credential, LoginAttempt, LoginOutcome},
    leave_balance::{LeaveBalance, checked_adjust, settle_from},
    leave_request::{LeaveRequest, NewLeaveRequest},
    role::Role,
    user::{LoginRecord, NewUser, User, UserProfile},
};

#[derive(Default)]
struct Tables {
    next_id: u64,
    users: BTreeMap<u64, User>,
    credentials: BTreeMap<u64, Credential>,
    login_attempts: Vec<LoginAttempt>,
    roles: BTreeMap<u64, Role>,
    balances: BTreeMap<u64, LeaveBalance>,
    requests: BTreeMap<u64, LeaveRequest>,
    approvals: BTreeMap<u64, Approval>,
    events: BTreeMap<u64, AttendanceEvent>,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn overlaps(&self, user_id: u64, start: NaiveDate, end: NaiveDate, exclude: Option<u64>) -> bool {
        self.requests.values().any(|r| {
            r.user_id == user_id && Some(r.id) != exclude && r.overlaps(start, end)
        })
    }

    fn counters(&self, user_id: u64) -> Option<(f64, f64)> {
        self.balances
            .get(&user_id)
            .map(|b| (b.accumulated_holidays, b.accumulated_permits))
    }

    fn put_balance(&mut self, user_id: u64, (holidays, permits): (f64, f64)) -> LeaveBalance {
        let balance = LeaveBalance {
            user_id,
            accumulated_holidays: holidays,
            accumulated_permits: permits,
            modified_at: Utc::now(),
        };
        self.balances.insert(user_id, balance.clone());
        balance
    }

    fn approvals_of(&self, request_id: u64) -> Vec<Approval> {
        let mut found: Vec<Approval> = self
            .approvals
            .values()
            .filter(|a| a.request_id == request_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| (a.decided_at, a.id));
        found
    }

    fn last_event(&self, user_id: u64) -> Option<&AttendanceEvent> {
        self.events
            .values()
            .filter(|e| e.user_id == user_id)
            .max_by_key(|e| (e.occurred_at, e.id))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T: Clone>(items: Vec<T>, page: Page) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect()
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let t = self.tables.lock();
        Ok(t.users.values().any(|u| u.email == email))
    }

    async fn user_exists(&self, user_id: u64) -> AppResult<bool> {
        Ok(self.tables.lock().users.contains_key(&user_id))
    }

    async fn find_login_record(&self, email: &str) -> AppResult<Option<LoginRecord>> {
        let t = self.tables.lock();
        let Some(user) = t.users.values().find(|u| u.email == email) else {
            return Ok(None);
        };
        let Some(credential) = t.credentials.get(&user.id) else {
            return Ok(None);
        };
        let hierarchy_level = user
            .role_id
            .and_then(|id| t.roles.get(&id))
            .map(|r| r.hierarchy_level);

        Ok(Some(LoginRecord {
            user: user.clone(),
            hierarchy_level,
            password_hash: credential.password_hash.clone(),
            salt: credential.salt.clone(),
        }))
    }

    async fn create_user_with_credential(
        &self,
        user: NewUser,
        password_hash: &str,
        salt: &str,
    ) -> AppResult<User> {
        let mut t = self.tables.lock();
        if t.users.values().any(|u| u.email == user.email) {
            return Err(AppError::conflict("Email already registered"));
        }
        if let Some(role_id) = user.role_id {
            if !t.roles.contains_key(&role_id) {
                return Err(AppError::validation("Referenced resource does not exist"));
            }
        }
        if let Some(manager_id) = user.manager_id {
            if !t.users.contains_key(&manager_id) {
                return Err(AppError::validation("Referenced resource does not exist"));
            }
        }

        let id = t.next_id();
        let now = Utc::now();
        let created = User {
            id,
            name: user.name,
            email: user.email,
            role_id: user.role_id,
            manager_id: user.manager_id,
            created_at: now,
        };
        t.users.insert(id, created.clone());
        t.credentials.insert(
            id,
            Credential {
                user_id: id,
                password_hash: password_hash.to_string(),
                salt: salt.to_string(),
                created_at: now,
                modified_at: now,
            },
        );
        Ok(created)
    }

    async fn find_credential(&self, user_id: u64) -> AppResult<Option<Credential>> {
        Ok(self.tables.lock().credentials.get(&user_id).cloned())
    }

    async fn update_credential(
        &self,
        user_id: u64,
        password_hash: &str,
        salt: &str,
    ) -> AppResult<()> {
        let mut t = self.tables.lock();
        let credential = t
            .credentials
            .get_mut(&user_id)
            .ok_or_else(|| AppError::not_found("Credential not found"))?;
        credential.password_hash = password_hash.to_string();
        credential.salt = salt.to_string();
        credential.modified_at = Utc::now();
        Ok(())
    }

    async fn find_profile(&self, user_id: u64) -> AppResult<Option<UserProfile>> {
        let t = self.tables.lock();
        Ok(t.users.get(&user_id).map(|u| {
            let role = u.role_id.and_then(|id| t.roles.get(&id));
            UserProfile {
                id: u.id,
                name: u.name.clone(),
                email: u.email.clone(),
                role_id: u.role_id,
                manager_id: u.manager_id,
                role_name: role.map(|r| r.name.clone()),
                hierarchy_level: role.map(|r| r.hierarchy_level),
            }
        }))
    }
}

#[async_trait]
impl LoginAttemptRepository for MemoryStore {
    async fn record_attempt(&self, user_id: u64, outcome: LoginOutcome) -> AppResult<()> {
        self.tables.lock().login_attempts.push(LoginAttempt {
            user_id,
            attempted_at: Utc::now(),
            outcome,
        });
        Ok(())
    }

    async fn count_failures_since(&self, user_id: u64, since: DateTime<Utc>) -> AppResult<i64> {
        let t = self.tables.lock();
        Ok(t.login_attempts
            .iter()
            .filter(|a| {
                a.user_id == user_id && a.outcome == LoginOutcome::Failure && a.attempted_at > since
            })
            .count() as i64)
    }
}

#[async_trait]
impl RoleRepository for MemoryStore {
    async fn insert_role(&self, name: &str, hierarchy_level: i32) -> AppResult<Role> {
        let mut t = self.tables.lock();
        if t.roles.values().any(|r| r.hierarchy_level == hierarchy_level) {
            return Err(AppError::conflict("Hierarchy level already exists"));
        }
        let id = t.next_id();
        let role = Role {
            id,
            name: name.to_string(),
            hierarchy_level,
        };
        t.roles.insert(id, role.clone());
        Ok(role)
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let mut roles: Vec<Role> = self.tables.lock().roles.values().cloned().collect();
        roles.sort_by_key(|r| r.hierarchy_level);
        Ok(roles)
    }

    async fn find_role(&self, id: u64) -> AppResult<Option<Role>> {
        Ok(self.tables.lock().roles.get(&id).cloned())
    }

    async fn find_role_by_level(&self, hierarchy_level: i32) -> AppResult<Option<Role>> {
        let t = self.tables.lock();
        Ok(t.roles
            .values()
            .find(|r| r.hierarchy_level == hierarchy_level)
            .cloned())
    }

    async fn update_role(&self, role: &Role) -> AppResult<Role> {
        let mut t = self.tables.lock();
        if t.roles
            .values()
            .any(|r| r.id != role.id && r.hierarchy_level == role.hierarchy_level)
        {
            return Err(AppError::conflict("Hierarchy level already exists"));
        }
        let stored = t
            .roles
            .get_mut(&role.id)
            .ok_or_else(|| AppError::not_found("Role not found"))?;
        *stored = role.clone();
        Ok(role.clone())
    }

    async fn delete_role(&self, id: u64) -> AppResult<()> {
        self.tables
            .lock()
            .roles
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("Role not found"))
    }

    async fn role_is_assigned(&self, id: u64) -> AppResult<bool> {
        let t = self.tables.lock();
        Ok(t.users.values().any(|u| u.role_id == Some(id)))
    }
}

#[async_trait]
impl LeaveBalanceRepository for MemoryStore {
    async fn find_balance(&self, user_id: u64) -> AppResult<Option<LeaveBalance>> {
        Ok(self.tables.lock().balances.get(&user_id).cloned())
    }

    async fn insert_balance_if_absent(
        &self,
        user_id: u64,
        holidays: f64,
        permits: f64,
    ) -> AppResult<LeaveBalance> {
        let mut t = self.tables.lock();
        let balance = t.balances.entry(user_id).or_insert_with(|| LeaveBalance {
            user_id,
            accumulated_holidays: holidays,
            accumulated_permits: permits,
            modified_at: Utc::now(),
        });
        Ok(balance.clone())
    }

    async fn adjust_balance(
        &self,
        user_id: u64,
        holidays_delta: f64,
        permits_delta: f64,
    ) -> AppResult<LeaveBalance> {
        let mut t = self.tables.lock();
        let next = checked_adjust(t.counters(user_id), holidays_delta, permits_delta)?;
        Ok(t.put_balance(user_id, next))
    }
}

#[async_trait]
impl RequestRepository for MemoryStore {
    async fn insert_request(&self, request: NewLeaveRequest) -> AppResult<LeaveRequest> {
        let mut t = self.tables.lock();
        if t.overlaps(request.user_id, request.start_date, request.end_date, None) {
            return Err(AppError::conflict("A request already exists for this period"));
        }
        let id = t.next_id();
        let created = LeaveRequest {
            id,
            user_id: request.user_id,
            start_date: request.start_date,
            end_date: request.end_date,
            request_type: request.request_type,
            notes: request.notes,
            created_at: Utc::now(),
        };
        t.requests.insert(id, created.clone());
        Ok(created)
    }

    async fn find_request(&self, id: u64) -> AppResult<Option<LeaveRequest>> {
        Ok(self.tables.lock().requests.get(&id).cloned())
    }

    async fn list_requests(&self, page: Page) -> AppResult<Vec<LeaveRequest>> {
        let mut all: Vec<LeaveRequest> = self.tables.lock().requests.values().cloned().collect();
        all.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(paginate(all, page))
    }

    async fn list_requests_by_user(
        &self,
        user_id: u64,
        page: Page,
    ) -> AppResult<Vec<LeaveRequest>> {
        let mut own: Vec<LeaveRequest> = self
            .tables
            .lock()
            .requests
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        own.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(paginate(own, page))
    }

    async fn list_requests_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<LeaveRequest>> {
        let mut found: Vec<LeaveRequest> = self
            .tables
            .lock()
            .requests
            .values()
            .filter(|r| r.overlaps(start, end))
            .cloned()
            .collect();
        found.sort_by_key(|r| (r.start_date, r.id));
        Ok(found)
    }

    async fn list_unapproved_requests(&self) -> AppResult<Vec<LeaveRequest>> {
        let t = self.tables.lock();
        let mut pending: Vec<LeaveRequest> = t
            .requests
            .values()
            .filter(|r| !t.approvals.values().any(|a| a.request_id == r.id))
            .cloned()
            .collect();
        pending.sort_by_key(|r| (r.created_at, r.id));
        Ok(pending)
    }

    async fn has_overlap(
        &self,
        user_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        exclude_id: Option<u64>,
    ) -> AppResult<bool> {
        Ok(self.tables.lock().overlaps(user_id, start, end, exclude_id))
    }

    async fn update_request(&self, request: &LeaveRequest) -> AppResult<LeaveRequest> {
        let mut t = self.tables.lock();
        if !t.requests.contains_key(&request.id) {
            return Err(AppError::not_found("Request not found"));
        }
        if t.approvals.values().any(|a| a.request_id == request.id) {
            return Err(AppError::conflict(
                "Cannot modify a request that already has approvals",
            ));
        }
        if t.overlaps(
            request.user_id,
            request.start_date,
            request.end_date,
            Some(request.id),
        ) {
            return Err(AppError::conflict(
                "New dates overlap with another existing request",
            ));
        }
        let stored = t
            .requests
            .get_mut(&request.id)
            .ok_or_else(|| AppError::not_found("Request not found"))?;
        stored.start_date = request.start_date;
        stored.end_date = request.end_date;
        stored.request_type = request.request_type;
        stored.notes = request.notes.clone();
        Ok(stored.clone())
    }

    async fn delete_request_cascade(&self, id: u64) -> AppResult<()> {
        let mut t = self.tables.lock();
        if !t.requests.contains_key(&id) {
            return Err(AppError::not_found("Request not found"));
        }
        if t.approvals
            .values()
            .any(|a| a.request_id == id && a.status == ApprovalStatus::Accepted)
        {
            return Err(AppError::conflict(
                "Cannot delete a request with an accepted approval",
            ));
        }
        t.requests.remove(&id);
        t.approvals.retain(|_, a| a.request_id != id);
        Ok(())
    }
}

#[async_trait]
impl ApprovalRepository for MemoryStore {
    async fn decide(&self, request_id: u64, decision: Decision) -> AppResult<Option<Approval>> {
        let mut t = self.tables.lock();
        let request = t
            .requests
            .get(&request_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Request not found"))?;
        let plan = decision.plan(&request, &t.approvals_of(request_id))?;
        debug!(request_id, from = %plan.before, to = %plan.after, "Decision planned");
        let settled = plan
            .balance_delta
            .map(|delta| settle_from(t.counters(request.user_id), delta))
            .transpose()?;

        let written = match decision {
            Decision::Create {
                approver_id,
                status,
                comment,
            } => {
                let id = t.next_id();
                let created = Approval {
                    id,
                    request_id,
                    approver_id,
                    status,
                    comment,
                    decided_at: Utc::now(),
                };
                t.approvals.insert(id, created.clone());
                Some(created)
            }
            Decision::Update {
                id,
                status,
                comment,
                ..
            } => {
                let approval = t
                    .approvals
                    .get_mut(&id)
                    .ok_or_else(|| AppError::not_found("Approval not found"))?;
                approval.status = status;
                approval.comment = comment;
                approval.decided_at = Utc::now();
                Some(approval.clone())
            }
            Decision::Delete { id, .. } => {
                t.approvals.remove(&id);
                None
            }
        };

        if let Some(counters) = settled {
            t.put_balance(request.user_id, counters);
        }
        Ok(written)
    }

    async fn find_approval(&self, id: u64) -> AppResult<Option<Approval>> {
        Ok(self.tables.lock().approvals.get(&id).cloned())
    }

    async fn list_approvals(&self, page: Page) -> AppResult<Vec<Approval>> {
        let mut all: Vec<Approval> = self.tables.lock().approvals.values().cloned().collect();
        all.sort_by(|a, b| (b.decided_at, b.id).cmp(&(a.decided_at, a.id)));
        Ok(paginate(all, page))
    }

    async fn list_approvals_by_request(&self, request_id: u64) -> AppResult<Vec<Approval>> {
        Ok(self.tables.lock().approvals_of(request_id))
    }

    async fn list_approvals_by_approver(
        &self,
        approver_id: u64,
        page: Page,
    ) -> AppResult<Vec<Approval>> {
        let mut found: Vec<Approval> = self
            .tables
            .lock()
            .approvals
            .values()
            .filter(|a| a.approver_id == approver_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| (b.decided_at, b.id).cmp(&(a.decided_at, a.id)));
        Ok(paginate(found, page))
    }

    async fn list_approvals_by_status(
        &self,
        status: ApprovalStatus,
        page: Page,
    ) -> AppResult<Vec<Approval>> {
        let mut found: Vec<Approval> = self
            .tables
            .lock()
            .approvals
            .values()
            .filter(|a| a.status == status)
            .cloned()
            .collect();
        found.sort_by(|a, b| (b.decided_at, b.id).cmp(&(a.decided_at, a.id)));
        Ok(paginate(found, page))
    }

    async fn count_approvals_by_status(&self, status: ApprovalStatus) -> AppResult<i64> {
        let t = self.tables.lock();
        Ok(t.approvals.values().filter(|a| a.status == status).count() as i64)
    }
}

#[async_trait]
impl AttendanceRepository for MemoryStore {
    async fn append_event(&self, event: NewAttendanceEvent) -> AppResult<AttendanceEvent> {
        let mut t = self.tables.lock();
        let last = t.last_event(event.user_id).map(|e| e.action_type);
        event.action_type.check_follows(last)?;

        let id = t.next_id();
        let created = AttendanceEvent {
            id,
            user_id: event.user_id,
            occurred_at: event.occurred_at,
            action_type: event.action_type,
            location: event.location,
            geolocation: event.geolocation,
        };
        t.events.insert(id, created.clone());
        Ok(created)
    }

    async fn last_event(&self, user_id: u64) -> AppResult<Option<AttendanceEvent>> {
        Ok(self.tables.lock().last_event(user_id).cloned())
    }

    async fn list_events_by_user(
        &self,
        user_id: u64,
        page: Page,
    ) -> AppResult<Vec<AttendanceEvent>> {
        let mut own: Vec<AttendanceEvent> = self
            .tables
            .lock()
            .events
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        own.sort_by(|a, b| (b.occurred_at, b.id).cmp(&(a.occurred_at, a.id)));
        Ok(paginate(own, page))
    }

    async fn list_events_by_user_on(
        &self,
        user_id: u64,
        date: NaiveDate,
    ) -> AppResult<Vec<AttendanceEvent>> {
        let mut day: Vec<AttendanceEvent> = self
            .tables
            .lock()
            .events
            .values()
            .filter(|e| e.user_id == user_id && e.occurred_at.date_naive() == date)
            .cloned()
            .collect();
        day.sort_by_key(|e| (e.occurred_at, e.id));
        Ok(day)
    }

    async fn list_events(&self, page: Page) -> AppResult<Vec<AttendanceEvent>> {
        let mut all: Vec<AttendanceEvent> = self.tables.lock().events.values().cloned().collect();
        all.sort_by(|a, b| (b.occurred_at, b.id).cmp(&(a.occurred_at, a.id)));
        Ok(paginate(all, page))
    }

    async fn delete_event(&self, id: u64) -> AppResult<()> {
        self.tables
            .lock()
            .events
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("Attendance event not found"))
    }
}
