//! MySQL backend.
//!
//! Sessions are opened SERIALIZABLE with a bounded lock wait (see `db.rs`).
//! Multi-statement operations lock the owning row with `SELECT ... FOR UPDATE`
//! before re-checking their invariant, so concurrent writers queue up instead
//! of racing.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, MySql, MySqlPool, Transaction};
use std::str::FromStr;
use tracing::debug;

use super::{
    ApprovalRepository, AttendanceRepository, LeaveBalanceRepository, LoginAttemptRepository,
    Page, RequestRepository, RoleRepository, UserRepository,
};
use crate::error::{AppError, AppResult};
use crate::model::{
    approval::{Approval, ApprovalStatus, Decision},
    attendance::{ActionType, AttendanceEvent, Location, NewAttendanceEvent},
    credential::{Credential, LoginOutcome},
    leave_balance::{LeaveBalance, checked_adjust, settle_from},
    leave_request::{LeaveRequest, NewLeaveRequest, RequestType},
    role::Role,
    user::{LoginRecord, NewUser, User, UserProfile},
};

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Locks the user row for the rest of the transaction.
    async fn lock_user(tx: &mut Transaction<'_, MySql>, user_id: u64) -> AppResult<()> {
        let locked: Option<(u64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ? FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?;
        locked
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    /// Locks the request row; decisions and edits on one request serialize here.
    async fn lock_request(tx: &mut Transaction<'_, MySql>, id: u64) -> AppResult<LeaveRequest> {
        sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM requests WHERE id = ? FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::not_found("Request not found"))?
        .try_into()
    }

    async fn approvals_in(
        tx: &mut Transaction<'_, MySql>,
        request_id: u64,
    ) -> AppResult<Vec<Approval>> {
        let rows = sqlx::query_as::<_, ApprovalRow>(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM approvals WHERE request_id = ? ORDER BY decided_at, id"
        ))
        .bind(request_id)
        .fetch_all(&mut **tx)
        .await?;
        convert_all(rows)
    }

    async fn lock_counters(
        tx: &mut Transaction<'_, MySql>,
        user_id: u64,
    ) -> AppResult<Option<(f64, f64)>> {
        let current = sqlx::query_as(
            r#"
            SELECT accumulated_holidays, accumulated_permits
            FROM leave_balances
            WHERE user_id = ?
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(current)
    }

    /// Writes counters read by `lock_counters`; `existed` picks UPDATE or INSERT.
    async fn write_counters(
        tx: &mut Transaction<'_, MySql>,
        user_id: u64,
        existed: bool,
        (holidays, permits): (f64, f64),
    ) -> AppResult<()> {
        let sql = if existed {
            r#"
            UPDATE leave_balances
            SET accumulated_holidays = ?, accumulated_permits = ?, modified_at = ?
            WHERE user_id = ?
            "#
        } else {
            r#"
            INSERT INTO leave_balances (accumulated_holidays, accumulated_permits, modified_at, user_id)
            VALUES (?, ?, ?, ?)
            "#
        };
        sqlx::query(sql)
            .bind(holidays)
            .bind(permits)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

fn parse_column<T: FromStr>(column: &str, value: &str) -> AppResult<T> {
    value
        .parse()
        .map_err(|_| AppError::internal(format!("unexpected {column} value '{value}'")))
}

#[derive(FromRow)]
struct LoginRow {
    id: u64,
    name: String,
    email: String,
    role_id: Option<u64>,
    manager_id: Option<u64>,
    created_at: DateTime<Utc>,
    hierarchy_level: Option<i32>,
    password_hash: String,
    salt: String,
}

#[derive(FromRow)]
struct RequestRow {
    id: u64,
    user_id: u64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    request_type: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for LeaveRequest {
    type Error = AppError;

    fn try_from(row: RequestRow) -> AppResult<Self> {
        Ok(LeaveRequest {
            id: row.id,
            user_id: row.user_id,
            start_date: row.start_date,
            end_date: row.end_date,
            request_type: parse_column::<RequestType>("request_type", &row.request_type)?,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct ApprovalRow {
    id: u64,
    request_id: u64,
    approver_id: u64,
    status: String,
    comment: Option<String>,
    decided_at: DateTime<Utc>,
}

impl TryFrom<ApprovalRow> for Approval {
    type Error = AppError;

    fn try_from(row: ApprovalRow) -> AppResult<Self> {
        Ok(Approval {
            id: row.id,
            request_id: row.request_id,
            approver_id: row.approver_id,
            status: parse_column::<ApprovalStatus>("status", &row.status)?,
            comment: row.comment,
            decided_at: row.decided_at,
        })
    }
}

#[derive(FromRow)]
struct EventRow {
    id: u64,
    user_id: u64,
    occurred_at: DateTime<Utc>,
    action_type: String,
    location: String,
    geolocation: Option<String>,
}

impl TryFrom<EventRow> for AttendanceEvent {
    type Error = AppError;

    fn try_from(row: EventRow) -> AppResult<Self> {
        Ok(AttendanceEvent {
            id: row.id,
            user_id: row.user_id,
            occurred_at: row.occurred_at,
            action_type: parse_column::<ActionType>("action_type", &row.action_type)?,
            location: parse_column::<Location>("location", &row.location)?,
            geolocation: row.geolocation,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

const REQUEST_COLUMNS: &str =
    "id, user_id, start_date, end_date, request_type, notes, created_at";
const APPROVAL_COLUMNS: &str = "id, request_id, approver_id, status, comment, decided_at";
const EVENT_COLUMNS: &str = "id, user_id, occurred_at, action_type, location, geolocation";

#[async_trait]
impl UserRepository for MySqlStore {
    async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn user_exists(&self, user_id: u64) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn find_login_record(&self, email: &str) -> AppResult<Option<LoginRecord>> {
        let row = sqlx::query_as::<_, LoginRow>(
            r#"
            SELECT u.id, u.name, u.email, u.role_id, u.manager_id, u.created_at,
                   r.hierarchy_level, c.password_hash, c.salt
            FROM users u
            JOIN credentials c ON c.user_id = u.id
            LEFT JOIN roles r ON r.id = u.role_id
            WHERE u.email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| LoginRecord {
            user: User {
                id: r.id,
                name: r.name,
                email: r.email,
                role_id: r.role_id,
                manager_id: r.manager_id,
                created_at: r.created_at,
            },
            hierarchy_level: r.hierarchy_level,
            password_hash: r.password_hash,
            salt: r.salt,
        }))
    }

    async fn create_user_with_credential(
        &self,
        user: NewUser,
        password_hash: &str,
        salt: &str,
    ) -> AppResult<User> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            r#"
            INSERT INTO users (name, email, role_id, manager_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role_id)
        .bind(user.manager_id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_id();

        sqlx::query(
            r#"
            INSERT INTO credentials (user_id, password_hash, salt, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .bind(salt)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let created = sqlx::query_as::<_, User>(
            "SELECT id, name, email, role_id, manager_id, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn find_credential(&self, user_id: u64) -> AppResult<Option<Credential>> {
        let credential = sqlx::query_as::<_, Credential>(
            r#"
            SELECT user_id, password_hash, salt, created_at, modified_at
            FROM credentials
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(credential)
    }

    async fn update_credential(
        &self,
        user_id: u64,
        password_hash: &str,
        salt: &str,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE credentials
            SET password_hash = ?, salt = ?, modified_at = ?
            WHERE user_id = ?
            "#,
        )
        .bind(password_hash)
        .bind(salt)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Credential not found"));
        }
        Ok(())
    }

    async fn find_profile(&self, user_id: u64) -> AppResult<Option<UserProfile>> {
        let profile = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT u.id, u.name, u.email, u.role_id, u.manager_id,
                   r.name AS role_name, r.hierarchy_level
            FROM users u
            LEFT JOIN roles r ON r.id = u.role_id
            WHERE u.id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }
}

#[async_trait]
impl LoginAttemptRepository for MySqlStore {
    async fn record_attempt(&self, user_id: u64, outcome: LoginOutcome) -> AppResult<()> {
        sqlx::query("INSERT INTO login_attempts (user_id, attempted_at, outcome) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(Utc::now())
            .bind(outcome.as_ref())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_failures_since(&self, user_id: u64, since: DateTime<Utc>) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM login_attempts
            WHERE user_id = ? AND outcome = ? AND attempted_at > ?
            "#,
        )
        .bind(user_id)
        .bind(LoginOutcome::Failure.as_ref())
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[async_trait]
impl RoleRepository for MySqlStore {
    async fn insert_role(&self, name: &str, hierarchy_level: i32) -> AppResult<Role> {
        let id = sqlx::query("INSERT INTO roles (name, hierarchy_level) VALUES (?, ?)")
            .bind(name)
            .bind(hierarchy_level)
            .execute(&self.pool)
            .await?
            .last_insert_id();

        Ok(Role {
            id,
            name: name.to_string(),
            hierarchy_level,
        })
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            "SELECT id, name, hierarchy_level FROM roles ORDER BY hierarchy_level",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    async fn find_role(&self, id: u64) -> AppResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>("SELECT id, name, hierarchy_level FROM roles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    async fn find_role_by_level(&self, hierarchy_level: i32) -> AppResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, name, hierarchy_level FROM roles WHERE hierarchy_level = ?",
        )
        .bind(hierarchy_level)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    async fn update_role(&self, role: &Role) -> AppResult<Role> {
        sqlx::query("UPDATE roles SET name = ?, hierarchy_level = ? WHERE id = ?")
            .bind(&role.name)
            .bind(role.hierarchy_level)
            .bind(role.id)
            .execute(&self.pool)
            .await?;

        self.find_role(role.id)
            .await?
            .ok_or_else(|| AppError::not_found("Role not found"))
    }

    async fn delete_role(&self, id: u64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Role not found"));
        }
        Ok(())
    }

    async fn role_is_assigned(&self, id: u64) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }
}

const BALANCE_SELECT: &str = r#"
    SELECT user_id, accumulated_holidays, accumulated_permits, modified_at
    FROM leave_balances
    WHERE user_id = ?
"#;

#[async_trait]
impl LeaveBalanceRepository for MySqlStore {
    async fn find_balance(&self, user_id: u64) -> AppResult<Option<LeaveBalance>> {
        let balance = sqlx::query_as::<_, LeaveBalance>(BALANCE_SELECT)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(balance)
    }

    async fn insert_balance_if_absent(
        &self,
        user_id: u64,
        holidays: f64,
        permits: f64,
    ) -> AppResult<LeaveBalance> {
        sqlx::query(
            r#"
            INSERT INTO leave_balances (user_id, accumulated_holidays, accumulated_permits, modified_at)
            VALUES (?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE user_id = user_id
            "#,
        )
        .bind(user_id)
        .bind(holidays)
        .bind(permits)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let balance = sqlx::query_as::<_, LeaveBalance>(BALANCE_SELECT)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(balance)
    }

    async fn adjust_balance(
        &self,
        user_id: u64,
        holidays_delta: f64,
        permits_delta: f64,
    ) -> AppResult<LeaveBalance> {
        let mut tx = self.pool.begin().await?;

        let current = Self::lock_counters(&mut tx, user_id).await?;
        // an Err here drops the transaction, which rolls it back
        let next = checked_adjust(current, holidays_delta, permits_delta)?;
        Self::write_counters(&mut tx, user_id, current.is_some(), next).await?;

        let balance = sqlx::query_as::<_, LeaveBalance>(BALANCE_SELECT)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(balance)
    }
}

async fn overlap_count(
    tx: &mut Transaction<'_, MySql>,
    user_id: u64,
    start: NaiveDate,
    end: NaiveDate,
    exclude_id: Option<u64>,
) -> AppResult<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM requests
        WHERE user_id = ? AND start_date <= ? AND end_date >= ?
          AND (? IS NULL OR id <> ?)
        "#,
    )
    .bind(user_id)
    .bind(end)
    .bind(start)
    .bind(exclude_id)
    .bind(exclude_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(count)
}

#[async_trait]
impl RequestRepository for MySqlStore {
    async fn insert_request(&self, request: NewLeaveRequest) -> AppResult<LeaveRequest> {
        let mut tx = self.pool.begin().await?;
        Self::lock_user(&mut tx, request.user_id).await?;

        if overlap_count(&mut tx, request.user_id, request.start_date, request.end_date, None)
            .await?
            > 0
        {
            return Err(AppError::conflict("A request already exists for this period"));
        }

        let id = sqlx::query(
            r#"
            INSERT INTO requests (user_id, start_date, end_date, request_type, notes, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(request.user_id)
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(request.request_type.as_ref())
        .bind(&request.notes)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?
        .last_insert_id();

        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM requests WHERE id = ?"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn find_request(&self, id: u64) -> AppResult<Option<LeaveRequest>> {
        sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM requests WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(LeaveRequest::try_from)
        .transpose()
    }

    async fn list_requests(&self, page: Page) -> AppResult<Vec<LeaveRequest>> {
        let rows = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM requests ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn list_requests_by_user(
        &self,
        user_id: u64,
        page: Page,
    ) -> AppResult<Vec<LeaveRequest>> {
        let rows = sqlx::query_as::<_, RequestRow>(&format!(
            r#"
            SELECT {REQUEST_COLUMNS} FROM requests
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn list_requests_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<LeaveRequest>> {
        let rows = sqlx::query_as::<_, RequestRow>(&format!(
            r#"
            SELECT {REQUEST_COLUMNS} FROM requests
            WHERE start_date <= ? AND end_date >= ?
            ORDER BY start_date, id
            "#
        ))
        .bind(end)
        .bind(start)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn list_unapproved_requests(&self) -> AppResult<Vec<LeaveRequest>> {
        let rows = sqlx::query_as::<_, RequestRow>(
            r#"
            SELECT r.id, r.user_id, r.start_date, r.end_date, r.request_type, r.notes, r.created_at
            FROM requests r
            WHERE NOT EXISTS (SELECT 1 FROM approvals a WHERE a.request_id = r.id)
            ORDER BY r.created_at, r.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn has_overlap(
        &self,
        user_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        exclude_id: Option<u64>,
    ) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;
        let count = overlap_count(&mut tx, user_id, start, end, exclude_id).await?;
        tx.commit().await?;
        Ok(count > 0)
    }

    async fn update_request(&self, request: &LeaveRequest) -> AppResult<LeaveRequest> {
        let mut tx = self.pool.begin().await?;
        // lock order everywhere: user, request, balance
        Self::lock_user(&mut tx, request.user_id).await?;
        Self::lock_request(&mut tx, request.id).await?;

        if !Self::approvals_in(&mut tx, request.id).await?.is_empty() {
            return Err(AppError::conflict(
                "Cannot modify a request that already has approvals",
            ));
        }

        if overlap_count(
            &mut tx,
            request.user_id,
            request.start_date,
            request.end_date,
            Some(request.id),
        )
        .await?
            > 0
        {
            return Err(AppError::conflict(
                "New dates overlap with another existing request",
            ));
        }

        sqlx::query(
            r#"
            UPDATE requests
            SET start_date = ?, end_date = ?, request_type = ?, notes = ?
            WHERE id = ?
            "#,
        )
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(request.request_type.as_ref())
        .bind(&request.notes)
        .bind(request.id)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM requests WHERE id = ?"
        ))
        .bind(request.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Request not found"))?;

        tx.commit().await?;
        row.try_into()
    }

    async fn delete_request_cascade(&self, id: u64) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::lock_request(&mut tx, id).await?;

        if Self::approvals_in(&mut tx, id)
            .await?
            .iter()
            .any(|a| a.status == ApprovalStatus::Accepted)
        {
            return Err(AppError::conflict(
                "Cannot delete a request with an accepted approval",
            ));
        }

        sqlx::query("DELETE FROM approvals WHERE request_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM requests WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ApprovalRepository for MySqlStore {
    async fn decide(&self, request_id: u64, decision: Decision) -> AppResult<Option<Approval>> {
        let mut tx = self.pool.begin().await?;
        let request = Self::lock_request(&mut tx, request_id).await?;
        let approvals = Self::approvals_in(&mut tx, request_id).await?;
        let plan = decision.plan(&request, &approvals)?;
        debug!(request_id, from = %plan.before, to = %plan.after, "Decision planned");

        // request row, then balance row
        if let Some(delta) = plan.balance_delta {
            let current = Self::lock_counters(&mut tx, request.user_id).await?;
            let next = settle_from(current, delta)?;
            Self::write_counters(&mut tx, request.user_id, current.is_some(), next).await?;
        }

        let written = match decision {
            Decision::Create {
                approver_id,
                status,
                comment,
            } => sqlx::query(
                r#"
                INSERT INTO approvals (request_id, approver_id, status, comment, decided_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(request_id)
            .bind(approver_id)
            .bind(status.as_ref())
            .bind(comment)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(|e| match AppError::from(e) {
                AppError::Conflict(_) => {
                    AppError::conflict("Approver already decided on this request")
                }
                other => other,
            })?
            .last_insert_id(),
            Decision::Update {
                id,
                status,
                comment,
                ..
            } => {
                sqlx::query(
                    "UPDATE approvals SET status = ?, comment = ?, decided_at = ? WHERE id = ?",
                )
                .bind(status.as_ref())
                .bind(comment)
                .bind(Utc::now())
                .bind(id)
                .execute(&mut *tx)
                .await?;
                id
            }
            Decision::Delete { id, .. } => {
                sqlx::query("DELETE FROM approvals WHERE id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                return Ok(None);
            }
        };

        let row = sqlx::query_as::<_, ApprovalRow>(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM approvals WHERE id = ?"
        ))
        .bind(written)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Some(Approval::try_from(row)).transpose()
    }

    async fn find_approval(&self, id: u64) -> AppResult<Option<Approval>> {
        sqlx::query_as::<_, ApprovalRow>(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM approvals WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Approval::try_from)
        .transpose()
    }

    async fn list_approvals(&self, page: Page) -> AppResult<Vec<Approval>> {
        let rows = sqlx::query_as::<_, ApprovalRow>(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM approvals ORDER BY decided_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn list_approvals_by_request(&self, request_id: u64) -> AppResult<Vec<Approval>> {
        let rows = sqlx::query_as::<_, ApprovalRow>(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM approvals WHERE request_id = ? ORDER BY decided_at, id"
        ))
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn list_approvals_by_approver(
        &self,
        approver_id: u64,
        page: Page,
    ) -> AppResult<Vec<Approval>> {
        let rows = sqlx::query_as::<_, ApprovalRow>(&format!(
            r#"
            SELECT {APPROVAL_COLUMNS} FROM approvals
            WHERE approver_id = ?
            ORDER BY decided_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(approver_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn list_approvals_by_status(
        &self,
        status: ApprovalStatus,
        page: Page,
    ) -> AppResult<Vec<Approval>> {
        let rows = sqlx::query_as::<_, ApprovalRow>(&format!(
            r#"
            SELECT {APPROVAL_COLUMNS} FROM approvals
            WHERE status = ?
            ORDER BY decided_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(status.as_ref())
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn count_approvals_by_status(&self, status: ApprovalStatus) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM approvals WHERE status = ?")
            .bind(status.as_ref())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl AttendanceRepository for MySqlStore {
    async fn append_event(&self, event: NewAttendanceEvent) -> AppResult<AttendanceEvent> {
        let mut tx = self.pool.begin().await?;
        Self::lock_user(&mut tx, event.user_id).await?;

        let last: Option<String> = sqlx::query_scalar(
            r#"
            SELECT action_type FROM attendance_events
            WHERE user_id = ?
            ORDER BY occurred_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(event.user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let last = last
            .map(|value| parse_column::<ActionType>("action_type", &value))
            .transpose()?;
        event.action_type.check_follows(last)?;

        let id = sqlx::query(
            r#"
            INSERT INTO attendance_events (user_id, occurred_at, action_type, location, geolocation)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.user_id)
        .bind(event.occurred_at)
        .bind(event.action_type.as_ref())
        .bind(event.location.as_ref())
        .bind(&event.geolocation)
        .execute(&mut *tx)
        .await?
        .last_insert_id();

        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM attendance_events WHERE id = ?"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn last_event(&self, user_id: u64) -> AppResult<Option<AttendanceEvent>> {
        sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS} FROM attendance_events
            WHERE user_id = ?
            ORDER BY occurred_at DESC, id DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(AttendanceEvent::try_from)
        .transpose()
    }

    async fn list_events_by_user(
        &self,
        user_id: u64,
        page: Page,
    ) -> AppResult<Vec<AttendanceEvent>> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS} FROM attendance_events
            WHERE user_id = ?
            ORDER BY occurred_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn list_events_by_user_on(
        &self,
        user_id: u64,
        date: NaiveDate,
    ) -> AppResult<Vec<AttendanceEvent>> {
        let day_start = date.and_time(NaiveTime::MIN).and_utc();
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS} FROM attendance_events
            WHERE user_id = ? AND occurred_at >= ? AND occurred_at < ?
            ORDER BY occurred_at, id
            "#
        ))
        .bind(user_id)
        .bind(day_start)
        .bind(day_start + Duration::days(1))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn list_events(&self, page: Page) -> AppResult<Vec<AttendanceEvent>> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS} FROM attendance_events
            ORDER BY occurred_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn delete_event(&self, id: u64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM attendance_events WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Attendance event not found"));
        }
        Ok(())
    }
}
