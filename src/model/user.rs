use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role_id: Option<u64>,
    pub manager_id: Option<u64>,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

/// Fields accepted at registration, already normalized.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role_id: Option<u64>,
    pub manager_id: Option<u64>,
}

/// User joined with its credential and role level, as needed by login.
#[derive(Debug, Clone)]
pub struct LoginRecord {
    pub user: User,
    pub hierarchy_level: Option<i32>,
    pub password_hash: String,
    pub salt: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct UserProfile {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role_id: Option<u64>,
    pub manager_id: Option<u64>,
    pub role_name: Option<String>,
    pub hierarchy_level: Option<i32>,
}

/// Lowercased, trimmed form used for storage and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
