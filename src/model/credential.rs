use chrono::{DateTime, Utc};
use strum_macros::{AsRefStr, Display, EnumString};

/// Stored password material. Never serialized outward.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Credential {
    pub user_id: u64,
    pub password_hash: String,
    pub salt: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LoginOutcome {
    Success,
    Failure,
}

#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub user_id: u64,
    pub attempted_at: DateTime<Utc>,
    pub outcome: LoginOutcome,
}
