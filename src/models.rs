use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::model::{
    approval::ApprovalStatus,
    attendance::{ActionType, Location},
    user::User,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    /// email
    pub sub: String,
    pub role_id: Option<u64>,
    pub hierarchy_level: Option<i32>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub jti: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "mario@example.com")]
    pub email: String,
    #[schema(example = "pw12345")]
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "Mario Rossi")]
    pub name: String,
    #[schema(example = "mario@example.com")]
    pub email: String,
    #[schema(example = "pw12345")]
    pub password: String,
    #[schema(example = 3)]
    pub role_id: Option<u64>,
    pub manager_id: Option<u64>,
}

#[derive(Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: u64,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        UserSummary {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenInfo {
    pub user_id: u64,
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ApprovalDecision {
    #[schema(example = 10)]
    pub request_id: u64,
    pub status: ApprovalStatus,
    pub comment: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct StatusUpdate {
    pub status: ApprovalStatus,
    pub comment: Option<String>,
}

#[derive(Deserialize, Default, ToSchema)]
pub struct RevokeRequest {
    pub reason: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct AttendanceInput {
    pub action_type: ActionType,
    pub location: Location,
    #[schema(example = "45.4642,9.1900")]
    pub geolocation: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct DateRangeQuery {
    /// Inclusive range start (YYYY-MM-DD)
    #[param(value_type = String, format = Date)]
    pub start_date: NaiveDate,
    /// Inclusive range end (YYYY-MM-DD)
    #[param(value_type = String, format = Date)]
    pub end_date: NaiveDate,
}

#[derive(Deserialize, IntoParams)]
pub struct StatusQuery {
    pub status: ApprovalStatus,
}

#[derive(Deserialize, ToSchema)]
pub struct EntitlementRequest {
    #[schema(example = 22.0)]
    pub holidays: f64,
    #[schema(example = 4.0)]
    pub permits: f64,
}
