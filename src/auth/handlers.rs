use actix_web::{HttpResponse, web};
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::{
    auth::auth::AuthUser,
    error::AppError,
    model::user::LoginRecord,
    models::{AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest, TokenInfo, UserSummary},
    service::{AppState, credentials::Registration},
};

fn issue_for(state: &AppState, record: &LoginRecord) -> Result<AuthResponse, AppError> {
    debug!(user_id = record.user.id, "Issuing token");
    let token = state.tokens.issue(&record.user, record.hierarchy_level)?;
    Ok(AuthResponse {
        token,
        user: UserSummary::from(&record.user),
    })
}

/// Login endpoint
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = AuthResponse),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many failed attempts")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(state, body), fields(email = %body.email))]
pub async fn login(
    body: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::validation("Email and password are required"));
    }

    let record = state.credentials.verify(&body.email, &body.password).await?;
    let response = issue_for(&state, &record)?;

    info!(user_id = record.user.id, "Login successful");
    Ok(HttpResponse::Ok().json(response))
}

/// Registration endpoint; logs the new user in.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered and authenticated", body = AuthResponse),
        (status = 400, description = "Invalid input or unknown role"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip(state, body), fields(email = %body.email))]
pub async fn register(
    body: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let (email, password) = (body.email.clone(), body.password.clone());

    state
        .credentials
        .register(Registration {
            name: body.name,
            email: body.email,
            password: body.password,
            role_id: body.role_id,
            manager_id: body.manager_id,
        })
        .await?;

    let record = state.credentials.verify(&email, &password).await?;
    let response = issue_for(&state, &record)?;
    Ok(HttpResponse::Created().json(response))
}

#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = Object, example = json!({
            "message": "Password changed successfully"
        })),
        (status = 400, description = "New password too short"),
        (status = 401, description = "Current password is incorrect")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
#[instrument(name = "auth_change_password", skip(state, auth, body), fields(user_id = auth.user_id))]
pub async fn change_password(
    auth: AuthUser,
    body: web::Json<ChangePasswordRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state
        .credentials
        .change_password(auth.user_id, &body.current_password, &body.new_password)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Password changed successfully"
    })))
}

#[utoipa::path(
    get,
    path = "/api/auth/profile",
    responses(
        (status = 200, description = "Current user profile", body = UserProfile),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn profile(auth: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let profile = state.credentials.profile(auth.user_id).await?;
    Ok(HttpResponse::Ok().json(profile))
}

#[utoipa::path(
    get,
    path = "/api/auth/validate",
    responses(
        (status = 200, description = "Token is valid", body = TokenInfo),
        (status = 401, description = "Invalid or expired token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn validate(auth: AuthUser) -> HttpResponse {
    HttpResponse::Ok().json(TokenInfo {
        user_id: auth.user_id,
        email: auth.email,
    })
}

/// Tokens are stateless; logout only acknowledges.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 204, description = "Logged out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(auth: AuthUser) -> HttpResponse {
    info!(user_id = auth.user_id, "Logout acknowledged");
    HttpResponse::NoContent().finish()
}
