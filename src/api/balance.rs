use actix_web::{HttpResponse, web};

use crate::{
    auth::{MANAGER_LEVEL, auth::AuthUser},
    error::AppError,
    models::EntitlementRequest,
    service::AppState,
};

#[utoipa::path(
    get,
    path = "/api/balance/me",
    responses((status = 200, description = "Own leave balance, seeded on first read", body = LeaveBalance)),
    security(("bearer_auth" = [])),
    tag = "Balance"
)]
pub async fn my_balance(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.ledger.get_or_initialize(auth.user_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/balance/{user_id}",
    params(("user_id" = u64, Path, description = "User id")),
    responses(
        (status = 200, description = "Leave balance of the user", body = LeaveBalance),
        (status = 403, description = "Managers only"),
        (status = 404, description = "No balance recorded")
    ),
    security(("bearer_auth" = [])),
    tag = "Balance"
)]
pub async fn user_balance(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_at_most_level(MANAGER_LEVEL)?;

    let balance = state
        .ledger
        .get(path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("No balance recorded for this user"))?;
    Ok(HttpResponse::Ok().json(balance))
}

#[utoipa::path(
    post,
    path = "/api/balance/{user_id}/entitlement",
    params(("user_id" = u64, Path, description = "User id")),
    request_body = EntitlementRequest,
    responses(
        (status = 200, description = "Balance after the credit", body = LeaveBalance),
        (status = 400, description = "Negative amount"),
        (status = 403, description = "Managers only")
    ),
    security(("bearer_auth" = [])),
    tag = "Balance"
)]
pub async fn add_entitlement(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<EntitlementRequest>,
) -> Result<HttpResponse, AppError> {
    auth.require_at_most_level(MANAGER_LEVEL)?;

    let balance = state
        .ledger
        .add_annual_entitlement(path.into_inner(), body.holidays, body.permits)
        .await?;
    Ok(HttpResponse::Ok().json(balance))
}
