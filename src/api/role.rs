use actix_web::{HttpResponse, web};

use crate::{
    auth::{ROLE_ADMIN_LEVEL, auth::AuthUser},
    error::AppError,
    model::role::RolePayload,
    service::AppState,
};

#[utoipa::path(
    get,
    path = "/api/roles",
    responses((status = 200, description = "Roles ordered by level", body = [Role])),
    security(("bearer_auth" = [])),
    tag = "Roles"
)]
pub async fn list_roles(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.roles.list().await?))
}

#[utoipa::path(
    get,
    path = "/api/roles/{id}",
    params(("id" = u64, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role", body = Role),
        (status = 404, description = "Role not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Roles"
)]
pub async fn get_role(
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.roles.get(path.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/api/roles",
    request_body = RolePayload,
    responses(
        (status = 201, description = "Role created", body = Role),
        (status = 400, description = "Empty name or negative level"),
        (status = 403, description = "Insufficient level"),
        (status = 409, description = "Level already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Roles"
)]
pub async fn create_role(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<RolePayload>,
) -> Result<HttpResponse, AppError> {
    auth.require_at_least_level(ROLE_ADMIN_LEVEL)?;
    let role = state.roles.create(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(role))
}

#[utoipa::path(
    put,
    path = "/api/roles/{id}",
    params(("id" = u64, Path, description = "Role id")),
    request_body = RolePayload,
    responses(
        (status = 200, description = "Role updated", body = Role),
        (status = 403, description = "Insufficient level"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Level already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Roles"
)]
pub async fn update_role(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<RolePayload>,
) -> Result<HttpResponse, AppError> {
    auth.require_at_least_level(ROLE_ADMIN_LEVEL)?;
    let role = state
        .roles
        .update(path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(role))
}

#[utoipa::path(
    delete,
    path = "/api/roles/{id}",
    params(("id" = u64, Path, description = "Role id")),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 403, description = "Insufficient level"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Role still assigned")
    ),
    security(("bearer_auth" = [])),
    tag = "Roles"
)]
pub async fn delete_role(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_at_least_level(ROLE_ADMIN_LEVEL)?;
    state.roles.delete(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
