use actix_web::{HttpResponse, web};

use crate::{
    api::paginated,
    auth::{MANAGER_LEVEL, auth::AuthUser},
    error::AppError,
    models::{ApprovalDecision, RevokeRequest, StatusQuery, StatusUpdate},
    service::AppState,
    store::{Page, PageQuery},
};

/// Managers and the requester may read decisions on a request.
async fn ensure_request_visible(
    auth: &AuthUser,
    state: &AppState,
    request_id: u64,
) -> Result<(), AppError> {
    if auth.is_manager() {
        return Ok(());
    }
    let request = state.requests.get(request_id).await?;
    if request.user_id == auth.user_id {
        return Ok(());
    }
    Err(AppError::forbidden("Not allowed to view these approvals"))
}

#[utoipa::path(
    post,
    path = "/api/approvals",
    request_body = ApprovalDecision,
    responses(
        (status = 201, description = "Decision recorded", body = Approval),
        (status = 400, description = "Decision cannot start as REVOKED"),
        (status = 403, description = "Managers only, or own request"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Already decided"),
        (status = 422, description = "Requester balance is insufficient")
    ),
    security(("bearer_auth" = [])),
    tag = "Approvals"
)]
pub async fn create_approval(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<ApprovalDecision>,
) -> Result<HttpResponse, AppError> {
    auth.require_at_most_level(MANAGER_LEVEL)?;

    let body = body.into_inner();
    let approval = state
        .approvals
        .create(auth.user_id, body.request_id, body.status, body.comment)
        .await?;
    Ok(HttpResponse::Created().json(approval))
}

#[utoipa::path(
    get,
    path = "/api/approvals",
    params(PageQuery),
    responses(
        (status = 200, description = "All decisions, newest first", body = Object),
        (status = 403, description = "Managers only")
    ),
    security(("bearer_auth" = [])),
    tag = "Approvals"
)]
pub async fn list_approvals(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_at_most_level(MANAGER_LEVEL)?;

    let page = Page::from_query(query.into_inner());
    Ok(paginated(state.approvals.all(page).await?, page))
}

#[utoipa::path(
    get,
    path = "/api/approvals/status",
    params(StatusQuery, PageQuery),
    responses(
        (status = 200, description = "Decisions with the given status", body = Object),
        (status = 403, description = "Managers only")
    ),
    security(("bearer_auth" = [])),
    tag = "Approvals"
)]
pub async fn approvals_by_status(
    auth: AuthUser,
    state: web::Data<AppState>,
    status: web::Query<StatusQuery>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_at_most_level(MANAGER_LEVEL)?;

    let page = Page::from_query(query.into_inner());
    let approvals = state.approvals.by_status(status.status, page).await?;
    Ok(paginated(approvals, page))
}

#[utoipa::path(
    get,
    path = "/api/approvals/statistics",
    responses(
        (status = 200, description = "Counts and rates per status", body = ApprovalStatistics),
        (status = 403, description = "Managers only")
    ),
    security(("bearer_auth" = [])),
    tag = "Approvals"
)]
pub async fn approval_statistics(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    auth.require_at_most_level(MANAGER_LEVEL)?;
    Ok(HttpResponse::Ok().json(state.approvals.statistics().await?))
}

#[utoipa::path(
    get,
    path = "/api/approvals/me",
    params(PageQuery),
    responses((status = 200, description = "Decisions made by the caller", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Approvals"
)]
pub async fn my_approvals(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let page = Page::from_query(query.into_inner());
    let approvals = state.approvals.by_approver(auth.user_id, page).await?;
    Ok(paginated(approvals, page))
}

#[utoipa::path(
    get,
    path = "/api/approvals/request/{request_id}",
    params(("request_id" = u64, Path, description = "Request id")),
    responses(
        (status = 200, description = "Decisions on the request", body = [Approval]),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "Request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Approvals"
)]
pub async fn approvals_for_request(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let request_id = path.into_inner();
    ensure_request_visible(&auth, &state, request_id).await?;
    Ok(HttpResponse::Ok().json(state.approvals.by_request(request_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/approvals/request/{request_id}/summary",
    params(("request_id" = u64, Path, description = "Request id")),
    responses(
        (status = 200, description = "Decision counts and final status", body = RequestApprovalSummary),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "Request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Approvals"
)]
pub async fn request_summary(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let request_id = path.into_inner();
    ensure_request_visible(&auth, &state, request_id).await?;
    Ok(HttpResponse::Ok().json(state.approvals.request_summary(request_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/approvals/{id}",
    params(("id" = u64, Path, description = "Approval id")),
    responses(
        (status = 200, description = "Approval", body = Approval),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "Approval not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Approvals"
)]
pub async fn get_approval(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let approval = state.approvals.get(path.into_inner()).await?;
    if approval.approver_id != auth.user_id {
        ensure_request_visible(&auth, &state, approval.request_id).await?;
    }
    Ok(HttpResponse::Ok().json(approval))
}

#[utoipa::path(
    put,
    path = "/api/approvals/{id}",
    params(("id" = u64, Path, description = "Approval id")),
    request_body = StatusUpdate,
    responses(
        (status = 200, description = "Decision updated", body = Approval),
        (status = 403, description = "Not the original approver"),
        (status = 404, description = "Approval not found"),
        (status = 409, description = "Transition not allowed"),
        (status = 422, description = "Requester balance is insufficient")
    ),
    security(("bearer_auth" = [])),
    tag = "Approvals"
)]
pub async fn update_approval(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<StatusUpdate>,
) -> Result<HttpResponse, AppError> {
    auth.require_at_most_level(MANAGER_LEVEL)?;

    let body = body.into_inner();
    let approval = state
        .approvals
        .update_status(path.into_inner(), auth.user_id, body.status, body.comment)
        .await?;
    Ok(HttpResponse::Ok().json(approval))
}

#[utoipa::path(
    post,
    path = "/api/approvals/{id}/revoke",
    params(("id" = u64, Path, description = "Approval id")),
    request_body(content = RevokeRequest, description = "Optional reason"),
    responses(
        (status = 200, description = "Decision revoked", body = Approval),
        (status = 403, description = "Not the original approver"),
        (status = 404, description = "Approval not found"),
        (status = 409, description = "Only accepted decisions can be revoked")
    ),
    security(("bearer_auth" = [])),
    tag = "Approvals"
)]
pub async fn revoke_approval(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: Option<web::Json<RevokeRequest>>,
) -> Result<HttpResponse, AppError> {
    auth.require_at_most_level(MANAGER_LEVEL)?;

    let reason = body.and_then(|b| b.into_inner().reason);
    let approval = state
        .approvals
        .revoke(path.into_inner(), auth.user_id, reason)
        .await?;
    Ok(HttpResponse::Ok().json(approval))
}

#[utoipa::path(
    delete,
    path = "/api/approvals/{id}",
    params(("id" = u64, Path, description = "Approval id")),
    responses(
        (status = 204, description = "Decision deleted"),
        (status = 403, description = "Not the original approver"),
        (status = 404, description = "Approval not found"),
        (status = 409, description = "Accepted decisions must be revoked")
    ),
    security(("bearer_auth" = [])),
    tag = "Approvals"
)]
pub async fn delete_approval(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_at_most_level(MANAGER_LEVEL)?;

    state
        .approvals
        .delete(path.into_inner(), auth.user_id)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}
