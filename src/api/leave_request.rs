use actix_web::{HttpResponse, web};

use crate::{
    api::paginated,
    auth::{MANAGER_LEVEL, auth::AuthUser},
    error::AppError,
    model::leave_request::{LeaveRequest, RequestDraft},
    models::DateRangeQuery,
    service::AppState,
    store::{Page, PageQuery},
};

/// Owners see their own requests; managers see everything.
fn ensure_visible(auth: &AuthUser, request: &LeaveRequest) -> Result<(), AppError> {
    if request.user_id == auth.user_id {
        return Ok(());
    }
    auth.require_at_most_level(MANAGER_LEVEL)
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/requests",
    request_body = RequestDraft,
    responses(
        (status = 201, description = "Request created", body = LeaveRequest),
        (status = 400, description = "Invalid dates, type or duration"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Overlaps an existing request"),
        (status = 422, description = "Insufficient balance")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn create_request(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<RequestDraft>,
) -> Result<HttpResponse, AppError> {
    let request = state
        .requests
        .create(auth.user_id, body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(request))
}

#[utoipa::path(
    get,
    path = "/api/requests/me",
    params(PageQuery),
    responses(
        (status = 200, description = "Own requests, newest first", body = Object, example = json!({
            "data": [{
                "id": 1,
                "user_id": 1000,
                "start_date": "2026-11-02",
                "end_date": "2026-11-04",
                "request_type": "HOLIDAY",
                "notes": null,
                "created_at": "2026-10-19T08:00:00Z"
            }],
            "page": 1,
            "per_page": 20
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn list_own_requests(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let page = Page::from_query(query.into_inner());
    let requests = state.requests.list_own(auth.user_id, page).await?;
    Ok(paginated(requests, page))
}

#[utoipa::path(
    get,
    path = "/api/requests",
    params(PageQuery),
    responses(
        (status = 200, description = "All requests, newest first", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Managers only")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn list_requests(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_at_most_level(MANAGER_LEVEL)?;

    let page = Page::from_query(query.into_inner());
    let requests = state.requests.list_all(page).await?;
    Ok(paginated(requests, page))
}

#[utoipa::path(
    get,
    path = "/api/requests/pending",
    responses(
        (status = 200, description = "Requests with no decision yet", body = [LeaveRequest]),
        (status = 403, description = "Managers only")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn pending_requests(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    auth.require_at_most_level(MANAGER_LEVEL)?;
    Ok(HttpResponse::Ok().json(state.requests.pending().await?))
}

#[utoipa::path(
    get,
    path = "/api/requests/range",
    params(DateRangeQuery),
    responses(
        (status = 200, description = "Requests intersecting the range", body = [LeaveRequest]),
        (status = 400, description = "Start after end")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn requests_in_range(
    state: web::Data<AppState>,
    query: web::Query<DateRangeQuery>,
) -> Result<HttpResponse, AppError> {
    let requests = state
        .requests
        .in_range(query.start_date, query.end_date)
        .await?;
    Ok(HttpResponse::Ok().json(requests))
}

#[utoipa::path(
    get,
    path = "/api/requests/{id}",
    params(("id" = u64, Path, description = "Request id")),
    responses(
        (status = 200, description = "Request", body = LeaveRequest),
        (status = 403, description = "Not your request"),
        (status = 404, description = "Request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn get_request(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let request = state.requests.get(path.into_inner()).await?;
    ensure_visible(&auth, &request)?;
    Ok(HttpResponse::Ok().json(request))
}

#[utoipa::path(
    get,
    path = "/api/requests/{id}/approvals",
    params(("id" = u64, Path, description = "Request id")),
    responses(
        (status = 200, description = "Request with decisions and derived status", body = RequestWithApprovals),
        (status = 403, description = "Not your request"),
        (status = 404, description = "Request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn get_request_with_approvals(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let view = state.requests.with_approvals(path.into_inner()).await?;
    ensure_visible(&auth, &view.request)?;
    Ok(HttpResponse::Ok().json(view))
}

#[utoipa::path(
    put,
    path = "/api/requests/{id}",
    params(("id" = u64, Path, description = "Request id")),
    request_body = RequestDraft,
    responses(
        (status = 200, description = "Request updated", body = LeaveRequest),
        (status = 400, description = "Invalid dates or type"),
        (status = 403, description = "Not your request"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Already decided or overlapping")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn update_request(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<RequestDraft>,
) -> Result<HttpResponse, AppError> {
    let request = state
        .requests
        .update(path.into_inner(), auth.user_id, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(request))
}

#[utoipa::path(
    delete,
    path = "/api/requests/{id}",
    params(("id" = u64, Path, description = "Request id")),
    responses(
        (status = 204, description = "Request and its approvals deleted"),
        (status = 403, description = "Not your request"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request has an accepted approval")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn delete_request(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    state
        .requests
        .delete(path.into_inner(), auth.user_id)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}
