use actix_web::{HttpResponse, web};
use chrono::NaiveDate;

use crate::{
    api::paginated,
    auth::{MANAGER_LEVEL, auth::AuthUser},
    error::AppError,
    models::AttendanceInput,
    service::AppState,
    store::{Page, PageQuery},
};

/// Clock-in / clock-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = AttendanceInput,
    responses(
        (status = 201, description = "Event recorded", body = AttendanceEvent),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "ENTER and EXIT must alternate, starting with ENTER")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn record_event(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<AttendanceInput>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let event = state
        .attendance
        .record(auth.user_id, body.action_type, body.location, body.geolocation)
        .await?;
    Ok(HttpResponse::Created().json(event))
}

#[utoipa::path(
    get,
    path = "/api/attendance/me",
    params(PageQuery),
    responses((status = 200, description = "Own events, newest first", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_events(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let page = Page::from_query(query.into_inner());
    let events = state.attendance.list_own(auth.user_id, page).await?;
    Ok(paginated(events, page))
}

#[utoipa::path(
    get,
    path = "/api/attendance/me/today",
    responses((status = 200, description = "Own events for today (UTC)", body = [AttendanceEvent])),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_events_today(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.attendance.today(auth.user_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/attendance/me/date/{date}",
    params(("date" = String, Path, description = "Day as YYYY-MM-DD")),
    responses(
        (status = 200, description = "Own events for the day", body = [AttendanceEvent]),
        (status = 404, description = "Malformed date")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_events_on(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<NaiveDate>,
) -> Result<HttpResponse, AppError> {
    let events = state
        .attendance
        .on_date(auth.user_id, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(events))
}

#[utoipa::path(
    get,
    path = "/api/attendance/me/last",
    responses(
        (status = 200, description = "Latest own event", body = AttendanceEvent),
        (status = 404, description = "No events yet")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_last_event(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.attendance.last(auth.user_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/attendance/me/status",
    responses((status = 200, description = "Whether the caller is clocked in", body = WorkingStatus)),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_working_status(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.attendance.working_status(auth.user_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    params(PageQuery),
    responses(
        (status = 200, description = "All events, newest first", body = Object),
        (status = 403, description = "Managers only")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_events(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_at_most_level(MANAGER_LEVEL)?;

    let page = Page::from_query(query.into_inner());
    Ok(paginated(state.attendance.list_all(page).await?, page))
}

#[utoipa::path(
    delete,
    path = "/api/attendance/{id}",
    params(("id" = u64, Path, description = "Event id")),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 403, description = "Managers only"),
        (status = 404, description = "Event not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn delete_event(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_at_most_level(MANAGER_LEVEL)?;

    state.attendance.delete(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
