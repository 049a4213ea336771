use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    web::Data,
};

use crate::{auth::auth::AuthUser, error::AppError, service::AppState};

/// Verifies the bearer token and stores the caller's identity in the
/// request extensions.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let state = req
        .app_data::<Data<AppState>>()
        .cloned()
        .ok_or_else(|| AppError::internal("application state missing"))?;

    let header_value = match req.headers().get("Authorization") {
        Some(h) => match h.to_str() {
            Ok(value) => value.to_string(),
            Err(_) => {
                let resp = AppError::auth("Invalid Authorization header encoding").error_response();
                return Ok(req.into_response(resp));
            }
        },
        None => {
            let resp = AppError::auth("Missing Authorization header").error_response();
            return Ok(req.into_response(resp));
        }
    };

    let token = match header_value.strip_prefix("Bearer ") {
        Some(t) => t,
        None => {
            let resp =
                AppError::auth("Authorization header must start with Bearer").error_response();
            return Ok(req.into_response(resp));
        }
    };

    let claims = match state.tokens.verify(token) {
        Ok(c) => c,
        Err(e) => return Ok(req.into_response(e.error_response())),
    };

    tracing::debug!(user_id = claims.user_id, "Authenticated request");
    req.extensions_mut().insert(AuthUser::from(claims));

    next.call(req).await
}
