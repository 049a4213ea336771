use actix_web::HttpResponse;
use serde::Serialize;
use serde_json::json;

use crate::store::Page;

pub mod approval;
pub mod attendance;
pub mod balance;
pub mod leave_request;
pub mod role;

/// List envelope shared by paginated endpoints.
pub(crate) fn paginated<T: Serialize>(data: Vec<T>, page: Page) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "data": data,
        "page": page.page_number(),
        "per_page": page.limit,
    }))
}
