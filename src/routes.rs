use crate::{
    api::{approval, attendance, balance, leave_request, role},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Context, Result};
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-IP limiters, built once and shared by every worker.
#[derive(Clone)]
pub struct RateLimiters {
    login: Limiter,
    register: Limiter,
    protected: Limiter,
}

fn build_limiter(requests_per_min: u32) -> Result<Limiter> {
    let burst = requests_per_min.max(1);
    let per_ms = 60_000 / burst as u64;
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms.max(1))
        .burst_size(burst)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .context("invalid rate limit configuration")?;
    Ok(Arc::new(Governor::new(&cfg)))
}

impl RateLimiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            login: build_limiter(config.rate_login_per_min)?,
            register: build_limiter(config.rate_register_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &RateLimiters) {
    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(limiters.register.clone())
                    .route(web::post().to(handlers::register)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(limiters.protected.clone())
            .service(
                web::scope("/auth")
                    .route("/change-password", web::post().to(handlers::change_password))
                    .route("/profile", web::get().to(handlers::profile))
                    .route("/validate", web::get().to(handlers::validate))
                    .route("/logout", web::post().to(handlers::logout)),
            )
            .service(
                web::scope("/requests")
                    // /requests
                    .service(
                        web::resource("")
                            .route(web::post().to(leave_request::create_request))
                            .route(web::get().to(leave_request::list_requests)),
                    )
                    .route("/me", web::get().to(leave_request::list_own_requests))
                    .route("/pending", web::get().to(leave_request::pending_requests))
                    .route("/range", web::get().to(leave_request::requests_in_range))
                    // /requests/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(leave_request::get_request))
                            .route(web::put().to(leave_request::update_request))
                            .route(web::delete().to(leave_request::delete_request)),
                    )
                    .route(
                        "/{id}/approvals",
                        web::get().to(leave_request::get_request_with_approvals),
                    ),
            )
            .service(
                web::scope("/approvals")
                    // /approvals
                    .service(
                        web::resource("")
                            .route(web::post().to(approval::create_approval))
                            .route(web::get().to(approval::list_approvals)),
                    )
                    .route("/status", web::get().to(approval::approvals_by_status))
                    .route("/statistics", web::get().to(approval::approval_statistics))
                    .route("/me", web::get().to(approval::my_approvals))
                    .route(
                        "/request/{request_id}",
                        web::get().to(approval::approvals_for_request),
                    )
                    .route(
                        "/request/{request_id}/summary",
                        web::get().to(approval::request_summary),
                    )
                    // /approvals/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(approval::get_approval))
                            .route(web::put().to(approval::update_approval))
                            .route(web::delete().to(approval::delete_approval)),
                    )
                    .route("/{id}/revoke", web::post().to(approval::revoke_approval)),
            )
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("")
                            .route(web::post().to(attendance::record_event))
                            .route(web::get().to(attendance::list_events)),
                    )
                    .route("/me", web::get().to(attendance::my_events))
                    .route("/me/today", web::get().to(attendance::my_events_today))
                    .route("/me/date/{date}", web::get().to(attendance::my_events_on))
                    .route("/me/last", web::get().to(attendance::my_last_event))
                    .route("/me/status", web::get().to(attendance::my_working_status))
                    .route("/{id}", web::delete().to(attendance::delete_event)),
            )
            .service(
                web::scope("/roles")
                    .service(
                        web::resource("")
                            .route(web::get().to(role::list_roles))
                            .route(web::post().to(role::create_role)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(role::get_role))
                            .route(web::put().to(role::update_role))
                            .route(web::delete().to(role::delete_role)),
                    ),
            )
            .service(
                web::scope("/balance")
                    .route("/me", web::get().to(balance::my_balance))
                    .route("/{user_id}", web::get().to(balance::user_balance))
                    .route(
                        "/{user_id}/entitlement",
                        web::post().to(balance::add_entitlement),
                    ),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing;
    use actix_web::{App, http::StatusCode, test, web::Data};
    use chrono::Duration;
    use serde_json::{Value, json};

    const PEER: &str = "127.0.0.1:40000";

    macro_rules! app {
        ($state:expr) => {{
            let config = Config::for_tests();
            let limiters = RateLimiters::from_config(&config).unwrap();
            test::init_service(
                App::new()
                    .app_data(Data::new($state.clone()))
                    .configure(move |cfg| configure(cfg, &config, &limiters)),
            )
            .await
        }};
    }

    fn bearer(token: &str) -> (&'static str, String) {
        ("Authorization", format!("Bearer {token}"))
    }

    async fn token_for(state: &crate::service::AppState, email: &str, level: i32) -> String {
        testing::register(state, email, level).await;
        let record = state.credentials.verify(email, "pw12345").await.unwrap();
        state
            .tokens
            .issue(&record.user, record.hierarchy_level)
            .unwrap()
    }

    #[actix_web::test]
    async fn register_then_read_profile() {
        let state = testing::state().await;
        let employee_role = testing::role_id(&state, 2).await;
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/auth/register")
            .peer_addr(PEER.parse().unwrap())
            .set_json(json!({
                "name": "Giulia Bianchi",
                "email": "Giulia@Example.com",
                "password": "secret1",
                "role_id": employee_role
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        let token = body["token"].as_str().unwrap().to_string();
        assert_eq!(body["user"]["email"], "giulia@example.com");

        let req = test::TestRequest::get()
            .uri("/api/auth/profile")
            .peer_addr(PEER.parse().unwrap())
            .insert_header(bearer(&token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["email"], "giulia@example.com");
    }

    #[actix_web::test]
    async fn login_with_wrong_password_is_unauthorized() {
        let state = testing::state().await;
        testing::register(&state, "luca@example.com", 2).await;
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/auth/login")
            .peer_addr(PEER.parse().unwrap())
            .set_json(json!({ "email": "luca@example.com", "password": "nope123" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn protected_scope_requires_bearer_token() {
        let state = testing::state().await;
        let app = app!(state);

        let req = test::TestRequest::get()
            .uri("/api/requests/me")
            .peer_addr(PEER.parse().unwrap())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "unauthorized");

        let req = test::TestRequest::get()
            .uri("/api/requests/me")
            .peer_addr(PEER.parse().unwrap())
            .insert_header(bearer("not-a-jwt"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn manager_listings_reject_employees() {
        let state = testing::state().await;
        let employee = token_for(&state, "emp@example.com", 2).await;
        let manager = token_for(&state, "boss@example.com", 1).await;
        let app = app!(state);

        let req = test::TestRequest::get()
            .uri("/api/requests/pending")
            .peer_addr(PEER.parse().unwrap())
            .insert_header(bearer(&employee))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::get()
            .uri("/api/requests/pending")
            .peer_addr(PEER.parse().unwrap())
            .insert_header(bearer(&manager))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn approved_request_deducts_balance() {
        let state = testing::state().await;
        let employee = token_for(&state, "emp@example.com", 2).await;
        let manager = token_for(&state, "boss@example.com", 1).await;
        let app = app!(state);

        let start = testing::next_monday();
        let end = start + Duration::days(2);
        let req = test::TestRequest::post()
            .uri("/api/requests")
            .peer_addr(PEER.parse().unwrap())
            .insert_header(bearer(&employee))
            .set_json(json!({
                "start_date": start,
                "end_date": end,
                "request_type": "HOLIDAY"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        let request_id = created["id"].as_u64().unwrap();

        let req = test::TestRequest::post()
            .uri("/api/approvals")
            .peer_addr(PEER.parse().unwrap())
            .insert_header(bearer(&manager))
            .set_json(json!({ "request_id": request_id, "status": "ACCEPTED" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::get()
            .uri("/api/balance/me")
            .peer_addr(PEER.parse().unwrap())
            .insert_header(bearer(&employee))
            .to_request();
        let balance: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(balance["accumulated_holidays"].as_f64(), Some(19.0));

        let req = test::TestRequest::get()
            .uri(&format!("/api/requests/{request_id}/approvals"))
            .peer_addr(PEER.parse().unwrap())
            .insert_header(bearer(&employee))
            .to_request();
        let view: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(view["status"], "APPROVED");
    }

    #[actix_web::test]
    async fn attendance_must_start_with_enter() {
        let state = testing::state().await;
        let employee = token_for(&state, "emp@example.com", 2).await;
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/attendance")
            .peer_addr(PEER.parse().unwrap())
            .insert_header(bearer(&employee))
            .set_json(json!({ "action_type": "EXIT", "location": "OFFICE" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::post()
            .uri("/api/attendance")
            .peer_addr(PEER.parse().unwrap())
            .insert_header(bearer(&employee))
            .set_json(json!({ "action_type": "ENTER", "location": "OFFICE" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::get()
            .uri("/api/attendance/me/status")
            .peer_addr(PEER.parse().unwrap())
            .insert_header(bearer(&employee))
            .to_request();
        let status: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(status["is_working"], true);
    }

    #[actix_web::test]
    async fn role_changes_need_high_level() {
        let state = testing::state().await;
        let admin = token_for(&state, "admin@example.com", 0).await;
        let employee = token_for(&state, "emp@example.com", 2).await;
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/roles")
            .peer_addr(PEER.parse().unwrap())
            .insert_header(bearer(&admin))
            .set_json(json!({ "name": "Intern", "hierarchy_level": 3 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::post()
            .uri("/api/roles")
            .peer_addr(PEER.parse().unwrap())
            .insert_header(bearer(&employee))
            .set_json(json!({ "name": "Intern", "hierarchy_level": 3 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }
}
