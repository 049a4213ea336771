use std::sync::Arc;

use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod service;
mod store;

use crate::auth::{jwt::TokenIssuer, password::CredentialHasher};
use crate::docs::ApiDoc;
use crate::routes::RateLimiters;
use crate::service::AppState;
use crate::store::{MemoryStore, MySqlStore, RoleRepository, Store};
use config::Config;
use db::init_db;

/// Roles a fresh in-memory deployment starts with.
const DEFAULT_ROLES: [(&str, i32); 3] = [("Administrator", 0), ("Manager", 1), ("Employee", 2)];

#[get("/")]
async fn index() -> impl Responder {
    "HRM Leave service"
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    match &config.database_url {
        Some(url) => {
            let pool = init_db(url, config).await?;
            Ok(Arc::new(MySqlStore::new(pool)))
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory store; data is lost on restart");
            let store = MemoryStore::new();
            for (name, level) in DEFAULT_ROLES {
                store
                    .insert_role(name, level)
                    .await
                    .with_context(|| format!("seeding role {name}"))?;
            }
            Ok(Arc::new(store))
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let level: tracing::Level = config
        .log_level
        .parse()
        .with_context(|| format!("LOG_LEVEL has an invalid value: {}", config.log_level))?;

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(level)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(addr = %config.server_addr, "Server starting...");

    let store = open_store(&config).await?;
    let hasher = CredentialHasher::new(config.argon2_memory_kib, config.argon2_iterations)
        .context("invalid argon2 parameters")?;
    let tokens = TokenIssuer::new(&config.jwt_secret, &config.token_issuer, config.token_ttl);
    let state = AppState::new(store, tokens, hasher);
    let limiters = RateLimiters::from_config(&config)?;

    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        let config = config.clone();
        let limiters = limiters.clone();
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(state.clone()))
            .service(index)
            .configure(move |cfg| routes::configure(cfg, &config, &limiters))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
