use std::{env, str::FromStr};

use anyhow::{Context, Result};
use dotenvy::dotenv;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: String,
    /// Absent means the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub token_ttl: i64,
    pub token_issuer: String,

    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub db_lock_wait_timeout_secs: u64,

    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub log_level: String,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parsed_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: env::var("DATABASE_URL").ok().filter(|u| !u.trim().is_empty()),
            jwt_secret,
            token_ttl: parsed_or("TOKEN_TTL", 86_400)?, // one day
            token_issuer: env::var("TOKEN_ISSUER").unwrap_or_else(|_| "hrm-leave".to_string()),

            db_max_connections: parsed_or("DB_MAX_CONNECTIONS", 10)?,
            db_acquire_timeout_secs: parsed_or("DB_ACQUIRE_TIMEOUT_SECS", 5)?,
            db_lock_wait_timeout_secs: parsed_or("DB_LOCK_WAIT_TIMEOUT_SECS", 5)?,

            argon2_memory_kib: parsed_or("ARGON2_MEMORY_KIB", 19_456)?,
            argon2_iterations: parsed_or("ARGON2_ITERATIONS", 2)?,

            rate_login_per_min: parsed_or("RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: parsed_or("RATE_REGISTER_PER_MIN", 30)?,
            rate_protected_per_min: parsed_or("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string()),
        })
    }

    /// Settings used by the HTTP tests.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            server_addr: "127.0.0.1:0".to_string(),
            database_url: None,
            jwt_secret: crate::service::testing::TEST_SECRET.to_string(),
            token_ttl: 3600,
            token_issuer: "hrm-leave".to_string(),
            db_max_connections: 1,
            db_acquire_timeout_secs: 1,
            db_lock_wait_timeout_secs: 1,
            argon2_memory_kib: 8,
            argon2_iterations: 1,
            rate_login_per_min: 1000,
            rate_register_per_min: 1000,
            rate_protected_per_min: 10_000,
            api_prefix: "/api".to_string(),
            log_level: "debug".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_falls_back_to_default() {
        let value: u32 = parsed_or("HRM_LEAVE_SURELY_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn required_key_reports_its_name() {
        let err = required("HRM_LEAVE_SURELY_UNSET_KEY").unwrap_err();
        assert!(err.to_string().contains("HRM_LEAVE_SURELY_UNSET_KEY"));
    }
}
