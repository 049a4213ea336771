use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::{
    auth::password::CredentialHasher,
    error::{AppError, AppResult},
    model::{
        credential::LoginOutcome,
        user::{LoginRecord, NewUser, User, UserProfile, normalize_email},
    },
    store::Store,
};

pub const MIN_PASSWORD_LEN: usize = 6;
/// Failed attempts tolerated inside the lockout window.
pub const MAX_FAILED_ATTEMPTS: i64 = 5;
pub const LOCKOUT_WINDOW_MINUTES: i64 = 15;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role_id: Option<u64>,
    pub manager_id: Option<u64>,
}

fn check_password_policy(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct CredentialService {
    store: Arc<dyn Store>,
    hasher: CredentialHasher,
}

impl CredentialService {
    pub fn new(store: Arc<dyn Store>, hasher: CredentialHasher) -> Self {
        Self { store, hasher }
    }

    pub async fn register(&self, registration: Registration) -> AppResult<User> {
        let name = registration.name.trim();
        let email = normalize_email(&registration.email);

        if name.is_empty() || email.is_empty() {
            return Err(AppError::validation("Name and email are required"));
        }
        check_password_policy(&registration.password)?;

        if self.store.email_exists(&email).await? {
            return Err(AppError::conflict("Email already registered"));
        }
        if let Some(role_id) = registration.role_id {
            if self.store.find_role(role_id).await?.is_none() {
                return Err(AppError::validation("Role does not exist"));
            }
        }
        if let Some(manager_id) = registration.manager_id {
            if !self.store.user_exists(manager_id).await? {
                return Err(AppError::validation("Manager does not exist"));
            }
        }

        let (hash, salt) = self.hasher.hash(&registration.password)?;
        let user = self
            .store
            .create_user_with_credential(
                NewUser {
                    name: name.to_string(),
                    email,
                    role_id: registration.role_id,
                    manager_id: registration.manager_id,
                },
                &hash,
                &salt,
            )
            .await?;

        info!(user_id = user.id, "User registered");
        Ok(user)
    }

    /// Resolves the login and applies the failed-attempt lockout before the
    /// password is looked at.
    pub async fn verify(&self, email: &str, password: &str) -> AppResult<LoginRecord> {
        let email = normalize_email(email);

        let Some(record) = self.store.find_login_record(&email).await? else {
            info!("Login failed: unknown email");
            return Err(AppError::auth(INVALID_CREDENTIALS));
        };
        let user_id = record.user.id;

        let since = Utc::now() - Duration::minutes(LOCKOUT_WINDOW_MINUTES);
        let failures = self.store.count_failures_since(user_id, since).await?;
        if failures >= MAX_FAILED_ATTEMPTS {
            self.store
                .record_attempt(user_id, LoginOutcome::Failure)
                .await?;
            warn!(user_id, failures, "Login locked out");
            return Err(AppError::RateLimited(
                "Too many failed login attempts, try again later".into(),
            ));
        }

        if !self.hasher.verify(password, &record.password_hash) {
            self.store
                .record_attempt(user_id, LoginOutcome::Failure)
                .await?;
            info!(user_id, "Login failed: password mismatch");
            return Err(AppError::auth(INVALID_CREDENTIALS));
        }

        self.store
            .record_attempt(user_id, LoginOutcome::Success)
            .await?;
        Ok(record)
    }

    pub async fn change_password(
        &self,
        user_id: u64,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        check_password_policy(new_password)?;

        let credential = self
            .store
            .find_credential(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        if !self.hasher.verify(current_password, &credential.password_hash) {
            return Err(AppError::auth("Current password is incorrect"));
        }

        let (hash, salt) = self.hasher.hash(new_password)?;
        self.store.update_credential(user_id, &hash, &salt).await?;

        info!(user_id, "Password changed");
        Ok(())
    }

    pub async fn profile(&self, user_id: u64) -> AppResult<UserProfile> {
        self.store
            .find_profile(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }
}
