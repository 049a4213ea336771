use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

use crate::{
    error::{AppError, AppResult},
    models::Claims,
};

/// Identity of the caller, placed in request extensions by the auth
/// middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub role_id: Option<u64>,
    /// Lower level means more authority.
    pub hierarchy_level: Option<i32>,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        AuthUser {
            user_id: claims.user_id,
            email: claims.sub,
            role_id: claims.role_id,
            hierarchy_level: claims.hierarchy_level,
        }
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| AppError::auth("Missing authentication")),
        )
    }
}

impl AuthUser {
    /// Passes when the caller's level is `max` or more senior (numerically
    /// lower). Used for manager-only operations.
    pub fn require_at_most_level(&self, max: i32) -> AppResult<()> {
        match self.hierarchy_level {
            Some(level) if level <= max => Ok(()),
            _ => Err(AppError::forbidden("Insufficient authorization level")),
        }
    }

    /// Passes when the caller's level is numerically `min` or higher. Role
    /// management is gated this way.
    pub fn require_at_least_level(&self, min: i32) -> AppResult<()> {
        match self.hierarchy_level {
            Some(level) if level >= min => Ok(()),
            _ => Err(AppError::forbidden("Insufficient authorization level")),
        }
    }

    pub fn is_manager(&self) -> bool {
        self.require_at_most_level(crate::auth::MANAGER_LEVEL).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_level(level: Option<i32>) -> AuthUser {
        AuthUser {
            user_id: 1,
            email: "a@x.io".into(),
            role_id: None,
            hierarchy_level: level,
        }
    }

    #[test]
    fn at_most_level_favors_lower_numbers() {
        assert!(with_level(Some(0)).require_at_most_level(1).is_ok());
        assert!(with_level(Some(1)).require_at_most_level(1).is_ok());
        assert!(matches!(
            with_level(Some(2)).require_at_most_level(1),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn at_least_level_favors_higher_numbers() {
        assert!(with_level(Some(2)).require_at_least_level(2).is_ok());
        assert!(with_level(Some(5)).require_at_least_level(2).is_ok());
        assert!(with_level(Some(1)).require_at_least_level(2).is_err());
    }

    #[actix_web::test]
    async fn extractor_reads_identity_from_extensions() {
        let req = actix_web::test::TestRequest::default().to_http_request();
        assert!(matches!(
            AuthUser::from_request(&req, &mut Payload::None).await,
            Err(AppError::Auth(_))
        ));

        req.extensions_mut().insert(with_level(Some(1)));
        let user = AuthUser::from_request(&req, &mut Payload::None).await.unwrap();
        assert_eq!(user.user_id, 1);
        assert!(user.is_manager());
    }

    #[test]
    fn missing_level_is_forbidden_both_ways() {
        let user = with_level(None);
        assert!(user.require_at_most_level(10).is_err());
        assert!(user.require_at_least_level(0).is_err());
        assert!(!user.is_manager());
    }
}
