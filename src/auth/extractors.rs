use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::warn;

use super::jwt::{form_token, JwtKeys};
use crate::error::{AppError, PageError};

/// Session key under which a logged-in admin is kept.
pub const ADMIN_KEY: &str = "admin";

/// A verified admin, from the browser session or a Bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSession {
    pub username: String,
    pub csrf: String,
}

impl AdminSession {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            csrf: form_token(),
        }
    }

    /// Checks the form token posted with a state-changing request.
    pub fn check_form_token(&self, posted: &str) -> Result<(), AppError> {
        let matches = posted.len() == self.csrf.len()
            && posted
                .bytes()
                .zip(self.csrf.bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0;
        if matches {
            Ok(())
        } else {
            warn!(username = %self.username, "form token mismatch");
            Err(AppError::Forbidden)
        }
    }
}

async fn admin_from_parts(parts: &Parts, keys: &JwtKeys) -> Result<AdminSession, AppError> {
    let bearer = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if let Some(token) = bearer {
        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired bearer token");
            AppError::Unauthorized
        })?;
        return Ok(AdminSession {
            username: claims.sub,
            csrf: claims.csrf,
        });
    }

    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(AppError::Unauthorized)?;
    session
        .get::<AdminSession>(ADMIN_KEY)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// Page flavour: a missing session redirects to the login form.
#[async_trait]
impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = PageError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        admin_from_parts(parts, &JwtKeys::from_ref(state))
            .await
            .map_err(PageError)
    }
}

/// JSON flavour: a missing session is a 401 body.
pub struct ApiAdmin(pub AdminSession);

#[async_trait]
impl<S> FromRequestParts<S> for ApiAdmin
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        admin_from_parts(parts, &JwtKeys::from_ref(state))
            .await
            .map(ApiAdmin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::fakes::test_config;
    use axum::http::Request;

    fn session() -> AdminSession {
        AdminSession {
            username: "admin".into(),
            csrf: "abcdefghijklmnopqrstuvwxyz012345".into(),
        }
    }

    fn keys() -> JwtKeys {
        JwtKeys::from(&test_config().jwt)
    }

    #[test]
    fn form_token_must_match_exactly() {
        let s = session();
        assert!(s.check_form_token("abcdefghijklmnopqrstuvwxyz012345").is_ok());
        assert!(matches!(
            s.check_form_token("abcdefghijklmnopqrstuvwxyz012346"),
            Err(AppError::Forbidden)
        ));
        assert!(s.check_form_token("").is_err());
    }

    #[test]
    fn new_sessions_get_distinct_form_tokens() {
        assert_ne!(AdminSession::new("admin").csrf, AdminSession::new("admin").csrf);
    }

    #[tokio::test]
    async fn bearer_token_yields_admin() {
        let token = keys().sign("admin").unwrap();
        let (parts, _) = Request::get("/")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(())
            .unwrap()
            .into_parts();
        let admin = admin_from_parts(&parts, &keys()).await.unwrap();
        assert_eq!(admin.username, "admin");
        assert_eq!(admin.csrf.len(), 32);
    }

    #[tokio::test]
    async fn missing_credentials_are_unauthorized() {
        let (parts, _) = Request::get("/").body(()).unwrap().into_parts();
        assert!(matches!(
            admin_from_parts(&parts, &keys()).await,
            Err(AppError::Unauthorized)
        ));

        let (parts, _) = Request::get("/")
            .header(AUTHORIZATION, "Bearer not-a-token")
            .body(())
            .unwrap()
            .into_parts();
        assert!(matches!(
            admin_from_parts(&parts, &keys()).await,
            Err(AppError::Unauthorized)
        ));
    }
}
