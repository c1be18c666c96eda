use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{header::LOCATION, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::warn;

const FLASH_KEY: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Error,
}

/// One-shot message carried across a redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn new(level: FlashLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Flash message pending for this request, if any. Reading it removes it
/// from the session.
pub struct IncomingFlash(pub Option<Flash>);

#[async_trait]
impl<S> FromRequestParts<S> for IncomingFlash
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(session) = parts.extensions.get::<Session>().cloned() else {
            return Ok(IncomingFlash(None));
        };
        match session.remove::<Flash>(FLASH_KEY).await {
            Ok(flash) => Ok(IncomingFlash(flash)),
            Err(e) => {
                warn!(error = %e, "could not read flash message");
                Ok(IncomingFlash(None))
            }
        }
    }
}

/// `302 Found` to `to`.
pub fn found(to: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, to.to_string())]).into_response()
}

/// Redirect whose flash message is written to the session by [`persist`].
pub fn redirect_with_flash(to: &str, level: FlashLevel, message: &str) -> Response {
    let mut res = found(to);
    res.extensions_mut().insert(Flash::new(level, message));
    res
}

/// Middleware moving a flash attached to the response into the session.
pub async fn persist(session: Session, req: Request, next: Next) -> Response {
    let mut res = next.run(req).await;
    if let Some(flash) = res.extensions_mut().remove::<Flash>() {
        if let Err(e) = session.insert(FLASH_KEY, flash).await {
            warn!(error = %e, "could not store flash message");
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::header::{COOKIE, SET_COOKIE},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, SessionManagerLayer};

    async fn show(IncomingFlash(flash): IncomingFlash) -> String {
        flash.map(|f| f.message).unwrap_or_default()
    }

    fn app() -> Router {
        Router::new()
            .route(
                "/set",
                get(|| async { redirect_with_flash("/show", FlashLevel::Success, "Saved!") }),
            )
            .route("/show", get(show))
            .layer(middleware::from_fn(persist))
            .layer(SessionManagerLayer::new(MemoryStore::default()).with_secure(false))
    }

    async fn get_text(app: &Router, uri: &str, cookie: &str) -> String {
        let req = axum::http::Request::get(uri)
            .header(COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn redirect_carries_flash_until_persisted() {
        let res = redirect_with_flash("/status/APP1", FlashLevel::Success, "ok");
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()[LOCATION], "/status/APP1");
        assert_eq!(
            res.extensions().get::<Flash>(),
            Some(&Flash::new(FlashLevel::Success, "ok"))
        );
    }

    #[tokio::test]
    async fn flash_is_shown_once() {
        let app = app();
        let res = app
            .clone()
            .oneshot(axum::http::Request::get("/set").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
        let set_cookie = res.headers()[SET_COOKIE].to_str().unwrap();
        let cookie = set_cookie.split(';').next().unwrap().to_string();

        assert_eq!(get_text(&app, "/show", &cookie).await, "Saved!");
        assert_eq!(get_text(&app, "/show", &cookie).await, "");
    }

    #[tokio::test]
    async fn no_session_means_no_flash() {
        assert_eq!(get_text(&app(), "/show", "").await, "");
    }
}
