use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use super::{
    extractors::{AdminSession, ADMIN_KEY},
    jwt::JwtKeys,
    password::{verify_absent_account, verify_password},
    repo_types::Admin,
};
use crate::{
    error::{AppError, PageError},
    pages::{
        self,
        flash::{redirect_with_flash, Flash, FlashLevel, IncomingFlash},
    },
    state::AppState,
};

pub const INVALID_CREDENTIALS: &str = "Invalid username or password!";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutForm {
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/login", get(login_form).post(login))
        .route("/admin/logout", post(logout))
        .route("/api/admin/login", post(api_login))
}

/// Checks a username and password against the admin store.
async fn authenticate(state: &AppState, req: &LoginRequest) -> Result<Admin, AppError> {
    let username = req.username.trim();
    if username.is_empty() || req.password.is_empty() {
        return Err(AppError::Unauthorized);
    }

    let admin = match state.admins.find_by_username(username).await {
        Ok(Some(a)) => a,
        Ok(None) => {
            verify_absent_account(&req.password);
            warn!(%username, "login unknown username");
            return Err(AppError::Unauthorized);
        }
        Err(e) => return Err(AppError::Database(e)),
    };

    if !verify_password(&req.password, &admin.password_hash)? {
        warn!(%username, admin_id = admin.id, "login invalid password");
        return Err(AppError::Unauthorized);
    }

    info!(admin_id = admin.id, username = %admin.username, "admin authenticated");
    Ok(admin)
}

pub async fn login_form(IncomingFlash(flash): IncomingFlash) -> Response {
    pages::render("Admin Login", &flash, &pages::login_body())
}

#[instrument(skip(state, session, payload))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(payload): Form<LoginRequest>,
) -> Result<Response, PageError> {
    match authenticate(&state, &payload).await {
        Ok(admin) => {
            // fresh id on privilege change
            session.cycle_id().await.map_err(AppError::from)?;
            session
                .insert(ADMIN_KEY, AdminSession::new(admin.username))
                .await
                .map_err(AppError::from)?;
            Ok(redirect_with_flash(
                "/admin/dashboard",
                FlashLevel::Success,
                "Login successful!",
            ))
        }
        Err(AppError::Unauthorized) => {
            let banner = Flash::new(FlashLevel::Error, INVALID_CREDENTIALS);
            Ok(pages::document("Admin Login", Some(&banner), &pages::login_body()).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

#[instrument(skip_all, fields(username = %admin.username))]
pub async fn logout(
    session: Session,
    admin: AdminSession,
    Form(form): Form<LogoutForm>,
) -> Result<Response, PageError> {
    admin.check_form_token(&form.csrf_token)?;
    session
        .remove::<AdminSession>(ADMIN_KEY)
        .await
        .map_err(AppError::from)?;
    session.cycle_id().await.map_err(AppError::from)?;
    info!("admin logged out");
    Ok(redirect_with_flash("/", FlashLevel::Success, "You have been logged out."))
}

#[instrument(skip(state, payload))]
pub async fn api_login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), AppError> {
    let admin = authenticate(&state, &payload).await?;
    let keys = JwtKeys::from_ref(&state);
    Ok((
        StatusCode::OK,
        Json(TokenResponse {
            access_token: keys.sign(&admin.username)?,
            token_type: "Bearer",
            expires_in: keys.ttl.as_secs(),
        }),
    ))
}
