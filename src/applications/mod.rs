pub mod dto;
pub mod handlers;
pub mod naming;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod validation;

use crate::state::AppState;
use axum::Router;

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .merge(handlers::public_routes(max_upload_bytes))
        .merge(handlers::admin_routes())
        .merge(handlers::api_routes())
}
