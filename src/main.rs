mod app;
mod applications;
mod auth;
mod config;
mod error;
mod letters;
mod pages;
mod state;
mod storage;

use tower_sessions::session_store::ExpiredDeletion;
use tower_sessions_sqlx_store::PostgresStore;

use crate::{auth::repo::ensure_default_admin, config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "admissions=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let admin_password = config.admin_default_password.clone();
    let (app_state, db) = AppState::init(config).await?;

    if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }

    if let Err(e) = ensure_default_admin(app_state.admins.as_ref(), &admin_password).await {
        tracing::warn!(error = %e, "could not seed default admin");
    }

    let sessions = PostgresStore::new(db);
    sessions.migrate().await?;
    tokio::spawn({
        let sessions = sessions.clone();
        async move {
            let mut tick = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                tick.tick().await;
                if let Err(e) = sessions.delete_expired().await {
                    tracing::warn!(error = %e, "expired session cleanup failed");
                }
            }
        }
    });

    app::serve(app::build_app(app_state, sessions)).await
}
