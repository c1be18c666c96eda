use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::applications::repo::{ApplicationStore, PgApplications};
use crate::auth::repo::{AdminStore, PgAdmins};
use crate::config::AppConfig;
use crate::storage::{self, StorageClient};

/// Everything a handler needs, built once in `main` and passed by axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub applications: Arc<dyn ApplicationStore>,
    pub admins: Arc<dyn AdminStore>,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<(Self, PgPool)> {
        let config = Arc::new(config);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let storage = storage::from_config(&config.storage).await?;

        let state = Self::from_parts(
            config,
            Arc::new(PgApplications::new(db.clone())),
            Arc::new(PgAdmins::new(db.clone())),
            storage,
        );
        Ok((state, db))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        applications: Arc<dyn ApplicationStore>,
        admins: Arc<dyn AdminStore>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        Self {
            config,
            applications,
            admins,
            storage,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        fakes::FakeParts::new().state()
    }
}
