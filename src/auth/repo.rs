use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, warn};

use super::{password::hash_password, repo_types::Admin};
use crate::config::DEFAULT_ADMIN_PASSWORD;

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<Admin>>;
    async fn create(&self, username: &str, password_hash: &str) -> anyhow::Result<Admin>;
}

#[derive(Clone)]
pub struct PgAdmins {
    db: PgPool,
}

impl PgAdmins {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AdminStore for PgAdmins {
    /// Find an admin by username.
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<Admin>> {
        let admin = sqlx::query_as::<_, Admin>(
            r#"
            SELECT id, username, password_hash, created_at
            FROM admins
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .context("find admin by username")?;
        Ok(admin)
    }

    /// Create a new admin with an already hashed password.
    async fn create(&self, username: &str, password_hash: &str) -> anyhow::Result<Admin> {
        let admin = sqlx::query_as::<_, Admin>(
            r#"
            INSERT INTO admins (username, password_hash)
            VALUES ($1, $2)
            RETURNING id, username, password_hash, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await
        .context("insert admin")?;
        Ok(admin)
    }
}

/// Creates the `admin` account on first start. Returns whether it was created.
pub async fn ensure_default_admin(store: &dyn AdminStore, password: &str) -> anyhow::Result<bool> {
    if store.find_by_username(DEFAULT_ADMIN_USERNAME).await?.is_some() {
        return Ok(false);
    }
    if password == DEFAULT_ADMIN_PASSWORD {
        warn!("seeding admin account with the default password; set ADMIN_DEFAULT_PASSWORD");
    }
    let hash = hash_password(password)?;
    let admin = store.create(DEFAULT_ADMIN_USERNAME, &hash).await?;
    info!(
        admin_id = admin.id,
        username = %admin.username,
        created_at = %admin.created_at,
        "default admin created"
    );
    Ok(true)
}
