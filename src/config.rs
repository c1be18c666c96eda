use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

/// Where uploaded documents and generated letters live.
#[derive(Debug, Clone, Deserialize)]
pub enum StorageConfig {
    Local { root: String },
    S3(S3Config),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub max_upload_bytes: usize,
    pub admin_default_password: String,
    pub cookie_secure: bool,
    /// Idle lifetime of a browser session, in minutes.
    pub session_ttl_minutes: i64,
}

pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "admissions".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "admissions-admins".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(8 * 60),
        };

        let storage = match std::env::var("STORAGE_BACKEND").as_deref() {
            Ok("s3") => StorageConfig::S3(S3Config {
                endpoint: std::env::var("S3_ENDPOINT").context("S3_ENDPOINT is not set")?,
                bucket: std::env::var("S3_BUCKET").context("S3_BUCKET is not set")?,
                access_key: std::env::var("S3_ACCESS_KEY").context("S3_ACCESS_KEY is not set")?,
                secret_key: std::env::var("S3_SECRET_KEY").context("S3_SECRET_KEY is not set")?,
                region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
            }),
            Ok("local") | Err(_) => StorageConfig::Local {
                root: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into()),
            },
            Ok(other) => anyhow::bail!("unknown STORAGE_BACKEND {other:?}, expected local or s3"),
        };

        Ok(Self {
            database_url,
            jwt,
            storage,
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            admin_default_password: std::env::var("ADMIN_DEFAULT_PASSWORD")
                .unwrap_or_else(|_| DEFAULT_ADMIN_PASSWORD.into()),
            cookie_secure: std::env::var("COOKIE_SECURE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            session_ttl_minutes: std::env::var("SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(8 * 60),
        })
    }
}
