use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

/// Where recipe images are kept.
#[derive(Debug, Clone, Deserialize)]
pub enum StorageConfig {
    S3(S3Config),
    /// Process-local storage, contents are lost on restart.
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub max_bytes: usize,
    pub url_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub uploads: UploadConfig,
    pub admin: Option<AdminBootstrap>,
}

const DEFAULT_UPLOAD_MAX_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_IMAGE_URL_TTL_SECS: u64 = 30 * 60;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "recipebook".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "recipebook-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };

        let storage = match std::env::var("STORAGE_BACKEND").as_deref() {
            Ok("memory") => StorageConfig::Memory,
            Ok("s3") | Err(_) => StorageConfig::S3(S3Config {
                endpoint: std::env::var("MINIO_ENDPOINT").context("MINIO_ENDPOINT is not set")?,
                bucket: std::env::var("MINIO_BUCKET").context("MINIO_BUCKET is not set")?,
                access_key: std::env::var("MINIO_ACCESS_KEY")
                    .context("MINIO_ACCESS_KEY is not set")?,
                secret_key: std::env::var("MINIO_SECRET_KEY")
                    .context("MINIO_SECRET_KEY is not set")?,
                region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".into()),
            }),
            Ok(other) => anyhow::bail!("unknown STORAGE_BACKEND {other:?}, expected s3 or memory"),
        };

        let uploads = UploadConfig {
            max_bytes: env_or("UPLOAD_MAX_BYTES", DEFAULT_UPLOAD_MAX_BYTES),
            url_ttl_secs: env_or("IMAGE_URL_TTL_SECS", DEFAULT_IMAGE_URL_TTL_SECS),
        };

        let admin = match (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) => Some(AdminBootstrap { email, password }),
            _ => None,
        };

        Ok(Self {
            database_url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            jwt,
            storage,
            uploads,
            admin,
        })
    }

    /// Settings for local runs and tests: memory storage, short-lived tokens.
    pub fn local(database_url: &str) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 5,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test".into(),
                audience: "test".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            storage: StorageConfig::Memory,
            uploads: UploadConfig {
                max_bytes: DEFAULT_UPLOAD_MAX_BYTES,
                url_ttl_secs: DEFAULT_IMAGE_URL_TTL_SECS,
            },
            admin: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_on_garbage() {
        std::env::set_var("RECIPEBOOK_TEST_NUMERIC", "not-a-number");
        assert_eq!(env_or("RECIPEBOOK_TEST_NUMERIC", 42u64), 42);
        std::env::set_var("RECIPEBOOK_TEST_NUMERIC", "7");
        assert_eq!(env_or("RECIPEBOOK_TEST_NUMERIC", 42u64), 7);
        std::env::remove_var("RECIPEBOOK_TEST_NUMERIC");
    }

    #[test]
    fn local_config_uses_memory_storage() {
        let cfg = AppConfig::local("postgres://localhost/recipes");
        assert!(matches!(cfg.storage, StorageConfig::Memory));
        assert_eq!(cfg.uploads.max_bytes, DEFAULT_UPLOAD_MAX_BYTES);
        assert!(cfg.admin.is_none());
    }
}
