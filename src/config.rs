use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};
use url::Url;

use crate::db::DEFAULT_MAX_POOL_SIZE;

pub const DEFAULT_RECYCLE_RETENTION_DAYS: i64 = 30;
pub const DEFAULT_PURGE_INTERVAL_SECONDS: u64 = 3600;
pub const DEFAULT_MAX_TREE_DEPTH: usize = 64;
pub const DEFAULT_SIDE_EFFECT_QUEUE_CAPACITY: usize = 1024;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_pool_size: u32,
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub cors_allowed_origin: Option<String>,
    pub public_base_url: Option<Url>,
    pub recycle_retention_days: i64,
    pub purge_interval_seconds: u64,
    pub max_tree_depth: usize,
    pub side_effect_queue_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_pool_size = parse_var("DATABASE_MAX_POOL_SIZE", DEFAULT_MAX_POOL_SIZE)?;
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = parse_var("SERVER_PORT", 3000)?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "folio".to_string());
        let jwt_audience =
            env::var("JWT_AUDIENCE").unwrap_or_else(|_| "folio-clients".to_string());
        let cors_allowed_origin = env::var("CORS_ALLOWED_ORIGIN").ok();
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .ok()
            .map(|raw| parse_base_url(&raw))
            .transpose()?;
        let recycle_retention_days =
            parse_var("RECYCLE_RETENTION_DAYS", DEFAULT_RECYCLE_RETENTION_DAYS)?;
        anyhow::ensure!(
            recycle_retention_days >= 0,
            "RECYCLE_RETENTION_DAYS must not be negative"
        );
        let purge_interval_seconds =
            parse_var("PURGE_INTERVAL_SECONDS", DEFAULT_PURGE_INTERVAL_SECONDS)?;
        let max_tree_depth = parse_var("MAX_TREE_DEPTH", DEFAULT_MAX_TREE_DEPTH)?;
        let side_effect_queue_capacity = parse_var(
            "SIDE_EFFECT_QUEUE_CAPACITY",
            DEFAULT_SIDE_EFFECT_QUEUE_CAPACITY,
        )?;

        Ok(Self {
            database_url,
            database_max_pool_size,
            server_host,
            server_port,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            cors_allowed_origin,
            public_base_url,
            recycle_retention_days,
            purge_interval_seconds,
            max_tree_depth,
            side_effect_queue_capacity: side_effect_queue_capacity.max(1),
        })
    }

    /// Absolute link for a share token, when a public base URL is configured.
    pub fn share_url(&self, token: &str) -> Option<String> {
        let base = self.public_base_url.as_ref()?;
        base.join(&format!("api/share/{token}"))
            .ok()
            .map(|url| url.to_string())
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{name} has an invalid value: {raw:?}"))
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized).with_context(|| format!("PUBLIC_BASE_URL is not a valid URL: {raw}"))
}
