use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use chrono::{TimeZone, Utc};
use diesel::prelude::*;
use diesel::SqliteConnection;
use folio::auth::jwt::JwtService;
use folio::clock::ManualClock;
use folio::config::AppConfig;
use folio::db;
use folio::routes;
use folio::models::NewRecycleItem;
use folio::schema::{activity_logs, documents, recycle_items};
use folio::state::AppState;
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const OWNER: i64 = 1001;
#[allow(dead_code)]
pub const OTHER_OWNER: i64 = 2002;

pub struct TestApp {
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    router: Router,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::with_retention(30).await
    }

    pub async fn with_retention(retention_days: i64) -> Result<Self> {
        let dir = tempfile::tempdir().context("failed to create temp dir")?;
        let database_path = dir.path().join("folio.db");
        let database_url = database_path
            .to_str()
            .ok_or_else(|| anyhow!("temp path is not valid UTF-8"))?
            .to_string();

        let config = AppConfig {
            database_url,
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            cors_allowed_origin: None,
            public_base_url: Some("https://docs.example.com/".parse()?),
            recycle_retention_days: retention_days,
            purge_interval_seconds: 3600,
            max_tree_depth: 16,
            side_effect_queue_capacity: 256,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        db::run_migrations(&pool)?;

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
                .single()
                .context("invalid start instant")?,
        ));
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(pool, config, jwt, clock.clone());
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            clock,
            router,
            _dir: dir,
        })
    }

    pub fn token_for(&self, owner_id: i64) -> Result<String> {
        self.state
            .jwt
            .generate_token(owner_id, chrono::Duration::hours(1))
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PATCH, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn post_empty(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::POST, path, token).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::GET, path, token).await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::DELETE, path, token).await
    }

    /// GET with a verbatim `Authorization` header value.
    #[allow(dead_code)]
    pub async fn get_with_authorization(
        &self,
        path: &str,
        authorization: &str,
    ) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .header("authorization", authorization)
            .body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn view_count(&self, document_id: i64) -> Result<i64> {
        self.with_conn(move |conn| {
            let count = documents::table
                .find(document_id)
                .select(documents::view_count)
                .first(conn)
                .context("failed to load view count")?;
            Ok(count)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn activity_actions(&self, owner_id: i64) -> Result<Vec<String>> {
        self.with_conn(move |conn| {
            let actions = activity_logs::table
                .filter(activity_logs::owner_id.eq(owner_id))
                .order(activity_logs::id.asc())
                .select(activity_logs::action_type)
                .load(conn)
                .context("failed to load activity log")?;
            Ok(actions)
        })
        .await
    }

    /// Polls until the asynchronous view counter reaches `expected`.
    #[allow(dead_code)]
    pub async fn wait_for_views(&self, document_id: i64, expected: i64) -> Result<()> {
        for _ in 0..100 {
            if self.view_count(document_id).await? >= expected {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        bail!("view count for document {document_id} never reached {expected}")
    }

    /// Writes a recycle row as-is, bypassing the services.
    #[allow(dead_code)]
    pub async fn insert_recycle_row(&self, row: NewRecycleItem) -> Result<i64> {
        self.with_conn(move |conn| {
            let id = diesel::insert_into(recycle_items::table)
                .values(&row)
                .returning(recycle_items::id)
                .get_result(conn)
                .context("failed to insert recycle row")?;
            Ok(id)
        })
        .await
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

#[allow(dead_code)]
pub async fn read_json<T: DeserializeOwned>(response: hyper::Response<Body>) -> Result<T> {
    let body = body_to_vec(response.into_body()).await?;
    serde_json::from_slice(&body).with_context(|| {
        format!(
            "unexpected response body: {}",
            String::from_utf8_lossy(&body)
        )
    })
}
