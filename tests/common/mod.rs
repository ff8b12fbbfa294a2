#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    extract::FromRef,
    http::{header, Method, Request, StatusCode},
    Router,
};
use recipebook::{
    app::build_app,
    auth::{dto::JwtKeys, repo_types::User, services::hash_password},
    config::AppConfig,
    db,
    state::AppState,
    storage::{MemoryStorage, StorageClient},
};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "testpass123";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub storage: Arc<MemoryStorage>,
}

/// Connects to `TEST_DATABASE_URL` (or `DATABASE_URL`) and applies migrations.
/// Returns `None` when no database is reachable so callers can skip.
pub async fn test_pool() -> Option<(PgPool, String)> {
    let _ = dotenvy::dotenv();
    let url = std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()?;
    let pool = match PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(std::time::Duration::from_secs(3))
        .connect(&url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("skipping: database unavailable: {e}");
            return None;
        }
    };
    db::run_migrations(&pool).await.expect("migrations");
    Some((pool, url))
}

pub async fn spawn_app() -> Option<TestApp> {
    let (pool, url) = test_pool().await?;
    let storage = Arc::new(MemoryStorage::new());
    let state = AppState::from_parts(
        pool,
        Arc::new(AppConfig::local(&url)),
        storage.clone() as Arc<dyn StorageClient>,
    );
    Some(TestApp {
        router: build_app(state.clone()),
        state,
        storage,
    })
}

pub fn unique_email() -> String {
    format!("user-{}@example.com", Uuid::new_v4().simple())
}

impl TestApp {
    pub async fn create_user(&self) -> (User, String) {
        let hash = hash_password(PASSWORD).expect("hash");
        let user = User::create(&self.state.db, &unique_email(), "Test User", &hash)
            .await
            .expect("create user");
        let token = JwtKeys::from_ref(&self.state)
            .sign_access(user.id)
            .expect("sign");
        (user, token)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).expect("request")).await
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let res = self.router.clone().oneshot(req).await.expect("response");
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    pub async fn upload(&self, recipe_id: i64, token: &str, bytes: &[u8]) -> (StatusCode, Value) {
        let boundary = "recipebook-test-boundary";
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"img\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let req = Request::post(format!("/api/v1/recipes/{recipe_id}/upload-image"))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .expect("request");
        self.send(req).await
    }
}

pub fn names(list: &Value) -> Vec<String> {
    let mut out: Vec<String> = list
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    out.sort();
    out
}

pub fn ids(list: &Value) -> Vec<i64> {
    let mut out: Vec<i64> = list
        .as_array()
        .map(|items| items.iter().filter_map(|i| i["id"].as_i64()).collect())
        .unwrap_or_default();
    out.sort();
    out
}
