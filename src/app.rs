use std::net::SocketAddr;

use axum::{extract::Request, routing::get, Router, ServiceExt};
use tower::Layer;
use tower_http::{
    cors::CorsLayer,
    normalize_path::{NormalizePath, NormalizePathLayer},
    trace::TraceLayer,
};

use crate::state::AppState;
use crate::{attributes, auth, images, recipes};

pub fn build_app(state: AppState) -> Router {
    let max_upload_bytes = state.config.uploads.max_bytes;
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(recipes::router())
                .merge(attributes::router())
                .merge(images::router(max_upload_bytes))
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

/// `/recipes/` and `/recipes` route identically. Applied outside the router
/// so the path is rewritten before routing.
pub fn with_normalized_paths(app: Router) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(app)
}

/// Binds `APP_HOST:APP_PORT` and serves until the process is stopped.
pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    let app = with_normalized_paths(app);

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::dto::JwtKeys;
    use axum::{
        body::Body,
        extract::FromRef,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt as _;
    use uuid::Uuid;

    fn bearer(state: &AppState) -> String {
        let token = JwtKeys::from_ref(state)
            .sign_access(Uuid::new_v4())
            .expect("sign access");
        format!("Bearer {token}")
    }

    async fn body_json(res: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn collections_require_auth() {
        for uri in [
            "/api/v1/recipes",
            "/api/v1/recipes/1",
            "/api/v1/tags",
            "/api/v1/ingredients",
            "/api/v1/me",
        ] {
            let app = build_app(AppState::fake());
            let res = app
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn trailing_slash_routes_like_bare_path() {
        let state = AppState::fake();
        let auth = bearer(&state);

        let res = with_normalized_paths(build_app(state.clone()))
            .oneshot(Request::get("/api/v1/recipes/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = with_normalized_paths(build_app(state))
            .oneshot(
                Request::get("/api/v1/tags/?assigned_only=maybe")
                    .header(header::AUTHORIZATION, auth)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_access_token() {
        let state = AppState::fake();
        let refresh = JwtKeys::from_ref(&state)
            .sign_refresh(Uuid::new_v4())
            .unwrap();
        let res = build_app(state)
            .oneshot(
                Request::get("/api/v1/tags")
                    .header(header::AUTHORIZATION, format!("Bearer {refresh}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_recipe_filter_is_bad_request() {
        let state = AppState::fake();
        let auth = bearer(&state);
        let res = build_app(state)
            .oneshot(
                Request::get("/api/v1/recipes?tags=1,abc&ingredients=2")
                    .header(header::AUTHORIZATION, auth)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = body_json(res).await;
        assert!(body["errors"]["tags"].is_array());
        assert!(body["errors"].get("ingredients").is_none());
    }

    #[tokio::test]
    async fn bad_assigned_only_is_bad_request() {
        let state = AppState::fake();
        let auth = bearer(&state);
        let res = build_app(state)
            .oneshot(
                Request::get("/api/v1/ingredients?assigned_only=maybe")
                    .header(header::AUTHORIZATION, auth)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(res).await["errors"]["assigned_only"].is_array());
    }

    #[tokio::test]
    async fn invalid_recipe_payload_is_bad_request() {
        let state = AppState::fake();
        let auth = bearer(&state);
        let res = build_app(state)
            .oneshot(
                Request::post("/api/v1/recipes")
                    .header(header::AUTHORIZATION, auth)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"title":"Soup","tags":"not-a-list"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn non_image_upload_is_rejected_before_storage() {
        let state = AppState::fake();
        let auth = bearer(&state);
        let boundary = "recipebook-boundary";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"\r\n\r\nnotanimage\r\n--{boundary}--\r\n"
        );
        let res = build_app(state)
            .oneshot(
                Request::post("/api/v1/recipes/1/upload-image")
                    .header(header::AUTHORIZATION, auth)
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(res).await["errors"]["image"].is_array());
    }

    #[tokio::test]
    async fn upload_without_image_field_is_rejected() {
        let state = AppState::fake();
        let auth = bearer(&state);
        let boundary = "recipebook-boundary";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n--{boundary}--\r\n"
        );
        let res = build_app(state)
            .oneshot(
                Request::post("/api/v1/recipes/1/upload-image")
                    .header(header::AUTHORIZATION, auth)
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = body_json(res).await;
        assert_eq!(body["errors"]["image"][0], "No file was submitted.");
    }
}
