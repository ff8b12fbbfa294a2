mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

#[tokio::test]
async fn register_login_and_fetch_profile() {
    let Some(app) = common::spawn_app().await else { return };
    let email = common::unique_email();

    let (status, registered) = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": email, "password": "testpass123", "name": "Cook" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(registered["user"]["email"], email);
    assert!(registered["user"].get("password_hash").is_none());

    let (status, logged_in) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": email, "password": "testpass123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = logged_in["access_token"].as_str().unwrap();

    let (status, me) = app.get("/api/v1/me", token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["name"], "Cook");
}

#[tokio::test]
async fn register_normalizes_email_domain() {
    let Some(app) = common::spawn_app().await else { return };
    let local = format!("Mixed.{}", uuid::Uuid::new_v4().simple());

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": format!("{local}@EXAMPLE.COM"), "password": "testpass123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], format!("{local}@example.com"));

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": format!("{local}@example.com"), "password": "testpass123" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn register_rejects_short_password() {
    let Some(app) = common::spawn_app().await else { return };
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": common::unique_email(), "password": "pw" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["password"].is_array());
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let Some(app) = common::spawn_app().await else { return };
    let (user, _) = app.create_user().await;
    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": user.email, "password": "not-the-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn update_profile_changes_name_and_password() {
    let Some(app) = common::spawn_app().await else { return };
    let (user, token) = app.create_user().await;

    let (status, me) = app
        .patch(
            "/api/v1/me",
            &token,
            json!({ "name": "Renamed", "password": "brandnewpass" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["name"], "Renamed");

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": user.email, "password": "brandnewpass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn refresh_issues_new_tokens() {
    let Some(app) = common::spawn_app().await else { return };
    let (user, _) = app.create_user().await;
    let (_, logged_in) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": user.email, "password": common::PASSWORD })),
        )
        .await;

    let (status, refreshed) = app
        .request(
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": logged_in["refresh_token"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed["user"]["id"], user.id.to_string());
}
