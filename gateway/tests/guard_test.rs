//! Route guard tests
//!
//! Drive the guarded frontend router directly with `oneshot` requests.

use auth::{issue_token, AccessEvaluator, Role, SessionClaims};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;
use trex_gateway::{guard, GuardState};

fn frontend() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("index.html"), "<html>trex panel</html>").unwrap();
    std::fs::create_dir(dir.path().join("assets")).unwrap();
    std::fs::write(dir.path().join("assets/app.js"), "console.log('trex')").unwrap();
    dir
}

fn app(dir: &TempDir) -> Router {
    guard::router(GuardState::new(AccessEvaluator::default(), "/dashboard", dir.path()))
}

fn token(role: Role, expires_in_secs: i64) -> String {
    issue_token(&SessionClaims::new("principal", role, expires_in_secs), "guard-secret").unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_with_cookie(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, format!("access_token={}", token))
        .body(Body::empty())
        .unwrap()
}

fn location(response: &axum::response::Response) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

#[tokio::test]
async fn test_no_session_redirects_to_login() {
    let dir = frontend();
    let response = app(&dir).oneshot(get("/dashboard/settings")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard/login");
}

#[tokio::test]
async fn test_expired_session_redirects_to_login() {
    let dir = frontend();
    let response = app(&dir)
        .oneshot(get_with_cookie("/dashboard/", &token(Role::Superadmin, -1)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard/login");
}

#[tokio::test]
async fn test_admin_bounced_from_superadmin_view() {
    let dir = frontend();
    let response = app(&dir)
        .oneshot(get_with_cookie("/dashboard/admins", &token(Role::Admin, 3600)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard/");
}

#[tokio::test]
async fn test_authorized_session_gets_index() {
    let dir = frontend();
    let response = app(&dir)
        .oneshot(get_with_cookie("/dashboard/panels", &token(Role::Superadmin, 3600)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"<html>trex panel</html>");
}

#[tokio::test]
async fn test_bearer_header_is_accepted() {
    let dir = frontend();
    let request = Request::builder()
        .uri("/dashboard")
        .header(header::AUTHORIZATION, format!("Bearer {}", token(Role::Admin, 3600)))
        .body(Body::empty())
        .unwrap();

    let response = app(&dir).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_view_is_public() {
    let dir = frontend();
    let response = app(&dir).oneshot(get("/dashboard/login")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_view_skipped_with_valid_session() {
    let dir = frontend();
    let response = app(&dir)
        .oneshot(get_with_cookie("/dashboard/login", &token(Role::Admin, 3600)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard/");
}

#[tokio::test]
async fn test_assets_are_public() {
    let dir = frontend();
    let response = app(&dir).oneshot(get("/dashboard/assets/app.js")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_paths_outside_prefix_are_not_found() {
    let dir = frontend();
    let response = app(&dir).oneshot(get("/elsewhere")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_valid_bearer_overrides_stale_cookie() {
    let dir = frontend();
    let request = Request::builder()
        .uri("/dashboard/settings")
        .header(header::COOKIE, format!("access_token={}", token(Role::Superadmin, -60)))
        .header(header::AUTHORIZATION, format!("Bearer {}", token(Role::Superadmin, 3600)))
        .body(Body::empty())
        .unwrap();

    let response = app(&dir).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_cookie_and_bearer_redirect_to_login() {
    let dir = frontend();
    let request = Request::builder()
        .uri("/dashboard/")
        .header(header::COOKIE, "access_token=garbage")
        .header(header::AUTHORIZATION, format!("Bearer {}", token(Role::Admin, -60)))
        .body(Body::empty())
        .unwrap();

    let response = app(&dir).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard/login");
}
