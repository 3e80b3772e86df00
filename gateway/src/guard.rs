//! Server-side route guard.
//!
//! Serves the built panel frontend under the configured prefix and runs the
//! access evaluator on every protected path before the page is returned.
//! Sessions come from the `access_token` cookie, or a bearer header for
//! non-browser callers.

use std::path::PathBuf;
use std::sync::Arc;

use auth::{AccessEvaluator, SessionContext, LANDING_VIEW, LOGIN_VIEW, TOKEN_COOKIE};
use axum::{
    extract::{Request, State},
    http::{header, StatusCode, Uri},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use error::ErrorResponse;
use tower_http::services::ServeDir;

use crate::config::GatewayConfig;

const ASSETS_VIEW: &str = "/assets";

/// Shared state of the guard router
#[derive(Clone)]
pub struct GuardState {
    evaluator: Arc<AccessEvaluator>,
    prefix: String,
    frontend_dir: PathBuf,
}

impl GuardState {
    /// `prefix` is a route path such as `/dashboard`, or empty.
    pub fn new(evaluator: AccessEvaluator, prefix: impl Into<String>, frontend_dir: impl Into<PathBuf>) -> Self {
        Self {
            evaluator: Arc::new(evaluator),
            prefix: prefix.into(),
            frontend_dir: frontend_dir.into(),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            AccessEvaluator::default(),
            config.route_prefix(),
            config.frontend_dir.clone(),
        )
    }

    /// Panel view addressed by a request path, if it lies under the prefix.
    fn view_for<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.prefix.is_empty() {
            return Some(path);
        }

        match path.strip_prefix(self.prefix.as_str())? {
            "" => Some(LANDING_VIEW),
            rest if rest.starts_with('/') => Some(rest),
            _ => None,
        }
    }

    fn location(&self, view: &str) -> String {
        format!("{}{}", self.prefix, view)
    }
}

/// Build the guarded frontend router.
pub fn router(state: GuardState) -> Router {
    let assets = ServeDir::new(state.frontend_dir.join("assets"));

    Router::new()
        .nest_service(&state.location(ASSETS_VIEW), assets)
        .fallback(serve_index)
        .layer(middleware::from_fn_with_state(state.clone(), session_guard))
        .with_state(state)
}

async fn session_guard(
    State(state): State<GuardState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let Some(view) = state.view_for(request.uri().path()).map(str::to_string) else {
        return next.run(request).await;
    };

    if view == ASSETS_VIEW || view.starts_with("/assets/") {
        return next.run(request).await;
    }

    let ctx = session_context(&state, &jar, &request);

    if view.trim_end_matches('/') == LOGIN_VIEW {
        if state.evaluator.validate(&ctx).is_ok() {
            return Redirect::to(&state.location(LANDING_VIEW)).into_response();
        }
        return next.run(request).await;
    }

    let access = state.evaluator.evaluate(&ctx, &view);
    match access.redirect_target() {
        Some(target) => {
            tracing::info!("Redirecting {} to {}", view, target);
            Redirect::to(&state.location(target)).into_response()
        }
        None => next.run(request).await,
    }
}

/// Session from the cookie or the bearer header, whichever is valid.
///
/// A stale cookie does not mask a valid bearer credential. When neither is
/// valid the cookie wins, so the reported reason matches the browser session.
fn session_context(state: &GuardState, jar: &CookieJar, request: &Request) -> SessionContext {
    let now = Utc::now();
    let candidates = [
        jar.get(TOKEN_COOKIE).map(|cookie| cookie.value().to_string()),
        bearer_token(request),
    ];

    let mut fallback = None;
    for token in candidates.into_iter().flatten() {
        let ctx = SessionContext::new(Some(token), now);
        if state.evaluator.validate(&ctx).is_ok() {
            return ctx;
        }
        if fallback.is_none() {
            fallback = Some(ctx);
        }
    }

    fallback.unwrap_or_else(|| SessionContext::new(None, now))
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

async fn serve_index(State(state): State<GuardState>, uri: Uri) -> Response {
    if state.view_for(uri.path()).is_none() {
        return (StatusCode::NOT_FOUND, Json(ErrorResponse::new("NOT_FOUND", "Not found"))).into_response();
    }

    match tokio::fs::read_to_string(state.frontend_dir.join("index.html")).await {
        Ok(index) => Html(index).into_response(),
        Err(e) => {
            tracing::error!("Failed to read frontend index: {}", e);
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("FRONTEND_NOT_FOUND", "Frontend build not found")),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(prefix: &str) -> GuardState {
        GuardState::new(AccessEvaluator::default(), prefix, "/nonexistent")
    }

    #[test]
    fn test_view_for_prefixed_paths() {
        let state = state("/dashboard");
        assert_eq!(state.view_for("/dashboard"), Some("/"));
        assert_eq!(state.view_for("/dashboard/"), Some("/"));
        assert_eq!(state.view_for("/dashboard/admins"), Some("/admins"));
        assert_eq!(state.view_for("/dashboardx"), None);
        assert_eq!(state.view_for("/other"), None);
    }

    #[test]
    fn test_view_for_root_mount() {
        let state = state("");
        assert_eq!(state.view_for("/panels"), Some("/panels"));
        assert_eq!(state.location(LOGIN_VIEW), "/login");
    }

    #[test]
    fn test_location() {
        let state = state("/dashboard");
        assert_eq!(state.location(LOGIN_VIEW), "/dashboard/login");
        assert_eq!(state.location(LANDING_VIEW), "/dashboard/");
    }
}
