//! Trex gateway entry point
//!
//! Command line access to the panel session (login, logout, inspection)
//! and the guarded frontend server.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use auth::{AccessEvaluator, AccessState, SessionContext, TokenStore};
use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trex_gateway::{
    format::{format_date_time, format_expiry_with_days},
    guard, ApiClient, GatewayConfig, GuardState,
};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trex_gateway=info,auth=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let Some(command) = args.get(1) else {
        print_help();
        return Ok(());
    };

    init_tracing();

    let config = GatewayConfig::from_env();
    config.validate()?;

    match command.as_str() {
        "login" => {
            let (Some(username), Some(password)) = (args.get(2), args.get(3)) else {
                bail!("Usage: trex-gateway login <username> <password>");
            };
            run_login(&config, username, password).await
        }
        "logout" => run_logout(&config),
        "whoami" => run_whoami(&config),
        "check" => {
            let view = args.get(2).map(String::as_str).unwrap_or(auth::LANDING_VIEW);
            run_check(&config, view)
        }
        "nav" => run_nav(&config),
        "serve" => run_serve(&config).await,
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        other => {
            print_help();
            bail!("Unknown command: {}", other)
        }
    }
}

fn print_help() {
    println!("Trex Gateway - session gate for the Trex panel");
    println!();
    println!("Usage:");
    println!("  trex-gateway login <user> <password>  Log in and store the session token");
    println!("  trex-gateway logout                   Clear the stored session");
    println!("  trex-gateway whoami                   Show the stored session");
    println!("  trex-gateway check [view]             Evaluate access to a view (default /)");
    println!("  trex-gateway nav                      List views available to the session");
    println!("  trex-gateway serve                    Serve the frontend behind the route guard");
    println!();
    println!("Environment Variables:");
    println!("  TREX_API_BASE_URL          Backend origin (default: http://localhost:8000)");
    println!("  TREX_URL_PREFIX            Panel path prefix (default: dashboard)");
    println!("  TREX_COOKIE_FILE           Session cookie file");
    println!("  TREX_LISTEN_ADDR           Guard server address (default: 127.0.0.1:8080)");
    println!("  TREX_FRONTEND_DIR          Built frontend (default: ./frontend/dist)");
    println!("  TREX_REQUEST_TIMEOUT_SECS  Outbound request timeout (default: 30)");
}

async fn run_login(config: &GatewayConfig, username: &str, password: &str) -> Result<()> {
    let store: Arc<dyn TokenStore> = Arc::new(config.token_store());
    let client = ApiClient::from_config(config, store)?;

    let claims = client.login(username, password).await?;
    println!("Logged in as {} ({})", claims.sub, claims.role);
    Ok(())
}

fn run_logout(config: &GatewayConfig) -> Result<()> {
    let target = auth::logout(&config.token_store())?;
    println!("Logged out; continue at {}{}", config.route_prefix(), target);
    Ok(())
}

fn run_whoami(config: &GatewayConfig) -> Result<()> {
    let store = config.token_store();
    let evaluator = AccessEvaluator::default();
    let now = Utc::now();

    let claims = evaluator
        .validate(&SessionContext::from_store(&store, now))
        .map_err(error::SessionError::from)
        .context("No valid session")?;

    println!("User:    {}", claims.username());
    println!("Role:    {}", claims.role());
    if let Some(panel) = claims.panel() {
        println!("Panel:   {}", panel);
    }
    if let Some(expires) = claims.expires_at() {
        let status = format_expiry_with_days(expires, now);
        println!("Expires: {} ({})", format_date_time(expires), status.text);
    }
    Ok(())
}

fn run_check(config: &GatewayConfig, view: &str) -> Result<()> {
    let store = config.token_store();
    let state = AccessEvaluator::default().evaluate(&SessionContext::current(&store), view);

    let label = match &state {
        AccessState::Invalid(reason) => format!("invalid ({:?})", reason),
        AccessState::Unauthorized { claims, .. } => format!("unauthorized ({})", claims.role),
        AccessState::Authorized(claims) => format!("authorized ({})", claims.role),
    };

    match state.redirect_target() {
        Some(target) => println!("{}: {} -> redirect to {}{}", view, label, config.route_prefix(), target),
        None => println!("{}: {}", view, label),
    }
    Ok(())
}

fn run_nav(config: &GatewayConfig) -> Result<()> {
    let store = config.token_store();
    let evaluator = AccessEvaluator::default();
    let claims = evaluator
        .validate(&SessionContext::current(&store))
        .map_err(error::SessionError::from)
        .context("No valid session")?;

    for view in evaluator.registry().navigation_for(claims.role()) {
        println!("{:<10} {}{}", view.label, config.route_prefix(), view.path);
    }
    Ok(())
}

async fn run_serve(config: &GatewayConfig) -> Result<()> {
    let addr = config.listen_addr()?;
    tracing::info!("Starting Trex gateway v{}", config.version);
    tracing::info!("Serving {} on http://{}{}", config.frontend_dir.display(), addr, config.route_prefix());

    let app = guard::router(GuardState::from_config(config));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
