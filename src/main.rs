// src/main.rs
mod config;
mod error;
mod handlers;
mod layers;
mod normalize;
mod token;
mod types;

use std::{net::SocketAddr, sync::Arc};

use axum::{
    middleware,
    routing::{any, get},
    Router,
};
use config::Config;
use handlers::{CHECKTOKEN_PATH, DASHBOARD_PATH, VALIDATE_CHECKTOKEN_PATH, VALIDATE_PATH};
use layers::RateLimiter;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let addr = config.bind;
    let app = app(config);

    info!("[SERVER] running on http://{addr}");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

fn app(config: Config) -> Router {
    let limiter = RateLimiter::new(config.rate_limit_max, config.rate_limit_window);
    let timeout = config.request_timeout;
    let public = ServeDir::new(&config.public_dir);

    Router::new()
        .route("/", get(handlers::root))
        .route(DASHBOARD_PATH, any(handlers::dashboard))
        .route(VALIDATE_PATH, any(handlers::validate))
        .route(CHECKTOKEN_PATH, any(handlers::checktoken))
        .route(VALIDATE_CHECKTOKEN_PATH, any(handlers::validate_checktoken))
        .fallback_service(public)
        .with_state(Arc::new(config))
        .layer(middleware::from_fn(layers::log_requests))
        .layer(middleware::from_fn_with_state(limiter, layers::rate_limit))
        .layer(TimeoutLayer::new(timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
