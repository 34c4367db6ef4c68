use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    cleanup::CleanupService,
    config::{Config, LogFormat},
    rate_limiter::RateLimiter,
    routes::{DataRoutes, create_router},
};

pub fn init_tracing(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into());

    match config.log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer())
                .init();
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

pub async fn start_server(config: Config, data: DataRoutes) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting vlr-web-api server with config: {:?}", config);

    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
    info!(limit = %rate_limiter.limit(), "Rate limiter initialized");

    let app = create_router(&config, rate_limiter.clone(), data).layer(TraceLayer::new_for_http().on_response(
        |response: &axum::response::Response, latency: Duration, _span: &tracing::Span| {
            tracing::info!(
                "response latency: {:?}, status: {}",
                latency,
                response.status()
            );
        },
    ));

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;

    let server_url = config.server_url();
    info!("Server running on {}", server_url);
    info!("API docs available at {}{}", server_url, config.docs.docs_index());
    info!("OpenAPI document available at {}{}", server_url, config.docs.openapi_path);

    // Print available environment variables for configuration
    info!("Configuration options:");
    info!("  VLR_HOST: Host to bind to (default: 0.0.0.0)");
    info!("  VLR_PORT: Port to bind to (default: 3001)");
    info!("  RUST_LOG or VLR_LOG_LEVEL: Log level (default: vlr_web_api=info,tower_http=info)");
    info!("  VLR_LOG_FORMAT: Log format - 'json' or 'text' (default: text)");
    info!("  VLR_CORS_ORIGINS: Comma-separated CORS origins (default: *)");
    info!("  VLR_STATIC_DIR: Static asset directory (default: static)");
    info!("  VLR_RATE_LIMIT: Requests per client, e.g. '250/minute' (default: 250/minute)");
    info!("  VLR_TRUST_PROXY_HEADERS: Key clients on X-Forwarded-For/X-Real-IP (default: false)");
    info!("  VLR_RATE_LIMIT_CLEANUP_INTERVAL_SECONDS: Cleanup interval in seconds (default: 60)");
    info!("  VLR_DOCS_MAX_BODY_BYTES: Largest docs page rewritten (default: 5242880)");
    info!("  VLR_DOCS_READ_TIMEOUT_SECONDS: Docs page read deadline (default: 10)");

    let mut cleanup_service = CleanupService::new(
        Arc::clone(&rate_limiter),
        config.rate_limit.cleanup_interval_seconds,
    );
    cleanup_service.start();

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    cleanup_service.stop();
    info!("Shutting down vlr-web-api server");

    Ok(())
}
