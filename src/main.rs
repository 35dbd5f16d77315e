use std::net::SocketAddr;
use std::time::Duration;

use axum::http::HeaderValue;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use courpera::config::CONFIG;
use courpera::db;
use courpera::endpoints::create_router;
use courpera::services::throttle::start_limiter_pruning;
use courpera::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Starting Courpera v{}", CONFIG.version);

    let db = db::connect().await?;
    tracing::info!("Database connection established");

    tokio::fs::create_dir_all(&CONFIG.uploads.media_root).await?;

    let state = AppState::new(db);
    start_limiter_pruning(state.clone(), Duration::from_secs(300));

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer());

    let addr: SocketAddr = format!("{}:{}", CONFIG.server.host, CONFIG.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("courpera={},tower_http={}", CONFIG.log_level, CONFIG.log_level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if CONFIG.log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn cors_layer() -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if CONFIG.server.allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = CONFIG
        .server
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    cors.allow_origin(origins)
}
