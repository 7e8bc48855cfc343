use std::net::SocketAddr;

use tracing::info;
use xconverse_app::{AppState, build_router, config::AppConfig};
use xconverse_observability::{ObservabilityConfig, init_observability};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let _observability = init_observability("xconverse-app", &ObservabilityConfig::from_env());

    let config = AppConfig::from_env().expect("configuration must be valid");
    let state = AppState::from_config(&config);
    let app = build_router(state);
    let addr: SocketAddr =
        format!("{}:{}", config.host, config.port).parse().expect("socket address must be valid");

    let listener = tokio::net::TcpListener::bind(addr).await.expect("listener must bind");
    info!(event = "app.started", %addr, backend = ?config.backend, region = %config.region);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .expect("server must run");
}
