use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use ride_dispatch::api::rest::router;
use ride_dispatch::config::Config;
use ride_dispatch::engine::dispatch::run_dispatch_worker;
use ride_dispatch::error::AppError;
use ride_dispatch::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    if config.log_format.eq_ignore_ascii_case("json") {
        subscriber.json().init();
    } else {
        subscriber.compact().init();
    }

    let (app_state, dispatch_rx) = AppState::new(&config)?;
    let shared_state = Arc::new(app_state);

    let app = router(shared_state.clone());

    tokio::spawn(run_dispatch_worker(shared_state.clone(), dispatch_rx));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        relay = %config.relay_url(),
        search_radius_km = config.search_radius_km,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
