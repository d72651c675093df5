use speedscale::{
    config::Config,
    infra::{CounterStore, FileCounterStore, MemoryCounterStore},
    routes, AppState,
};
use std::{net::SocketAddr, process::ExitCode, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "speedscale=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(
        port = config.port,
        mode = %config.sampler_mode,
        simulation_base_url = %config.simulation_base_url,
        "Starting SpeedScale backend"
    );

    let counter: Arc<dyn CounterStore> = match &config.counter_path {
        Some(path) => match FileCounterStore::open(path).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to open counter file");
                return ExitCode::FAILURE;
            }
        },
        None => Arc::new(MemoryCounterStore::new()),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = match AppState::new(config, counter) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialise application state");
            return ExitCode::FAILURE;
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("Listening on http://{}", addr);
    if let Err(e) = axum::serve(listener, routes::router(state)).await {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
