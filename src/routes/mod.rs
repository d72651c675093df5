pub mod compare;
pub mod health;
pub mod simulate;
pub mod static_files;
pub mod stats;

use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/simulate/:role", get(simulate::simulate))
        .route("/api/stats", get(stats::get_stats))
        .route("/api/stats/increment", post(stats::increment_stats))
        .route("/api/compare", get(compare::compare))
        .fallback(static_files::serve_static)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::{Config, DelayRange};
    use crate::infra::{CounterStore, MemoryCounterStore};
    use crate::state::AppState;
    use axum::{body::Body, http::Request, response::Response, Router};
    use http_body_util::BodyExt;
    use std::{net::SocketAddr, sync::Arc, time::Duration};
    use tower::ServiceExt;

    pub fn closed_port() -> SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    /// Config with no synthetic delay and an unreachable DNS-over-HTTPS endpoint.
    pub fn test_config() -> Config {
        let mut config = Config::default();
        config.doh_endpoint = format!("http://{}/resolve", closed_port());
        config.dns_timeout = Duration::from_millis(200);
        config.request_timeout = Duration::from_secs(5);
        config.edge_delay = DelayRange::new(0, 0);
        config.origin_delay = DelayRange::new(0, 0);
        config
    }

    pub fn test_state(config: Config, counter: Arc<dyn CounterStore>) -> AppState {
        AppState::new(config, counter).unwrap()
    }

    pub fn default_state() -> AppState {
        test_state(test_config(), Arc::new(MemoryCounterStore::new()))
    }

    pub async fn send(app: Router, request: Request<Body>) -> (Response, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let (parts, body) = response.into_parts();
        let bytes = body.collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (Response::from_parts(parts, Body::empty()), json)
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    pub fn post(uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }
}
