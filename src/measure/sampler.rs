//! Measurement sampling.
//!
//! [`HttpSampler`] times one request per call under one of two disciplines:
//! server-proxied (through the local simulation endpoints) or client-direct
//! (straight to the target with per-phase timing). Every failure is folded
//! into a placeholder sample.

use super::estimator::{estimate, BreakdownEstimator, ProportionalEstimator, WarmConnectionEstimator};
use super::metadata::MetadataProbe;
use super::probe::{probe, USER_AGENT};
use super::types::{
    ApiResponse, Protocol, Role, SimulationData, SourceKind, SourceMetadata, TimingSample,
    SIMULATION_MODE,
};
use crate::config::Config;
use crate::infra::DohResolver;
use crate::shared::normalize_target;
use std::{
    fmt,
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};

/// Request discipline used by the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerMode {
    /// Time a round trip to the local simulation endpoint.
    Proxied,
    /// Time a request made straight to the target.
    Direct,
}

impl FromStr for SamplerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "proxied" | "server-proxied" => Ok(SamplerMode::Proxied),
            "direct" | "client-direct" => Ok(SamplerMode::Direct),
            other => Err(format!("unknown sampler mode '{}'", other)),
        }
    }
}

impl fmt::Display for SamplerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplerMode::Proxied => f.write_str("proxied"),
            SamplerMode::Direct => f.write_str("direct"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SamplerSettings {
    pub mode: SamplerMode,
    pub simulation_base_url: String,
    pub edge_default_target: String,
    pub origin_default_target: String,
    pub request_timeout: Duration,
    pub require_timing_allow: bool,
}

impl SamplerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.sampler_mode,
            simulation_base_url: config.simulation_base_url.clone(),
            edge_default_target: config.edge_default_target.clone(),
            origin_default_target: config.origin_default_target.clone(),
            request_timeout: config.request_timeout,
            require_timing_allow: config.require_timing_allow,
        }
    }

    fn default_target(&self, role: Role) -> &str {
        match role {
            Role::Edge => &self.edge_default_target,
            Role::Origin => &self.origin_default_target,
        }
    }
}

#[derive(Clone)]
pub struct HttpSampler {
    settings: SamplerSettings,
    client: reqwest::Client,
    metadata: MetadataProbe,
}

/// `max(1, round(elapsed))` in milliseconds.
fn elapsed_ms(start: Instant) -> u64 {
    ((start.elapsed().as_secs_f64() * 1000.0).round() as u64).max(1)
}

/// Heuristic used for server-proxied samples, which only ever know a total.
fn proxied_model(role: Role) -> &'static dyn BreakdownEstimator {
    match role {
        Role::Edge => &WarmConnectionEstimator,
        Role::Origin => &ProportionalEstimator,
    }
}

async fn fetch_simulation(request: reqwest::RequestBuilder) -> Result<SimulationData, String> {
    let envelope: ApiResponse<SimulationData> = request
        .send()
        .await
        .map_err(|e| format!("request failed: {}", e))?
        .json()
        .await
        .map_err(|e| format!("invalid envelope: {}", e))?;

    match envelope {
        ApiResponse {
            success: true,
            data: Some(data),
            ..
        } => Ok(data),
        ApiResponse { error, .. } => {
            Err(error.unwrap_or_else(|| "simulation reported failure".to_string()))
        }
    }
}

impl HttpSampler {
    pub fn new(settings: SamplerSettings, client: reqwest::Client, resolver: Arc<DohResolver>) -> Self {
        Self {
            settings,
            client,
            metadata: MetadataProbe::new(resolver),
        }
    }

    pub fn mode(&self) -> SamplerMode {
        self.settings.mode
    }

    /// Same sampler, different discipline.
    pub fn with_mode(&self, mode: SamplerMode) -> Self {
        let mut sampler = self.clone();
        sampler.settings.mode = mode;
        sampler
    }

    /// Measures `target` (or the role's default) for `role`.
    pub async fn sample(&self, target: Option<&str>, role: Role) -> TimingSample {
        match self.settings.mode {
            SamplerMode::Proxied => self.sample_proxied(target, role).await,
            SamplerMode::Direct => self.sample_direct(target, role).await,
        }
    }

    async fn sample_proxied(&self, target: Option<&str>, role: Role) -> TimingSample {
        let target = match target.map(normalize_target).transpose() {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(role = %role, error = %e, "Rejected sample target");
                return TimingSample::failed(role, SourceKind::Worker, Protocol::Https);
            }
        };

        let endpoint = format!(
            "{}/api/simulate/{}",
            self.settings.simulation_base_url.trim_end_matches('/'),
            role
        );
        let mut request = self
            .client
            .get(&endpoint)
            .header(reqwest::header::CACHE_CONTROL, "no-cache");
        if let Some(url) = &target {
            request = request.query(&[("url", url.as_str())]);
        }

        let start = Instant::now();
        let outcome = fetch_simulation(request).await;
        let total = elapsed_ms(start);

        match outcome {
            Ok(data) => {
                let estimate = estimate(total, data.protocol, None, proxied_model(role));
                TimingSample::measured(role, SourceKind::Worker, data.protocol, total, estimate)
                    .with_size(data.size)
                    .with_address(data.resolved_ip)
                    .with_tested_url(data.tested_url)
            }
            Err(e) => {
                tracing::warn!(role = %role, endpoint = %endpoint, error = %e, "Simulation sample failed");
                let protocol = target.as_ref().map(Protocol::from_url).unwrap_or(Protocol::Https);
                TimingSample::failed(role, SourceKind::Worker, protocol).with_tested_url(
                    target
                        .map(|url| url.to_string())
                        .unwrap_or_else(|| SIMULATION_MODE.to_string()),
                )
            }
        }
    }

    async fn sample_direct(&self, target: Option<&str>, role: Role) -> TimingSample {
        let raw = target.unwrap_or_else(|| self.settings.default_target(role));
        let url = match normalize_target(raw) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(role = %role, error = %e, "Rejected sample target");
                return TimingSample::failed(role, SourceKind::Browser, Protocol::Https);
            }
        };
        let protocol = Protocol::from_url(&url);

        let start = Instant::now();
        let outcome = probe(&url, start, self.settings.request_timeout).await;
        let total = elapsed_ms(start);

        match outcome {
            Ok(outcome) => {
                // The protocol that counts is the one the chain ended on.
                let protocol = Protocol::from_url(&outcome.final_url);
                let entry = (outcome.timing_allowed || !self.settings.require_timing_allow)
                    .then_some(outcome.entry);
                let estimate = estimate(total, protocol, entry.as_ref(), &ProportionalEstimator);
                let metadata = self.metadata.lookup(&url, outcome.content_length).await;

                tracing::debug!(
                    role = %role,
                    url = %url,
                    status = outcome.status,
                    redirects = outcome.redirects,
                    total_ms = total,
                    estimated = estimate.is_estimated,
                    "Direct sample complete"
                );

                TimingSample::measured(role, SourceKind::Browser, protocol, total, estimate)
                    .with_size(metadata.size_label)
                    .with_address(metadata.address)
                    .with_tested_url(url.as_str())
                    .with_source_metadata(SourceMetadata {
                        user_agent: USER_AGENT.to_string(),
                        timing_available: outcome.timing_allowed,
                    })
            }
            Err(e) => {
                tracing::warn!(role = %role, url = %url, error = %e, "Direct sample failed");
                TimingSample::failed(role, SourceKind::Browser, protocol).with_tested_url(url.as_str())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DelayRange;
    use crate::infra::MemoryCounterStore;
    use crate::measure::types::FAILED_TOTAL_MS;
    use crate::routes::router;
    use crate::state::AppState;
    use axum::{http::HeaderValue, response::Redirect, routing::get, Router};
    use std::net::SocketAddr;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        addr
    }

    fn closed_port() -> SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    fn test_config(base_url: String, mode: SamplerMode) -> Config {
        let mut config = Config::default();
        config.sampler_mode = mode;
        config.simulation_base_url = base_url;
        config.doh_endpoint = format!("http://{}/resolve", closed_port());
        config.dns_timeout = Duration::from_millis(200);
        config.request_timeout = Duration::from_secs(5);
        config.edge_delay = DelayRange::new(0, 0);
        config.origin_delay = DelayRange::new(30, 30);
        config
    }

    fn sampler_for(config: &Config) -> HttpSampler {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let resolver = Arc::new(DohResolver::new(
            client.clone(),
            config.doh_endpoint.clone(),
            config.dns_timeout,
        ));
        HttpSampler::new(SamplerSettings::from_config(config), client, resolver)
    }

    /// Serves the real router and returns a sampler pointed at it.
    async fn proxied_sampler() -> HttpSampler {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = test_config(format!("http://{}", addr), SamplerMode::Proxied);
        let sampler = sampler_for(&config);
        let state = AppState::new(config, Arc::new(MemoryCounterStore::new())).unwrap();
        tokio::spawn(async move { axum::serve(listener, router(state)).await });
        sampler
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("proxied".parse::<SamplerMode>(), Ok(SamplerMode::Proxied));
        assert_eq!("Client-Direct".parse::<SamplerMode>(), Ok(SamplerMode::Direct));
        assert!("both".parse::<SamplerMode>().is_err());
    }

    #[tokio::test]
    async fn test_proxied_simulation_mode() {
        let sampler = proxied_sampler().await;

        let edge = sampler.sample(None, Role::Edge).await;
        assert!(!edge.failed);
        assert!(edge.is_estimated);
        assert_eq!(edge.source_kind, SourceKind::Worker);
        assert_eq!(edge.size_label, "1.2kb");
        assert_eq!(edge.resolved_address.as_deref(), Some("1.1.1.1"));
        assert_eq!(edge.tested_url.as_deref(), Some(SIMULATION_MODE));
        assert_eq!(edge.breakdown.total(), edge.total_time_ms);

        let origin = sampler.sample(None, Role::Origin).await;
        assert!(!origin.failed);
        assert_eq!(origin.label, "Origin Server");
        assert!(origin.total_time_ms >= 30);
        assert_eq!(origin.breakdown.total(), origin.total_time_ms);
    }

    #[tokio::test]
    async fn test_proxied_with_unreachable_target() {
        let sampler = proxied_sampler().await;
        let target = format!("http://{}/", closed_port());

        let sample = sampler.sample(Some(&target), Role::Origin).await;
        assert!(!sample.failed);
        assert_eq!(sample.protocol, Protocol::Http);
        assert_eq!(sample.breakdown.tls, 0);
        assert_eq!(sample.size_label, "256kb");
        assert_eq!(sample.resolved_address.as_deref(), Some("127.0.0.1"));
        assert_eq!(sample.tested_url.as_deref(), Some(target.as_str()));
    }

    #[tokio::test]
    async fn test_proxied_endpoint_down() {
        let config = test_config(format!("http://{}", closed_port()), SamplerMode::Proxied);
        let sampler = sampler_for(&config);

        let sample = sampler.sample(Some("example.com"), Role::Edge).await;
        assert!(sample.failed);
        assert_eq!(sample.total_time_ms, FAILED_TOTAL_MS);
        assert_eq!(sample.breakdown.wait, 600);
        assert_eq!(sample.tested_url.as_deref(), Some("https://example.com/"));
    }

    #[tokio::test]
    async fn test_direct_precise_timing() {
        let app = Router::new().route(
            "/",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(25)).await;
                "x".repeat(4608)
            }),
        );
        let addr = serve(app).await;
        let config = test_config(String::new(), SamplerMode::Direct);
        let sampler = sampler_for(&config);
        let target = format!("http://{}/", addr);

        let sample = sampler.sample(Some(&target), Role::Origin).await;
        assert!(!sample.failed);
        assert!(!sample.is_estimated);
        assert_eq!(sample.source_kind, SourceKind::Browser);
        assert_eq!(sample.protocol, Protocol::Http);
        assert_eq!(sample.breakdown.tls, 0);
        assert!(sample.breakdown.wait >= 20);
        assert!(sample.breakdown.download >= 1);
        assert!(sample.total_time_ms >= 25);
        assert_eq!(sample.size_label, "4.5kb");
        assert_eq!(sample.resolved_address.as_deref(), Some("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_direct_requires_timing_opt_in() {
        let app = Router::new()
            .route("/closed", get(|| async { "no timing for you" }))
            .route(
                "/open",
                get(|| async { ([("timing-allow-origin", HeaderValue::from_static("*"))], "ok") }),
            );
        let addr = serve(app).await;
        let mut config = test_config(String::new(), SamplerMode::Direct);
        config.require_timing_allow = true;
        let sampler = sampler_for(&config);

        let closed = sampler
            .sample(Some(&format!("http://{}/closed", addr)), Role::Edge)
            .await;
        assert!(!closed.failed);
        assert!(closed.is_estimated);
        assert_eq!(closed.breakdown.total(), closed.total_time_ms);
        let metadata = closed.source_metadata.unwrap();
        assert!(!metadata.timing_available);
        assert!(metadata.user_agent.starts_with("speedscale/"));

        let open = sampler
            .sample(Some(&format!("http://{}/open", addr)), Role::Edge)
            .await;
        assert!(!open.is_estimated);
        assert_eq!(open.source_metadata.map(|m| m.timing_available), Some(true));
    }

    #[tokio::test]
    async fn test_direct_measures_redirect_destination() {
        let app = Router::new()
            .route("/", get(|| async { Redirect::permanent("/final") }))
            .route(
                "/final",
                get(|| async {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    "x".repeat(4608)
                }),
            );
        let addr = serve(app).await;
        let config = test_config(String::new(), SamplerMode::Direct);
        let sampler = sampler_for(&config);
        let target = format!("http://{}/", addr);

        let sample = sampler.sample(Some(&target), Role::Origin).await;
        assert!(!sample.failed);
        assert!(!sample.is_estimated);
        assert_eq!(sample.size_label, "4.5kb");
        assert!(sample.total_time_ms >= 30);
        assert!(sample.breakdown.wait >= 25);
        assert_eq!(sample.tested_url.as_deref(), Some(target.as_str()));
    }

    #[tokio::test]
    async fn test_direct_failure_is_absorbed() {
        let config = test_config(String::new(), SamplerMode::Direct);
        let sampler = sampler_for(&config);
        let target = format!("http://{}/", closed_port());

        let sample = sampler.sample(Some(&target), Role::Edge).await;
        assert!(sample.failed);
        assert!(sample.total_time_ms >= 1);
        assert_eq!(sample.protocol, Protocol::Http);
        assert_eq!(sample.breakdown.tls, 0);
        assert_eq!(sample.breakdown.total(), FAILED_TOTAL_MS);
    }

    #[tokio::test]
    async fn test_with_mode() {
        let config = test_config(String::new(), SamplerMode::Proxied);
        let sampler = sampler_for(&config);
        assert_eq!(sampler.mode(), SamplerMode::Proxied);
        assert_eq!(sampler.with_mode(SamplerMode::Direct).mode(), SamplerMode::Direct);
    }
}
