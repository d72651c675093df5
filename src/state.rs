use crate::config::Config;
use crate::error::AppError;
use crate::infra::{CounterStore, DohResolver};
use crate::measure::probe::USER_AGENT;
use crate::measure::{HttpSampler, SamplerSettings};
use std::sync::Arc;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Client for HEAD probes against tested targets.
    pub http: reqwest::Client,
    pub resolver: Arc<DohResolver>,
    pub counter: Arc<dyn CounterStore>,
    pub sampler: Arc<HttpSampler>,
}

impl AppState {
    pub fn new(config: Config, counter: Arc<dyn CounterStore>) -> Result<Self, AppError> {
        // Measurements go straight to their targets, never through a system proxy.
        let http = reqwest::Client::builder()
            .no_proxy()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let resolver = Arc::new(DohResolver::new(
            http.clone(),
            config.doh_endpoint.clone(),
            config.dns_timeout,
        ));

        let sampler = Arc::new(HttpSampler::new(
            SamplerSettings::from_config(&config),
            http.clone(),
            resolver.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            http,
            resolver,
            counter,
            sampler,
        })
    }
}
