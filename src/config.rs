use crate::measure::{Role, SamplerMode};
use rand::Rng;
use std::{env, path::PathBuf, time::Duration};

/// Inclusive range of synthetic delays, written `min-max` (or a single value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (min, max) = match raw.split_once('-') {
            Some((min, max)) => (min.trim().parse().ok()?, max.trim().parse().ok()?),
            None => {
                let value = raw.trim().parse().ok()?;
                (value, value)
            }
        };
        (min <= max).then_some(Self::new(min, max))
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub sampler_mode: SamplerMode,
    /// Base URL the server-proxied sampler calls `/api/simulate/*` on.
    pub simulation_base_url: String,
    pub edge_default_target: String,
    pub origin_default_target: String,
    pub doh_endpoint: String,
    pub dns_timeout: Duration,
    pub request_timeout: Duration,
    /// Only trust direct timing entries when the target sends `Timing-Allow-Origin`.
    pub require_timing_allow: bool,
    pub edge_delay: DelayRange,
    pub origin_delay: DelayRange,
    pub counter_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let port = lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        Self {
            port,
            sampler_mode: lookup("SAMPLER_MODE")
                .and_then(|m| m.parse().ok())
                .unwrap_or(SamplerMode::Proxied),
            simulation_base_url: lookup("SIMULATION_BASE_URL")
                .unwrap_or_else(|| format!("http://127.0.0.1:{}", port)),
            edge_default_target: lookup("EDGE_DEFAULT_TARGET")
                .unwrap_or_else(|| "https://www.cloudflare.com/cdn-cgi/trace".to_string()),
            origin_default_target: lookup("ORIGIN_DEFAULT_TARGET")
                .unwrap_or_else(|| "https://example.com".to_string()),
            doh_endpoint: lookup("DOH_ENDPOINT")
                .unwrap_or_else(|| "https://dns.google/resolve".to_string()),
            dns_timeout: Duration::from_millis(parsed("DNS_TIMEOUT_MS").unwrap_or(2000)),
            request_timeout: Duration::from_millis(parsed("REQUEST_TIMEOUT_MS").unwrap_or(30000)),
            require_timing_allow: lookup("REQUIRE_TIMING_ALLOW")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            edge_delay: lookup("EDGE_DELAY_MS")
                .and_then(|v| DelayRange::parse(&v))
                .unwrap_or(DelayRange::new(5, 20)),
            origin_delay: lookup("ORIGIN_DELAY_MS")
                .and_then(|v| DelayRange::parse(&v))
                .unwrap_or(DelayRange::new(800, 1500)),
            counter_path: lookup("COUNTER_PATH").map(PathBuf::from),
        }
    }

    pub fn delay_for(&self, role: Role) -> DelayRange {
        match role {
            Role::Edge => self.edge_delay,
            Role::Origin => self.origin_delay,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
