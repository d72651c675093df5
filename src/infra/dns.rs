//! DNS resolution infrastructure.
//!
//! Two resolvers share the [`DnsResolver`] trait: the system resolver used
//! to time the lookup phase of direct samples, and a DNS-over-HTTPS client
//! used to display the address of a tested host.

use hickory_resolver::{config::*, TokioAsyncResolver};
use serde::Deserialize;
use std::{
    net::IpAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{sync::OnceCell, time::timeout};

/// DNS resolution result containing resolved IPs and timing information.
#[derive(Debug)]
pub struct DnsResult {
    /// List of resolved IP addresses.
    pub ips: Vec<IpAddr>,
    /// Time taken for DNS resolution in milliseconds.
    pub duration_ms: u64,
}

/// Trait for DNS resolution.
#[allow(async_fn_in_trait)]
pub trait DnsResolver: Send + Sync {
    /// Resolves a hostname to a list of IP addresses.
    async fn resolve(&self, host: &str) -> Result<DnsResult, String>;
}

fn literal(host: &str) -> Option<DnsResult> {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    bare.parse::<IpAddr>().ok().map(|ip| DnsResult {
        ips: vec![ip],
        duration_ms: 0,
    })
}

/// Global DNS resolver instance for connection reuse.
static DNS_RESOLVER: OnceCell<Arc<TokioAsyncResolver>> = OnceCell::const_new();

async fn get_resolver() -> Arc<TokioAsyncResolver> {
    DNS_RESOLVER
        .get_or_init(|| async {
            Arc::new(TokioAsyncResolver::tokio(
                ResolverConfig::default(),
                ResolverOpts::default(),
            ))
        })
        .await
        .clone()
}

/// Resolver backed by hickory-resolver.
#[derive(Default)]
pub struct HickoryDnsResolver;

impl HickoryDnsResolver {
    pub fn new() -> Self {
        Self
    }
}

impl DnsResolver for HickoryDnsResolver {
    async fn resolve(&self, host: &str) -> Result<DnsResult, String> {
        if let Some(result) = literal(host) {
            return Ok(result);
        }

        let start = Instant::now();
        let resolver = get_resolver().await;
        match resolver.lookup_ip(host).await {
            Ok(response) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                let ips: Vec<IpAddr> = response.iter().collect();
                if ips.is_empty() {
                    Err("DNS lookup returned no addresses".to_string())
                } else {
                    Ok(DnsResult { ips, duration_ms })
                }
            }
            Err(e) => Err(format!("DNS lookup failed: {}", e)),
        }
    }
}

/// Resolves `host` with the system resolver.
pub async fn resolve_dns(host: &str) -> Result<DnsResult, String> {
    HickoryDnsResolver::new().resolve(host).await
}

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    data: String,
}

/// DNS-over-HTTPS client speaking the JSON API (`?name=<host>&type=A`).
///
/// Every lookup is bounded by `timeout`; CNAME records in the answer are
/// skipped in favour of the first record that parses as an address.
#[derive(Debug, Clone)]
pub struct DohResolver {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl DohResolver {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        }
    }

    /// First resolved address, or `None` when the lookup failed or timed out.
    pub async fn resolve_first(&self, host: &str) -> Option<IpAddr> {
        match self.resolve(host).await {
            Ok(result) => result.ips.first().copied(),
            Err(e) => {
                tracing::debug!(host = %host, error = %e, "DNS-over-HTTPS resolution failed");
                None
            }
        }
    }

    async fn query(&self, host: &str) -> Result<DohResponse, String> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("name", host), ("type", "A")])
            .header(reqwest::header::ACCEPT, "application/dns-json")
            .send()
            .await
            .map_err(|e| format!("DNS-over-HTTPS request failed: {}", e))?
            .error_for_status()
            .map_err(|e| format!("DNS-over-HTTPS request failed: {}", e))?;

        response
            .json::<DohResponse>()
            .await
            .map_err(|e| format!("Invalid DNS-over-HTTPS answer: {}", e))
    }
}

impl DnsResolver for DohResolver {
    async fn resolve(&self, host: &str) -> Result<DnsResult, String> {
        if host.is_empty() {
            return Err("No host to resolve".to_string());
        }
        if let Some(result) = literal(host) {
            return Ok(result);
        }

        let start = Instant::now();
        let body = timeout(self.timeout, self.query(host))
            .await
            .map_err(|_| format!("DNS-over-HTTPS lookup timed out after {:?}", self.timeout))??;

        let ips: Vec<IpAddr> = body
            .answer
            .iter()
            .filter_map(|record| record.data.parse().ok())
            .collect();

        if ips.is_empty() {
            Err("DNS lookup returned no addresses".to_string())
        } else {
            Ok(DnsResult {
                ips,
                duration_ms: start.elapsed().as_millis() as u64,
            })
        }
    }
}
