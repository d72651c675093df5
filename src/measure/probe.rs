//! Direct request execution with phase-by-phase timing.
//!
//! Drives DNS, TCP, TLS and an HTTP/1.1 exchange by hand so each phase
//! boundary can be recorded into a [`ResourceTimingEntry`]. Redirects are
//! followed over a fresh connection per hop; like Resource Timing, the entry
//! stays anchored at the original start and its phases describe the final
//! hop.

use super::types::ResourceTimingEntry;
use crate::infra::dns::resolve_dns;
use crate::infra::tls::{connect_tls, RustlsTlsProvider, TlsProvider};
use crate::shared::{content_length, DetailedTiming};
use http_body_util::{BodyExt, Empty};
use hyper::{
    body::Bytes,
    header::{self, HeaderMap},
    Method, Request,
};
use hyper_util::rt::TokioIo;
use std::{
    net::{IpAddr, SocketAddr},
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    time::timeout,
};
use url::Url;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    Dns(String),

    #[error("TCP connection failed: {0}")]
    Connect(#[from] std::io::Error),

    #[error("{0}")]
    Tls(String),

    #[error("HTTP exchange failed: {0}")]
    Http(#[from] hyper::Error),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("Too many redirects (more than {0})")]
    TooManyRedirects(usize),
}

/// User agent sent by direct samples and server-side lookups.
pub const USER_AGENT: &str = concat!("speedscale/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow.
pub const MAX_REDIRECTS: usize = 20;

/// What a direct request observed.
#[derive(Debug)]
pub struct ProbeOutcome {
    pub status: u16,
    pub entry: ResourceTimingEntry,
    pub server_ip: IpAddr,
    pub content_length: Option<u64>,
    /// The target opted into exposing detailed timing.
    pub timing_allowed: bool,
    pub body_bytes: usize,
    /// URL of the response that ended the chain.
    pub final_url: Url,
    pub redirects: usize,
}

/// Response of a single hop.
struct Hop {
    status: u16,
    headers: HeaderMap,
    server_ip: IpAddr,
    body_bytes: usize,
}

impl Hop {
    /// Where a 3xx response points, resolved against the URL it answered.
    fn redirect_target(&self, current: &Url) -> Option<Url> {
        if !(300..400).contains(&self.status) {
            return None;
        }
        let location = self.headers.get(header::LOCATION)?.to_str().ok()?;
        current
            .join(location)
            .ok()
            .filter(|next| matches!(next.scheme(), "http" | "https"))
    }
}

struct Target {
    host: String,
    port: u16,
    authority: String,
    path_and_query: String,
    is_https: bool,
}

impl Target {
    fn from_url(url: &Url) -> Result<Self, ProbeError> {
        let host = url
            .host_str()
            .ok_or_else(|| ProbeError::InvalidUrl("URL has no host".to_string()))?
            .to_string();

        let is_https = url.scheme() == "https";
        let default_port = if is_https { 443 } else { 80 };
        let port = url.port().unwrap_or(default_port);

        let authority = if port == default_port {
            host.clone()
        } else {
            format!("{}:{}", host, port)
        };

        let mut path_and_query = url.path().to_string();
        if path_and_query.is_empty() {
            path_and_query.push('/');
        }
        if let Some(query) = url.query() {
            path_and_query.push('?');
            path_and_query.push_str(query);
        }

        // Connect and SNI use the bare host, without IPv6 brackets.
        let host = host.trim_start_matches('[').trim_end_matches(']').to_string();

        Ok(Self {
            host,
            port,
            authority,
            path_and_query,
            is_https,
        })
    }
}

/// Performs a no-cache GET against `url`, timing every phase from `started`.
pub async fn probe(
    url: &Url,
    started: Instant,
    request_timeout: Duration,
) -> Result<ProbeOutcome, ProbeError> {
    probe_with(&RustlsTlsProvider, url, started, request_timeout).await
}

/// [`probe`] with an explicit TLS configuration source.
pub async fn probe_with<P: TlsProvider + ?Sized>(
    tls: &P,
    url: &Url,
    started: Instant,
    request_timeout: Duration,
) -> Result<ProbeOutcome, ProbeError> {
    let mut current = url.clone();
    let mut redirects = 0;

    loop {
        // Each hop starts from a clean slate so a final plain-HTTP hop
        // carries no TLS marks from an earlier one.
        let mut timing = DetailedTiming::starting_at(started);
        let hop = fetch_hop(tls, &current, request_timeout, &mut timing).await?;

        if let Some(next) = hop.redirect_target(&current) {
            if redirects >= MAX_REDIRECTS {
                return Err(ProbeError::TooManyRedirects(MAX_REDIRECTS));
            }
            redirects += 1;
            tracing::debug!(
                from = %current,
                to = %next,
                status = hop.status,
                "Following redirect"
            );
            current = next;
            continue;
        }

        tracing::debug!(
            url = %current,
            ip = %hop.server_ip,
            status = hop.status,
            bytes = hop.body_bytes,
            redirects,
            "Direct request completed"
        );

        return Ok(ProbeOutcome {
            status: hop.status,
            entry: timing.to_resource_entry(),
            server_ip: hop.server_ip,
            content_length: content_length(&hop.headers),
            timing_allowed: hop.headers.contains_key("timing-allow-origin"),
            body_bytes: hop.body_bytes,
            final_url: current,
            redirects,
        });
    }
}

/// One request over a fresh DNS lookup, TCP connection and TLS session.
async fn fetch_hop<P: TlsProvider + ?Sized>(
    tls: &P,
    url: &Url,
    request_timeout: Duration,
    timing: &mut DetailedTiming,
) -> Result<Hop, ProbeError> {
    let target = Target::from_url(url)?;

    timing.start_dns();
    let dns_result = resolve_dns(&target.host).await.map_err(ProbeError::Dns)?;
    timing.end_dns();

    let server_ip = dns_result
        .ips
        .first()
        .copied()
        .ok_or_else(|| ProbeError::Dns("DNS lookup returned no addresses".to_string()))?;
    let addr = SocketAddr::new(server_ip, target.port);

    timing.start_tcp();
    let tcp_stream = timeout(request_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| ProbeError::Timeout("TCP connection"))??;
    timing.end_tcp();

    let (status, headers, body_bytes) = if target.is_https {
        timing.start_tls();
        let tls_stream = timeout(request_timeout, connect_tls(tls, tcp_stream, &target.host))
            .await
            .map_err(|_| ProbeError::Timeout("TLS handshake"))?
            .map_err(ProbeError::Tls)?;
        timing.end_tls();

        exchange(tls_stream, &target, request_timeout, timing).await?
    } else {
        exchange(tcp_stream, &target, request_timeout, timing).await?
    };

    Ok(Hop {
        status,
        headers,
        server_ip,
        body_bytes,
    })
}

/// Sends the request over an established stream and drains the body.
async fn exchange<S>(
    stream: S,
    target: &Target,
    request_timeout: Duration,
    timing: &mut DetailedTiming,
) -> Result<(u16, HeaderMap, usize), ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!("Connection closed with error: {}", e);
        }
    });

    let request = Request::builder()
        .method(Method::GET)
        .uri(target.path_and_query.as_str())
        .header(header::HOST, target.authority.as_str())
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::PRAGMA, "no-cache")
        .header(header::ACCEPT, "*/*")
        .header(header::USER_AGENT, USER_AGENT)
        .body(Empty::<Bytes>::new())
        .map_err(|e| ProbeError::InvalidUrl(e.to_string()))?;

    timing.start_request();
    let response = timeout(request_timeout, sender.send_request(request))
        .await
        .map_err(|_| ProbeError::Timeout("Request"))??;
    timing.mark_response_start();

    let status = response.status().as_u16();
    let headers = response.headers().clone();

    let body = timeout(request_timeout, response.into_body().collect())
        .await
        .map_err(|_| ProbeError::Timeout("Body read"))??
        .to_bytes();
    timing.mark_response_end();

    Ok((status, headers, body.len()))
}
