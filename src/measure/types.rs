use serde::{Deserialize, Serialize};
use std::fmt;

/// Size label used when no payload size could be determined.
pub const UNKNOWN_SIZE: &str = "Unknown";

/// Address label used when the target host could not be resolved.
pub const UNRESOLVED_ADDRESS: &str = "N/A";

/// Tested-URL label for runs without a user supplied target.
pub const SIMULATION_MODE: &str = "Simulation Mode";

/// Nominal duration reported by failed samples.
pub const FAILED_TOTAL_MS: u64 = 1000;

/// Which side of the comparison a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Edge,
    Origin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Edge => "edge",
            Role::Origin => "origin",
        }
    }

    /// Display label shown next to the sample.
    pub fn label(self) -> &'static str {
        match self {
            Role::Edge => "Cloudflare Edge",
            Role::Origin => "Origin Server",
        }
    }

    /// Address reported by the simulation endpoint when resolution fails.
    pub fn default_address(self) -> &'static str {
        match self {
            Role::Edge => "1.1.1.1",
            Role::Origin => "8.8.8.8",
        }
    }

    /// Payload size reported in Simulation Mode.
    pub fn simulation_size(self) -> &'static str {
        match self {
            Role::Edge => "1.2kb",
            Role::Origin => "256kb",
        }
    }

    /// Payload size reported when a real target sends no `content-length`.
    pub fn unreported_size(self) -> &'static str {
        match self {
            Role::Edge => "4.5kb",
            Role::Origin => "256kb",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "edge" => Ok(Role::Edge),
            "origin" => Ok(Role::Origin),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn from_url(url: &url::Url) -> Self {
        if url.scheme() == "https" {
            Protocol::Https
        } else {
            Protocol::Http
        }
    }

    pub fn is_secure(self) -> bool {
        self == Protocol::Https
    }
}

/// Which request path produced a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Timed against the server-side simulation endpoint.
    Worker,
    /// Timed directly against the target.
    Browser,
}

/// Five-phase latency breakdown in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LatencyBreakdown {
    pub dns: u64,
    pub connect: u64,
    pub tls: u64,
    pub wait: u64,
    pub download: u64,
}

impl LatencyBreakdown {
    pub fn total(&self) -> u64 {
        self.dns + self.connect + self.tls + self.wait + self.download
    }

    /// Everything up to the first response byte.
    pub fn ttfb(&self) -> u64 {
        self.dns + self.connect + self.tls + self.wait
    }

    /// Fixed breakdown carried by failed samples. Sums to [`FAILED_TOTAL_MS`].
    pub fn placeholder(protocol: Protocol) -> Self {
        if protocol.is_secure() {
            Self { dns: 100, connect: 100, tls: 100, wait: 600, download: 100 }
        } else {
            Self { dns: 100, connect: 100, tls: 0, wait: 600, download: 200 }
        }
    }
}

/// Sub-phase timestamps of a single request, in milliseconds relative to its start.
///
/// Mirrors the fields of a W3C `PerformanceResourceTiming` entry. A zero
/// `secure_connection_start` means no TLS handshake took place.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTimingEntry {
    pub duration: f64,
    pub domain_lookup_start: f64,
    pub domain_lookup_end: f64,
    pub connect_start: f64,
    pub connect_end: f64,
    pub secure_connection_start: f64,
    pub request_start: f64,
    pub response_start: f64,
    pub response_end: f64,
}

impl ResourceTimingEntry {
    /// Whether the entry carries real sub-phase data.
    pub fn is_detailed(&self) -> bool {
        self.duration > 0.0 && self.request_start > 0.0
    }
}

/// Result of the breakdown estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Estimate {
    pub breakdown: LatencyBreakdown,
    pub is_estimated: bool,
}

/// One measured (or placeholder) request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingSample {
    pub label: String,
    #[serde(rename = "totalTime")]
    pub total_time_ms: u64,
    #[serde(rename = "ttfb")]
    pub ttfb_ms: u64,
    #[serde(rename = "duration")]
    pub transfer_ms: u64,
    pub breakdown: LatencyBreakdown,
    #[serde(rename = "size")]
    pub size_label: String,
    #[serde(rename = "resolvedIP", skip_serializing_if = "Option::is_none")]
    pub resolved_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tested_url: Option<String>,
    #[serde(rename = "source")]
    pub source_kind: SourceKind,
    pub protocol: Protocol,
    #[serde(rename = "error")]
    pub failed: bool,
    pub is_estimated: bool,
    #[serde(rename = "browserMetadata", skip_serializing_if = "Option::is_none")]
    pub source_metadata: Option<SourceMetadata>,
}

/// Client-side details attached to direct samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMetadata {
    pub user_agent: String,
    /// The target opted into detailed timing with `Timing-Allow-Origin`.
    pub timing_available: bool,
}

impl TimingSample {
    /// Builds a sample from a measured total and its breakdown.
    pub fn measured(
        role: Role,
        source_kind: SourceKind,
        protocol: Protocol,
        total_time_ms: u64,
        estimate: Estimate,
    ) -> Self {
        Self {
            label: role.label().to_string(),
            total_time_ms: total_time_ms.max(1),
            ttfb_ms: estimate.breakdown.ttfb(),
            transfer_ms: estimate.breakdown.download,
            breakdown: estimate.breakdown,
            size_label: UNKNOWN_SIZE.to_string(),
            resolved_address: None,
            tested_url: None,
            source_kind,
            protocol,
            failed: false,
            is_estimated: estimate.is_estimated,
            source_metadata: None,
        }
    }

    /// Placeholder sample for a request that could not be completed.
    pub fn failed(role: Role, source_kind: SourceKind, protocol: Protocol) -> Self {
        let breakdown = LatencyBreakdown::placeholder(protocol);
        let mut sample = Self::measured(
            role,
            source_kind,
            protocol,
            FAILED_TOTAL_MS,
            Estimate { breakdown, is_estimated: true },
        );
        sample.failed = true;
        sample
    }

    pub fn with_size(mut self, size_label: impl Into<String>) -> Self {
        self.size_label = size_label.into();
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.resolved_address = Some(address.into());
        self
    }

    pub fn with_tested_url(mut self, tested_url: impl Into<String>) -> Self {
        self.tested_url = Some(tested_url.into());
        self
    }

    pub fn with_source_metadata(mut self, metadata: SourceMetadata) -> Self {
        self.source_metadata = Some(metadata);
        self
    }
}

/// An edge sample paired with an origin sample.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub edge: TimingSample,
    pub origin: TimingSample,
    pub speedup: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_url: Option<String>,
}

/// Lowest speedup ever reported.
pub const MIN_SPEEDUP: f64 = 0.1;

/// `origin / edge`, rounded to one decimal.
///
/// Non-finite ratios (a zero edge total) collapse to 1.0 and the result is
/// never below [`MIN_SPEEDUP`].
pub fn speedup_ratio(edge_total_ms: u64, origin_total_ms: u64) -> f64 {
    let ratio = origin_total_ms as f64 / edge_total_ms as f64;
    if !ratio.is_finite() {
        return 1.0;
    }
    let rounded = (ratio * 10.0).round() / 10.0;
    rounded.max(MIN_SPEEDUP)
}

/// JSON envelope shared by every API endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Payload of the simulation endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationData {
    pub source: String,
    pub size: String,
    #[serde(rename = "resolvedIP")]
    pub resolved_ip: String,
    pub tested_url: String,
    pub protocol: Protocol,
    pub timestamp: u64,
    #[serde(rename = "latency_injected", default)]
    pub latency_injected: u64,
}
