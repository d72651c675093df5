//! Latency breakdown estimation.
//!
//! Converts either a precise [`ResourceTimingEntry`] or a bare total duration
//! into a [`LatencyBreakdown`]. Heuristic splits live behind the
//! [`BreakdownEstimator`] trait so a real sub-phase source can replace them
//! without touching callers.

use super::types::{Estimate, LatencyBreakdown, Protocol, ResourceTimingEntry};
use rand::Rng;

/// Produces a breakdown from nothing more than a total duration.
pub trait BreakdownEstimator: Send + Sync {
    fn estimate(&self, total_ms: u64, protocol: Protocol) -> LatencyBreakdown;
}

/// Fixed 10/10/10/60 split with `download` taking the remainder.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProportionalEstimator;

impl BreakdownEstimator for ProportionalEstimator {
    fn estimate(&self, total_ms: u64, protocol: Protocol) -> LatencyBreakdown {
        proportional_breakdown(total_ms, protocol)
    }
}

/// Warm-connection model for samples that went through the edge simulation:
/// small randomized handshake phases, remainder split 80/20 between wait and
/// download.
#[derive(Debug, Default, Clone, Copy)]
pub struct WarmConnectionEstimator;

impl BreakdownEstimator for WarmConnectionEstimator {
    fn estimate(&self, total_ms: u64, protocol: Protocol) -> LatencyBreakdown {
        warm_breakdown(total_ms, protocol, &mut rand::thread_rng())
    }
}

/// Proportional split of `total_ms` (floored at 1).
///
/// The fixed phases are floored, so their sum never exceeds 90% of the total
/// and `download` always ends up at least 1ms while the five phases add up to
/// the total exactly.
pub fn proportional_breakdown(total_ms: u64, protocol: Protocol) -> LatencyBreakdown {
    let total = total_ms.max(1);
    let dns = total / 10;
    let connect = total / 10;
    let tls = if protocol.is_secure() { total / 10 } else { 0 };
    let wait = total * 6 / 10;
    let download = total.saturating_sub(dns + connect + tls + wait).max(1);

    LatencyBreakdown {
        dns,
        connect,
        tls,
        wait,
        download,
    }
}

/// Warm-connection split of `total_ms` using `rng` for the handshake phases.
///
/// Totals too small to hold the drawn handshake phases fall back to
/// [`proportional_breakdown`].
pub fn warm_breakdown<R: Rng + ?Sized>(
    total_ms: u64,
    protocol: Protocol,
    rng: &mut R,
) -> LatencyBreakdown {
    let dns = rng.gen_range(1..=3);
    let connect = rng.gen_range(2..=5);
    let tls = if protocol.is_secure() {
        rng.gen_range(5..=10)
    } else {
        0
    };

    let handshake = dns + connect + tls;
    if total_ms < handshake + 2 {
        return proportional_breakdown(total_ms, protocol);
    }

    let remaining = total_ms - handshake;
    let wait = remaining * 8 / 10;

    LatencyBreakdown {
        dns,
        connect,
        tls,
        wait,
        download: remaining - wait,
    }
}

/// Breakdown read straight off a resource timing entry.
///
/// Each phase is the non-negative gap between adjacent timestamps. `connect`
/// spans the whole connection including TLS, as in the browser API.
pub fn precise_breakdown(entry: &ResourceTimingEntry, protocol: Protocol) -> LatencyBreakdown {
    let tls = if protocol.is_secure() && entry.secure_connection_start > 0.0 {
        span(entry.secure_connection_start, entry.connect_end)
    } else {
        0
    };

    LatencyBreakdown {
        dns: span(entry.domain_lookup_start, entry.domain_lookup_end),
        connect: span(entry.connect_start, entry.connect_end),
        tls,
        wait: span(entry.request_start, entry.response_start),
        download: span(entry.response_start, entry.response_end).max(1),
    }
}

fn span(start: f64, end: f64) -> u64 {
    (end - start).max(0.0).round() as u64
}

/// Chooses between the precise and the estimated path.
///
/// The precise path is taken only for entries that report a positive
/// duration and request start; everything else goes through `model`.
pub fn estimate(
    total_ms: u64,
    protocol: Protocol,
    precise: Option<&ResourceTimingEntry>,
    model: &dyn BreakdownEstimator,
) -> Estimate {
    match precise.filter(|entry| entry.is_detailed()) {
        Some(entry) => Estimate {
            breakdown: precise_breakdown(entry, protocol),
            is_estimated: false,
        },
        None => Estimate {
            breakdown: model.estimate(total_ms, protocol),
            is_estimated: true,
        },
    }
}
