//! Phase-by-phase timing of a single direct request.
//!
//! Records instants as the request moves through DNS, connect, TLS,
//! request, first byte and body, then turns them into a
//! [`ResourceTimingEntry`] with millisecond offsets from the start.

use crate::measure::types::ResourceTimingEntry;
use std::time::Instant;

/// Instants recorded while a direct request is in flight.
#[derive(Debug)]
pub struct DetailedTiming {
    pub dns_start: Option<Instant>,
    pub dns_end: Option<Instant>,
    pub tcp_start: Option<Instant>,
    pub tcp_end: Option<Instant>,
    pub tls_start: Option<Instant>,
    pub tls_end: Option<Instant>,
    pub request_start: Option<Instant>,
    pub response_start: Option<Instant>,
    pub response_end: Option<Instant>,
    pub total_start: Instant,
}

impl DetailedTiming {
    /// Creates a new `DetailedTiming` with the start instant set to now.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Creates a new `DetailedTiming` anchored at `total_start`.
    pub fn starting_at(total_start: Instant) -> Self {
        Self {
            dns_start: None,
            dns_end: None,
            tcp_start: None,
            tcp_end: None,
            tls_start: None,
            tls_end: None,
            request_start: None,
            response_start: None,
            response_end: None,
            total_start,
        }
    }

    fn offset(&self, instant: Option<Instant>) -> f64 {
        instant
            .map(|i| i.duration_since(self.total_start).as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }

    /// Converts the recorded instants into a resource timing entry.
    ///
    /// `connect_end` covers the TLS handshake when one took place, matching
    /// how browsers report it. Phases that never started stay at 0.
    pub fn to_resource_entry(&self) -> ResourceTimingEntry {
        let end = self.response_end.unwrap_or_else(Instant::now);

        ResourceTimingEntry {
            duration: self.offset(Some(end)),
            domain_lookup_start: self.offset(self.dns_start),
            domain_lookup_end: self.offset(self.dns_end),
            connect_start: self.offset(self.tcp_start),
            connect_end: self.offset(self.tls_end.or(self.tcp_end)),
            secure_connection_start: self.offset(self.tls_start),
            request_start: self.offset(self.request_start),
            response_start: self.offset(self.response_start),
            response_end: self.offset(Some(end)),
        }
    }

    pub fn start_dns(&mut self) {
        self.dns_start = Some(Instant::now());
    }

    pub fn end_dns(&mut self) {
        self.dns_end = Some(Instant::now());
    }

    pub fn start_tcp(&mut self) {
        self.tcp_start = Some(Instant::now());
    }

    pub fn end_tcp(&mut self) {
        self.tcp_end = Some(Instant::now());
    }

    pub fn start_tls(&mut self) {
        self.tls_start = Some(Instant::now());
    }

    pub fn end_tls(&mut self) {
        self.tls_end = Some(Instant::now());
    }

    /// Marks the moment the request is handed to the connection.
    pub fn start_request(&mut self) {
        self.request_start = Some(Instant::now());
    }

    /// Marks the arrival of the response head.
    pub fn mark_response_start(&mut self) {
        self.response_start = Some(Instant::now());
    }

    /// Marks the last body byte.
    pub fn mark_response_end(&mut self) {
        self.response_end = Some(Instant::now());
    }
}

impl Default for DetailedTiming {
    fn default() -> Self {
        Self::new()
    }
}
