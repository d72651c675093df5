//! Infrastructure layer providing abstractions for external dependencies.
//!
//! This module contains traits and implementations for:
//! - DNS resolution (system resolver and DNS-over-HTTPS)
//! - TLS client connections
//! - The global usage counter store

pub mod counter;
pub mod dns;
pub mod tls;

pub use counter::{CounterError, CounterStore, FileCounterStore, MemoryCounterStore};
pub use dns::{DnsResolver, DohResolver, HickoryDnsResolver};
pub use tls::{create_tls_config, RustlsTlsProvider, TlsProvider};
