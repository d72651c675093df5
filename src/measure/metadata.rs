//! Best-effort metadata for direct samples.

use super::types::{UNKNOWN_SIZE, UNRESOLVED_ADDRESS};
use crate::infra::DohResolver;
use crate::shared::size_label;
use std::sync::Arc;
use url::Url;

/// Address and payload size shown next to a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetMetadata {
    pub address: String,
    pub size_label: String,
}

/// Looks up display metadata for a target. Never fails: anything it cannot
/// determine comes back as a placeholder.
#[derive(Debug, Clone)]
pub struct MetadataProbe {
    resolver: Arc<DohResolver>,
}

impl MetadataProbe {
    pub fn new(resolver: Arc<DohResolver>) -> Self {
        Self { resolver }
    }

    pub async fn lookup(&self, url: &Url, content_length: Option<u64>) -> TargetMetadata {
        let address = match url.host_str() {
            Some(host) => self.resolver.resolve_first(host).await,
            None => None,
        };

        TargetMetadata {
            address: address
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| UNRESOLVED_ADDRESS.to_string()),
            size_label: content_length
                .map(size_label)
                .unwrap_or_else(|| UNKNOWN_SIZE.to_string()),
        }
    }
}
