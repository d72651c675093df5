//! Server-proxied simulation endpoints.
//!
//! `GET /api/simulate/{edge|origin}?url=` looks the target up (address via
//! DNS-over-HTTPS, size via a HEAD request), waits out a role-specific
//! synthetic delay and reports what it found. Lookup failures fall back to
//! role defaults instead of failing the request.

use crate::error::AppError;
use crate::measure::{ApiResponse, Protocol, Role, SimulationData, SIMULATION_MODE};
use crate::shared::{content_length, normalize_target, size_label};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;

#[derive(Debug, Deserialize)]
pub struct SimulateQuery {
    pub url: Option<String>,
}

pub async fn simulate(
    State(state): State<AppState>,
    Path(role): Path<String>,
    Query(query): Query<SimulateQuery>,
) -> Result<Json<ApiResponse<SimulationData>>, AppError> {
    let role: Role = role.parse().map_err(AppError::UnknownRole)?;

    // Unusable targets degrade to Simulation Mode.
    let target = query
        .url
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .and_then(|raw| normalize_target(raw).ok());

    let delay = state.config.delay_for(role).sample(&mut rand::thread_rng());

    let (size, resolved_ip) = match &target {
        Some(url) => {
            let host = url.host_str().unwrap_or_default();
            let (ip, size) = tokio::join!(
                state.resolver.resolve_first(host),
                head_size(&state.http, url, role)
            );
            let ip = ip
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| role.default_address().to_string());
            (size, ip)
        }
        None => (
            role.simulation_size().to_string(),
            role.default_address().to_string(),
        ),
    };

    tokio::time::sleep(delay).await;

    tracing::debug!(
        role = %role,
        url = ?target.as_ref().map(Url::as_str),
        delay_ms = delay.as_millis() as u64,
        "Simulation served"
    );

    Ok(Json(ApiResponse::success(SimulationData {
        source: role.label().to_string(),
        size,
        resolved_ip,
        protocol: target.as_ref().map(Protocol::from_url).unwrap_or(Protocol::Https),
        tested_url: target
            .map(|url| url.to_string())
            .unwrap_or_else(|| SIMULATION_MODE.to_string()),
        timestamp: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64,
        latency_injected: delay.as_millis() as u64,
    })))
}

/// Payload size advertised by the target, following redirects.
async fn head_size(client: &reqwest::Client, url: &Url, role: Role) -> String {
    match client.head(url.as_str()).send().await {
        Ok(response) => content_length(response.headers())
            .map(size_label)
            .unwrap_or_else(|| role.unreported_size().to_string()),
        Err(e) => {
            tracing::warn!(role = %role, url = %url, error = %e, "HEAD request to target failed");
            role.unreported_size().to_string()
        }
    }
}
