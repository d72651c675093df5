use crate::error::AppError;
use crate::measure::{combiner, ApiResponse, ComparisonResult, SamplerMode};
use crate::shared::normalize_target;
use crate::state::AppState;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareQuery {
    pub url: Option<String>,
    pub origin_url: Option<String>,
    pub mode: Option<String>,
}

fn validated(raw: Option<&str>) -> Result<Option<String>, AppError> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => Ok(None),
        Some(raw) => normalize_target(raw)
            .map(|url| Some(url.to_string()))
            .map_err(AppError::InvalidUrl),
    }
}

fn requested_mode(raw: Option<&str>) -> Result<Option<SamplerMode>, AppError> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| AppError::InvalidMode(raw.to_string())),
    }
}

/// Runs one edge vs. origin comparison.
pub async fn compare(
    State(state): State<AppState>,
    query: Result<Query<CompareQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<ComparisonResult>>, AppError> {
    let Query(query) = query?;
    let target = validated(query.url.as_deref())?;
    let origin_target = validated(query.origin_url.as_deref())?;
    let mode = requested_mode(query.mode.as_deref())?;

    let sampler = match mode {
        Some(mode) if mode != state.sampler.mode() => Arc::new(state.sampler.with_mode(mode)),
        _ => state.sampler.clone(),
    };

    tracing::info!(url = ?target, mode = %sampler.mode(), "Running comparison");

    let result = combiner::compare(
        sampler.as_ref(),
        state.counter.clone(),
        target.as_deref(),
        origin_target.as_deref(),
    )
    .await;

    Ok(Json(ApiResponse::success(result)))
}
