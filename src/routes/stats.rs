use crate::error::AppError;
use crate::measure::ApiResponse;
use crate::state::AppState;
use axum::{extract::State, Json};

pub async fn get_stats(State(state): State<AppState>) -> Result<Json<ApiResponse<u64>>, AppError> {
    let value = state.counter.get_value().await?;
    Ok(Json(ApiResponse::success(value)))
}

pub async fn increment_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<u64>>, AppError> {
    let value = state.counter.increment().await?;
    tracing::debug!(value, "Usage counter incremented");
    Ok(Json(ApiResponse::success(value)))
}
