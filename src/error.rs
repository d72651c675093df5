use crate::infra::CounterError;
use crate::measure::ApiResponse;
use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid sampler mode: {0} (expected proxied or direct)")]
    InvalidMode(String),

    #[error("Invalid query: {0}")]
    Query(#[from] QueryRejection),

    #[error("Unknown simulation role: {0}")]
    UnknownRole(String),

    #[error("No API route for {0}")]
    NotFound(String),

    #[error("Counter unavailable: {0}")]
    Counter(#[from] CounterError),

    #[error("HTTP client setup failed: {0}")]
    Client(#[from] reqwest::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidUrl(_) | AppError::InvalidMode(_) | AppError::Query(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::UnknownRole(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Counter(_) | AppError::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = Json(ApiResponse::<()>::error(self.to_string()));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_url_is_bad_request() {
        let response = AppError::InvalidUrl("unsupported scheme 'ftp'".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Invalid URL: unsupported scheme 'ftp'");
    }

    #[tokio::test]
    async fn test_counter_error_is_server_error() {
        let err = AppError::from(CounterError::Io(std::io::Error::other("disk full")));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("disk full"));
    }
}
