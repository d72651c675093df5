use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
};
use crate::error::AppError;
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "frontend/"]
struct DashboardAssets;

/// Serves the embedded dashboard, falling back to `index.html` for unknown paths.
///
/// Unknown `/api` paths get the JSON error envelope instead of the page.
pub async fn serve_static(req: Request<Body>) -> Response {
    if req.uri().path() == "/api" || req.uri().path().starts_with("/api/") {
        return AppError::NotFound(req.uri().path().to_string()).into_response();
    }

    let path = req.uri().path().trim_start_matches('/');

    let candidates = [
        path.to_string(),
        format!("{}.html", path),
        format!("{}/index.html", path.trim_end_matches('/')),
        "index.html".to_string(),
    ];

    for candidate in candidates.iter().filter(|c| !c.is_empty()) {
        if let Some(content) = DashboardAssets::get(candidate) {
            return asset_response(candidate, content.data.into_owned());
        }
    }

    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

fn asset_response(path: &str, data: Vec<u8>) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let cache = if path.ends_with(".html") {
        "no-cache"
    } else {
        "public, max-age=31536000, immutable"
    };

    (
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (header::CACHE_CONTROL, cache.to_string()),
        ],
        data,
    )
        .into_response()
}
