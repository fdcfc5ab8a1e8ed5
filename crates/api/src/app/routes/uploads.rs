use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Extension, Path},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

pub fn router() -> Router {
    Router::new()
        .route("/", post(upload_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)))
        .route("/:name", get(get_image))
}

/// Stores the raw request body; `Content-Type` picks the file extension.
pub async fn upload_image(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    match services.images.save(content_type, &body).await {
        Ok(name) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "name": name,
                "url": dto::image_url(&name),
            })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_image(
    Extension(services): Extension<Arc<AppServices>>,
    Path(name): Path<String>,
) -> axum::response::Response {
    match services.images.read(&name).await {
        Ok((bytes, content_type)) => {
            (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
