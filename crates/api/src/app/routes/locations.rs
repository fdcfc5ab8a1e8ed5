use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use labstock_core::LocationId;
use labstock_inventory::LocationDraft;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_locations).post(create_location))
        .route("/:id", put(update_location).delete(delete_location))
}

pub async fn list_locations(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.store.list_locations().await {
        Ok(locations) => {
            let body: Vec<_> = locations.into_iter().map(dto::location_to_json).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create_location(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::NameRequest>,
) -> axum::response::Response {
    let draft = match LocationDraft::new(&body.name) {
        Ok(d) => d,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store.create_location(&draft).await {
        Ok(l) => (StatusCode::CREATED, Json(dto::location_to_json(l))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Renames only the location row; materials keep the name they were stored with.
pub async fn update_location(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::NameRequest>,
) -> axum::response::Response {
    let id: LocationId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let draft = match LocationDraft::new(&body.name) {
        Ok(d) => d,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store.update_location(id, &draft).await {
        Ok(l) => (StatusCode::OK, Json(dto::location_to_json(l))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_location(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: LocationId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.store.delete_location(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
