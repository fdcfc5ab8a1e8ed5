use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use labstock_core::CategoryId;
use labstock_inventory::CategoryDraft;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/:id", put(update_category).delete(delete_category))
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.store.list_categories().await {
        Ok(categories) => {
            let body: Vec<_> = categories.into_iter().map(dto::category_to_json).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::NameRequest>,
) -> axum::response::Response {
    let draft = match CategoryDraft::new(&body.name) {
        Ok(d) => d,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store.create_category(&draft).await {
        Ok(c) => (StatusCode::CREATED, Json(dto::category_to_json(c))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn update_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::NameRequest>,
) -> axum::response::Response {
    let id: CategoryId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let draft = match CategoryDraft::new(&body.name) {
        Ok(d) => d,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store.update_category(id, &draft).await {
        Ok(c) => (StatusCode::OK, Json(dto::category_to_json(c))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CategoryId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.store.delete_category(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
