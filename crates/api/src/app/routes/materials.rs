use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use labstock_core::MaterialId;
use labstock_inventory::TransactionFilter;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_materials).post(create_material))
        .route(
            "/:id",
            get(get_material).put(update_material).delete(delete_material),
        )
        .route("/:id/transactions", get(list_material_transactions))
}

pub async fn list_materials(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::MaterialListQuery>,
) -> axum::response::Response {
    let filter = match query.to_filter() {
        Ok(f) => f,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store.list_materials(&filter).await {
        Ok(rows) => {
            let body: Vec<_> = rows.into_iter().map(dto::material_listing_to_json).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create_material(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::MaterialRequest>,
) -> axum::response::Response {
    let new = match body.to_new_material() {
        Ok(n) => n,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if let Err(e) = services.ensure_image_stored(new.draft().image()).await {
        return errors::store_error_to_response(e);
    }

    match services.store.create_material(&new).await {
        Ok(m) => (StatusCode::CREATED, Json(dto::material_listing_to_json(m))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_material(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: MaterialId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.store.get_material(id).await {
        Ok(m) => (StatusCode::OK, Json(dto::material_listing_to_json(m))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Replaces the editable fields. Stock only changes through transactions.
pub async fn update_material(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::MaterialRequest>,
) -> axum::response::Response {
    let id: MaterialId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let draft = match body.to_draft() {
        Ok(d) => d,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let previous_image = match services.store.get_material(id).await {
        Ok(m) => m.material.image,
        Err(e) => return errors::store_error_to_response(e),
    };
    if draft.image() != previous_image.as_deref() {
        if let Err(e) = services.ensure_image_stored(draft.image()).await {
            return errors::store_error_to_response(e);
        }
    }

    let updated = match services.store.update_material(id, &draft).await {
        Ok(m) => m,
        Err(e) => return errors::store_error_to_response(e),
    };

    if let Some(old) = previous_image.as_deref() {
        if updated.material.image.as_deref() != Some(old) {
            services.discard_image(old).await;
        }
    }

    (StatusCode::OK, Json(dto::material_listing_to_json(updated))).into_response()
}

/// Deletes the material and its transaction history, then its image file
/// unless another material still uses it.
pub async fn delete_material(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: MaterialId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let deleted = match services.store.delete_material(id).await {
        Ok(m) => m,
        Err(e) => return errors::store_error_to_response(e),
    };
    if let Some(image) = deleted.image.as_deref() {
        services.discard_image(image).await;
    }

    (StatusCode::OK, Json(dto::material_to_json(deleted))).into_response()
}

pub async fn list_material_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::TransactionListQuery>,
) -> axum::response::Response {
    let id: MaterialId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let limit = match query.to_filter() {
        Ok(f) => f.limit,
        Err(e) => return errors::domain_error_to_response(e),
    };

    // Unknown material is a 404, not an empty history.
    if let Err(e) = services.store.get_material(id).await {
        return errors::store_error_to_response(e);
    }

    let filter = TransactionFilter {
        limit,
        ..TransactionFilter::for_material(id)
    };
    match services.store.list_transactions(&filter).await {
        Ok(rows) => {
            let body: Vec<_> = rows.into_iter().map(dto::transaction_listing_to_json).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
