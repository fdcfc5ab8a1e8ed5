use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", get(list_transactions).post(record_transaction))
}

pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::TransactionListQuery>,
) -> axum::response::Response {
    let filter = match query.to_filter() {
        Ok(f) => f,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store.list_transactions(&filter).await {
        Ok(rows) => {
            let body: Vec<_> = rows.into_iter().map(dto::transaction_listing_to_json).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Ledger entry point: adjusts the material's stock and appends the record atomically.
pub async fn record_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::TransactionRequest>,
) -> axum::response::Response {
    let cmd = match body.to_command() {
        Ok(c) => c,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store.record_transaction(&cmd).await {
        Ok(t) => (StatusCode::CREATED, Json(dto::transaction_to_json(t))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
