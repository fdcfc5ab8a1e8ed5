use axum::{routing::get, Router};

pub mod categories;
pub mod locations;
pub mod materials;
pub mod stats;
pub mod system;
pub mod transactions;
pub mod uploads;

/// Router for all resource endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/stats", get(stats::get_stats))
        .nest("/categories", categories::router())
        .nest("/locations", locations::router())
        .nest("/materials", materials::router())
        .nest("/transactions", transactions::router())
        .nest("/uploads", uploads::router())
}
