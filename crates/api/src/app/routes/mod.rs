use axum::{Router, routing::get};

use kitroom_infra::Storage;

pub mod checkout;
pub mod inventory;
pub mod system;

/// Router for all `/api` endpoints plus the index and health probe.
pub fn router<S: Storage>() -> Router {
    Router::new()
        .route("/", get(system::index))
        .route("/health", get(system::health::<S>))
        .nest("/api/inventory", inventory::router::<S>())
        .nest("/api/checkout", checkout::router::<S>())
}
