use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use kitroom_infra::Storage;

use crate::app::services::AppServices;

/// API index: name, version and the route table.
pub async fn index() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "kitroom",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "equipment checkout and check-in service",
        "endpoints": {
            "inventory": {
                "list": "GET /api/inventory?location={location}&ldap={ldap}",
                "search": "GET /api/inventory/search?q={query}&location={location}",
                "get_item": "GET /api/inventory/{item_id}",
            },
            "checkout": {
                "checkout": "POST /api/checkout",
                "checkin": "POST /api/checkout/checkin",
                "active": "GET /api/checkout/active?user_id={user_id}&item_id={item_id}",
                "overdue": "GET /api/checkout/overdue",
                "user_history": "GET /api/checkout/user/{ldap}?limit={limit}",
                "item_history": "GET /api/checkout/item/{item_id}/history?limit={limit}",
            },
        },
    }))
}

pub async fn health<S: Storage>(
    Extension(services): Extension<Arc<AppServices<S>>>,
) -> axum::response::Response {
    match services.storage().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "healthy", "database": "connected" })),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "unhealthy", "database": "unreachable" })),
            )
                .into_response()
        }
    }
}
