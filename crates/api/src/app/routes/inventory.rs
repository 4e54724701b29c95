use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use kitroom_core::ItemId;
use kitroom_infra::Storage;
use kitroom_inventory::UserLookup;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router<S: Storage>() -> Router {
    Router::new()
        .route("/", get(list_inventory::<S>))
        .route("/search", get(search_inventory::<S>))
        .route("/:item_id", get(get_item::<S>))
}

/// Items at one location, optionally on behalf of a named user.
pub async fn list_inventory<S: Storage>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Query(query): Query<dto::InventoryQuery>,
) -> axum::response::Response {
    let Some(location) = dto::non_blank(query.location.as_deref()) else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "missing required parameter: location",
        );
    };

    let user = match dto::non_blank(query.ldap.as_deref()) {
        Some(ldap) => match services
            .catalog()
            .find_user(UserLookup::Ldap(ldap.to_string()))
            .await
        {
            Ok(user) => Some(user),
            Err(kitroom_infra::CheckoutError::UserNotFound(_)) => {
                return errors::json_error(
                    StatusCode::UNAUTHORIZED,
                    "invalid_user",
                    format!("unknown ldap '{ldap}'"),
                );
            }
            Err(e) => return errors::checkout_error_to_response(e),
        },
        None => None,
    };

    let items = match services.catalog().items_by_location(location).await {
        Ok(items) => items,
        Err(e) => return errors::checkout_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "location": location,
            "user": user.as_ref().map(dto::user_brief_to_json),
            "total_items": items.len(),
            "items": items.iter().map(dto::item_to_json).collect::<Vec<_>>(),
        })),
    )
        .into_response()
}

pub async fn search_inventory<S: Storage>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Query(query): Query<dto::SearchQuery>,
) -> axum::response::Response {
    let Some(text) = dto::non_blank(query.q.as_deref()) else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "missing required parameter: q",
        );
    };
    let location = dto::non_blank(query.location.as_deref());

    match services.catalog().search_items(text, location).await {
        Ok(items) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "query": text,
                "location": location,
                "total_results": items.len(),
                "items": items.iter().map(dto::search_hit_to_json).collect::<Vec<_>>(),
            })),
        )
            .into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

pub async fn get_item<S: Storage>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(item_id): Path<String>,
) -> axum::response::Response {
    let id: ItemId = match errors::parse_id(&item_id, "item") {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.catalog().get_item(id).await {
        Ok(item) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "item": dto::item_to_json(&item),
            })),
        )
            .into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}
