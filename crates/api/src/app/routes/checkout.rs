use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use kitroom_checkout::{CheckinRequest, CheckoutRequest};
use kitroom_core::{CheckoutId, ItemId, UserId};
use kitroom_infra::Storage;
use kitroom_infra::store::ActiveFilter;
use kitroom_inventory::UserLookup;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router<S: Storage>() -> Router {
    Router::new()
        .route("/", post(checkout_item::<S>))
        .route("/checkin", post(checkin_item::<S>))
        .route("/active", get(list_active::<S>))
        .route("/overdue", get(list_overdue::<S>))
        .route("/user/:ldap", get(user_history::<S>))
        .route("/item/:item_id/history", get(item_history::<S>))
}

pub async fn checkout_item<S: Storage>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Json(body): Json<dto::CheckoutBody>,
) -> axum::response::Response {
    let item_id: ItemId = match errors::parse_id(&body.item_id, "item") {
        Ok(v) => v,
        Err(res) => return res,
    };

    // An explicit user id wins over an ldap name.
    let user_id: UserId = match (
        dto::non_blank(body.user_id.as_deref()),
        dto::non_blank(body.user_ldap.as_deref()),
    ) {
        (Some(raw), _) => match errors::parse_id(raw, "user") {
            Ok(v) => v,
            Err(res) => return res,
        },
        (None, Some(ldap)) => match services
            .catalog()
            .find_user(UserLookup::Ldap(ldap.to_string()))
            .await
        {
            Ok(user) => user.id,
            Err(e) => return errors::checkout_error_to_response(e),
        },
        (None, None) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "either user_id or user_ldap is required",
            );
        }
    };

    let expected_return_time = match dto::non_blank(body.expected_return_datetime.as_deref()) {
        Some(raw) => match dto::parse_timestamp(raw) {
            Some(ts) => Some(ts),
            None => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "validation_error",
                    format!("invalid expected_return_datetime '{raw}'"),
                );
            }
        },
        None => None,
    };

    let request = CheckoutRequest {
        item_id,
        user_id,
        quantity: body.quantity,
        expected_return_time,
        condition: body.checkout_condition,
        notes: body.notes,
    };

    match services.workflow().checkout(request).await {
        Ok(checkout) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "success": true,
                "message": "item checked out",
                "checkout": checkout,
            })),
        )
            .into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

pub async fn checkin_item<S: Storage>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Json(body): Json<dto::CheckinBody>,
) -> axum::response::Response {
    let checkout_id: CheckoutId = match errors::parse_id(&body.checkout_id, "checkout") {
        Ok(v) => v,
        Err(res) => return res,
    };

    let request = CheckinRequest {
        checkout_id,
        return_condition: body.return_condition,
        return_notes: body.return_notes,
    };

    match services.workflow().checkin(request).await {
        Ok(history) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "message": "item checked in",
                "history": history,
            })),
        )
            .into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

pub async fn list_active<S: Storage>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Query(query): Query<dto::ActiveQuery>,
) -> axum::response::Response {
    let mut filter = ActiveFilter::default();
    if let Some(raw) = dto::non_blank(query.user_id.as_deref()) {
        match errors::parse_id(raw, "user") {
            Ok(v) => filter.user_id = Some(v),
            Err(res) => return res,
        }
    }
    if let Some(raw) = dto::non_blank(query.item_id.as_deref()) {
        match errors::parse_id(raw, "item") {
            Ok(v) => filter.item_id = Some(v),
            Err(res) => return res,
        }
    }

    match services.views().list_active(filter).await {
        Ok(checkouts) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "total_active_checkouts": checkouts.len(),
                "checkouts": checkouts,
            })),
        )
            .into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

pub async fn list_overdue<S: Storage>(
    Extension(services): Extension<Arc<AppServices<S>>>,
) -> axum::response::Response {
    match services.views().list_overdue().await {
        Ok(checkouts) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "total_overdue": checkouts.len(),
                "checkouts": checkouts,
            })),
        )
            .into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

pub async fn user_history<S: Storage>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(ldap): Path<String>,
    Query(query): Query<dto::LimitQuery>,
) -> axum::response::Response {
    let user = match services
        .catalog()
        .find_user(UserLookup::Ldap(ldap.clone()))
        .await
    {
        Ok(user) => user,
        Err(e) => return errors::checkout_error_to_response(e),
    };

    let limit = services.history_limit(query.limit);
    match services
        .views()
        .user_history(UserLookup::Id(user.id), limit)
        .await
    {
        Ok(history) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "user": dto::user_brief_to_json(&user),
                "total_records": history.len(),
                "history": history,
            })),
        )
            .into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

pub async fn item_history<S: Storage>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(item_id): Path<String>,
    Query(query): Query<dto::LimitQuery>,
) -> axum::response::Response {
    let id: ItemId = match errors::parse_id(&item_id, "item") {
        Ok(v) => v,
        Err(res) => return res,
    };

    let limit = services.history_limit(query.limit);
    match services.views().item_history(id, limit).await {
        Ok(history) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "item_id": id,
                "total_records": history.len(),
                "history": history,
            })),
        )
            .into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}
