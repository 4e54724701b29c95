use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use kitroom_infra::CheckoutError;

pub fn checkout_error_to_response(err: CheckoutError) -> axum::response::Response {
    let status = match &err {
        CheckoutError::ItemNotFound(_)
        | CheckoutError::UserNotFound(_)
        | CheckoutError::CheckoutNotFound(_) => StatusCode::NOT_FOUND,
        CheckoutError::InsufficientQuantity { .. } | CheckoutError::OverReturn { .. } => {
            StatusCode::CONFLICT
        }
        CheckoutError::InvalidQuantity(_) | CheckoutError::Validation(_) => StatusCode::BAD_REQUEST,
        CheckoutError::HistoryRecordMismatch(_) | CheckoutError::Store(_) => {
            tracing::error!(error = %err, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    json_error(status, err.code(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path or query identifier, answering 400 on garbage.
pub fn parse_id<T>(raw: &str, what: &'static str) -> Result<T, axum::response::Response>
where
    T: core::str::FromStr,
{
    raw.trim().parse().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id '{raw}'"),
        )
    })
}
