//! The uniform `{message, data}` response envelope.
//!
//! Every 2xx body is `{"message": ..., "data": ...}`; error bodies come from
//! [`crate::error::Error`]'s `IntoResponse` impl and share the shape. The
//! one exception is 204, which carries no body at all.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::query::Projection;

pub fn reply(status: StatusCode, message: &str, data: Value) -> Response {
    (status, Json(json!({ "message": message, "data": data }))).into_response()
}

pub fn ok(data: Value) -> Response {
    reply(StatusCode::OK, "OK", data)
}

pub fn created(data: Value) -> Response {
    reply(StatusCode::CREATED, "Created", data)
}

/// 204 is literally empty, not an empty envelope.
pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

pub fn json_of<T: serde::Serialize>(entity: &T) -> Value {
    serde_json::to_value(entity).unwrap_or(Value::Null)
}

/// Serialize one entity and apply the `select` projection to it.
pub fn project<T: serde::Serialize>(entity: &T, projection: &Projection) -> Value {
    let mut value = json_of(entity);
    if let Value::Object(map) = &mut value {
        projection.apply(map);
    }
    value
}

pub fn project_all<T: serde::Serialize>(entities: &[T], projection: &Projection) -> Value {
    Value::Array(entities.iter().map(|e| project(e, projection)).collect())
}
