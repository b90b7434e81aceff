// SPDX-License-Identifier: MIT
//! Error taxonomy for the whole service.
//!
//! Every handler returns `Result<_, Error>`, and the [`IntoResponse`] impl
//! here is the single place HTTP status codes and the `{message, data}`
//! envelope bodies are decided. Store and coordinator code never touches
//! status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::error;

/// Which resource an id-shaped error refers to. Only affects wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Task,
    User,
}

impl Entity {
    pub fn label(&self) -> &'static str {
        match self {
            Entity::Task => "Task",
            Entity::User => "User",
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A list-endpoint query parameter failed structural validation.
    /// The payload names the offending parameter ("where", "sort", ...).
    #[error("invalid {0} parameter")]
    InvalidParameter(&'static str),

    /// A request body failed semantic validation; the string is the
    /// caller-facing detail ("Name and deadline are required", ...).
    #[error("{0}")]
    Validation(String),

    /// A path id that cannot be a stored id. Indistinguishable from
    /// [`Error::NotFound`] on the wire.
    #[error("{entity} id is malformed")]
    InvalidId { entity: Entity },

    #[error("{entity} not found")]
    NotFound { entity: Entity },

    /// Unique-index violation on the users email column.
    #[error("email already exists")]
    DuplicateEmail,

    /// No database was configured at startup; the server answers requests
    /// but every store-backed route reports this.
    #[error("store unavailable")]
    Unavailable,

    /// Unexpected failure from the backing store. `action` tags the
    /// operation for the response body ("retrieve tasks", "create user").
    #[error("failed to {action}: {source}")]
    Store {
        action: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl Error {
    /// Wrap a database failure, tagging the operation for the response body.
    pub fn store(action: &'static str, source: sqlx::Error) -> Self {
        Error::Store { action, source }
    }

    /// Like [`Error::store`], but recognizes a unique-constraint violation
    /// (the email column) and reports it as [`Error::DuplicateEmail`].
    pub fn user_write(action: &'static str, source: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &source {
            if db.is_unique_violation() {
                return Error::DuplicateEmail;
            }
        }
        Error::store(action, source)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message, data) = match &self {
            Error::InvalidParameter(name) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid {name} parameter"),
                Value::Null,
            ),
            Error::Validation(detail) => (
                StatusCode::BAD_REQUEST,
                "Bad request".to_string(),
                json!({ "error": detail }),
            ),
            Error::InvalidId { entity } | Error::NotFound { entity } => (
                StatusCode::NOT_FOUND,
                "Not found".to_string(),
                json!({ "error": format!("{entity} not found") }),
            ),
            Error::DuplicateEmail => (
                StatusCode::BAD_REQUEST,
                "Bad request".to_string(),
                json!({ "error": "Email already exists" }),
            ),
            Error::Unavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server error".to_string(),
                json!({ "error": "Store unavailable" }),
            ),
            Error::Store { action, source } => {
                error!(err = %source, action, "store operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server error".to_string(),
                    json!({ "error": format!("Failed to {action}") }),
                )
            }
        };
        (status, Json(json!({ "message": message, "data": data }))).into_response()
    }
}
