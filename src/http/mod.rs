//! HTTP surface.
//!
//! Endpoints:
//!   GET    /health          — liveness, no envelope
//!   GET    /tasks           — list (where/sort/select/skip/limit/count)
//!   POST   /tasks           — create
//!   GET    /tasks/{id}      — fetch one (select honored)
//!   PUT    /tasks/{id}      — full replace
//!   DELETE /tasks/{id}      — delete, 204
//!   GET    /users           — list (same parameters, unbounded by default)
//!   POST   /users           — create
//!   GET    /users/{id}      — fetch one
//!   PUT    /users/{id}      — full replace + link repair
//!   DELETE /users/{id}      — delete, 204

pub mod envelope;
pub mod routes;

use axum::http::{header, HeaderName, Method};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::AppContext;

/// Assemble the full route table. CORS is wide open: the API is meant to be
/// called from frontends on arbitrary origins.
pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::POST,
            Method::GET,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static("x-http-method-override"),
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]);

    Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/tasks/{id}",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route(
            "/users",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route(
            "/users/{id}",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .layer(cors)
        .with_state(ctx)
}
