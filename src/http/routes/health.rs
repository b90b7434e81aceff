//! `GET /health` — liveness probe.
//!
//! Deliberately outside the `{message, data}` envelope so dumb probes can
//! read it, and it works whether or not a store is configured.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::AppContext;

pub async fn health(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": ctx.started_at.elapsed().as_secs(),
        "store": if ctx.db.is_configured() { "configured" } else { "unconfigured" },
    }))
}
