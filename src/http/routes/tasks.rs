//! `/tasks` handlers.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use super::parse_body;
use crate::error::Error;
use crate::http::envelope;
use crate::model::{TaskDoc, TaskPayload};
use crate::query::{self, RawParams, TASK_FIELDS};
use crate::AppContext;

pub async fn list_tasks(
    State(ctx): State<Arc<AppContext>>,
    Query(raw): Query<RawParams>,
) -> Result<Response, Error> {
    let plan = query::parse(&raw, &TASK_FIELDS)?;
    if plan.count_only {
        let count = ctx.tasks.count(&plan.filter).await?;
        return Ok(envelope::ok(json!({ "count": count })));
    }
    let tasks = ctx.tasks.find_many(&plan).await?;
    let docs: Vec<TaskDoc> = tasks.into_iter().map(TaskDoc::from).collect();
    Ok(envelope::ok(envelope::project_all(&docs, &plan.projection)))
}

pub async fn create_task(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<Value>,
) -> Result<Response, Error> {
    let payload: TaskPayload = parse_body(body)?;
    let task = ctx.coordinator.create_task(payload).await?;
    Ok(envelope::created(envelope::json_of(&TaskDoc::from(task))))
}

/// Query parameters are validated even on the by-id route, and `select`
/// is honored; `where`, `skip`, `limit` and `count` are ignored.
pub async fn get_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    Query(raw): Query<RawParams>,
) -> Result<Response, Error> {
    let plan = query::parse(&raw, &TASK_FIELDS)?;
    let task = ctx.tasks.find_by_id(&id).await?;
    Ok(envelope::ok(envelope::project(&TaskDoc::from(task), &plan.projection)))
}

pub async fn update_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, Error> {
    let payload: TaskPayload = parse_body(body)?;
    let task = ctx.coordinator.update_task(&id, payload).await?;
    Ok(envelope::ok(envelope::json_of(&TaskDoc::from(task))))
}

pub async fn delete_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Response, Error> {
    ctx.coordinator.delete_task(&id).await?;
    Ok(envelope::no_content())
}
