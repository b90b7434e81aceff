//! `/users` handlers.
//!
//! Same surface as `/tasks` with two deliberate differences: listings are
//! unbounded unless the caller passes `limit`, and creating a user never
//! triggers task-side repairs.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use super::parse_body;
use crate::error::Error;
use crate::http::envelope;
use crate::model::{UserDoc, UserPayload};
use crate::query::{self, RawParams, USER_FIELDS};
use crate::AppContext;

pub async fn list_users(
    State(ctx): State<Arc<AppContext>>,
    Query(raw): Query<RawParams>,
) -> Result<Response, Error> {
    let plan = query::parse(&raw, &USER_FIELDS)?;
    if plan.count_only {
        let count = ctx.users.count(&plan.filter).await?;
        return Ok(envelope::ok(json!({ "count": count })));
    }
    let users = ctx.users.find_many(&plan).await?;
    let docs: Vec<UserDoc> = users.into_iter().map(UserDoc::from).collect();
    Ok(envelope::ok(envelope::project_all(&docs, &plan.projection)))
}

pub async fn create_user(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<Value>,
) -> Result<Response, Error> {
    let payload: UserPayload = parse_body(body)?;
    let user = ctx.coordinator.create_user(payload).await?;
    Ok(envelope::created(envelope::json_of(&UserDoc::from(user))))
}

pub async fn get_user(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    Query(raw): Query<RawParams>,
) -> Result<Response, Error> {
    let plan = query::parse(&raw, &USER_FIELDS)?;
    let user = ctx.users.find_by_id(&id).await?;
    Ok(envelope::ok(envelope::project(&UserDoc::from(user), &plan.projection)))
}

pub async fn update_user(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, Error> {
    let payload: UserPayload = parse_body(body)?;
    let user = ctx.coordinator.update_user(&id, payload).await?;
    Ok(envelope::ok(envelope::json_of(&UserDoc::from(user))))
}

pub async fn delete_user(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Response, Error> {
    ctx.coordinator.delete_user(&id).await?;
    Ok(envelope::no_content())
}
