use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::auth::RequestContext;
use crate::content::{ContentKind, ContentStatus};
use crate::error::ApiError;
use crate::services::{PublishRequest, SaveRequest};
use crate::state::AppState;

fn parse_kind(segment: &str) -> Result<ContentKind, ApiError> {
    ContentKind::from_path(segment)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown content kind: {}", segment)))
}

fn parse_status(raw: &str) -> Result<ContentStatus, ApiError> {
    match raw {
        "draft" => Ok(ContentStatus::Draft),
        "published" => Ok(ContentStatus::Published),
        other => Err(ApiError::bad_request(format!(
            "Unknown status filter: {}",
            other
        ))),
    }
}

/// POST /api/content/:kind/save
pub async fn save(
    Path(kind): Path<String>,
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<SaveRequest>,
) -> Result<Json<Value>, ApiError> {
    let kind = parse_kind(&kind)?;
    let item = state.content().save(&ctx, kind, payload).await?;

    Ok(Json(json!({
        "id": item.id,
        "slug": item.slug,
        "status": item.status,
    })))
}

/// POST /api/content/:kind/publish
pub async fn publish(
    Path(kind): Path<String>,
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<PublishRequest>,
) -> Result<Json<Value>, ApiError> {
    let kind = parse_kind(&kind)?;
    let outcome = state.distribution().publish(&ctx, kind, payload).await?;
    Ok(Json(serde_json::to_value(outcome).map_err(|e| {
        ApiError::internal_server_error(e.to_string())
    })?))
}

#[derive(Debug, Deserialize)]
pub struct TenantQuery {
    pub tenant_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
    #[serde(default)]
    pub body: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// PUT /api/content/:kind/:id_or_slug?tenant_id=
pub async fn update(
    Path((kind, id_or_slug)): Path<(String, String)>,
    Query(query): Query<TenantQuery>,
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<UpdateBody>,
) -> Result<Json<Value>, ApiError> {
    let kind = parse_kind(&kind)?;
    let tenant_id = query.tenant_id.unwrap_or_else(|| ctx.tenant_id());

    let item = state
        .content()
        .update_body(&ctx, kind, tenant_id, &id_or_slug, payload.body, payload.extra)
        .await?;

    Ok(Json(json!({ "id": item.id, "slug": item.slug })))
}

/// DELETE /api/content/:kind/:id
pub async fn delete(
    Path((kind, id)): Path<(String, String)>,
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<Value>, ApiError> {
    let kind = parse_kind(&kind)?;
    let id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::bad_request(format!("Invalid id: {}", id)))?;

    state.content().delete(&ctx, kind, id).await?;
    Ok(Json(json!({ "success": true })))
}

/// GET /api/content/:kind/:id_or_slug?tenant_id=
pub async fn get_one(
    Path((kind, id_or_slug)): Path<(String, String)>,
    Query(query): Query<TenantQuery>,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let kind = parse_kind(&kind)?;
    let tenant_id = query
        .tenant_id
        .ok_or_else(|| ApiError::bad_request("Missing tenant_id parameter"))?;

    let item = state.content().get(kind, tenant_id, &id_or_slug).await?;
    Ok(Json(json!({ "item": item })))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub tenant_id: Option<Uuid>,
    pub status: Option<String>,
    #[serde(default)]
    pub include_assigned: bool,
}

/// GET /api/content/:kind/list?tenant_id=&status=&include_assigned=
pub async fn list(
    Path(kind): Path<String>,
    Query(query): Query<ListQuery>,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let kind = parse_kind(&kind)?;
    let tenant_id = query
        .tenant_id
        .ok_or_else(|| ApiError::bad_request("Missing tenant_id parameter"))?;

    if query.include_assigned {
        // Merged view: owned + adopted + available system content. The status
        // filter does not apply here; per-tenant publish state lives on the
        // assignment rows, not the shared items.
        let items = state.distribution().list_for_tenant(kind, tenant_id).await?;
        return Ok(Json(json!({ "items": items })));
    }

    let status = query.status.as_deref().map(parse_status).transpose()?;
    let items = state.content().list(kind, tenant_id, status).await?;
    Ok(Json(json!({ "items": items })))
}
