use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::auth::{guard, RequestContext};
use crate::content::{AuthorKind, ContentItem, ContentKind, ContentStatus, SYSTEM_TENANT_ID};
use crate::error::ApiError;
use crate::store::{ContentStore, NewContent};

/// Save payload from the external builder. The builder does not track the
/// generated id client-side, so `id` is usually absent and the repository
/// dedups on `(tenant_id, slug)` instead.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveRequest {
    pub id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub author_kind: Option<AuthorKind>,
    #[serde(default)]
    pub is_mandatory: bool,
    #[serde(default)]
    pub enabled_for_tenants: bool,
    /// Kind-specific passthrough fields; filtered against the kind's allowlist.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Tenant-scoped CRUD over one content kind.
pub struct ContentService {
    store: Arc<dyn ContentStore>,
}

impl ContentService {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Idempotent upsert. An explicit `id` updates that row; otherwise the
    /// `(tenant_id, slug)` pair decides between update and insert, atomically.
    pub async fn save(
        &self,
        ctx: &RequestContext,
        kind: ContentKind,
        req: SaveRequest,
    ) -> Result<ContentItem, ApiError> {
        if req.slug.trim().is_empty() {
            return Err(ApiError::bad_request("Missing required field: slug"));
        }
        if req.title.trim().is_empty() {
            return Err(ApiError::bad_request("Missing required field: title"));
        }

        let tenant_id = req.tenant_id.unwrap_or_else(|| ctx.tenant_id());
        guard::authorize(ctx, tenant_id)?;

        let author_kind = self.resolve_author_kind(ctx, kind, req.author_kind, tenant_id)?;
        let distributed = author_kind == AuthorKind::System;

        let content = NewContent {
            tenant_id,
            slug: req.slug.trim().to_string(),
            title: req.title,
            body: req.body,
            extra: filter_extra(kind, &req.extra),
            author_kind,
            author_id: ctx.actor_id(),
            // Distribution flags only apply to system-authored rows
            is_mandatory: distributed && req.is_mandatory,
            enabled_for_tenants: distributed && req.enabled_for_tenants,
        };

        if let Some(id) = req.id {
            // Ownership check runs against the stored row, never the payload
            let existing = self
                .store
                .find_by_id(kind, id)
                .await?
                .ok_or_else(|| ApiError::not_found(format!("{} not found", kind)))?;
            guard::authorize(ctx, existing.tenant_id)?;

            Ok(self.store.update_item(kind, id, &content).await?)
        } else {
            Ok(self.store.upsert_by_slug(kind, &content).await?)
        }
    }

    fn resolve_author_kind(
        &self,
        ctx: &RequestContext,
        kind: ContentKind,
        requested: Option<AuthorKind>,
        tenant_id: Uuid,
    ) -> Result<AuthorKind, ApiError> {
        match requested {
            Some(AuthorKind::System) => {
                if !kind.allows_system_author() {
                    return Err(ApiError::bad_request(format!(
                        "{} cannot be system-authored",
                        kind
                    )));
                }
                if !ctx.is_platform_admin() {
                    return Err(ApiError::forbidden("Not allowed"));
                }
                if tenant_id != SYSTEM_TENANT_ID {
                    return Err(ApiError::bad_request(
                        "system-authored content must belong to the system tenant",
                    ));
                }
                Ok(AuthorKind::System)
            }
            _ => Ok(AuthorKind::Tenant),
        }
    }

    /// Resolve by slug first, falling back to treating the segment as an id.
    /// System-authored items enabled for tenants are readable from any
    /// tenant's scope; everything else must belong to the requested tenant.
    pub async fn get(
        &self,
        kind: ContentKind,
        tenant_id: Uuid,
        slug_or_id: &str,
    ) -> Result<ContentItem, ApiError> {
        let item = self.resolve(kind, tenant_id, slug_or_id).await?;
        item.ok_or_else(|| ApiError::not_found(format!("{} not found", kind)))
    }

    async fn resolve(
        &self,
        kind: ContentKind,
        tenant_id: Uuid,
        slug_or_id: &str,
    ) -> Result<Option<ContentItem>, ApiError> {
        if let Some(item) = self.store.find_by_slug(kind, tenant_id, slug_or_id).await? {
            return Ok(Some(item));
        }

        if let Ok(id) = Uuid::parse_str(slug_or_id) {
            if let Some(item) = self.store.find_by_id(kind, id).await? {
                let visible = item.tenant_id == tenant_id
                    || (item.is_system_authored() && item.enabled_for_tenants);
                return Ok(visible.then_some(item));
            }
        }

        // Shared items are also reachable by slug under the system tenant
        if let Some(item) = self
            .store
            .find_by_slug(kind, SYSTEM_TENANT_ID, slug_or_id)
            .await?
        {
            if item.enabled_for_tenants {
                return Ok(Some(item));
            }
        }

        Ok(None)
    }

    /// Content-body-only update; id resolution matches `get`.
    pub async fn update_body(
        &self,
        ctx: &RequestContext,
        kind: ContentKind,
        tenant_id: Uuid,
        slug_or_id: &str,
        body: String,
        extra: Map<String, Value>,
    ) -> Result<ContentItem, ApiError> {
        let item = self
            .resolve(kind, tenant_id, slug_or_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("{} not found", kind)))?;

        guard::authorize(ctx, item.tenant_id)?;

        let extra = if extra.is_empty() {
            Value::Null
        } else {
            filter_extra(kind, &extra)
        };

        Ok(self.store.update_body(kind, item.id, &body, &extra).await?)
    }

    /// Delete a row the caller owns, or — for system-authored items seen from
    /// a brand tenant — drop only that tenant's assignment. The shared row is
    /// never removed by a brand tenant.
    pub async fn delete(
        &self,
        ctx: &RequestContext,
        kind: ContentKind,
        id: Uuid,
    ) -> Result<(), ApiError> {
        let item = self
            .store
            .find_by_id(kind, id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("{} not found", kind)))?;

        if item.is_system_authored() && !ctx.is_platform_admin() {
            let removed = self
                .store
                .delete_assignment(kind, item.id, ctx.tenant_id())
                .await?;
            if !removed {
                return Err(ApiError::not_found("Assignment not found"));
            }
            return Ok(());
        }

        guard::authorize(ctx, item.tenant_id)?;
        self.store.delete_item(kind, id).await?;
        Ok(())
    }

    pub async fn list(
        &self,
        kind: ContentKind,
        tenant_id: Uuid,
        status: Option<ContentStatus>,
    ) -> Result<Vec<ContentItem>, ApiError> {
        Ok(self.store.list_items(kind, tenant_id, status).await?)
    }
}

/// Keep only the kind-specific fields the descriptor allows.
fn filter_extra(kind: ContentKind, raw: &Map<String, Value>) -> Value {
    let allowed = kind.extra_fields();
    let filtered: Map<String, Value> = raw
        .iter()
        .filter(|(k, _)| allowed.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Value::Object(filtered)
}
