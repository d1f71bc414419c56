use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::content::{
    Assignment, AssignmentStatus, AuthorKind, ContentItem, ContentKind, ContentStatus,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors from the storage backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Field set for inserting or upserting a content row. The slug is the
/// client-facing identity; `(tenant_id, slug)` is unique per kind.
#[derive(Debug, Clone)]
pub struct NewContent {
    pub tenant_id: Uuid,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub extra: serde_json::Value,
    pub author_kind: AuthorKind,
    pub author_id: Option<Uuid>,
    pub is_mandatory: bool,
    pub enabled_for_tenants: bool,
}

/// Target state for an assignment upsert.
#[derive(Debug, Clone)]
pub struct AssignmentChange {
    pub status: AssignmentStatus,
    pub is_published: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

/// Storage seam for content rows and per-tenant assignment rows.
///
/// Implementations must make `upsert_by_slug` and `upsert_assignment` atomic
/// (insert-or-update in one statement, or equivalent) so concurrent first
/// saves cannot create duplicate rows.
#[async_trait]
pub trait ContentStore: Send + Sync {
    // Content rows
    async fn upsert_by_slug(
        &self,
        kind: ContentKind,
        content: &NewContent,
    ) -> Result<ContentItem, StoreError>;

    async fn update_item(
        &self,
        kind: ContentKind,
        id: Uuid,
        content: &NewContent,
    ) -> Result<ContentItem, StoreError>;

    async fn update_body(
        &self,
        kind: ContentKind,
        id: Uuid,
        body: &str,
        extra: &serde_json::Value,
    ) -> Result<ContentItem, StoreError>;

    async fn find_by_id(
        &self,
        kind: ContentKind,
        id: Uuid,
    ) -> Result<Option<ContentItem>, StoreError>;

    async fn find_by_slug(
        &self,
        kind: ContentKind,
        tenant_id: Uuid,
        slug: &str,
    ) -> Result<Option<ContentItem>, StoreError>;

    /// Remove a content row and any assignment rows referencing it.
    async fn delete_item(&self, kind: ContentKind, id: Uuid) -> Result<bool, StoreError>;

    async fn list_items(
        &self,
        kind: ContentKind,
        tenant_id: Uuid,
        status: Option<ContentStatus>,
    ) -> Result<Vec<ContentItem>, StoreError>;

    /// System-tenant rows flagged as visible to brand tenants.
    async fn list_system_enabled(&self, kind: ContentKind)
        -> Result<Vec<ContentItem>, StoreError>;

    async fn set_publish_state(
        &self,
        kind: ContentKind,
        id: Uuid,
        status: ContentStatus,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<ContentItem, StoreError>;

    // Assignment rows
    async fn upsert_assignment(
        &self,
        kind: ContentKind,
        content_id: Uuid,
        tenant_id: Uuid,
        change: &AssignmentChange,
    ) -> Result<Assignment, StoreError>;

    async fn delete_assignment(
        &self,
        kind: ContentKind,
        content_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<bool, StoreError>;

    /// Assignments for a tenant in any of the given states, joined to their
    /// content rows.
    async fn list_assigned(
        &self,
        kind: ContentKind,
        tenant_id: Uuid,
        statuses: &[AssignmentStatus],
    ) -> Result<Vec<(ContentItem, Assignment)>, StoreError>;

    /// Liveness probe for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}
