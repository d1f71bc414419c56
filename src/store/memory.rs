use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::content::{
    Assignment, AssignmentStatus, ContentItem, ContentKind, ContentStatus,
};
use crate::store::{AssignmentChange, ContentStore, NewContent, StoreError};

/// In-memory backend. Backs the test suite and the no-database dev loop;
/// interior mutability mirrors the per-statement atomicity the relational
/// store provides.
#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<(ContentKind, Uuid), ContentItem>>,
    assignments: RwLock<HashMap<(ContentKind, Uuid, Uuid), Assignment>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_item(content: &NewContent) -> ContentItem {
        let now = Utc::now();
        ContentItem {
            id: Uuid::new_v4(),
            tenant_id: content.tenant_id,
            slug: content.slug.clone(),
            title: content.title.clone(),
            body: content.body.clone(),
            extra: content.extra.clone(),
            status: ContentStatus::Draft,
            published_at: None,
            author_kind: content.author_kind,
            author_id: content.author_id,
            is_mandatory: content.is_mandatory,
            enabled_for_tenants: content.enabled_for_tenants,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_content(item: &mut ContentItem, content: &NewContent) {
        item.slug = content.slug.clone();
        item.title = content.title.clone();
        item.body = content.body.clone();
        item.extra = content.extra.clone();
        item.author_kind = content.author_kind;
        item.author_id = content.author_id;
        item.is_mandatory = content.is_mandatory;
        item.enabled_for_tenants = content.enabled_for_tenants;
        item.updated_at = Utc::now();
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn upsert_by_slug(
        &self,
        kind: ContentKind,
        content: &NewContent,
    ) -> Result<ContentItem, StoreError> {
        // Single write lock covers lookup and insert, matching the atomicity
        // of the SQL ON CONFLICT upsert.
        let mut items = self.items.write().await;

        let existing = items
            .iter_mut()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, v)| v)
            .find(|i| i.tenant_id == content.tenant_id && i.slug == content.slug);

        if let Some(item) = existing {
            Self::apply_content(item, content);
            return Ok(item.clone());
        }

        let item = Self::fresh_item(content);
        items.insert((kind, item.id), item.clone());
        Ok(item)
    }

    async fn update_item(
        &self,
        kind: ContentKind,
        id: Uuid,
        content: &NewContent,
    ) -> Result<ContentItem, StoreError> {
        let mut items = self.items.write().await;
        let item = items
            .get_mut(&(kind, id))
            .ok_or_else(|| StoreError::NotFound(format!("{} {}", kind, id)))?;
        Self::apply_content(item, content);
        Ok(item.clone())
    }

    async fn update_body(
        &self,
        kind: ContentKind,
        id: Uuid,
        body: &str,
        extra: &serde_json::Value,
    ) -> Result<ContentItem, StoreError> {
        let mut items = self.items.write().await;
        let item = items
            .get_mut(&(kind, id))
            .ok_or_else(|| StoreError::NotFound(format!("{} {}", kind, id)))?;
        item.body = body.to_string();
        if !extra.is_null() {
            item.extra = extra.clone();
        }
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn find_by_id(
        &self,
        kind: ContentKind,
        id: Uuid,
    ) -> Result<Option<ContentItem>, StoreError> {
        Ok(self.items.read().await.get(&(kind, id)).cloned())
    }

    async fn find_by_slug(
        &self,
        kind: ContentKind,
        tenant_id: Uuid,
        slug: &str,
    ) -> Result<Option<ContentItem>, StoreError> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, v)| v)
            .find(|i| i.tenant_id == tenant_id && i.slug == slug)
            .cloned())
    }

    async fn delete_item(&self, kind: ContentKind, id: Uuid) -> Result<bool, StoreError> {
        let removed = self.items.write().await.remove(&(kind, id)).is_some();
        if removed {
            self.assignments
                .write()
                .await
                .retain(|(k, content_id, _), _| !(*k == kind && *content_id == id));
        }
        Ok(removed)
    }

    async fn list_items(
        &self,
        kind: ContentKind,
        tenant_id: Uuid,
        status: Option<ContentStatus>,
    ) -> Result<Vec<ContentItem>, StoreError> {
        let items = self.items.read().await;
        let mut out: Vec<ContentItem> = items
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, v)| v)
            .filter(|i| i.tenant_id == tenant_id)
            .filter(|i| status.map_or(true, |s| i.status == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(out)
    }

    async fn list_system_enabled(
        &self,
        kind: ContentKind,
    ) -> Result<Vec<ContentItem>, StoreError> {
        let items = self.items.read().await;
        let mut out: Vec<ContentItem> = items
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, v)| v)
            .filter(|i| i.tenant_id == crate::content::SYSTEM_TENANT_ID && i.enabled_for_tenants)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(out)
    }

    async fn set_publish_state(
        &self,
        kind: ContentKind,
        id: Uuid,
        status: ContentStatus,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<ContentItem, StoreError> {
        let mut items = self.items.write().await;
        let item = items
            .get_mut(&(kind, id))
            .ok_or_else(|| StoreError::NotFound(format!("{} {}", kind, id)))?;
        item.status = status;
        item.published_at = published_at;
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn upsert_assignment(
        &self,
        kind: ContentKind,
        content_id: Uuid,
        tenant_id: Uuid,
        change: &AssignmentChange,
    ) -> Result<Assignment, StoreError> {
        let mut assignments = self.assignments.write().await;
        let entry = assignments
            .entry((kind, content_id, tenant_id))
            .or_insert_with(|| Assignment {
                id: Uuid::new_v4(),
                kind,
                content_id,
                tenant_id,
                status: change.status,
                is_published: change.is_published,
                assigned_at: Utc::now(),
                acknowledged_at: change.acknowledged_at,
            });
        entry.status = change.status;
        entry.is_published = change.is_published;
        entry.acknowledged_at = change.acknowledged_at;
        Ok(entry.clone())
    }

    async fn delete_assignment(
        &self,
        kind: ContentKind,
        content_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<bool, StoreError> {
        Ok(self
            .assignments
            .write()
            .await
            .remove(&(kind, content_id, tenant_id))
            .is_some())
    }

    async fn list_assigned(
        &self,
        kind: ContentKind,
        tenant_id: Uuid,
        statuses: &[AssignmentStatus],
    ) -> Result<Vec<(ContentItem, Assignment)>, StoreError> {
        let assignments = self.assignments.read().await;
        let items = self.items.read().await;

        let mut out: Vec<(ContentItem, Assignment)> = assignments
            .values()
            .filter(|a| a.kind == kind && a.tenant_id == tenant_id)
            .filter(|a| statuses.contains(&a.status))
            .filter_map(|a| {
                items
                    .get(&(kind, a.content_id))
                    .map(|i| (i.clone(), a.clone()))
            })
            .collect();
        out.sort_by(|a, b| b.0.updated_at.cmp(&a.0.updated_at));
        Ok(out)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
