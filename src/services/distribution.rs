use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::RequestContext;
use crate::content::{
    Assignment, AssignmentStatus, ContentItem, ContentKind, ContentStatus,
};
use crate::error::ApiError;
use crate::store::{AssignmentChange, ContentStore};

#[derive(Debug, Clone, Deserialize)]
pub struct PublishRequest {
    pub id: Option<Uuid>,
    pub slug: Option<String>,
    /// `false` withdraws the item from the tenant's site again.
    #[serde(default = "default_publish")]
    pub publish: bool,
}

fn default_publish() -> bool {
    true
}

/// Which path a publish took, so the caller can render tenant-appropriate UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionKind {
    System,
    Tenant,
}

#[derive(Debug, Serialize)]
pub struct PublishOutcome {
    pub id: Uuid,
    pub slug: String,
    /// Effective status as seen by the requesting tenant.
    pub status: ContentStatus,
    pub kind: DistributionKind,
}

/// A content item in a tenant's merged view, annotated with its distribution
/// state for that tenant.
#[derive(Debug, Serialize)]
pub struct AnnotatedItem {
    #[serde(flatten)]
    pub item: ContentItem,
    pub assignment_status: Option<AssignmentStatus>,
    pub is_published_for_tenant: bool,
}

/// Keeps shared content items and per-tenant assignment rows in sync, and
/// builds the merged per-tenant listing.
pub struct DistributionService {
    store: Arc<dyn ContentStore>,
}

impl DistributionService {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Publish (or withdraw) an item from the requesting tenant's point of
    /// view.
    ///
    /// Tenant-authored items flip their own status. System-authored items
    /// never change the shared row here; the tenant's assignment row carries
    /// the publish state instead, and is created on first use if the tenant
    /// never explicitly adopted the item.
    pub async fn publish(
        &self,
        ctx: &RequestContext,
        kind: ContentKind,
        req: PublishRequest,
    ) -> Result<PublishOutcome, ApiError> {
        let item = self.resolve(ctx, kind, &req).await?;

        // Looser than the write guard on purpose: any tenant may adopt a
        // system-authored item, but only the owner (or an admin) touches a
        // tenant-authored one.
        let allowed = item.tenant_id == ctx.tenant_id()
            || item.is_system_authored()
            || ctx.is_platform_admin();
        if !allowed {
            return Err(ApiError::forbidden("Not allowed"));
        }

        if item.is_system_authored() && !ctx.is_platform_admin() {
            self.toggle_assignment(ctx, kind, &item, req.publish).await
        } else {
            self.toggle_item(kind, &item, req.publish).await
        }
    }

    async fn resolve(
        &self,
        ctx: &RequestContext,
        kind: ContentKind,
        req: &PublishRequest,
    ) -> Result<ContentItem, ApiError> {
        if let Some(id) = req.id {
            return self
                .store
                .find_by_id(kind, id)
                .await?
                .ok_or_else(|| ApiError::not_found(format!("{} not found", kind)));
        }

        let slug = req
            .slug
            .as_deref()
            .ok_or_else(|| ApiError::bad_request("Missing id or slug"))?;

        self.store
            .find_by_slug(kind, ctx.tenant_id(), slug)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("{} not found", kind)))
    }

    async fn toggle_item(
        &self,
        kind: ContentKind,
        item: &ContentItem,
        publish: bool,
    ) -> Result<PublishOutcome, ApiError> {
        let (status, published_at) = if publish {
            (ContentStatus::Published, Some(Utc::now()))
        } else {
            (ContentStatus::Draft, None)
        };

        let updated = self
            .store
            .set_publish_state(kind, item.id, status, published_at)
            .await?;

        tracing::info!(kind = %kind, id = %updated.id, publish, "tenant item publish state changed");

        Ok(PublishOutcome {
            id: updated.id,
            slug: updated.slug,
            status: updated.status,
            kind: DistributionKind::Tenant,
        })
    }

    async fn toggle_assignment(
        &self,
        ctx: &RequestContext,
        kind: ContentKind,
        item: &ContentItem,
        publish: bool,
    ) -> Result<PublishOutcome, ApiError> {
        let status = match (publish, item.is_mandatory) {
            (_, true) => AssignmentStatus::Mandatory,
            (true, false) => AssignmentStatus::Accepted,
            (false, false) => AssignmentStatus::Pending,
        };

        let change = AssignmentChange {
            status,
            is_published: publish,
            acknowledged_at: Some(Utc::now()),
        };

        let assignment = self
            .store
            .upsert_assignment(kind, item.id, ctx.tenant_id(), &change)
            .await?;

        tracing::info!(
            kind = %kind,
            id = %item.id,
            tenant = %ctx.tenant_id(),
            publish,
            "assignment publish state changed"
        );

        Ok(PublishOutcome {
            id: item.id,
            slug: item.slug.clone(),
            status: if assignment.is_published {
                ContentStatus::Published
            } else {
                ContentStatus::Draft
            },
            kind: DistributionKind::System,
        })
    }

    /// Merged view for one tenant: its own items, system items it has adopted
    /// (accepted or mandatory), and system items enabled for tenants that
    /// have no assignment yet. No id appears twice; system rows always live
    /// under the system tenant, so owned and assigned sets are disjoint by
    /// construction.
    pub async fn list_for_tenant(
        &self,
        kind: ContentKind,
        tenant_id: Uuid,
    ) -> Result<Vec<AnnotatedItem>, ApiError> {
        let owned = self.store.list_items(kind, tenant_id, None).await?;

        let all_statuses = [
            AssignmentStatus::Pending,
            AssignmentStatus::Accepted,
            AssignmentStatus::Rejected,
            AssignmentStatus::Mandatory,
        ];
        let assigned = self
            .store
            .list_assigned(kind, tenant_id, &all_statuses)
            .await?;

        // Any assignment, rejected included, removes the item from the
        // "available" pool below.
        let assigned_ids: HashSet<Uuid> = assigned.iter().map(|(i, _)| i.id).collect();

        let available = self.store.list_system_enabled(kind).await?;

        let mut seen: HashSet<Uuid> = HashSet::new();
        let mut merged: Vec<AnnotatedItem> = Vec::new();

        for item in owned {
            if seen.insert(item.id) {
                let published = item.status == ContentStatus::Published;
                merged.push(AnnotatedItem {
                    item,
                    assignment_status: None,
                    is_published_for_tenant: published,
                });
            }
        }

        for (item, assignment) in assigned {
            if !adopted(&assignment) {
                continue;
            }
            if seen.insert(item.id) {
                merged.push(AnnotatedItem {
                    item,
                    assignment_status: Some(assignment.status),
                    is_published_for_tenant: assignment.is_published,
                });
            }
        }

        for item in available {
            if assigned_ids.contains(&item.id) || !seen.insert(item.id) {
                continue;
            }
            let status = if item.is_mandatory {
                AssignmentStatus::Mandatory
            } else {
                AssignmentStatus::Pending
            };
            merged.push(AnnotatedItem {
                item,
                assignment_status: Some(status),
                is_published_for_tenant: false,
            });
        }

        merged.sort_by(|a, b| b.item.updated_at.cmp(&a.item.updated_at));
        Ok(merged)
    }
}

fn adopted(assignment: &Assignment) -> bool {
    matches!(
        assignment.status,
        AssignmentStatus::Accepted | AssignmentStatus::Mandatory
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Claims, Role};
    use crate::content::{AuthorKind, SYSTEM_TENANT_ID};
    use crate::services::content::{ContentService, SaveRequest};
    use crate::store::MemoryStore;
    use serde_json::Map;

    struct Fixture {
        content: ContentService,
        distribution: DistributionService,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn ContentStore> = Arc::new(MemoryStore::new());
        Fixture {
            content: ContentService::new(store.clone()),
            distribution: DistributionService::new(store),
        }
    }

    fn tenant_ctx(tenant: Uuid) -> RequestContext {
        RequestContext::new(Claims::new(
            tenant,
            None,
            vec!["content:write".to_string()],
            Role::Tenant,
            1,
        ))
    }

    fn admin_ctx() -> RequestContext {
        RequestContext::new(Claims::new(
            SYSTEM_TENANT_ID,
            None,
            vec!["content:write".to_string()],
            Role::PlatformAdmin,
            1,
        ))
    }

    fn save_req(slug: &str, title: &str) -> SaveRequest {
        SaveRequest {
            id: None,
            tenant_id: None,
            slug: slug.to_string(),
            title: title.to_string(),
            body: String::new(),
            author_kind: None,
            is_mandatory: false,
            enabled_for_tenants: false,
            extra: Map::new(),
        }
    }

    fn publish_req(id: Uuid) -> PublishRequest {
        PublishRequest {
            id: Some(id),
            slug: None,
            publish: true,
        }
    }

    async fn system_item(f: &Fixture, slug: &str, mandatory: bool) -> ContentItem {
        let mut req = save_req(slug, slug);
        req.tenant_id = Some(SYSTEM_TENANT_ID);
        req.author_kind = Some(AuthorKind::System);
        req.is_mandatory = mandatory;
        req.enabled_for_tenants = true;
        f.content
            .save(&admin_ctx(), ContentKind::News, req)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn tenant_item_publish_flips_own_row() {
        let f = fixture();
        let tenant = Uuid::new_v4();
        let ctx = tenant_ctx(tenant);

        let saved = f
            .content
            .save(&ctx, ContentKind::News, save_req("welcome", "Welkom"))
            .await
            .unwrap();

        let outcome = f
            .distribution
            .publish(&ctx, ContentKind::News, publish_req(saved.id))
            .await
            .unwrap();

        assert_eq!(outcome.kind, DistributionKind::Tenant);
        assert_eq!(outcome.status, ContentStatus::Published);

        let item = f.content.get(ContentKind::News, tenant, "welcome").await.unwrap();
        assert_eq!(item.status, ContentStatus::Published);
        assert!(item.published_at.is_some());
    }

    #[tokio::test]
    async fn publish_resolves_by_slug_too() {
        let f = fixture();
        let tenant = Uuid::new_v4();
        let ctx = tenant_ctx(tenant);

        f.content
            .save(&ctx, ContentKind::News, save_req("welcome", "Welkom"))
            .await
            .unwrap();

        let outcome = f
            .distribution
            .publish(
                &ctx,
                ContentKind::News,
                PublishRequest {
                    id: None,
                    slug: Some("welcome".to_string()),
                    publish: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, ContentStatus::Published);
    }

    #[tokio::test]
    async fn system_item_publish_never_touches_shared_row() {
        let f = fixture();
        let item = system_item(&f, "global-news", false).await;

        let brand = Uuid::new_v4();
        let outcome = f
            .distribution
            .publish(&tenant_ctx(brand), ContentKind::News, publish_req(item.id))
            .await
            .unwrap();

        assert_eq!(outcome.kind, DistributionKind::System);
        assert_eq!(outcome.status, ContentStatus::Published);

        // The shared row is still a draft
        let shared = f
            .content
            .get(ContentKind::News, SYSTEM_TENANT_ID, "global-news")
            .await
            .unwrap();
        assert_eq!(shared.status, ContentStatus::Draft);
        assert!(shared.published_at.is_none());
    }

    #[tokio::test]
    async fn publish_without_prior_adoption_creates_assignment() {
        let f = fixture();
        let item = system_item(&f, "global-news", false).await;
        let brand = Uuid::new_v4();

        f.distribution
            .publish(&tenant_ctx(brand), ContentKind::News, publish_req(item.id))
            .await
            .unwrap();

        let listed = f
            .distribution
            .list_for_tenant(ContentKind::News, brand)
            .await
            .unwrap();
        let entry = listed.iter().find(|a| a.item.id == item.id).unwrap();
        assert_eq!(entry.assignment_status, Some(AssignmentStatus::Accepted));
        assert!(entry.is_published_for_tenant);
    }

    #[tokio::test]
    async fn second_tenant_still_sees_item_unpublished() {
        let f = fixture();
        let item = system_item(&f, "global-news", false).await;

        let brand_b = Uuid::new_v4();
        let brand_c = Uuid::new_v4();

        f.distribution
            .publish(&tenant_ctx(brand_b), ContentKind::News, publish_req(item.id))
            .await
            .unwrap();

        let view_c = f
            .distribution
            .list_for_tenant(ContentKind::News, brand_c)
            .await
            .unwrap();
        let entry = view_c.iter().find(|a| a.item.id == item.id).unwrap();
        assert!(!entry.is_published_for_tenant);
        assert_eq!(entry.assignment_status, Some(AssignmentStatus::Pending));
    }

    #[tokio::test]
    async fn unpublish_keeps_mandatory_status() {
        let f = fixture();
        let item = system_item(&f, "must-run", true).await;
        let brand = Uuid::new_v4();
        let ctx = tenant_ctx(brand);

        f.distribution
            .publish(&ctx, ContentKind::News, publish_req(item.id))
            .await
            .unwrap();

        let outcome = f
            .distribution
            .publish(
                &ctx,
                ContentKind::News,
                PublishRequest {
                    id: Some(item.id),
                    slug: None,
                    publish: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, ContentStatus::Draft);

        let listed = f
            .distribution
            .list_for_tenant(ContentKind::News, brand)
            .await
            .unwrap();
        let entry = listed.iter().find(|a| a.item.id == item.id).unwrap();
        assert_eq!(entry.assignment_status, Some(AssignmentStatus::Mandatory));
        assert!(!entry.is_published_for_tenant);
    }

    #[tokio::test]
    async fn foreign_tenant_item_is_not_publishable() {
        let f = fixture();
        let owner = Uuid::new_v4();

        let saved = f
            .content
            .save(&tenant_ctx(owner), ContentKind::News, save_req("mine", "Mine"))
            .await
            .unwrap();

        let err = f
            .distribution
            .publish(
                &tenant_ctx(Uuid::new_v4()),
                ContentKind::News,
                publish_req(saved.id),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn merged_list_has_no_duplicates_and_annotates_system_items() {
        let f = fixture();
        let brand = Uuid::new_v4();
        let ctx = tenant_ctx(brand);

        // Own item, published
        let own = f
            .content
            .save(&ctx, ContentKind::News, save_req("own-news", "Own"))
            .await
            .unwrap();
        f.distribution
            .publish(&ctx, ContentKind::News, publish_req(own.id))
            .await
            .unwrap();

        // Adopted system item and a merely-available mandatory one
        let adopted_item = system_item(&f, "adopted", false).await;
        f.distribution
            .publish(&ctx, ContentKind::News, publish_req(adopted_item.id))
            .await
            .unwrap();
        let available = system_item(&f, "available", true).await;

        let listed = f
            .distribution
            .list_for_tenant(ContentKind::News, brand)
            .await
            .unwrap();

        let ids: Vec<Uuid> = listed.iter().map(|a| a.item.id).collect();
        let unique: HashSet<Uuid> = ids.iter().copied().collect();
        assert_eq!(ids.len(), unique.len());
        assert_eq!(ids.len(), 3);

        let own_entry = listed.iter().find(|a| a.item.id == own.id).unwrap();
        assert!(own_entry.assignment_status.is_none());
        assert!(own_entry.is_published_for_tenant);

        let avail_entry = listed.iter().find(|a| a.item.id == available.id).unwrap();
        assert_eq!(avail_entry.item.author_kind, AuthorKind::System);
        assert!(avail_entry.item.is_mandatory);
        assert_eq!(avail_entry.assignment_status, Some(AssignmentStatus::Mandatory));

        // Every system item is either enabled for tenants or explicitly assigned
        for entry in &listed {
            if entry.item.author_kind == AuthorKind::System {
                assert!(entry.item.enabled_for_tenants || entry.assignment_status.is_some());
            }
        }
    }

    #[tokio::test]
    async fn tenant_delete_of_system_item_only_drops_assignment() {
        let f = fixture();
        let item = system_item(&f, "global-news", false).await;
        let brand = Uuid::new_v4();
        let ctx = tenant_ctx(brand);

        f.distribution
            .publish(&ctx, ContentKind::News, publish_req(item.id))
            .await
            .unwrap();

        f.content.delete(&ctx, ContentKind::News, item.id).await.unwrap();

        // Shared row survives and shows up again as available
        let shared = f
            .content
            .get(ContentKind::News, SYSTEM_TENANT_ID, "global-news")
            .await
            .unwrap();
        assert_eq!(shared.id, item.id);

        let listed = f
            .distribution
            .list_for_tenant(ContentKind::News, brand)
            .await
            .unwrap();
        let entry = listed.iter().find(|a| a.item.id == item.id).unwrap();
        assert!(!entry.is_published_for_tenant);
    }
}
