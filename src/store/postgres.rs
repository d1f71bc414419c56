use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::content::{
    Assignment, AssignmentStatus, ContentItem, ContentKind, ContentStatus, SYSTEM_TENANT_ID,
};
use crate::store::{AssignmentChange, ContentStore, NewContent, StoreError};

/// Relational backend. All check-then-write sequences are single statements
/// (`ON CONFLICT` upserts) or explicit transactions, so the unique indexes on
/// `(tenant_id, slug)` and `(kind, content_id, tenant_id)` hold under
/// concurrent callers.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool from `DATABASE_URL` with the configured limits.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::NotFound("DATABASE_URL not set".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .connect(&url)
            .await?;

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Conflict(e.to_string()))
    }

    fn map_unique_violation(err: sqlx::Error, what: &str) -> StoreError {
        if let sqlx::Error::Database(ref db) = err {
            if db.code().as_deref() == Some("23505") {
                return StoreError::Conflict(format!("{} already exists", what));
            }
        }
        StoreError::Sqlx(err)
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn upsert_by_slug(
        &self,
        kind: ContentKind,
        content: &NewContent,
    ) -> Result<ContentItem, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO {table}
                (tenant_id, slug, title, body, extra, status,
                 author_kind, author_id, is_mandatory, enabled_for_tenants)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (tenant_id, slug) DO UPDATE SET
                title = EXCLUDED.title,
                body = EXCLUDED.body,
                extra = EXCLUDED.extra,
                author_kind = EXCLUDED.author_kind,
                author_id = EXCLUDED.author_id,
                is_mandatory = EXCLUDED.is_mandatory,
                enabled_for_tenants = EXCLUDED.enabled_for_tenants,
                updated_at = now()
            RETURNING *
            "#,
            table = kind.table()
        );

        let item = sqlx::query_as::<_, ContentItem>(&sql)
            .bind(content.tenant_id)
            .bind(&content.slug)
            .bind(&content.title)
            .bind(&content.body)
            .bind(&content.extra)
            .bind(ContentStatus::Draft)
            .bind(content.author_kind)
            .bind(content.author_id)
            .bind(content.is_mandatory)
            .bind(content.enabled_for_tenants)
            .fetch_one(&self.pool)
            .await?;

        Ok(item)
    }

    async fn update_item(
        &self,
        kind: ContentKind,
        id: Uuid,
        content: &NewContent,
    ) -> Result<ContentItem, StoreError> {
        let sql = format!(
            r#"
            UPDATE {table} SET
                slug = $2,
                title = $3,
                body = $4,
                extra = $5,
                author_kind = $6,
                author_id = $7,
                is_mandatory = $8,
                enabled_for_tenants = $9,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
            table = kind.table()
        );

        sqlx::query_as::<_, ContentItem>(&sql)
            .bind(id)
            .bind(&content.slug)
            .bind(&content.title)
            .bind(&content.body)
            .bind(&content.extra)
            .bind(content.author_kind)
            .bind(content.author_id)
            .bind(content.is_mandatory)
            .bind(content.enabled_for_tenants)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::map_unique_violation(e, "slug"))?
            .ok_or_else(|| StoreError::NotFound(format!("{} {}", kind, id)))
    }

    async fn update_body(
        &self,
        kind: ContentKind,
        id: Uuid,
        body: &str,
        extra: &serde_json::Value,
    ) -> Result<ContentItem, StoreError> {
        let sql = format!(
            r#"
            UPDATE {table} SET
                body = $2,
                extra = CASE WHEN $3::jsonb IS NULL THEN extra ELSE $3::jsonb END,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
            table = kind.table()
        );

        let extra_param = if extra.is_null() { None } else { Some(extra) };

        sqlx::query_as::<_, ContentItem>(&sql)
            .bind(id)
            .bind(body)
            .bind(extra_param)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("{} {}", kind, id)))
    }

    async fn find_by_id(
        &self,
        kind: ContentKind,
        id: Uuid,
    ) -> Result<Option<ContentItem>, StoreError> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", kind.table());
        Ok(sqlx::query_as::<_, ContentItem>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_slug(
        &self,
        kind: ContentKind,
        tenant_id: Uuid,
        slug: &str,
    ) -> Result<Option<ContentItem>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE tenant_id = $1 AND slug = $2",
            kind.table()
        );
        Ok(sqlx::query_as::<_, ContentItem>(&sql)
            .bind(tenant_id)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_item(&self, kind: ContentKind, id: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM content_assignments WHERE kind = $1 AND content_id = $2")
            .bind(kind)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let sql = format!("DELETE FROM {} WHERE id = $1", kind.table());
        let result = sqlx::query(&sql).bind(id).execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_items(
        &self,
        kind: ContentKind,
        tenant_id: Uuid,
        status: Option<ContentStatus>,
    ) -> Result<Vec<ContentItem>, StoreError> {
        let sql = format!(
            r#"
            SELECT * FROM {table}
            WHERE tenant_id = $1 AND ($2::content_status IS NULL OR status = $2)
            ORDER BY updated_at DESC
            "#,
            table = kind.table()
        );

        Ok(sqlx::query_as::<_, ContentItem>(&sql)
            .bind(tenant_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_system_enabled(
        &self,
        kind: ContentKind,
    ) -> Result<Vec<ContentItem>, StoreError> {
        let sql = format!(
            r#"
            SELECT * FROM {table}
            WHERE tenant_id = $1 AND enabled_for_tenants = true
            ORDER BY updated_at DESC
            "#,
            table = kind.table()
        );

        Ok(sqlx::query_as::<_, ContentItem>(&sql)
            .bind(SYSTEM_TENANT_ID)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn set_publish_state(
        &self,
        kind: ContentKind,
        id: Uuid,
        status: ContentStatus,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<ContentItem, StoreError> {
        let sql = format!(
            r#"
            UPDATE {table} SET
                status = $2,
                published_at = $3,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
            table = kind.table()
        );

        sqlx::query_as::<_, ContentItem>(&sql)
            .bind(id)
            .bind(status)
            .bind(published_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("{} {}", kind, id)))
    }

    async fn upsert_assignment(
        &self,
        kind: ContentKind,
        content_id: Uuid,
        tenant_id: Uuid,
        change: &AssignmentChange,
    ) -> Result<Assignment, StoreError> {
        let assignment = sqlx::query_as::<_, Assignment>(
            r#"
            INSERT INTO content_assignments
                (kind, content_id, tenant_id, status, is_published, acknowledged_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (kind, content_id, tenant_id) DO UPDATE SET
                status = EXCLUDED.status,
                is_published = EXCLUDED.is_published,
                acknowledged_at = EXCLUDED.acknowledged_at
            RETURNING *
            "#,
        )
        .bind(kind)
        .bind(content_id)
        .bind(tenant_id)
        .bind(change.status)
        .bind(change.is_published)
        .bind(change.acknowledged_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(assignment)
    }

    async fn delete_assignment(
        &self,
        kind: ContentKind,
        content_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM content_assignments WHERE kind = $1 AND content_id = $2 AND tenant_id = $3",
        )
        .bind(kind)
        .bind(content_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_assigned(
        &self,
        kind: ContentKind,
        tenant_id: Uuid,
        statuses: &[AssignmentStatus],
    ) -> Result<Vec<(ContentItem, Assignment)>, StoreError> {
        let assignments = sqlx::query_as::<_, Assignment>(
            "SELECT * FROM content_assignments WHERE kind = $1 AND tenant_id = $2",
        )
        .bind(kind)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        let assignments: Vec<Assignment> = assignments
            .into_iter()
            .filter(|a| statuses.contains(&a.status))
            .collect();

        if assignments.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<Uuid> = assignments.iter().map(|a| a.content_id).collect();
        let sql = format!(
            "SELECT * FROM {} WHERE id = ANY($1) ORDER BY updated_at DESC",
            kind.table()
        );
        let items = sqlx::query_as::<_, ContentItem>(&sql)
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;

        let out = items
            .into_iter()
            .filter_map(|item| {
                assignments
                    .iter()
                    .find(|a| a.content_id == item.id)
                    .cloned()
                    .map(|a| (item, a))
            })
            .collect();

        Ok(out)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
