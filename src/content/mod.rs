use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::{uuid, Uuid};

/// Owning tenant id for globally authored content rows.
///
/// Platform-admin authority is carried by `Role::PlatformAdmin` in the token
/// claims; this constant only marks which tenant owns shared rows.
pub const SYSTEM_TENANT_ID: Uuid = uuid!("00000000-0000-0000-0000-000000000999");

/// The content kinds the API serves. Each kind maps to its own table but
/// shares the same tenant/slug/status shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "content_kind", rename_all = "snake_case")]
pub enum ContentKind {
    News,
    Destinations,
    Trips,
}

impl ContentKind {
    pub fn from_path(segment: &str) -> Option<Self> {
        match segment {
            "news" => Some(Self::News),
            "destinations" => Some(Self::Destinations),
            "trips" => Some(Self::Trips),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::News => "news",
            Self::Destinations => "destinations",
            Self::Trips => "trips",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Self::News => "news_items",
            Self::Destinations => "destinations",
            Self::Trips => "trips",
        }
    }

    /// Kind-specific fields accepted from the external builder. Anything not
    /// listed here is dropped on save rather than stored blindly.
    pub fn extra_fields(&self) -> &'static [&'static str] {
        match self {
            Self::News => &["excerpt", "featured_image", "tags"],
            Self::Destinations => &["country", "region", "highlights", "images"],
            Self::Trips => &[
                "destinations",
                "duration_days",
                "price_from",
                "images",
                "tags",
            ],
        }
    }

    /// Whether the platform operator can author items of this kind for
    /// distribution to brands. Trips are always brand-authored.
    pub fn allows_system_author(&self) -> bool {
        !matches!(self, Self::Trips)
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "content_status", rename_all = "snake_case")]
pub enum ContentStatus {
    Draft,
    Published,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "author_kind", rename_all = "snake_case")]
pub enum AuthorKind {
    System,
    Tenant,
}

/// One content document, owned by exactly one tenant (or the system tenant).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContentItem {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub extra: serde_json::Value,
    pub status: ContentStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub author_kind: AuthorKind,
    pub author_id: Option<Uuid>,
    pub is_mandatory: bool,
    pub enabled_for_tenants: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    pub fn is_system_authored(&self) -> bool {
        self.author_kind == AuthorKind::System
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "assignment_status", rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Accepted,
    Rejected,
    Mandatory,
}

/// Per-tenant adoption record for a system-authored content item.
///
/// At most one row exists per `(kind, content_id, tenant_id)`. `is_published`
/// is only meaningful while `status` is accepted or mandatory.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Assignment {
    pub id: Uuid,
    pub kind: ContentKind,
    pub content_id: Uuid,
    pub tenant_id: Uuid,
    pub status: AssignmentStatus,
    pub is_published: bool,
    pub assigned_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}
