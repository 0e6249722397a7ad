use crate::models::{ClickEvent, Link, NewClickEvent, NewLink, OwnerStats};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The code/alias namespace invariant would be violated. Carries the
    /// colliding identifier so callers can tell a retryable generated-code
    /// collision from a terminal user-supplied alias collision.
    #[error("identifier already exists: {0}")]
    DuplicateIdentifier(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Row shape shared by the SQL backends. Tags are stored as a JSON text
/// column and decoded on the way out.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct LinkRow {
    pub id: i64,
    pub long_url: String,
    pub short_code: String,
    pub custom_alias: Option<String>,
    pub title: Option<String>,
    pub tags: String,
    pub click_count: i64,
    pub created_at: i64,
    pub last_accessed_at: Option<i64>,
    pub owner_id: Option<String>,
}

impl From<LinkRow> for Link {
    fn from(row: LinkRow) -> Self {
        Link {
            id: row.id,
            long_url: row.long_url,
            short_code: row.short_code,
            custom_alias: row.custom_alias,
            title: row.title,
            tags: serde_json::from_str(&row.tags).unwrap_or_default(),
            click_count: row.click_count,
            created_at: row.created_at,
            last_accessed_at: row.last_accessed_at,
            owner_id: row.owner_id,
        }
    }
}

#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Initialize the storage (create tables and indexes).
    async fn init(&self) -> Result<()>;

    /// Persist a new link. The link row and its identifier rows (short code,
    /// plus alias when present) are written in one transaction; a namespace
    /// collision fails with `DuplicateIdentifier`.
    async fn create_link(&self, new: &NewLink) -> StoreResult<Link>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Link>>;

    async fn get_by_code(&self, code: &str) -> Result<Option<Link>>;

    async fn get_by_alias(&self, alias: &str) -> Result<Option<Link>>;

    /// Check the combined code/alias namespace.
    async fn identifier_exists(&self, identifier: &str) -> Result<bool>;

    /// Replace the custom alias (`None` clears it). Collision-checked against
    /// the combined namespace, excluding the link's own current alias.
    /// Returns `Ok(false)` when the link does not exist.
    async fn update_alias(&self, id: i64, alias: Option<&str>) -> StoreResult<bool>;

    /// Returns `false` when the link does not exist.
    async fn update_tags(&self, id: i64, tags: &[String]) -> Result<bool>;

    /// Ownership-checked delete; cascades click events and identifier rows.
    /// Returns `false` when no link matches both id and owner.
    async fn delete_link(&self, id: i64, owner_id: &str) -> Result<bool>;

    /// Atomic counter bump: a single `click_count = click_count + ?`
    /// statement, never read-modify-write. Also advances `last_accessed_at`.
    async fn increment_clicks(&self, id: i64, amount: i64, last_access: i64) -> Result<()>;

    async fn insert_click(&self, click: &NewClickEvent) -> Result<()>;

    async fn list_by_owner(&self, owner_id: &str, limit: i64, offset: i64) -> Result<Vec<Link>>;

    /// Owner-level totals; `since` bounds the "monthly" click window.
    async fn aggregate_stats(&self, owner_id: &str, since: i64) -> Result<OwnerStats>;

    /// Most recent click events, descending by timestamp.
    async fn recent_clicks(&self, link_id: i64, limit: i64) -> Result<Vec<ClickEvent>>;

    /// Clicks since `since`, bucketed to UTC days (`ts / 86400 * 86400`),
    /// ascending. Days with no clicks do not appear.
    async fn clicks_by_day(&self, link_id: i64, since: i64) -> Result<Vec<(i64, i64)>>;

    /// Referrer value (None = direct) with click count, descending.
    async fn referrer_counts(&self, link_id: i64) -> Result<Vec<(Option<String>, i64)>>;

    /// Raw user-agent strings with click count; classification happens in the
    /// analytics layer.
    async fn user_agent_counts(&self, link_id: i64) -> Result<Vec<(Option<String>, i64)>>;

    /// Distinct known source IPs over the full event history.
    async fn distinct_visitor_count(&self, link_id: i64) -> Result<i64>;
}
