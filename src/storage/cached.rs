use crate::models::{ClickEvent, Link, NewClickEvent, NewLink, OwnerStats};
use crate::storage::{LinkStore, StoreResult};
use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Read-through cache over identifier lookups on the redirect hot path.
///
/// Cached entries may carry a stale `click_count` (increments land in the
/// database, not the cache); anything that changes resolution (alias
/// updates, tag updates, deletes) invalidates the affected entries.
pub struct CachedStore {
    inner: Arc<dyn LinkStore>,
    read_cache: Cache<String, Option<Link>>,
}

fn code_key(code: &str) -> String {
    format!("c:{code}")
}

fn alias_key(alias: &str) -> String {
    format!("a:{alias}")
}

impl CachedStore {
    pub fn new(inner: Arc<dyn LinkStore>, max_entries: u64) -> Self {
        let read_cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(Duration::from_secs(300))
            .build();
        Self { inner, read_cache }
    }

    async fn invalidate_link(&self, link: &Link) {
        self.read_cache.invalidate(&code_key(&link.short_code)).await;
        if let Some(alias) = &link.custom_alias {
            self.read_cache.invalidate(&alias_key(alias)).await;
        }
    }
}

#[async_trait]
impl LinkStore for CachedStore {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn create_link(&self, new: &NewLink) -> StoreResult<Link> {
        let link = self.inner.create_link(new).await?;
        // Overwrite both identifier entries: a lookup that missed before the
        // create may have left negative entries behind.
        self.read_cache
            .insert(code_key(&link.short_code), Some(link.clone()))
            .await;
        if let Some(alias) = &link.custom_alias {
            self.read_cache
                .insert(alias_key(alias), Some(link.clone()))
                .await;
        }
        Ok(link)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Link>> {
        self.inner.get_by_id(id).await
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Link>> {
        let key = code_key(code);
        if let Some(cached) = self.read_cache.get(&key).await {
            return Ok(cached);
        }
        let result = self.inner.get_by_code(code).await?;
        self.read_cache.insert(key, result.clone()).await;
        Ok(result)
    }

    async fn get_by_alias(&self, alias: &str) -> Result<Option<Link>> {
        let key = alias_key(alias);
        if let Some(cached) = self.read_cache.get(&key).await {
            return Ok(cached);
        }
        let result = self.inner.get_by_alias(alias).await?;
        self.read_cache.insert(key, result.clone()).await;
        Ok(result)
    }

    async fn identifier_exists(&self, identifier: &str) -> Result<bool> {
        self.inner.identifier_exists(identifier).await
    }

    async fn update_alias(&self, id: i64, alias: Option<&str>) -> StoreResult<bool> {
        // Snapshot the pre-update identifiers so both old and new entries
        // can be dropped.
        let before = self.inner.get_by_id(id).await?;
        let updated = self.inner.update_alias(id, alias).await?;
        if updated {
            if let Some(link) = before {
                self.invalidate_link(&link).await;
            }
            if let Some(new_alias) = alias {
                self.read_cache.invalidate(&alias_key(new_alias)).await;
            }
        }
        Ok(updated)
    }

    async fn update_tags(&self, id: i64, tags: &[String]) -> Result<bool> {
        let before = self.inner.get_by_id(id).await?;
        let updated = self.inner.update_tags(id, tags).await?;
        if updated {
            if let Some(link) = before {
                self.invalidate_link(&link).await;
            }
        }
        Ok(updated)
    }

    async fn delete_link(&self, id: i64, owner_id: &str) -> Result<bool> {
        let before = self.inner.get_by_id(id).await?;
        let deleted = self.inner.delete_link(id, owner_id).await?;
        if deleted {
            if let Some(link) = before {
                self.invalidate_link(&link).await;
            }
        }
        Ok(deleted)
    }

    async fn increment_clicks(&self, id: i64, amount: i64, last_access: i64) -> Result<()> {
        self.inner.increment_clicks(id, amount, last_access).await
    }

    async fn insert_click(&self, click: &NewClickEvent) -> Result<()> {
        self.inner.insert_click(click).await
    }

    async fn list_by_owner(&self, owner_id: &str, limit: i64, offset: i64) -> Result<Vec<Link>> {
        self.inner.list_by_owner(owner_id, limit, offset).await
    }

    async fn aggregate_stats(&self, owner_id: &str, since: i64) -> Result<OwnerStats> {
        self.inner.aggregate_stats(owner_id, since).await
    }

    async fn recent_clicks(&self, link_id: i64, limit: i64) -> Result<Vec<ClickEvent>> {
        self.inner.recent_clicks(link_id, limit).await
    }

    async fn clicks_by_day(&self, link_id: i64, since: i64) -> Result<Vec<(i64, i64)>> {
        self.inner.clicks_by_day(link_id, since).await
    }

    async fn referrer_counts(&self, link_id: i64) -> Result<Vec<(Option<String>, i64)>> {
        self.inner.referrer_counts(link_id).await
    }

    async fn user_agent_counts(&self, link_id: i64) -> Result<Vec<(Option<String>, i64)>> {
        self.inner.user_agent_counts(link_id).await
    }

    async fn distinct_visitor_count(&self, link_id: i64) -> Result<i64> {
        self.inner.distinct_visitor_count(link_id).await
    }
}
