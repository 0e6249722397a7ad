use crate::models::{ClickEvent, Link, NewClickEvent, NewLink, OwnerStats};
use crate::storage::trait_def::LinkRow;
use crate::storage::{LinkStore, StoreError, StoreResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl LinkStore for PostgresStore {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id BIGSERIAL PRIMARY KEY,
                long_url TEXT NOT NULL,
                short_code TEXT NOT NULL,
                custom_alias TEXT,
                title TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                click_count BIGINT NOT NULL DEFAULT 0,
                created_at BIGINT NOT NULL,
                last_accessed_at BIGINT,
                owner_id TEXT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        // Single shared namespace for short codes and aliases. The primary
        // key here is the authoritative arbiter for concurrent creates.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS link_identifiers (
                identifier TEXT PRIMARY KEY,
                link_id BIGINT NOT NULL REFERENCES links(id)
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS click_events (
                id BIGSERIAL PRIMARY KEY,
                link_id BIGINT NOT NULL REFERENCES links(id),
                timestamp BIGINT NOT NULL,
                source_ip TEXT,
                user_agent TEXT,
                referrer TEXT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_short_code ON links(short_code)")
            .execute(self.pool.as_ref())
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_custom_alias ON links(custom_alias)")
            .execute(self.pool.as_ref())
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_owner ON links(owner_id)")
            .execute(self.pool.as_ref())
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_clicks_link_ts ON click_events(link_id, timestamp)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn create_link(&self, new: &NewLink) -> StoreResult<Link> {
        let tags_json =
            serde_json::to_string(&new.tags).map_err(|e| StoreError::Other(e.into()))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Other(e.into()))?;

        let link_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO links (long_url, short_code, custom_alias, title, tags, created_at, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&new.long_url)
        .bind(&new.short_code)
        .bind(&new.custom_alias)
        .bind(&new.title)
        .bind(&tags_json)
        .bind(new.created_at)
        .bind(&new.owner_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StoreError::Other(e.into()))?;

        let claimed = sqlx::query(
            "INSERT INTO link_identifiers (identifier, link_id) VALUES ($1, $2) ON CONFLICT (identifier) DO NOTHING",
        )
        .bind(&new.short_code)
        .bind(link_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Other(e.into()))?;

        if claimed.rows_affected() == 0 {
            return Err(StoreError::DuplicateIdentifier(new.short_code.clone()));
        }

        if let Some(alias) = &new.custom_alias {
            let claimed = sqlx::query(
                "INSERT INTO link_identifiers (identifier, link_id) VALUES ($1, $2) ON CONFLICT (identifier) DO NOTHING",
            )
            .bind(alias)
            .bind(link_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Other(e.into()))?;

            if claimed.rows_affected() == 0 {
                return Err(StoreError::DuplicateIdentifier(alias.clone()));
            }
        }

        tx.commit().await.map_err(|e| StoreError::Other(e.into()))?;

        Ok(Link {
            id: link_id,
            long_url: new.long_url.clone(),
            short_code: new.short_code.clone(),
            custom_alias: new.custom_alias.clone(),
            title: new.title.clone(),
            tags: new.tags.clone(),
            click_count: 0,
            created_at: new.created_at,
            last_accessed_at: None,
            owner_id: new.owner_id.clone(),
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Link>> {
        let row = sqlx::query_as::<_, LinkRow>("SELECT * FROM links WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        Ok(row.map(Link::from))
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Link>> {
        let row = sqlx::query_as::<_, LinkRow>("SELECT * FROM links WHERE short_code = $1")
            .bind(code)
            .fetch_optional(self.pool.as_ref())
            .await?;
        Ok(row.map(Link::from))
    }

    async fn get_by_alias(&self, alias: &str) -> Result<Option<Link>> {
        let row = sqlx::query_as::<_, LinkRow>("SELECT * FROM links WHERE custom_alias = $1")
            .bind(alias)
            .fetch_optional(self.pool.as_ref())
            .await?;
        Ok(row.map(Link::from))
    }

    async fn identifier_exists(&self, identifier: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM link_identifiers WHERE identifier = $1",
        )
        .bind(identifier)
        .fetch_one(self.pool.as_ref())
        .await?;
        Ok(count > 0)
    }

    async fn update_alias(&self, id: i64, alias: Option<&str>) -> StoreResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Other(e.into()))?;

        let current = sqlx::query_scalar::<_, Option<String>>(
            "SELECT custom_alias FROM links WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StoreError::Other(e.into()))?;

        let current = match current {
            Some(current) => current,
            None => return Ok(false),
        };

        // Saving a link with its own unchanged alias is not a collision.
        if current.as_deref() == alias {
            return Ok(true);
        }

        if let Some(old) = &current {
            sqlx::query("DELETE FROM link_identifiers WHERE link_id = $1 AND identifier = $2")
                .bind(id)
                .bind(old)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Other(e.into()))?;
        }

        if let Some(new_alias) = alias {
            let claimed = sqlx::query(
                "INSERT INTO link_identifiers (identifier, link_id) VALUES ($1, $2) ON CONFLICT (identifier) DO NOTHING",
            )
            .bind(new_alias)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Other(e.into()))?;

            if claimed.rows_affected() == 0 {
                return Err(StoreError::DuplicateIdentifier(new_alias.to_string()));
            }
        }

        sqlx::query("UPDATE links SET custom_alias = $1 WHERE id = $2")
            .bind(alias)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Other(e.into()))?;

        tx.commit().await.map_err(|e| StoreError::Other(e.into()))?;
        Ok(true)
    }

    async fn update_tags(&self, id: i64, tags: &[String]) -> Result<bool> {
        let tags_json = serde_json::to_string(tags)?;
        let result = sqlx::query("UPDATE links SET tags = $1 WHERE id = $2")
            .bind(tags_json)
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_link(&self, id: i64, owner_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let owned = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM links WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

        if owned == 0 {
            return Ok(false);
        }

        // Explicit cascade: events, identifiers, then the link itself.
        sqlx::query("DELETE FROM click_events WHERE link_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM link_identifiers WHERE link_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM links WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn increment_clicks(&self, id: i64, amount: i64, last_access: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE links
            SET click_count = click_count + $1,
                last_accessed_at = $2
            WHERE id = $3
            "#,
        )
        .bind(amount)
        .bind(last_access)
        .bind(id)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    async fn insert_click(&self, click: &NewClickEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO click_events (link_id, timestamp, source_ip, user_agent, referrer)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(click.link_id)
        .bind(click.timestamp)
        .bind(&click.source_ip)
        .bind(&click.user_agent)
        .bind(&click.referrer)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    async fn list_by_owner(&self, owner_id: &str, limit: i64, offset: i64) -> Result<Vec<Link>> {
        let rows = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT * FROM links
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows.into_iter().map(Link::from).collect())
    }

    async fn aggregate_stats(&self, owner_id: &str, since: i64) -> Result<OwnerStats> {
        let (total_links, total_clicks) = sqlx::query_as::<_, (i64, i64)>(
            // SUM over BIGINT is NUMERIC in Postgres; cast back for decoding.
            "SELECT COUNT(*), COALESCE(SUM(click_count), 0)::BIGINT FROM links WHERE owner_id = $1",
        )
        .bind(owner_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        let monthly_clicks = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM click_events ce
            JOIN links l ON ce.link_id = l.id
            WHERE l.owner_id = $1 AND ce.timestamp >= $2
            "#,
        )
        .bind(owner_id)
        .bind(since)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(OwnerStats {
            total_links,
            total_clicks,
            monthly_clicks,
        })
    }

    async fn recent_clicks(&self, link_id: i64, limit: i64) -> Result<Vec<ClickEvent>> {
        let events = sqlx::query_as::<_, ClickEvent>(
            r#"
            SELECT * FROM click_events
            WHERE link_id = $1
            ORDER BY timestamp DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(link_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(events)
    }

    async fn clicks_by_day(&self, link_id: i64, since: i64) -> Result<Vec<(i64, i64)>> {
        let rows = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT (timestamp / 86400) * 86400 AS day_bucket, COUNT(*)
            FROM click_events
            WHERE link_id = $1 AND timestamp >= $2
            GROUP BY day_bucket
            ORDER BY day_bucket ASC
            "#,
        )
        .bind(link_id)
        .bind(since)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows)
    }

    async fn referrer_counts(&self, link_id: i64) -> Result<Vec<(Option<String>, i64)>> {
        let rows = sqlx::query_as::<_, (Option<String>, i64)>(
            r#"
            SELECT referrer, COUNT(*) AS clicks
            FROM click_events
            WHERE link_id = $1
            GROUP BY referrer
            ORDER BY clicks DESC
            "#,
        )
        .bind(link_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows)
    }

    async fn user_agent_counts(&self, link_id: i64) -> Result<Vec<(Option<String>, i64)>> {
        let rows = sqlx::query_as::<_, (Option<String>, i64)>(
            r#"
            SELECT user_agent, COUNT(*) AS clicks
            FROM click_events
            WHERE link_id = $1
            GROUP BY user_agent
            ORDER BY clicks DESC
            "#,
        )
        .bind(link_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows)
    }

    async fn distinct_visitor_count(&self, link_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(DISTINCT source_ip) FROM click_events WHERE link_id = $1",
        )
        .bind(link_id)
        .fetch_one(self.pool.as_ref())
        .await?;
        Ok(count)
    }
}
