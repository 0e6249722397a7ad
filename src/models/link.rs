use serde::{Deserialize, Serialize};

/// A shortened link record.
///
/// `short_code` and all non-null `custom_alias` values live in one shared
/// uniqueness namespace: resolving either finds the link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: i64,
    pub long_url: String,
    pub short_code: String,
    pub custom_alias: Option<String>,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub click_count: i64,
    pub created_at: i64,
    pub last_accessed_at: Option<i64>,
    pub owner_id: Option<String>,
}

/// Fields needed to persist a new link. `id` is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewLink {
    pub long_url: String,
    pub short_code: String,
    pub custom_alias: Option<String>,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub owner_id: Option<String>,
    pub created_at: i64,
}

/// Creation payload as accepted by the API and the service layer.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLinkRequest {
    pub long_url: String,
    pub custom_alias: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Mutable fields of a link. Everything else is immutable after creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkPatch {
    /// `Some(None)` clears the alias, `None` leaves it untouched.
    #[serde(default, with = "double_option")]
    pub custom_alias: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
}

/// Serde helper so an absent `custom_alias` key means "unchanged" while an
/// explicit `null` means "clear".
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(de: D) -> Result<Option<Option<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(de).map(Some)
    }
}

/// One observed resolution of a link. Insert-only; deleted only by cascade
/// when the owning link is deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ClickEvent {
    pub id: i64,
    pub link_id: i64,
    pub timestamp: i64,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

/// Click event before it has been assigned an id by the store.
#[derive(Debug, Clone)]
pub struct NewClickEvent {
    pub link_id: i64,
    pub timestamp: i64,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

/// Aggregate stats for one owner.
#[derive(Debug, Clone, Serialize)]
pub struct OwnerStats {
    pub total_links: i64,
    pub total_clicks: i64,
    pub monthly_clicks: i64,
}

/// Clicks grouped onto one UTC calendar day.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DayCount {
    pub date: String,
    pub click_count: i64,
}
