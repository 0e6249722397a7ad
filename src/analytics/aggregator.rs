//! Derived click statistics.
//!
//! Everything here is computed on demand from the persisted click events;
//! the hot path never waits on any of it.

use crate::models::DayCount;
use crate::service::ServiceError;
use crate::storage::LinkStore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Window for clicks-by-day and "monthly" counts, in seconds.
const TRAILING_WINDOW_SECS: i64 = 30 * 86400;

/// How many recent click events a breakdown returns.
const RECENT_CLICKS_LIMIT: i64 = 10;

/// How many referrers a breakdown returns.
const TOP_REFERRERS_LIMIT: usize = 5;

/// One recent click with missing metadata replaced by sentinels.
#[derive(Debug, Clone, Serialize)]
pub struct RecentClick {
    pub timestamp: i64,
    pub source_ip: String,
    pub user_agent: String,
    pub referrer: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReferrerCount {
    pub referrer: String,
    pub click_count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeviceCount {
    pub device: String,
    pub click_count: i64,
}

/// Detailed per-link breakdown.
///
/// `unique_visitors` is a true distinct-source-IP count over the full event
/// history. `visitor_ratio` is `round(unique_visitors / total_clicks * 100)`,
/// a visitor-to-click ratio rather than a real click-through rate (this
/// system has no impression denominator).
#[derive(Debug, Clone, Serialize)]
pub struct LinkAnalytics {
    pub total_clicks: i64,
    pub unique_visitors: i64,
    pub visitor_ratio: i64,
    pub recent_clicks: Vec<RecentClick>,
    pub clicks_by_day: Vec<DayCount>,
    pub top_referrers: Vec<ReferrerCount>,
    pub device_breakdown: Vec<DeviceCount>,
}

pub struct AnalyticsAggregator {
    store: Arc<dyn LinkStore>,
}

impl AnalyticsAggregator {
    pub fn new(store: Arc<dyn LinkStore>) -> Self {
        Self { store }
    }

    /// Owner-level totals: link count, lifetime clicks, trailing-30-day
    /// clicks.
    pub async fn owner_stats(
        &self,
        owner_id: &str,
    ) -> Result<crate::models::OwnerStats, ServiceError> {
        let since = chrono::Utc::now().timestamp() - TRAILING_WINDOW_SECS;
        Ok(self.store.aggregate_stats(owner_id, since).await?)
    }

    /// Ownership-checked detailed breakdown for one link.
    pub async fn link_analytics(
        &self,
        link_id: i64,
        owner_id: &str,
    ) -> Result<LinkAnalytics, ServiceError> {
        let link = self
            .store
            .get_by_id(link_id)
            .await?
            .ok_or(ServiceError::NotFoundOrForbidden)?;

        if link.owner_id.as_deref() != Some(owner_id) {
            return Err(ServiceError::NotFoundOrForbidden);
        }

        let total_clicks = link.click_count;
        let unique_visitors = self.store.distinct_visitor_count(link_id).await?;

        let visitor_ratio = if total_clicks > 0 {
            ((unique_visitors as f64 / total_clicks as f64) * 100.0).round() as i64
        } else {
            0
        };

        let recent_clicks = self
            .store
            .recent_clicks(link_id, RECENT_CLICKS_LIMIT)
            .await?
            .into_iter()
            .map(|event| RecentClick {
                timestamp: event.timestamp,
                source_ip: event.source_ip.unwrap_or_else(|| "Unknown".to_string()),
                user_agent: event.user_agent.unwrap_or_else(|| "Unknown".to_string()),
                referrer: event.referrer.unwrap_or_else(|| "Direct".to_string()),
            })
            .collect();

        let since = chrono::Utc::now().timestamp() - TRAILING_WINDOW_SECS;
        let clicks_by_day = self
            .store
            .clicks_by_day(link_id, since)
            .await?
            .into_iter()
            .filter_map(|(bucket, count)| {
                chrono::DateTime::from_timestamp(bucket, 0).map(|day| DayCount {
                    date: day.format("%Y-%m-%d").to_string(),
                    click_count: count,
                })
            })
            .collect();

        let top_referrers = top_referrers(self.store.referrer_counts(link_id).await?);
        let device_breakdown = device_breakdown(self.store.user_agent_counts(link_id).await?);

        Ok(LinkAnalytics {
            total_clicks,
            unique_visitors,
            visitor_ratio,
            recent_clicks,
            clicks_by_day,
            top_referrers,
            device_breakdown,
        })
    }
}

/// Normalize missing referrers to "Direct", merge, sort by count descending
/// (name ascending on ties), keep the top 5.
fn top_referrers(rows: Vec<(Option<String>, i64)>) -> Vec<ReferrerCount> {
    let mut merged: HashMap<String, i64> = HashMap::new();
    for (referrer, count) in rows {
        let referrer = referrer.unwrap_or_else(|| "Direct".to_string());
        *merged.entry(referrer).or_insert(0) += count;
    }

    let mut referrers: Vec<ReferrerCount> = merged
        .into_iter()
        .map(|(referrer, click_count)| ReferrerCount {
            referrer,
            click_count,
        })
        .collect();
    referrers.sort_by(|a, b| {
        b.click_count
            .cmp(&a.click_count)
            .then_with(|| a.referrer.cmp(&b.referrer))
    });
    referrers.truncate(TOP_REFERRERS_LIMIT);
    referrers
}

/// Classify each user agent into exactly one device class and count per
/// class, descending.
fn device_breakdown(rows: Vec<(Option<String>, i64)>) -> Vec<DeviceCount> {
    let mut merged: HashMap<&'static str, i64> = HashMap::new();
    for (user_agent, count) in rows {
        *merged.entry(classify_device(user_agent.as_deref())).or_insert(0) += count;
    }

    let mut devices: Vec<DeviceCount> = merged
        .into_iter()
        .map(|(device, click_count)| DeviceCount {
            device: device.to_string(),
            click_count,
        })
        .collect();
    devices.sort_by(|a, b| {
        b.click_count
            .cmp(&a.click_count)
            .then_with(|| a.device.cmp(&b.device))
    });
    devices
}

/// Substring classification, first match wins: Mobile, then Tablet, then
/// Desktop, else Unknown.
fn classify_device(user_agent: Option<&str>) -> &'static str {
    let ua = match user_agent {
        Some(ua) => ua,
        None => return "Unknown",
    };
    if ua.contains("Mobile") || ua.contains("Android") || ua.contains("iPhone") {
        "Mobile"
    } else if ua.contains("Tablet") || ua.contains("iPad") {
        "Tablet"
    } else if ua.contains("Windows") || ua.contains("Mac") || ua.contains("Linux") {
        "Desktop"
    } else {
        "Unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_user_agents() {
        assert_eq!(classify_device(Some("Mozilla/5.0 (iPhone; CPU)")), "Mobile");
        assert_eq!(classify_device(Some("Mozilla/5.0 (iPad; CPU)")), "Tablet");
        assert_eq!(
            classify_device(Some("Mozilla/5.0 (Windows NT 10.0)")),
            "Desktop"
        );
        assert_eq!(classify_device(Some("curl/8.0")), "Unknown");
        assert_eq!(classify_device(None), "Unknown");
    }

    #[test]
    fn mobile_token_beats_desktop_token() {
        // Android browsers advertise Linux as well; the Mobile check runs first.
        assert_eq!(
            classify_device(Some("Mozilla/5.0 (Linux; Android 14) Mobile")),
            "Mobile"
        );
    }

    #[test]
    fn merges_direct_referrers_and_caps_at_five() {
        let rows = vec![
            (None, 3),
            (Some("Direct".to_string()), 2),
            (Some("https://a.example".to_string()), 4),
            (Some("https://b.example".to_string()), 1),
            (Some("https://c.example".to_string()), 1),
            (Some("https://d.example".to_string()), 1),
            (Some("https://e.example".to_string()), 1),
        ];

        let top = top_referrers(rows);
        assert_eq!(top.len(), 5);
        assert_eq!(top[0].referrer, "Direct");
        assert_eq!(top[0].click_count, 5);
        assert_eq!(top[1].referrer, "https://a.example");
    }
}
