//! Analytics aggregation tests: per-link breakdowns and owner stats.

use snaplink::analytics::AnalyticsAggregator;
use snaplink::models::{NewClickEvent, NewLink};
use snaplink::service::ServiceError;
use snaplink::storage::{LinkStore, SqliteStore};
use std::sync::Arc;

async fn create_test_store() -> Arc<dyn LinkStore> {
    let store = SqliteStore::new("sqlite::memory:", 1).await.unwrap();
    store.init().await.unwrap();
    Arc::new(store)
}

async fn create_owned_link(store: &Arc<dyn LinkStore>, code: &str, owner: &str) -> i64 {
    store
        .create_link(&NewLink {
            long_url: "https://example.com/page".to_string(),
            short_code: code.to_string(),
            custom_alias: None,
            title: None,
            tags: vec![],
            owner_id: Some(owner.to_string()),
            created_at: chrono::Utc::now().timestamp(),
        })
        .await
        .unwrap()
        .id
}

fn event(
    link_id: i64,
    timestamp: i64,
    ip: Option<&str>,
    ua: Option<&str>,
    referrer: Option<&str>,
) -> NewClickEvent {
    NewClickEvent {
        link_id,
        timestamp,
        source_ip: ip.map(String::from),
        user_agent: ua.map(String::from),
        referrer: referrer.map(String::from),
    }
}

#[tokio::test]
async fn clicks_over_three_days_bucket_into_three_ascending_entries() {
    let store = create_test_store().await;
    let aggregator = AnalyticsAggregator::new(Arc::clone(&store));
    let link_id = create_owned_link(&store, "abc123", "alice").await;

    // 35 events spread over three distinct UTC days: 20 today, 10 yesterday,
    // 5 the day before.
    let now = chrono::Utc::now().timestamp();
    let spread = [(0i64, 20usize), (86_400, 10), (2 * 86_400, 5)];
    for (age, count) in spread {
        for _ in 0..count {
            store
                .insert_click(&event(link_id, now - age, Some("203.0.113.7"), None, None))
                .await
                .unwrap();
        }
    }
    store.increment_clicks(link_id, 35, now).await.unwrap();

    let breakdown = aggregator.link_analytics(link_id, "alice").await.unwrap();

    assert_eq!(breakdown.total_clicks, 35);
    assert_eq!(breakdown.clicks_by_day.len(), 3);
    let total: i64 = breakdown
        .clicks_by_day
        .iter()
        .map(|day| day.click_count)
        .sum();
    assert_eq!(total, 35);

    // Ascending by date, no synthesized zero-click days.
    let dates: Vec<&str> = breakdown
        .clicks_by_day
        .iter()
        .map(|day| day.date.as_str())
        .collect();
    let mut sorted = dates.clone();
    sorted.sort();
    assert_eq!(dates, sorted);
    assert_eq!(breakdown.clicks_by_day[0].click_count, 5);
    assert_eq!(breakdown.clicks_by_day[2].click_count, 20);
}

#[tokio::test]
async fn unique_visitors_are_distinct_ips_and_ratio_is_rounded() {
    let store = create_test_store().await;
    let aggregator = AnalyticsAggregator::new(Arc::clone(&store));
    let link_id = create_owned_link(&store, "abc123", "alice").await;

    let now = chrono::Utc::now().timestamp();
    // 6 clicks from 2 distinct IPs (plus one with no IP at all).
    for ip in ["203.0.113.7", "203.0.113.7", "203.0.113.8", "203.0.113.8"] {
        store
            .insert_click(&event(link_id, now, Some(ip), None, None))
            .await
            .unwrap();
    }
    store.insert_click(&event(link_id, now, None, None, None)).await.unwrap();
    store.insert_click(&event(link_id, now, None, None, None)).await.unwrap();
    store.increment_clicks(link_id, 6, now).await.unwrap();

    let breakdown = aggregator.link_analytics(link_id, "alice").await.unwrap();
    assert_eq!(breakdown.total_clicks, 6);
    assert_eq!(breakdown.unique_visitors, 2);
    // round(2 / 6 * 100) = 33
    assert_eq!(breakdown.visitor_ratio, 33);
}

#[tokio::test]
async fn zero_clicks_means_zero_ratio() {
    let store = create_test_store().await;
    let aggregator = AnalyticsAggregator::new(Arc::clone(&store));
    let link_id = create_owned_link(&store, "abc123", "alice").await;

    let breakdown = aggregator.link_analytics(link_id, "alice").await.unwrap();
    assert_eq!(breakdown.total_clicks, 0);
    assert_eq!(breakdown.visitor_ratio, 0);
    assert!(breakdown.recent_clicks.is_empty());
    assert!(breakdown.clicks_by_day.is_empty());
    assert!(breakdown.top_referrers.is_empty());
    assert!(breakdown.device_breakdown.is_empty());
}

#[tokio::test]
async fn recent_clicks_cap_at_ten_with_sentinels() {
    let store = create_test_store().await;
    let aggregator = AnalyticsAggregator::new(Arc::clone(&store));
    let link_id = create_owned_link(&store, "abc123", "alice").await;

    let now = chrono::Utc::now().timestamp();
    for i in 0..12 {
        store
            .insert_click(&event(link_id, now - i, None, None, None))
            .await
            .unwrap();
    }

    let breakdown = aggregator.link_analytics(link_id, "alice").await.unwrap();
    assert_eq!(breakdown.recent_clicks.len(), 10);

    // Descending by timestamp, missing metadata replaced with sentinels.
    assert_eq!(breakdown.recent_clicks[0].timestamp, now);
    assert!(breakdown
        .recent_clicks
        .windows(2)
        .all(|pair| pair[0].timestamp >= pair[1].timestamp));
    assert_eq!(breakdown.recent_clicks[0].source_ip, "Unknown");
    assert_eq!(breakdown.recent_clicks[0].user_agent, "Unknown");
    assert_eq!(breakdown.recent_clicks[0].referrer, "Direct");
}

#[tokio::test]
async fn referrers_and_devices_are_counted_and_sorted() {
    let store = create_test_store().await;
    let aggregator = AnalyticsAggregator::new(Arc::clone(&store));
    let link_id = create_owned_link(&store, "abc123", "alice").await;

    let now = chrono::Utc::now().timestamp();
    let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)";
    let windows = "Mozilla/5.0 (Windows NT 10.0; Win64)";
    let ipad = "Mozilla/5.0 (iPad; CPU OS 17_0)";

    let clicks = [
        (Some("https://news.example"), Some(windows)),
        (Some("https://news.example"), Some(windows)),
        (Some("https://news.example"), Some(iphone)),
        (Some("https://social.example"), Some(iphone)),
        (None, Some(iphone)),
        (None, Some(ipad)),
        (None, Some("curl/8.0")),
    ];
    for (referrer, ua) in clicks {
        store
            .insert_click(&event(link_id, now, None, ua, referrer))
            .await
            .unwrap();
    }

    let breakdown = aggregator.link_analytics(link_id, "alice").await.unwrap();

    assert_eq!(breakdown.top_referrers[0].referrer, "Direct");
    assert_eq!(breakdown.top_referrers[0].click_count, 3);
    assert_eq!(breakdown.top_referrers[1].referrer, "https://news.example");
    assert_eq!(breakdown.top_referrers[1].click_count, 3);
    assert_eq!(breakdown.top_referrers[2].referrer, "https://social.example");

    assert_eq!(breakdown.device_breakdown[0].device, "Mobile");
    assert_eq!(breakdown.device_breakdown[0].click_count, 3);
    let by_name: std::collections::HashMap<_, _> = breakdown
        .device_breakdown
        .iter()
        .map(|d| (d.device.as_str(), d.click_count))
        .collect();
    assert_eq!(by_name["Desktop"], 2);
    assert_eq!(by_name["Tablet"], 1);
    assert_eq!(by_name["Unknown"], 1);
}

#[tokio::test]
async fn analytics_are_ownership_checked() {
    let store = create_test_store().await;
    let aggregator = AnalyticsAggregator::new(Arc::clone(&store));
    let link_id = create_owned_link(&store, "abc123", "alice").await;

    // Foreign and missing links produce the same error.
    assert!(matches!(
        aggregator.link_analytics(link_id, "mallory").await,
        Err(ServiceError::NotFoundOrForbidden)
    ));
    assert!(matches!(
        aggregator.link_analytics(9999, "alice").await,
        Err(ServiceError::NotFoundOrForbidden)
    ));
}

#[tokio::test]
async fn owner_stats_sum_links_and_window_clicks() {
    let store = create_test_store().await;
    let aggregator = AnalyticsAggregator::new(Arc::clone(&store));

    let a = create_owned_link(&store, "codea1", "alice").await;
    let b = create_owned_link(&store, "codeb1", "alice").await;
    create_owned_link(&store, "codec1", "bob").await;

    let now = chrono::Utc::now().timestamp();
    store.increment_clicks(a, 3, now).await.unwrap();
    store.increment_clicks(b, 1, now).await.unwrap();

    // Three recent events plus one older than the 30-day window.
    for _ in 0..3 {
        store.insert_click(&event(a, now, None, None, None)).await.unwrap();
    }
    store
        .insert_click(&event(b, now - 40 * 86_400, None, None, None))
        .await
        .unwrap();

    let stats = aggregator.owner_stats("alice").await.unwrap();
    assert_eq!(stats.total_links, 2);
    assert_eq!(stats.total_clicks, 4);
    assert_eq!(stats.monthly_clicks, 3);
}
