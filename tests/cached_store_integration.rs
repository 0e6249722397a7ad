//! Tests for the read-through cache wrapper.
//!
//! The wrapper fronts every lookup in the production wiring, so these cover
//! the cases where a cached entry and the database could disagree: negative
//! entries left by lookups that missed before a create, and invalidation on
//! alias changes, tag changes and deletes.

use snaplink::clicks::ClickRecorder;
use snaplink::models::{CreateLinkRequest, NewLink};
use snaplink::service::{LinkService, ServiceError};
use snaplink::shortcode::CodeGenerator;
use snaplink::storage::{CachedStore, LinkStore, SqliteStore};
use std::sync::Arc;

/// Returns the wrapper plus the undecorated inner store, so tests can mutate
/// the database behind the cache's back.
async fn create_test_stores() -> (CachedStore, Arc<dyn LinkStore>) {
    let store = SqliteStore::new("sqlite::memory:", 1).await.unwrap();
    store.init().await.unwrap();
    let inner: Arc<dyn LinkStore> = Arc::new(store);
    (CachedStore::new(Arc::clone(&inner), 1024), inner)
}

fn new_link(code: &str, alias: Option<&str>) -> NewLink {
    NewLink {
        long_url: "https://example.com/page".to_string(),
        short_code: code.to_string(),
        custom_alias: alias.map(String::from),
        title: None,
        tags: vec![],
        owner_id: Some("alice".to_string()),
        created_at: 1_700_000_000,
    }
}

#[tokio::test]
async fn create_overwrites_negative_entries_from_earlier_misses() {
    let (cached, _) = create_test_stores().await;

    // Both identifiers probed (and cached as misses) before the link exists.
    assert!(cached.get_by_code("abc123").await.unwrap().is_none());
    assert!(cached.get_by_alias("promo").await.unwrap().is_none());

    let created = cached
        .create_link(&new_link("abc123", Some("promo")))
        .await
        .unwrap();

    let by_code = cached.get_by_code("abc123").await.unwrap().unwrap();
    assert_eq!(by_code.id, created.id);

    let by_alias = cached.get_by_alias("promo").await.unwrap().unwrap();
    assert_eq!(by_alias.id, created.id);
}

#[tokio::test]
async fn resolve_finds_alias_probed_before_creation() {
    let (cached, _) = create_test_stores().await;
    let cached: Arc<dyn LinkStore> = Arc::new(cached);
    let recorder = Arc::new(ClickRecorder::new(Arc::clone(&cached), 16, 3600));
    let service = LinkService::new(
        Arc::clone(&cached),
        recorder,
        CodeGenerator::default(),
        10,
    );

    // The miss lands in the cache before the link exists.
    assert!(matches!(
        service.resolve("promo").await,
        Err(ServiceError::NotFound)
    ));

    let created = service
        .create_link(
            CreateLinkRequest {
                long_url: "https://example.com/page".to_string(),
                custom_alias: Some("promo".to_string()),
                title: None,
                tags: vec![],
            },
            None,
        )
        .await
        .unwrap();

    let resolved = service.resolve("promo").await.unwrap();
    assert_eq!(resolved.id, created.id);
}

#[tokio::test]
async fn lookups_are_served_from_cache() {
    let (cached, inner) = create_test_stores().await;
    let created = cached
        .create_link(&new_link("abc123", Some("promo")))
        .await
        .unwrap();

    // Prime both entries, then change the row behind the cache's back.
    cached.get_by_code("abc123").await.unwrap();
    cached.get_by_alias("promo").await.unwrap();
    inner
        .update_tags(created.id, &["changed".to_string()])
        .await
        .unwrap();

    // Cached entries still serve the pre-change snapshot.
    let by_code = cached.get_by_code("abc123").await.unwrap().unwrap();
    assert!(by_code.tags.is_empty());
    let by_alias = cached.get_by_alias("promo").await.unwrap().unwrap();
    assert!(by_alias.tags.is_empty());
}

#[tokio::test]
async fn alias_change_invalidates_old_and_new_entries() {
    let (cached, _) = create_test_stores().await;
    let created = cached
        .create_link(&new_link("abc123", Some("one")))
        .await
        .unwrap();

    cached.get_by_code("abc123").await.unwrap();
    cached.get_by_alias("one").await.unwrap();
    // Leave a negative entry under the alias about to be claimed.
    assert!(cached.get_by_alias("two").await.unwrap().is_none());

    assert!(cached.update_alias(created.id, Some("two")).await.unwrap());

    assert!(cached.get_by_alias("one").await.unwrap().is_none());
    let by_alias = cached.get_by_alias("two").await.unwrap().unwrap();
    assert_eq!(by_alias.id, created.id);
    let by_code = cached.get_by_code("abc123").await.unwrap().unwrap();
    assert_eq!(by_code.custom_alias.as_deref(), Some("two"));
}

#[tokio::test]
async fn tag_update_invalidates_cached_entry() {
    let (cached, _) = create_test_stores().await;
    let created = cached.create_link(&new_link("abc123", None)).await.unwrap();

    cached.get_by_code("abc123").await.unwrap();
    assert!(cached
        .update_tags(created.id, &["launch".to_string()])
        .await
        .unwrap());

    let by_code = cached.get_by_code("abc123").await.unwrap().unwrap();
    assert_eq!(by_code.tags, vec!["launch"]);
}

#[tokio::test]
async fn delete_invalidates_resolution_entries() {
    let (cached, _) = create_test_stores().await;
    let created = cached
        .create_link(&new_link("abc123", Some("promo")))
        .await
        .unwrap();

    cached.get_by_code("abc123").await.unwrap();
    cached.get_by_alias("promo").await.unwrap();

    assert!(cached.delete_link(created.id, "alice").await.unwrap());

    assert!(cached.get_by_code("abc123").await.unwrap().is_none());
    assert!(cached.get_by_alias("promo").await.unwrap().is_none());
}
