//! Integration tests running the gateway and collections against a real
//! SQLite file.
//!
//! The catalog is mocked so no HTTP requests are made. Each test reopens the
//! database to check that what was written survives a restart.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use paperdesk_core::catalog::mock::{MockCatalog, MockResponse};
use paperdesk_core::{
    Backend, CollectionError, CollectionKind, CollectionStore, ManualClock, NewItem, Record,
    RecordPage, SearchCriteria, SearchGateway, SqliteStore, SubscriptionStore, build_backend,
};

fn sample_page() -> RecordPage {
    RecordPage {
        items: vec![Record {
            id: "2310.06825v1".into(),
            title: "Mistral 7B".into(),
            authors: vec!["Albert Q. Jiang".into()],
            ..Default::default()
        }],
        total_results: 1,
        start_index: 0,
        items_per_page: 10,
    }
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 1, 10, 8, 30, 0).unwrap(),
    ))
}

#[tokio::test]
async fn cached_search_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paperdesk.db");
    let clock = clock();
    let criteria = SearchCriteria::default()
        .title("language model")
        .category("cs.CL");

    let catalog = Arc::new(MockCatalog::new(MockResponse::Page(sample_page())));
    {
        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let gateway = SearchGateway::new(catalog.clone(), store).with_clock(clock.clone());
        gateway.search(&criteria, 0, 10).await.unwrap();
    }

    let store = Arc::new(SqliteStore::open(&path).unwrap());
    let gateway = SearchGateway::new(catalog.clone(), store).with_clock(clock.clone());
    let page = gateway.search(&criteria, 0, 10).await.unwrap();
    assert_eq!(page, sample_page());
    assert_eq!(catalog.query_calls(), 1);

    clock.advance(Duration::hours(24));
    gateway.search(&criteria, 0, 10).await.unwrap();
    assert_eq!(catalog.query_calls(), 2);
}

#[tokio::test]
async fn favorites_persist_with_legacy_ids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paperdesk.db");

    {
        let backend = build_backend(Some(&path));
        assert!(backend.is_persistent());
        let favorites = CollectionStore::new(backend.collections.clone()).with_clock(clock());
        favorites
            .add_favorite(
                "reader",
                NewItem::new("hep-th/9711200", "The Large N Limit", vec!["J. Maldacena".into()]),
            )
            .await
            .unwrap();
    }

    let backend = build_backend(Some(&path));
    let favorites = CollectionStore::new(backend.collections.clone());
    let items = favorites.list_favorites("reader", None).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].item_id, "hep-th/9711200");
    assert_eq!(items[0].authors, vec!["J. Maldacena"]);

    favorites
        .remove_favorite("reader", "hep-th/9711200")
        .await
        .unwrap();
    assert!(favorites.list_favorites("reader", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn history_capacity_enforced_on_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Backend::from_store(
        Arc::new(SqliteStore::open(&dir.path().join("paperdesk.db")).unwrap()),
        true,
    );
    let clock = clock();
    let history = CollectionStore::new(backend.collections.clone()).with_clock(clock.clone());

    for i in 0..CollectionKind::History.capacity() {
        history
            .add_history_entry("reader", NewItem::new(format!("2401.{i:05}"), "t", vec![]))
            .await
            .unwrap();
        clock.advance(Duration::milliseconds(1));
    }

    let err = history
        .add_history_entry("reader", NewItem::new("2402.00001", "t", vec![]))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "History limit of 1000 reached. Please clear some entries first."
    );
    assert!(matches!(err, CollectionError::CapacityExceeded { .. }));

    let newest = history.list_history("reader", Some(1)).await.unwrap();
    assert_eq!(newest[0].item_id, "2401.00999");
}

#[tokio::test]
async fn subscriptions_persist() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paperdesk.db");

    let id = {
        let backend = build_backend(Some(&path));
        let subs = SubscriptionStore::new(backend.subscriptions.clone());
        subs.add("reader", "astro-ph.GA", vec!["dwarf galaxies".into()])
            .await
            .unwrap()
            .id
    };

    let backend = build_backend(Some(&path));
    let subs = SubscriptionStore::new(backend.subscriptions.clone());
    let listed = subs.list("reader").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);
    assert_eq!(listed[0].keywords, vec!["dwarf galaxies"]);
}
