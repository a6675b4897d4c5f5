//! End-to-end tests of the data layer over the seeded in-memory forum.
//!
//! Covers hydration, live flags, pagination boundaries, batch failure
//! semantics, secondary-index lookups and write-triggered invalidation.

use std::sync::Arc;
use std::time::Duration;

use forum_core::{
    DataConfig, EntityType, ErrorSelection, ForumError, Page, ProfileSummary, Scope,
};
use forum_storage::{CacheStore, ForumData, MemoryCacheStore};
use forum_test_utils::{
    assertions, fixtures, Conversation, InMemoryForumStore, RecordingPermissionOracle,
    RecordingRoleCache,
};

// ============================================================================
// HARNESS
// ============================================================================

struct Harness {
    data: ForumData<InMemoryForumStore>,
    store: InMemoryForumStore,
    cache: MemoryCacheStore,
    oracle: Arc<RecordingPermissionOracle>,
    roles: Arc<RecordingRoleCache>,
}

fn harness_with(config: DataConfig) -> Harness {
    let store = fixtures::seeded_forum();
    let cache = MemoryCacheStore::new();
    let oracle = Arc::new(RecordingPermissionOracle::new());
    let roles = Arc::new(RecordingRoleCache::new());

    let cache_store: Arc<dyn CacheStore> = Arc::new(cache.clone());
    let data = ForumData::new(
        &config,
        Arc::new(store.clone()),
        cache_store,
        oracle.clone(),
        roles.clone(),
    )
    .expect("data layer should build");

    Harness {
        data,
        store,
        cache,
        oracle,
        roles,
    }
}

fn harness() -> Harness {
    harness_with(fixtures::test_config())
}

// ============================================================================
// SINGLE ITEMS
// ============================================================================

#[tokio::test]
async fn test_second_read_is_served_from_cache() {
    let h = harness();
    let id = fixtures::CONVERSATIONS[0];

    let first = h.data.conversation(id, None).await.unwrap();
    let second = h.data.conversation(id, None).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.store.fetch_count(EntityType::Conversation), 1);
    assert_eq!(h.store.fetch_count(EntityType::Profile), 1);
    assert_eq!(first.author.profile_name, "alice");
    assert!(first.editor.is_none());
    assert!(h.data.cache_stats().hits >= 2);
}

#[tokio::test]
async fn test_editor_is_hydrated() {
    let h = harness();
    let view = h
        .data
        .conversation(fixtures::CONVERSATIONS[1], None)
        .await
        .unwrap();

    assert_eq!(view.editor.map(|p| p.profile_name), Some("bob".to_string()));
}

#[tokio::test]
async fn test_unread_flag_is_computed_on_every_read() {
    let h = harness();
    let id = fixtures::CONVERSATIONS[0];

    assert!(h.data.conversation(id, Some(2)).await.unwrap().unread);
    assert!(!h.data.conversation(id, Some(3)).await.unwrap().unread);
    assert!(!h.data.conversation(id, None).await.unwrap().unread);

    h.store.set_unread(id, 2, false);
    let view = h.data.conversation(id, Some(2)).await.unwrap();
    assert!(!view.unread);
    assert_eq!(h.store.fetch_count(EntityType::Conversation), 1);
}

#[tokio::test]
async fn test_microcosm_permission_is_never_cached() {
    let h = harness();
    let id = fixtures::LEAF_MICROCOSM;

    assert!(h.data.microcosm(id, Some(1)).await.unwrap().can_read);

    h.oracle.deny(EntityType::Microcosm, id, Some(1));
    assert!(!h.data.microcosm(id, Some(1)).await.unwrap().can_read);
    assert!(h.data.microcosm(id, None).await.unwrap().can_read);

    assert_eq!(h.oracle.checks(), 3);
    assert_eq!(h.store.fetch_count(EntityType::Microcosm), 1);
}

#[tokio::test]
async fn test_missing_record_is_not_found() {
    let h = harness();
    let result = h.data.event(999).await;
    assertions::assert_not_found(&result, EntityType::Event, 999);
}

#[tokio::test]
async fn test_store_failure_is_internal() {
    let h = harness();
    h.store.fail_fetch(EntityType::Event, fixtures::BIG_EVENT);

    let result = h.data.event(fixtures::BIG_EVENT).await;
    assertions::assert_internal(&result);
    assert_eq!(result.unwrap_err().status_code(), 500);
}

#[tokio::test]
async fn test_huddle_participants_keep_order() {
    let h = harness();
    let view = h.data.huddle(fixtures::HUDDLE).await.unwrap();

    let names: Vec<_> = view
        .participants
        .iter()
        .map(|p| p.profile_name.as_str())
        .collect();
    assert_eq!(names, vec!["alice", "bob", "carol"]);
    assert_eq!(view.author.id, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_huddle_author_does_not_cancel_participants() {
    let h = harness();
    h.store.fail_fetch(EntityType::Profile, 1);
    h.store
        .delay_fetch(EntityType::Profile, 3, Duration::from_millis(200));

    let result = h.data.huddle(fixtures::HUDDLE).await;
    assertions::assert_internal(&result);

    // The slow participant fetch finished and populated the cache
    let key = h
        .data
        .cache()
        .key(EntityType::Profile, Scope::Summary, 3)
        .unwrap();
    assertions::assert_cached(&h.cache, &key);
}

// ============================================================================
// COLLECTIONS
// ============================================================================

#[tokio::test]
async fn test_last_page_of_attendees() {
    let h = harness();
    let page = Page::new(20, 40).unwrap();

    let collection = h.data.attendees(fixtures::BIG_EVENT, page).await.unwrap();

    assertions::assert_page_shape(&collection, 47, 3, 7);
    let ids: Vec<_> = collection.items.iter().map(|a| a.attendee.id).collect();
    assert_eq!(ids, (1041..=1047).collect::<Vec<_>>());
    assert_eq!(collection.items[0].profile.id, collection.items[0].attendee.profile_id);
}

#[tokio::test]
async fn test_offset_past_last_page_is_rejected() {
    let h = harness();
    let page = Page::new(20, 60).unwrap();

    let result = h.data.attendees(fixtures::BIG_EVENT, page).await;

    assertions::assert_bad_request(&result);
    assertions::assert_offset_out_of_range(&result, 60, 40, 47);
    assert_eq!(h.store.fetch_count(EntityType::Attendee), 0);
}

#[tokio::test]
async fn test_empty_listing_accepts_any_offset() {
    let h = harness();
    let page = Page::new(25, 100).unwrap();

    let collection = h.data.attendees(fixtures::EMPTY_EVENT, page).await.unwrap();
    assertions::assert_page_shape(&collection, 0, 0, 0);
}

#[tokio::test]
async fn test_missing_item_fails_the_batch() {
    let h = harness();
    h.store.insert(fixtures::profile(9, "ivan"));
    h.store.remove::<ProfileSummary>(3);

    let result = h
        .data
        .executor()
        .gather(&[5, 3, 9], |id| h.data.profile_summary(id))
        .await;

    assertions::assert_not_found(&result, EntityType::Profile, 3);
    assert_eq!(result.unwrap_err().status_code(), 404);
}

#[tokio::test]
async fn test_batch_of_existing_items_keeps_input_order() {
    let h = harness();
    h.store.insert(fixtures::profile(9, "ivan"));

    let profiles = h
        .data
        .executor()
        .gather(&[5, 3, 9], |id| h.data.profile_summary(id))
        .await
        .unwrap();

    let names: Vec<_> = profiles.iter().map(|p| p.profile_name.as_str()).collect();
    assert_eq!(names, vec!["erin", "carol", "ivan"]);
}

#[tokio::test]
async fn test_lowest_sequence_error_is_deterministic() {
    let h = harness_with(DataConfig {
        error_selection: ErrorSelection::LowestSequence,
        ..fixtures::test_config()
    });
    h.store.fail_fetch(EntityType::Attendee, 1046);
    h.store.fail_fetch(EntityType::Attendee, 1042);

    let err = h
        .data
        .attendees(fixtures::BIG_EVENT, Page::new(20, 40).unwrap())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ForumError::query_failed(EntityType::Attendee, "injected failure for id 1042")
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetch_does_not_reorder_page() {
    let h = harness();
    h.store
        .delay_fetch(EntityType::Attendee, 1041, Duration::from_millis(500));
    h.store
        .delay_fetch(EntityType::Attendee, 1043, Duration::from_millis(100));

    let collection = h
        .data
        .attendees(fixtures::BIG_EVENT, Page::new(20, 40).unwrap())
        .await
        .unwrap();

    let ids: Vec<_> = collection.items.iter().map(|a| a.attendee.id).collect();
    assert_eq!(ids, (1041..=1047).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_other_listings() {
    let h = harness();

    let children = h
        .data
        .microcosm_children(fixtures::ROOT_MICROCOSM, None, Page::default())
        .await
        .unwrap();
    let ids: Vec<_> = children.items.iter().map(|m| m.microcosm.id).collect();
    assert_eq!(ids, vec![2, fixtures::SIBLING_MICROCOSM]);

    let conversations = h
        .data
        .conversations(fixtures::LEAF_MICROCOSM, Some(2), Page::default())
        .await
        .unwrap();
    assertions::assert_page_shape(&conversations, 3, 1, 3);
    assert!(conversations.items[0].unread);

    let site_roles = h
        .data
        .roles(fixtures::SITE_ID, None, Page::default())
        .await
        .unwrap();
    assert_eq!(site_roles.items.len(), 1);
    assert_eq!(site_roles.items[0].id, fixtures::SITE_ROLE);

    let members = h
        .data
        .role_members(fixtures::SITE_ROLE, Page::default())
        .await
        .unwrap();
    assertions::assert_page_shape(&members, 3, 1, 3);

    let updates = h.data.updates(1, Page::default()).await.unwrap();
    let ids: Vec<_> = updates.items.iter().map(|u| u.update.id).collect();
    assert_eq!(ids, vec![52, 51, 50]);
    assert_eq!(updates.items[0].author.profile_name, "bob");

    let watchers = h.data.watchers(1, Page::default()).await.unwrap();
    assertions::assert_page_shape(&watchers, 2, 1, 2);

    let attributes = h
        .data
        .attributes(EntityType::Conversation, fixtures::CONVERSATIONS[0], Page::default())
        .await
        .unwrap();
    assertions::assert_page_shape(&attributes, 2, 1, 2);

    let profiles = h
        .data
        .profiles(fixtures::SITE_ID, Page::first(2).unwrap())
        .await
        .unwrap();
    assertions::assert_page_shape(&profiles, 5, 3, 2);

    let participants = h
        .data
        .huddle_participants(fixtures::HUDDLE, Page::default())
        .await
        .unwrap();
    assertions::assert_page_shape(&participants, 3, 1, 3);
}

#[tokio::test]
async fn test_listing_failure_is_reported() {
    let h = harness();
    h.store.fail_list(forum_storage::ListQuery::WatchersOfProfile { profile_id: 1 });

    let result = h.data.watchers(1, Page::default()).await;
    assertions::assert_internal(&result);
}

// ============================================================================
// SECONDARY INDEXES
// ============================================================================

#[tokio::test]
async fn test_username_lookup_is_cached() {
    let h = harness();

    assert_eq!(h.data.profile_id_by_name(fixtures::SITE_ID, "carol").await.unwrap(), 3);
    assert_eq!(h.data.profile_id_by_name(fixtures::SITE_ID, "carol").await.unwrap(), 3);
    assert_eq!(h.store.lookup_count(), 1);

    let key = h
        .data
        .cache()
        .key(EntityType::Profile, Scope::Lookup, "1:carol")
        .unwrap();
    assertions::assert_cached(&h.cache, &key);
}

#[tokio::test]
async fn test_unknown_username_is_not_found() {
    let h = harness();
    let result = h.data.profile_id_by_name(fixtures::SITE_ID, "zed").await;
    assertions::assert_not_found(&result, EntityType::Profile, "1:zed");
}

#[tokio::test]
async fn test_domain_lookup_normalizes() {
    let h = harness();

    assert_eq!(h.data.site_id_by_domain("Forum.Example.ORG.").await.unwrap(), 1);
    assert_eq!(h.data.site_id_by_domain("forum.example.org").await.unwrap(), 1);
    assert_eq!(h.store.lookup_count(), 1);

    let result = h.data.site_id_by_domain("elsewhere.example.org").await;
    assertions::assert_not_found(&result, EntityType::Site, "elsewhere.example.org");
}

#[tokio::test]
async fn test_renamed_profile_releases_old_name() {
    let h = harness();
    assert_eq!(h.data.profile_id_by_name(fixtures::SITE_ID, "carol").await.unwrap(), 3);

    h.store.insert(fixtures::profile(3, "caroline"));
    assert!(h.data.record_write(EntityType::Profile, 3));
    assert!(h.data.record_profile_rename(fixtures::SITE_ID, "carol"));
    h.data.flush_invalidations().await;

    let result = h.data.profile_id_by_name(fixtures::SITE_ID, "carol").await;
    assertions::assert_not_found(&result, EntityType::Profile, "1:carol");
    assert_eq!(
        h.data.profile_id_by_name(fixtures::SITE_ID, "caroline").await.unwrap(),
        3
    );
    assert_eq!(h.data.profile_summary(3).await.unwrap().profile_name, "caroline");
}

#[tokio::test]
async fn test_deleted_profile_name_is_not_served_from_cache() {
    let h = harness();
    assert_eq!(h.data.profile_id_by_name(fixtures::SITE_ID, "dave").await.unwrap(), 4);

    h.store.remove::<ProfileSummary>(4);
    h.data.record_write(EntityType::Profile, 4);
    h.data.record_profile_rename(fixtures::SITE_ID, "dave");
    h.data.flush_invalidations().await;

    let result = h.data.profile_id_by_name(fixtures::SITE_ID, "dave").await;
    assertions::assert_not_found(&result, EntityType::Profile, "1:dave");
}

#[tokio::test]
async fn test_domain_change_releases_old_domain() {
    let h = harness();
    assert_eq!(h.data.site_id_by_domain(fixtures::SITE_DOMAIN).await.unwrap(), 1);

    h.store.remove_domain(fixtures::SITE_DOMAIN);
    h.store.add_domain("new.example.org", fixtures::SITE_ID);
    assert!(h.data.record_domain_change("Forum.Example.ORG"));
    h.data.flush_invalidations().await;

    let result = h.data.site_id_by_domain(fixtures::SITE_DOMAIN).await;
    assertions::assert_not_found(&result, EntityType::Site, fixtures::SITE_DOMAIN);
    assert_eq!(h.data.site_id_by_domain("new.example.org").await.unwrap(), 1);
}

// ============================================================================
// INVALIDATION
// ============================================================================

#[tokio::test]
async fn test_write_then_flush_serves_fresh_record() {
    let h = harness();
    let id = fixtures::CONVERSATIONS[2];
    assert_eq!(h.data.conversation(id, None).await.unwrap().conversation.title, "Conversation 12");

    let mut renamed = h.store.get::<Conversation>(id).unwrap();
    renamed.title = "Renamed".to_string();
    h.store.insert(renamed);

    // Cached until the write is recorded
    assert_eq!(h.data.conversation(id, None).await.unwrap().conversation.title, "Conversation 12");

    assert!(h.data.record_write(EntityType::Conversation, id));
    h.data.flush_invalidations().await;

    assert_eq!(h.data.conversation(id, None).await.unwrap().conversation.title, "Renamed");
    assert_eq!(h.store.fetch_count(EntityType::Conversation), 2);
}

#[tokio::test]
async fn test_microcosm_write_purges_ancestors_but_not_root() {
    let h = harness();
    for id in 1..=4 {
        h.data.microcosm(id, None).await.unwrap();
    }
    let detail = |id: i64| {
        h.data
            .cache()
            .key(EntityType::Microcosm, Scope::Detail, id)
            .unwrap()
    };

    h.data.record_write(EntityType::Microcosm, fixtures::LEAF_MICROCOSM);
    h.data.flush_invalidations().await;

    assertions::assert_cached(&h.cache, &detail(fixtures::ROOT_MICROCOSM));
    for id in 2..=4 {
        assertions::assert_not_cached(&h.cache, &detail(id));
    }
}

#[tokio::test]
async fn test_role_write_flushes_membership() {
    let h = harness();
    h.data.role(fixtures::SITE_ROLE).await.unwrap();

    h.data.record_write(EntityType::Role, fixtures::SITE_ROLE);
    h.data.flush_invalidations().await;

    assert_eq!(h.roles.flushed(), vec![fixtures::SITE_ROLE]);
    let key = h
        .data
        .cache()
        .key(EntityType::Role, Scope::Detail, fixtures::SITE_ROLE)
        .unwrap();
    assertions::assert_not_cached(&h.cache, &key);
}

#[tokio::test]
async fn test_scope_write_leaves_other_scopes() {
    let h = harness();
    h.data.profile_summary(1).await.unwrap();

    let counts = h.data.cache().key(EntityType::Profile, Scope::Counts, 1).unwrap();
    let summary = h.data.cache().key(EntityType::Profile, Scope::Summary, 1).unwrap();
    h.data.cache().set_int(&counts, 17).await;

    h.data.record_scope_write(Scope::Counts, EntityType::Profile, 1);
    h.data.flush_invalidations().await;

    assertions::assert_not_cached(&h.cache, &counts);
    assertions::assert_cached(&h.cache, &summary);
}

#[tokio::test]
async fn test_uncached_type_write_is_harmless() {
    let h = harness();
    assert!(h.data.record_write(EntityType::Poll, 5));
    h.data.flush_invalidations().await;

    let stats = h.data.dispatch_stats();
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.purged, 1);
}

#[tokio::test]
async fn test_shutdown_drops_later_writes() {
    let h = harness();
    h.data.shutdown().await;

    assert!(!h.data.record_write(EntityType::Conversation, 10));
    assert_eq!(h.data.dispatch_stats().dropped, 1);
}
