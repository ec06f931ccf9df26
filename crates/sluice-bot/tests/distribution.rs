mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use sluice_bot::{check_quota, DistributionConfig, Distributor, QuotaDecision};
use sluice_gateway::{Call, RecordingGateway};
use sluice_shared::{ChatId, UserId};
use sluice_store::{Store, UserFields, UserProfile, UserUpdate};

use common::Harness;

fn distributor(store: &Store, gw: &Arc<RecordingGateway>, batch_size: usize) -> Distributor {
    let mut config = DistributionConfig::new(batch_size, 30, chrono::Duration::minutes(30));
    config.pacing = Duration::ZERO;
    Distributor::new(store.clone(), gw.clone(), config)
}

#[tokio::test]
async fn batch_from_unseen_items() {
    let h = Harness::new();
    let items = h.seed_content(5);
    let user = UserId(10);
    h.register(user);

    // Two of five already seen: three unseen remain.
    let seen = [items[0].id, items[1].id];
    h.store
        .with(|db| db.update_user_atomic(user, &UserUpdate::new().add_viewed(seen)))
        .unwrap();

    let d = distributor(&h.store, &h.gw, 2);
    let batch = d.request_batch(&h.user(user), user.into()).await.unwrap();

    assert_eq!(batch.items.len(), 2);
    assert_eq!(batch.delivered.len(), 2);
    assert!(!batch.pool_reset);
    assert!(batch.items.iter().all(|i| !seen.contains(&i.id)));

    let after = h.user(user);
    assert_eq!(after.viewed_content.len(), 4);
    assert_eq!(after.daily_count, 2);
    assert_eq!(after.scheduled_messages.len(), 2);

    let unseen = h
        .store
        .with(|db| db.find_content_excluding(&after.viewed_content))
        .unwrap();
    assert_eq!(unseen.len(), 1);
}

#[tokio::test]
async fn exhausted_pool_resets_viewed_set() {
    let h = Harness::new();
    let items = h.seed_content(3);
    let user = UserId(11);
    h.register(user);

    let seen = [items[0].id, items[1].id];
    h.store
        .with(|db| db.update_user_atomic(user, &UserUpdate::new().add_viewed(seen)))
        .unwrap();

    let d = distributor(&h.store, &h.gw, 2);
    let batch = d.request_batch(&h.user(user), user.into()).await.unwrap();

    assert!(batch.pool_reset);
    assert_eq!(batch.items.len(), 2);
    // Cleared, then only this batch's items recorded.
    let after = h.user(user);
    assert_eq!(after.viewed_content.len(), 2);
    assert!(batch.items.iter().all(|i| after.viewed_content.contains(&i.id)));
}

#[tokio::test]
async fn viewed_never_exceeds_pool() {
    let h = Harness::new();
    h.seed_content(3);
    let user = UserId(12);
    h.register(user);

    let d = distributor(&h.store, &h.gw, 2);
    for _ in 0..6 {
        let before = h.user(user);
        let batch = d.request_batch(&before, user.into()).await.unwrap();
        let after = h.user(user);

        assert!(after.viewed_content.len() <= 3);
        if !batch.pool_reset {
            assert_eq!(
                after.viewed_content.len(),
                before.viewed_content.len() + batch.attempted
            );
        }
    }
    assert_eq!(h.user(user).daily_count, 12);
}

#[tokio::test]
async fn failed_sends_still_count_as_attempted() {
    let h = Harness::new();
    h.seed_content(4);
    let user = UserId(13);
    h.register(user);
    h.gw.mark_failing(ChatId(13));

    let d = distributor(&h.store, &h.gw, 2);
    let batch = d.request_batch(&h.user(user), user.into()).await.unwrap();

    assert_eq!(batch.attempted, 2);
    assert!(batch.delivered.is_empty());

    let after = h.user(user);
    assert_eq!(after.daily_count, 2);
    assert_eq!(after.viewed_content.len(), 2);
    // Nothing was sent, so nothing needs deleting later.
    assert!(after.scheduled_messages.is_empty());
}

#[tokio::test]
async fn scheduled_entries_follow_send_order() {
    let h = Harness::new();
    h.seed_content(3);
    let user = UserId(14);
    h.register(user);

    let d = distributor(&h.store, &h.gw, 3);
    let batch = d.request_batch(&h.user(user), user.into()).await.unwrap();

    let scheduled: Vec<_> = h
        .user(user)
        .scheduled_messages
        .iter()
        .map(|s| s.message)
        .collect();
    assert_eq!(scheduled, batch.delivered);

    let sent_refs: Vec<_> = h
        .gw
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::SendMedia { media_ref, .. } => Some(media_ref),
            _ => None,
        })
        .collect();
    let selected: Vec<_> = batch.items.iter().map(|i| i.media_ref.clone()).collect();
    assert_eq!(sent_refs, selected);
}

#[test]
fn quota_at_cap_is_refused_unless_premium() {
    let h = Harness::new();
    let user = UserId(15);
    h.store
        .with(|db| {
            db.upsert_user(user, &UserProfile::default(), Utc::now())?;
            db.update_user_atomic(user, &UserUpdate::new().inc_daily_count(30))
        })
        .unwrap();

    assert_eq!(
        check_quota(&h.user(user), 30),
        QuotaDecision::LimitReached { cap: 30 }
    );

    let premium = UserFields {
        is_premium: Some(true),
        ..UserFields::default()
    };
    h.store
        .with(|db| db.update_user_atomic(user, &UserUpdate::new().set(premium)))
        .unwrap();
    assert_eq!(
        check_quota(&h.user(user), 30),
        QuotaDecision::Allowed {
            is_first_batch_of_day: false
        }
    );
}
