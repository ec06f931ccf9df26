mod common;

use chrono::Utc;
use uuid::Uuid;

use sluice_bot::{Broadcaster, Revocation};
use sluice_shared::{BroadcastTarget, ChatId, Payload, RecipientClass, UserId};
use sluice_store::Channel;

use common::{Harness, ADMIN};

fn broadcaster(h: &Harness) -> Broadcaster {
    Broadcaster::new(h.store.clone(), h.gw.clone(), h.roster.clone()).with_pacing(std::time::Duration::ZERO)
}

#[tokio::test]
async fn one_blocked_user_out_of_five() {
    let h = Harness::new();
    for id in 1..=5 {
        h.register(UserId(100 + id));
    }
    h.gw.mark_unreachable(ChatId(103));

    let report = broadcaster(&h)
        .broadcast(BroadcastTarget::Users, &Payload::text("news"), ADMIN, None)
        .await
        .unwrap();

    assert_eq!(report.recipients, 5);
    assert_eq!(report.success, 4);
    assert_eq!(report.failure, 1);
    assert_eq!(report.success + report.failure, report.recipients);

    let stored = h.store.with(|db| db.find_recent_broadcasts(50)).unwrap();
    assert_eq!(stored.len(), 4);
    assert!(stored.iter().all(|r| r.message.chat_id != ChatId(103)));
    assert!(stored.iter().all(|r| r.target_class == RecipientClass::User));
}

#[tokio::test]
async fn all_target_reaches_users_and_channels() {
    let h = Harness::new();
    h.register(UserId(201));
    let channel = Channel {
        id: Uuid::new_v4(),
        chat_id: ChatId(-1001),
        title: "News".into(),
        username: Some("news".into()),
        invite_link: None,
        added_by: ADMIN,
        added_at: Utc::now(),
    };
    h.store.with(|db| db.insert_channel(&channel)).unwrap();
    h.roster.reload(&h.store).await.unwrap();

    let report = broadcaster(&h)
        .broadcast(BroadcastTarget::All, &Payload::text("hi"), ADMIN, None)
        .await
        .unwrap();

    assert_eq!(report.success, 2);
    let classes: Vec<_> = report.records.iter().map(|r| r.target_class).collect();
    assert_eq!(classes, vec![RecipientClass::User, RecipientClass::Channel]);
}

#[tokio::test]
async fn revoking_a_vanished_message_still_drops_the_record() {
    let h = Harness::new();
    h.register(UserId(301));
    let b = broadcaster(&h);

    let report = b
        .broadcast(BroadcastTarget::Users, &Payload::text("oops"), ADMIN, None)
        .await
        .unwrap();
    let record = report.records[0].clone();
    h.gw.mark_gone(record.message);

    let outcome = b.revoke(record.id).await.unwrap();
    assert_eq!(outcome, Revocation::Revoked { remote_deleted: false });
    assert!(b.recent(10).unwrap().is_empty());
    assert_eq!(h.gw.deleted(), vec![record.message]);

    assert_eq!(b.revoke(record.id).await.unwrap(), Revocation::NotFound);
}

#[tokio::test]
async fn revoke_deletes_remote_message() {
    let h = Harness::new();
    h.register(UserId(401));
    let b = broadcaster(&h);

    let report = b
        .broadcast(BroadcastTarget::Users, &Payload::text("fine"), ADMIN, None)
        .await
        .unwrap();
    let id = report.records[0].id;

    assert_eq!(
        b.revoke(id).await.unwrap(),
        Revocation::Revoked { remote_deleted: true }
    );
}
