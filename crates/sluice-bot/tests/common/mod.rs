#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use sluice_bot::{Bot, BotConfig, Roster, Session};
use sluice_gateway::{Inbound, InboundKind, RecordingGateway, Sender};
use sluice_shared::{Action, ChatId, ChatKind, MediaKind, MessageId, MessageRef, UserId};
use sluice_store::{ContentItem, InsertOutcome, NewContent, Store, User, UserProfile};

pub const ADMIN: UserId = UserId(1);
pub const REVIEW_CHAT: ChatId = ChatId(-500);

pub struct Harness {
    pub bot: Bot,
    pub gw: Arc<RecordingGateway>,
    pub store: Store,
    pub roster: Roster,
    next_update: i64,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(BotConfig {
            admins: vec![ADMIN],
            admin_group: Some(REVIEW_CHAT),
            required_channel: None,
            batch_size: 2,
            daily_cap: 4,
            ..BotConfig::default()
        })
    }

    pub fn with_config(config: BotConfig) -> Self {
        let gw = Arc::new(RecordingGateway::new());
        let store = Store::open_in_memory().unwrap();
        let roster = Roster::new();
        let bot = Bot::new(Arc::new(config), store.clone(), gw.clone(), roster.clone())
            .with_pacing(Duration::ZERO);
        Self {
            bot,
            gw,
            store,
            roster,
            next_update: 0,
        }
    }

    pub async fn send(&mut self, session: &mut Session, user: UserId, kind: InboundKind) {
        let inbound = self.inbound(user, kind);
        self.send_inbound(session, inbound).await;
    }

    pub async fn send_inbound(&self, session: &mut Session, inbound: Inbound) {
        self.bot.handle(session, inbound).await.unwrap();
    }

    pub fn inbound(&mut self, user: UserId, kind: InboundKind) -> Inbound {
        self.next_update += 1;
        Inbound {
            update_id: self.next_update,
            chat_id: user.into(),
            chat_kind: ChatKind::Private,
            from: Some(sender(user)),
            forwarded_from: None,
            kind,
        }
    }

    pub fn user(&self, id: UserId) -> User {
        self.store.with(|db| db.find_user(id)).unwrap().unwrap()
    }

    pub fn register(&self, id: UserId) -> User {
        self.store
            .with(|db| db.upsert_user(id, &UserProfile::default(), Utc::now()))
            .unwrap()
    }

    pub fn seed_content(&self, n: usize) -> Vec<ContentItem> {
        (0..n)
            .map(|i| {
                let new = NewContent {
                    media_ref: format!("video-{i}"),
                    kind: MediaKind::Video,
                    caption: String::new(),
                    added_by: Some(ADMIN),
                };
                match self
                    .store
                    .with(|db| db.insert_content_if_absent(&new, Utc::now()))
                    .unwrap()
                {
                    InsertOutcome::Inserted(item) => item,
                    InsertOutcome::AlreadyExists => panic!("duplicate seed"),
                }
            })
            .collect()
    }
}

pub fn sender(user: UserId) -> Sender {
    Sender {
        id: user,
        first_name: Some(format!("User{}", user.0)),
        last_name: None,
        username: None,
    }
}

pub fn command(name: &str) -> InboundKind {
    InboundKind::Command {
        name: name.into(),
        args: String::new(),
    }
}

pub fn text(body: &str) -> InboundKind {
    InboundKind::Text { text: body.into() }
}

pub fn photo(media_ref: &str) -> InboundKind {
    InboundKind::Media {
        kind: MediaKind::Photo,
        media_ref: media_ref.into(),
        caption: None,
    }
}

/// A button press on message `message_id` in the presser's own chat.
pub fn press(user: UserId, action: Action, message_id: i32) -> InboundKind {
    InboundKind::Callback {
        id: format!("cb-{message_id}"),
        action,
        message: Some(MessageRef::new(user.into(), MessageId(message_id))),
    }
}
