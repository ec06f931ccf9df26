use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Numeric identity of a chat participant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric identity of a chat (private chat, group or channel).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<UserId> for ChatId {
    // A private chat shares its numeric id with the user on the other end.
    fn from(user: UserId) -> Self {
        ChatId(user.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to one sent message, enough to edit or delete it later.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

impl MessageRef {
    pub fn new(chat_id: ChatId, message_id: MessageId) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }
}

/// How a chat is addressed before it has been resolved: either a numeric id
/// or a public `@handle`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ChatTarget {
    Id(ChatId),
    Handle(String),
}

impl ChatTarget {
    /// Public link for handle targets (`https://t.me/<handle>`).
    pub fn public_link(&self) -> Option<String> {
        match self {
            ChatTarget::Handle(handle) => {
                Some(format!("https://t.me/{}", handle.trim_start_matches('@')))
            }
            ChatTarget::Id(_) => None,
        }
    }
}

impl From<ChatId> for ChatTarget {
    fn from(id: ChatId) -> Self {
        ChatTarget::Id(id)
    }
}

impl From<UserId> for ChatTarget {
    fn from(user: UserId) -> Self {
        ChatTarget::Id(user.into())
    }
}

impl fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatTarget::Id(id) => write!(f, "{id}"),
            ChatTarget::Handle(handle) => write!(f, "{handle}"),
        }
    }
}

impl FromStr for ChatTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(name) = s.strip_prefix('@') {
            let valid = !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(format!("invalid chat handle: {s}"));
            }
            return Ok(ChatTarget::Handle(s.to_string()));
        }
        s.parse::<i64>()
            .map(|id| ChatTarget::Id(ChatId(id)))
            .map_err(|_| format!("expected @handle or numeric chat id, got {s:?}"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Photo,
    Video,
    Document,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
        }
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "photo" => Ok(MediaKind::Photo),
            "video" => Ok(MediaKind::Video),
            "document" => Ok(MediaKind::Document),
            other => Err(format!("unknown media kind: {other}")),
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of chat an event arrived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

/// A user's membership in a chat, as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
}

impl MemberStatus {
    pub fn is_member(&self) -> bool {
        matches!(
            self,
            MemberStatus::Creator | MemberStatus::Administrator | MemberStatus::Member
        )
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, MemberStatus::Creator | MemberStatus::Administrator)
    }
}

/// Population a broadcast is fanned out to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BroadcastTarget {
    Users,
    Channels,
    All,
}

impl BroadcastTarget {
    pub fn includes_users(&self) -> bool {
        matches!(self, BroadcastTarget::Users | BroadcastTarget::All)
    }

    pub fn includes_channels(&self) -> bool {
        matches!(self, BroadcastTarget::Channels | BroadcastTarget::All)
    }
}

impl fmt::Display for BroadcastTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BroadcastTarget::Users => "users",
            BroadcastTarget::Channels => "channels",
            BroadcastTarget::All => "all",
        };
        f.write_str(s)
    }
}

/// Class of a single broadcast recipient, recorded on its delivery record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RecipientClass {
    User,
    Channel,
}

impl RecipientClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientClass::User => "user",
            RecipientClass::Channel => "channel",
        }
    }
}

impl FromStr for RecipientClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(RecipientClass::User),
            "channel" => Ok(RecipientClass::Channel),
            other => Err(format!("unknown recipient class: {other}")),
        }
    }
}

/// What a user is paying for when they submit a payment proof.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PaymentKind {
    Premium,
    Group,
}

impl fmt::Display for PaymentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentKind::Premium => f.write_str("premium"),
            PaymentKind::Group => f.write_str("group"),
        }
    }
}
