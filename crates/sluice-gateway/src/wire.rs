//! Bot API JSON shapes. Only the fields the bot reads are modelled.

use serde::Deserialize;

use sluice_shared::{ChatKind, MemberStatus};

#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseParameters {
    pub retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgUpdate {
    pub update_id: i64,
    pub message: Option<TgMessage>,
    pub callback_query: Option<TgCallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgUser {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: Option<String>,
    pub username: Option<String>,
    pub invite_link: Option<String>,
}

impl TgChat {
    pub fn chat_kind(&self) -> ChatKind {
        match self.kind.as_str() {
            "group" => ChatKind::Group,
            "supergroup" => ChatKind::Supergroup,
            "channel" => ChatKind::Channel,
            _ => ChatKind::Private,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgFile {
    pub file_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgPhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
}

/// `forward_origin` of a forwarded message; only channel origins carry a chat.
#[derive(Debug, Deserialize)]
pub(crate) struct TgForwardOrigin {
    pub chat: Option<TgChat>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgMessage {
    pub message_id: i32,
    pub chat: TgChat,
    pub from: Option<TgUser>,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub photo: Option<Vec<TgPhotoSize>>,
    pub video: Option<TgFile>,
    pub document: Option<TgFile>,
    pub forward_origin: Option<TgForwardOrigin>,
    pub forward_from_chat: Option<TgChat>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgCallbackQuery {
    pub id: String,
    pub from: TgUser,
    pub message: Option<TgMessage>,
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgChatMember {
    pub status: String,
}

impl TgChatMember {
    pub fn member_status(&self) -> MemberStatus {
        match self.status.as_str() {
            "creator" => MemberStatus::Creator,
            "administrator" => MemberStatus::Administrator,
            "member" => MemberStatus::Member,
            "restricted" => MemberStatus::Restricted,
            "kicked" => MemberStatus::Kicked,
            _ => MemberStatus::Left,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgMe {
    pub id: i64,
}
