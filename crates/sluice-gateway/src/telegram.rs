//! [`Gateway`] implementation over the Telegram Bot HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use sluice_shared::constants::POLL_TIMEOUT_SECS;
use sluice_shared::{ChatId, ChatTarget, MediaKind, MemberStatus, MessageId, MessageRef, UserId};

use crate::error::{GatewayError, Result};
use crate::gateway::{BotIdentity, ButtonKind, ChatInfo, Gateway, InlineKeyboard, SendOptions};
use crate::wire::{ApiResponse, TgChat, TgChatMember, TgMe, TgMessage, TgUpdate};

/// Bot API client. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct TelegramGateway {
    client: reqwest::Client,
    /// `{api_base_url}/bot{token}`
    endpoint: String,
}

impl TelegramGateway {
    pub fn new(api_base_url: &str, token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            // Long polls hold the request open for POLL_TIMEOUT_SECS.
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 15))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/bot{}", api_base_url.trim_end_matches('/'), token),
        })
    }

    /// POST one Bot API method and unwrap the `{ok, result}` envelope.
    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T> {
        let resp = self
            .client
            .post(format!("{}/{}", self.endpoint, method))
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let envelope: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| GatewayError::Decode(format!("{method}: {e}")))?;

        if envelope.ok {
            return envelope
                .result
                .ok_or_else(|| GatewayError::Decode(format!("{method}: missing result")));
        }

        let code = envelope.error_code.unwrap_or(i64::from(status.as_u16()));
        let description = envelope.description.unwrap_or_default();
        let retry_after = envelope.parameters.and_then(|p| p.retry_after);
        tracing::debug!(method, code, %description, "bot api call failed");
        Err(GatewayError::from_api(code, description, retry_after))
    }

    /// Fetch pending updates with a server-side long poll.
    pub(crate) async fn get_updates(&self, offset: i64) -> Result<Vec<TgUpdate>> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }
}

fn chat_param(chat: &ChatTarget) -> Value {
    match chat {
        ChatTarget::Id(id) => json!(id.0),
        ChatTarget::Handle(handle) => json!(handle),
    }
}

fn keyboard_json(keyboard: &InlineKeyboard) -> Value {
    let rows: Vec<Vec<Value>> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| match &button.kind {
                    ButtonKind::Callback(action) => {
                        json!({ "text": button.text, "callback_data": action.encode() })
                    }
                    ButtonKind::Url(url) => json!({ "text": button.text, "url": url }),
                })
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

fn apply_options(body: &mut Value, opts: &SendOptions) {
    if let Some(keyboard) = &opts.keyboard {
        body["reply_markup"] = keyboard_json(keyboard);
    }
    if opts.silent {
        body["disable_notification"] = json!(true);
    }
}

fn message_ref(msg: &TgMessage) -> MessageRef {
    MessageRef::new(ChatId(msg.chat.id), MessageId(msg.message_id))
}

#[async_trait]
impl Gateway for TelegramGateway {
    async fn send_text(&self, chat: &ChatTarget, text: &str, opts: &SendOptions) -> Result<MessageRef> {
        let mut body = json!({ "chat_id": chat_param(chat), "text": text });
        apply_options(&mut body, opts);
        let msg: TgMessage = self.call("sendMessage", &body).await?;
        Ok(message_ref(&msg))
    }

    async fn send_media(
        &self,
        chat: &ChatTarget,
        kind: MediaKind,
        media_ref: &str,
        caption: Option<&str>,
        opts: &SendOptions,
    ) -> Result<MessageRef> {
        let (method, field) = match kind {
            MediaKind::Photo => ("sendPhoto", "photo"),
            MediaKind::Video => ("sendVideo", "video"),
            MediaKind::Document => ("sendDocument", "document"),
        };

        let mut body = json!({ "chat_id": chat_param(chat) });
        body[field] = json!(media_ref);
        if let Some(caption) = caption.filter(|c| !c.is_empty()) {
            body["caption"] = json!(caption);
        }
        if opts.spoiler && kind != MediaKind::Document {
            body["has_spoiler"] = json!(true);
        }
        apply_options(&mut body, opts);

        let msg: TgMessage = self.call(method, &body).await?;
        Ok(message_ref(&msg))
    }

    async fn edit_text(
        &self,
        message: MessageRef,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<()> {
        let mut body = json!({
            "chat_id": message.chat_id.0,
            "message_id": message.message_id.0,
            "text": text,
        });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = keyboard_json(keyboard);
        }
        let _: Value = self.call("editMessageText", &body).await?;
        Ok(())
    }

    async fn edit_caption(
        &self,
        message: MessageRef,
        caption: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<()> {
        let mut body = json!({
            "chat_id": message.chat_id.0,
            "message_id": message.message_id.0,
            "caption": caption,
        });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = keyboard_json(keyboard);
        }
        let _: Value = self.call("editMessageCaption", &body).await?;
        Ok(())
    }

    async fn delete_message(&self, message: MessageRef) -> Result<()> {
        let _: bool = self
            .call(
                "deleteMessage",
                &json!({ "chat_id": message.chat_id.0, "message_id": message.message_id.0 }),
            )
            .await?;
        Ok(())
    }

    async fn get_chat_member(&self, chat: &ChatTarget, user: UserId) -> Result<MemberStatus> {
        let member: TgChatMember = self
            .call(
                "getChatMember",
                &json!({ "chat_id": chat_param(chat), "user_id": user.0 }),
            )
            .await?;
        Ok(member.member_status())
    }

    async fn get_chat(&self, chat: &ChatTarget) -> Result<ChatInfo> {
        let info: TgChat = self
            .call("getChat", &json!({ "chat_id": chat_param(chat) }))
            .await?;
        Ok(ChatInfo {
            id: ChatId(info.id),
            kind: info.chat_kind(),
            title: info.title,
            username: info.username,
            invite_link: info.invite_link,
        })
    }

    async fn get_me(&self) -> Result<BotIdentity> {
        let me: TgMe = self.call("getMe", &json!({})).await?;
        Ok(BotIdentity { id: UserId(me.id) })
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>, show_alert: bool) -> Result<()> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            body["text"] = json!(text);
            body["show_alert"] = json!(show_alert);
        }
        let _: bool = self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Button;
    use sluice_shared::Action;

    #[test]
    fn keyboard_serializes_callbacks_and_urls() {
        let keyboard = InlineKeyboard::new()
            .row([
                Button::callback("Get", Action::GetBatch),
                Button::url("Join", "https://t.me/awt_bots"),
            ])
            .button(Button::callback("Back", Action::MainMenu));

        let value = keyboard_json(&keyboard);
        let rows = value["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1]["url"], "https://t.me/awt_bots");

        let data = rows[0][0]["callback_data"].as_str().unwrap();
        assert_eq!(Action::decode(data).unwrap(), Action::GetBatch);
    }

    #[test]
    fn chat_param_keeps_handles_as_strings() {
        assert_eq!(chat_param(&ChatTarget::Handle("@news".into())), json!("@news"));
        assert_eq!(chat_param(&ChatTarget::Id(ChatId(-100))), json!(-100));
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let gw = TelegramGateway::new("https://api.telegram.org/", "123:abc").unwrap();
        assert_eq!(gw.endpoint, "https://api.telegram.org/bot123:abc");
    }
}
