use chrono::Utc;

use sluice_gateway::Inbound;
use sluice_shared::ChatId;
use sluice_store::UserProfile;

use super::Bot;
use crate::error::Result;
use crate::menus;
use crate::session::{Mode, Session};

impl Bot {
    pub(super) async fn on_command(
        &self,
        session: &mut Session,
        inbound: &Inbound,
        name: &str,
        is_admin: bool,
    ) -> Result<()> {
        let chat = inbound.chat_id;
        match name {
            "start" => {
                if let Some(sender) = &inbound.from {
                    let profile = UserProfile {
                        first_name: sender.first_name.clone(),
                        last_name: sender.last_name.clone(),
                        username: sender.username.clone(),
                    };
                    self.store
                        .with(|db| db.upsert_user(sender.id, &profile, Utc::now()))?;
                    tracing::info!(user = %sender.id, "user started the bot");
                }
                self.show_main_menu(session, chat).await
            }
            "admin" => {
                if is_admin {
                    self.show_admin_panel(session, chat).await
                } else {
                    self.reply(chat, menus::NO_ADMIN_ACCESS).await.map(|_| ())
                }
            }
            "help" => {
                let text = menus::help_text(&self.config.support_handle);
                self.reply(chat, &text).await.map(|_| ())
            }
            "cancel" => {
                let was_admin_flow = session.mode().requires_admin();
                session.reset();
                if is_admin && was_admin_flow {
                    self.show_admin_panel(session, chat).await
                } else {
                    self.show_main_menu(session, chat).await
                }
            }
            other => {
                tracing::debug!(chat = %chat, command = other, "unknown command");
                Ok(())
            }
        }
    }

    pub(super) async fn show_admin_panel(&self, session: &mut Session, chat: ChatId) -> Result<()> {
        session.enter(Mode::Admin, true);
        let (text, keyboard) = menus::admin_panel();
        self.reply_with(chat, &text, keyboard).await.map(|_| ())
    }
}
