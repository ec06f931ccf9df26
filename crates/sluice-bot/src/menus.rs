//! Menu texts and inline keyboards.
//!
//! Everything the bot says lives here so handlers only decide *what* to
//! show. Texts are sent without a parse mode.

use sluice_gateway::{Button, InlineKeyboard, Sender};
use sluice_shared::{Action, BroadcastTarget, ChatTarget, PaymentKind, Payload, UserId};
use sluice_store::{BroadcastRecord, Channel, StoreStats, User};

pub const APOLOGY: &str = "❌ An error occurred. Please try again.";
pub const START_FIRST: &str = "⚠️ Please send /start first";
pub const ADMIN_ONLY: &str = "❌ Admin only";
pub const NO_ADMIN_ACCESS: &str = "❌ You don't have permission to access the admin panel.";
pub const USER_NOT_FOUND: &str = "❌ User not found";

// ---------------------------------------------------------------------------
// User menus
// ---------------------------------------------------------------------------

pub fn main_menu(batch_size: usize) -> (String, InlineKeyboard) {
    let keyboard = InlineKeyboard::new()
        .button(Button::callback(format!("📥 GET {batch_size} VIDEOS"), Action::GetBatch))
        .button(Button::callback("💳 SUBSCRIBE", Action::Subscribe))
        .button(Button::callback("👥 PURCHASE GROUP", Action::PurchaseGroup))
        .button(Button::callback("🆕 DEMO", Action::Demo));
    ("🎬 MAIN MENU".to_string(), keyboard)
}

fn back() -> Button {
    Button::callback("🔙 Back", Action::MainMenu)
}

pub fn after_first_batch(batch_size: usize) -> (String, InlineKeyboard) {
    let keyboard = InlineKeyboard::new()
        .button(Button::callback(
            format!("📥 GET {batch_size} MORE VIDEOS"),
            Action::GetBatch,
        ))
        .button(Button::callback("🏠 MAIN MENU", Action::MainMenu));
    ("🎬 Enjoy your videos!".to_string(), keyboard)
}

pub fn limit_reached(cap: u32) -> (String, InlineKeyboard) {
    let keyboard = InlineKeyboard::new()
        .button(Button::callback("💳 SUBSCRIBE", Action::Subscribe))
        .button(back());
    (
        format!("⚠️ Daily limit reached ({cap} videos). Subscribe for unlimited access."),
        keyboard,
    )
}

pub fn empty_pool() -> (String, InlineKeyboard) {
    (
        "ℹ️ No videos are available yet. Please check back later.".to_string(),
        InlineKeyboard::new().button(back()),
    )
}

pub fn payment_instructions(kind: PaymentKind, price: &str, upi_id: &str) -> (String, InlineKeyboard) {
    let text = match kind {
        PaymentKind::Group => format!(
            "💳 Purchase Group Access ({price})\n\n\
             1. Pay to the UPI ID: {upi_id}\n\
             2. Send a screenshot of the payment here to get the group link"
        ),
        PaymentKind::Premium => format!(
            "💳 Premium Subscription\n\n\
             1. Pay to the UPI ID: {upi_id}\n\
             2. Send a screenshot of the payment here to get premium"
        ),
    };
    let keyboard = InlineKeyboard::new()
        .button(Button::callback("📋 Copy UPI ID", Action::CopyPaymentRef))
        .button(back());
    (text, keyboard)
}

pub fn copy_payment_ref(upi_id: &str) -> (String, InlineKeyboard) {
    (
        format!("✅ UPI ID: {upi_id} (copy manually)"),
        InlineKeyboard::new().button(back()),
    )
}

pub fn purchase_group_offer(price: &str) -> (String, InlineKeyboard) {
    let keyboard = InlineKeyboard::new()
        .button(Button::callback(format!("💳 PAY {price}"), Action::PurchaseGroupPay))
        .button(back());
    (
        format!("👥 PURCHASE GROUP ACCESS ({price})\n\nGet exclusive content and offers in our private group!"),
        keyboard,
    )
}

pub fn group_access_granted(link: &str) -> (String, InlineKeyboard) {
    let keyboard = InlineKeyboard::new().row([Button::url("👥 Join Purchase Group", link), back()]);
    (
        "✅ You already have access to the purchase group!".to_string(),
        keyboard,
    )
}

pub const DEMO_CAPTION: &str = "🆕 Here's a demo of our content (view once, expires shortly)";
pub const DEMO_UNAVAILABLE: &str = "⚠️ Error sending demo. Please try again.";

pub fn join_prompt(channel: &ChatTarget) -> (String, InlineKeyboard) {
    let mut keyboard = InlineKeyboard::new();
    if let Some(link) = channel.public_link() {
        keyboard = keyboard.button(Button::url("Join Channel", link));
    }
    keyboard = keyboard.button(Button::callback("I Joined ✅", Action::VerifyJoin));
    (format!("🔒 Please join our channel first: {channel}"), keyboard)
}

pub const ACCESS_GRANTED: &str = "🎉 Access granted! Use /start to begin.";
pub const STILL_NOT_MEMBER: &str = "❌ Still not a member. Join then try again.";

pub fn banned_notice(support: &str) -> String {
    format!("🚫 Your account has been banned. Contact support: {support}")
}

pub fn help_text(support: &str) -> String {
    format!(
        "🆘 Bot Help\n\n\
         • /start - Start the bot and show main menu\n\
         • /help - Show this help message\n\n\
         Use the buttons in the main menu to navigate.\n\n\
         For support, contact {support}"
    )
}

pub fn support_url(support: &str) -> String {
    format!("https://t.me/{}", support.trim_start_matches('@'))
}

fn contact_support(support: &str) -> InlineKeyboard {
    InlineKeyboard::new().button(Button::url("📞 Contact Support", support_url(support)))
}

// ---------------------------------------------------------------------------
// Admin panel
// ---------------------------------------------------------------------------

pub fn admin_panel() -> (String, InlineKeyboard) {
    let keyboard = InlineKeyboard::new()
        .button(Button::callback("📢 Broadcast Message", Action::AdminBroadcastText))
        .button(Button::callback("📷 Broadcast Media", Action::AdminBroadcastMedia))
        .button(Button::callback("🎥 Upload Media", Action::AdminUpload))
        .button(Button::callback("📺 Manage Channels", Action::AdminManageChannels))
        .button(Button::callback("🗑 Delete Broadcast", Action::AdminDeleteBroadcast))
        .button(Button::callback("📊 Stats", Action::AdminStats))
        .button(Button::callback("🔙 Main Menu", Action::MainMenu));
    ("🛠 ADMIN PANEL".to_string(), keyboard)
}

pub fn cancel_keyboard() -> InlineKeyboard {
    InlineKeyboard::new().button(Button::callback("❌ Cancel", Action::AdminCancel))
}

pub const COMPOSE_TEXT: &str = "📢 Enter the broadcast message (or /cancel to abort):";
pub const COMPOSE_MEDIA: &str = "📷 Send media to broadcast (photo/video/document):";
pub const UPLOAD_PROMPT: &str = "🎥 Send media to add to the database:";
pub const UPLOAD_DONE: &str = "✅ Media successfully uploaded to database!";
pub const UPLOAD_DUPLICATE: &str = "⚠️ This media already exists in the database.";
pub const NOTHING_TO_SEND: &str = "⚠️ Nothing to broadcast. Compose a message first.";

pub fn broadcast_preview(payload: &Payload) -> (String, InlineKeyboard) {
    let text = match payload {
        Payload::Text { body } => format!("📢 Broadcast Preview:\n\n{body}"),
        Payload::Media { kind, caption, .. } => format!(
            "📢 Media Broadcast Preview ({kind})\n\nCaption: {}",
            caption.as_deref().unwrap_or("None")
        ),
    };
    let target = |label: &str, target| {
        Button::callback(label, Action::ConfirmBroadcast { target })
    };
    let keyboard = InlineKeyboard::new()
        .button(target("👤 Users", BroadcastTarget::Users))
        .button(target("📺 Channels", BroadcastTarget::Channels))
        .button(target("🌐 All", BroadcastTarget::All))
        .button(Button::callback("❌ Cancel", Action::AdminCancel));
    (text, keyboard)
}

pub fn broadcast_tally(success: usize, failure: usize) -> String {
    format!("✅ Broadcast completed\n\n✅ Sent: {success}\n❌ Failed: {failure}")
}

pub fn channel_menu() -> (String, InlineKeyboard) {
    let keyboard = InlineKeyboard::new()
        .button(Button::callback("➕ Add Channel", Action::AddChannel))
        .button(Button::callback("➖ Remove Channel", Action::RemoveChannelMenu))
        .button(Button::callback("📋 List Channels", Action::ListChannels))
        .button(Button::callback("🔙 Back", Action::AdminCancel));
    ("📺 Channel Management".to_string(), keyboard)
}

pub const ADD_CHANNEL_HELP: &str = "📢 How to add a channel:\n\n\
     1. Add this bot as admin to your channel\n\
     2. Make sure it has the post messages permission\n\
     3. Forward any message from that channel here\n\n\
     OR send the channel ID (like @channelname or -1001234567890)";

pub const CHANNEL_REF_INVALID: &str =
    "⚠️ Send @channelname, a numeric chat ID, or forward a message from the channel.";
pub const CHANNEL_NOT_FOUND: &str = "⚠️ Could not find that channel. Check the ID and try again.";
pub const NO_CHANNELS: &str = "ℹ️ No channels registered yet";
pub const NO_CHANNELS_TO_REMOVE: &str = "ℹ️ No channels to remove";

pub fn bot_not_admin(title: &str) -> String {
    format!("❌ I'm not an administrator in {title}. Add me as admin with permission to post, then try again.")
}

pub fn channel_added(channel: &Channel) -> String {
    format!("✅ Channel added: {} ({})", channel.title, channel.chat_id)
}

pub fn channel_already_registered(title: &str) -> String {
    format!("ℹ️ {title} is already registered.")
}

pub fn channel_removed(channel: &Channel) -> String {
    format!("🗑 Channel Removed\n\nName: {}\nID: {}", channel.title, channel.chat_id)
}

pub const CHANNEL_GONE: &str = "⚠️ Channel not found";

/// One line per channel; `admin` tells whether the bot can still post there.
pub fn channel_list(channels: &[(Channel, bool)]) -> String {
    let mut text = String::from("📺 Registered Channels\n\n");
    for (channel, admin) in channels {
        let mark = if *admin { '✅' } else { '❌' };
        text.push_str(&format!("- {} {} {mark}\n", channel.title, channel.chat_id));
    }
    text
}

pub fn remove_channel_menu(channels: &[Channel]) -> (String, InlineKeyboard) {
    let mut keyboard = InlineKeyboard::new();
    for chunk in channels.chunks(3) {
        keyboard = keyboard.row(chunk.iter().map(|c| {
            let title: String = c.title.chars().take(15).collect();
            Button::callback(format!("❌ {title}"), Action::RemoveChannel { id: c.id })
        }));
    }
    keyboard = keyboard.button(Button::callback("🔙 Back", Action::AdminCancel));
    ("Select a channel to remove:".to_string(), keyboard)
}

pub fn stats(stats: &StoreStats) -> String {
    format!(
        "📊 Bot Statistics:\n\n\
         👥 Total Users: {}\n\
         💎 Premium Users: {}\n\
         👑 Purchase Group Members: {}\n\
         🚫 Banned Users: {}\n\
         🎥 Videos Available: {}\n\
         📺 Registered Channels: {}",
        stats.users,
        stats.premium_users,
        stats.group_access_users,
        stats.banned_users,
        stats.content_items,
        stats.channels,
    )
}

pub const NO_RECENT_BROADCASTS: &str = "No recent broadcasts found.";

pub fn delete_broadcast_menu(records: &[BroadcastRecord]) -> (String, InlineKeyboard) {
    let mut keyboard = InlineKeyboard::new();
    for record in records {
        let label = format!(
            "🗑 {} ({}) {}",
            record.sent_at.format("%Y-%m-%d %H:%M"),
            record.target_class.as_str(),
            record.payload.summary()
        );
        keyboard = keyboard.button(Button::callback(label, Action::DeleteBroadcast { id: record.id }));
    }
    keyboard = keyboard.button(Button::callback("🔙 Back", Action::AdminCancel));
    ("Select a broadcast to delete:".to_string(), keyboard)
}

pub const BROADCAST_REVOKED: &str = "✅ Broadcast message deleted successfully.";
pub const BROADCAST_RECORD_DROPPED: &str =
    "⚠️ The message could not be deleted remotely. It may have been deleted already; the record was removed.";
pub const BROADCAST_NOT_FOUND: &str = "Broadcast not found.";

// ---------------------------------------------------------------------------
// Payment review
// ---------------------------------------------------------------------------

/// How a person is shown to administrators.
pub fn display_name(first_name: Option<&str>, username: Option<&str>, id: UserId) -> String {
    match (first_name, username) {
        (Some(name), Some(handle)) => format!("{name} (@{handle})"),
        (Some(name), None) => name.to_string(),
        (None, Some(handle)) => format!("@{handle}"),
        (None, None) => id.to_string(),
    }
}

fn sender_name(sender: &Sender) -> String {
    display_name(sender.first_name.as_deref(), sender.username.as_deref(), sender.id)
}

pub fn review_caption(kind: PaymentKind, sender: &Sender, price: &str) -> String {
    let username = sender
        .username
        .as_deref()
        .map(|u| format!("@{u}"))
        .unwrap_or_else(|| "None".to_string());
    let name = sender.first_name.as_deref().unwrap_or("Unknown");
    match kind {
        PaymentKind::Group => format!(
            "🧾 Purchase Group Payment\n\n• From: {name}\n• Username: {username}\n• User ID: {}\n• Amount: {price}",
            sender.id
        ),
        PaymentKind::Premium => format!(
            "🧾 Premium Payment\n\n• From: {name}\n• Username: {username}\n• User ID: {}",
            sender.id
        ),
    }
}

pub fn review_keyboard(user: UserId, kind: PaymentKind) -> InlineKeyboard {
    InlineKeyboard::new()
        .row([
            Button::callback("✅ Approve", Action::ApprovePayment { user, kind }),
            Button::callback("❌ Reject", Action::RejectPayment { user }),
        ])
        .row([
            Button::callback("🚫 Ban User", Action::BanUser { user }),
            Button::callback("🗂 View User", Action::ViewUser { user }),
        ])
}

pub fn proof_received(support: &str) -> (String, InlineKeyboard) {
    (
        "✅ Payment proof received! Our team will verify it within 24 hours.\n\n\
         You'll receive a confirmation message once approved."
            .to_string(),
        contact_support(support),
    )
}

pub const PROOF_FAILED: &str = "⚠️ Failed to process your payment proof. Please try again.";

pub fn review_unavailable(support: &str) -> String {
    format!("⚠️ Payment review is not available right now. Please contact support: {support}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    Approved(PaymentKind),
    Rejected,
    Banned,
}

/// Replacement caption for a reviewed payment proof.
pub fn review_result(outcome: ReviewOutcome, user: &User, reviewer: &Sender, at: &str) -> String {
    let name = display_name(user.first_name.as_deref(), user.username.as_deref(), user.id);
    let by = sender_name(reviewer);
    match outcome {
        ReviewOutcome::Approved(kind) => {
            let kind = match kind {
                PaymentKind::Group => "Group Access",
                PaymentKind::Premium => "Premium",
            };
            format!("✅ Payment Approved\n\nUser: {name} ({})\nType: {kind}\nApproved by: {by}\nAt: {at}", user.id)
        }
        ReviewOutcome::Rejected => {
            format!("❌ Payment Rejected\n\nUser: {name} ({})\nRejected by: {by}\nAt: {at}", user.id)
        }
        ReviewOutcome::Banned => {
            format!("🚫 User Banned\n\nUser: {name} ({})\nBanned by: {by}\nAt: {at}", user.id)
        }
    }
}

/// What the reviewed user is told, with an optional keyboard.
pub fn review_notice(outcome: ReviewOutcome, group_link: &str, support: &str) -> (String, Option<InlineKeyboard>) {
    match outcome {
        ReviewOutcome::Approved(PaymentKind::Group) => (
            format!("🎉 Purchase Group Approved!\n\nJoin here: {group_link}"),
            None,
        ),
        ReviewOutcome::Approved(PaymentKind::Premium) => {
            ("🎉 Premium Membership Approved!".to_string(), None)
        }
        ReviewOutcome::Rejected => (
            "⚠️ Payment Rejected\n\nPlease contact support for assistance.".to_string(),
            Some(contact_support(support)),
        ),
        ReviewOutcome::Banned => (
            "🚫 Account Banned\n\nAll premium access has been revoked.".to_string(),
            None,
        ),
    }
}

pub fn review_toast(outcome: ReviewOutcome) -> &'static str {
    match outcome {
        ReviewOutcome::Approved(_) => "Approved successfully!",
        ReviewOutcome::Rejected => "Rejected successfully!",
        ReviewOutcome::Banned => "User banned successfully!",
    }
}

pub fn user_info(user: &User) -> String {
    let flag = |on: bool| if on { '✅' } else { '❌' };
    format!(
        "👤 User Information\n\n\
         • Name: {}\n\
         • Username: {}\n\
         • User ID: {}\n\
         • Premium: {}\n\
         • Group Access: {}\n\
         • Banned: {}\n\
         • Videos Viewed: {}\n\
         • Videos Today: {}\n\
         • Last Reset: {}",
        user.first_name.as_deref().unwrap_or("Unknown"),
        user.username.as_deref().map(|u| format!("@{u}")).unwrap_or_else(|| "None".into()),
        user.id,
        flag(user.is_premium),
        flag(user.has_group_access),
        if user.is_banned { '🚫' } else { '✅' },
        user.viewed_content.len(),
        user.daily_count,
        user.last_reset.format("%Y-%m-%d %H:%M UTC"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_shared::ChatId;

    #[test]
    fn main_menu_shows_batch_size() {
        let (_, keyboard) = main_menu(10);
        assert_eq!(keyboard.rows[0][0].text, "📥 GET 10 VIDEOS");
        assert_eq!(
            keyboard.actions(),
            vec![Action::GetBatch, Action::Subscribe, Action::PurchaseGroup, Action::Demo]
        );
    }

    #[test]
    fn join_prompt_links_public_channels_only() {
        let (text, keyboard) = join_prompt(&ChatTarget::Handle("@awt_bots".into()));
        assert!(text.ends_with("@awt_bots"));
        assert_eq!(keyboard.rows.len(), 2);

        let (_, keyboard) = join_prompt(&ChatTarget::Id(ChatId(-100)));
        assert_eq!(keyboard.actions(), vec![Action::VerifyJoin]);
        assert_eq!(keyboard.rows.len(), 1);
    }

    #[test]
    fn remove_menu_packs_three_per_row() {
        let channels: Vec<Channel> = (0..4)
            .map(|i| Channel {
                id: uuid::Uuid::new_v4(),
                chat_id: ChatId(-i),
                title: format!("A very long channel title {i}"),
                username: None,
                invite_link: None,
                added_by: UserId(1),
                added_at: chrono::Utc::now(),
            })
            .collect();
        let (_, keyboard) = remove_channel_menu(&channels);
        assert_eq!(keyboard.rows.len(), 3);
        assert_eq!(keyboard.rows[0].len(), 3);
        assert_eq!(keyboard.rows[1].len(), 1);
        assert_eq!(keyboard.rows[0][0].text.chars().count(), "❌ ".chars().count() + 15);
    }

    #[test]
    fn preview_offers_every_target() {
        let (text, keyboard) = broadcast_preview(&Payload::text("hello"));
        assert!(text.ends_with("hello"));
        assert_eq!(
            keyboard.actions(),
            vec![
                Action::ConfirmBroadcast { target: BroadcastTarget::Users },
                Action::ConfirmBroadcast { target: BroadcastTarget::Channels },
                Action::ConfirmBroadcast { target: BroadcastTarget::All },
                Action::AdminCancel,
            ]
        );
    }

    #[test]
    fn support_url_strips_at() {
        assert_eq!(support_url("@stephinjk"), "https://t.me/stephinjk");
    }
}
