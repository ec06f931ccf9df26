//! Per-chat conversational state.
//!
//! A [`Session`] is owned by exactly one chat worker and passed by `&mut` into
//! every handler, so it never needs locking. It is created with defaults on
//! the first event for a chat and dropped when the worker goes idle.

use sluice_gateway::{Inbound, InboundKind};
use sluice_shared::{ChatId, ChatTarget, MediaKind, PaymentKind, Payload};

/// What a broadcast compose is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeStage {
    AwaitingText,
    AwaitingMedia,
    /// Payload held, waiting for a target choice.
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Main,
    Admin,
    BroadcastCompose(ComposeStage),
    UploadPending,
    ChannelManagement {
        awaiting_ref: bool,
    },
    PaymentPending(PaymentKind),
    Stats,
    DeleteBroadcast,
}

impl Mode {
    pub fn requires_admin(&self) -> bool {
        !matches!(self, Mode::Main | Mode::PaymentPending(_))
    }
}

/// How a channel to register was identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    Target(ChatTarget),
    Forwarded(ChatId),
}

/// Meaning of a free-form text or media event in the current mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation {
    BroadcastPayload(Payload),
    Upload {
        kind: MediaKind,
        media_ref: String,
        caption: String,
    },
    PaymentProof {
        kind: PaymentKind,
        media_ref: String,
    },
    ChannelRef(ChannelRef),
    /// Text that was expected to identify a channel but does not parse.
    InvalidChannelRef(String),
    Ignored,
}

#[derive(Debug, Default)]
pub struct Session {
    mode: Mode,
    pending_broadcast: Option<Payload>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn pending_broadcast(&self) -> Option<&Payload> {
        self.pending_broadcast.as_ref()
    }

    /// Switch to `mode`, clearing every waiting flag and any held payload.
    ///
    /// Returns `false` without touching the session when a non-admin asks
    /// for an admin-only mode.
    pub fn enter(&mut self, mode: Mode, is_admin: bool) -> bool {
        if mode.requires_admin() && !is_admin {
            return false;
        }
        self.mode = mode;
        self.pending_broadcast = None;
        true
    }

    /// Back to the main menu.
    pub fn reset(&mut self) {
        self.mode = Mode::Main;
        self.pending_broadcast = None;
    }

    /// Hold a composed broadcast payload. Only valid while composing.
    pub fn hold_broadcast(&mut self, payload: Payload) -> bool {
        match self.mode {
            Mode::BroadcastCompose(ComposeStage::AwaitingText | ComposeStage::AwaitingMedia) => {
                self.mode = Mode::BroadcastCompose(ComposeStage::Ready);
                self.pending_broadcast = Some(payload);
                true
            }
            _ => false,
        }
    }

    /// Take the held payload for sending and return to the main mode.
    pub fn take_pending_broadcast(&mut self) -> Option<Payload> {
        if self.mode != Mode::BroadcastCompose(ComposeStage::Ready) {
            return None;
        }
        let payload = self.pending_broadcast.take();
        self.reset();
        payload
    }

    /// Decide what a text or media event means. Commands and callbacks are
    /// never free-form and always interpret as [`Interpretation::Ignored`].
    pub fn interpret(&self, inbound: &Inbound, is_admin: bool) -> Interpretation {
        match &inbound.kind {
            InboundKind::Text { text } => self.interpret_text(text, inbound, is_admin),
            InboundKind::Media {
                kind,
                media_ref,
                caption,
            } => self.interpret_media(*kind, media_ref, caption.as_deref(), inbound, is_admin),
            InboundKind::Command { .. } | InboundKind::Callback { .. } => Interpretation::Ignored,
        }
    }

    fn interpret_text(&self, text: &str, inbound: &Inbound, is_admin: bool) -> Interpretation {
        if !is_admin {
            return Interpretation::Ignored;
        }
        match self.mode {
            Mode::BroadcastCompose(ComposeStage::AwaitingText) => {
                Interpretation::BroadcastPayload(Payload::text(text))
            }
            Mode::ChannelManagement { awaiting_ref: true } => {
                if let Some(origin) = inbound.forwarded_from {
                    return Interpretation::ChannelRef(ChannelRef::Forwarded(origin));
                }
                match text.parse::<ChatTarget>() {
                    Ok(target) => Interpretation::ChannelRef(ChannelRef::Target(target)),
                    Err(_) => Interpretation::InvalidChannelRef(text.to_string()),
                }
            }
            _ => Interpretation::Ignored,
        }
    }

    fn interpret_media(
        &self,
        kind: MediaKind,
        media_ref: &str,
        caption: Option<&str>,
        inbound: &Inbound,
        is_admin: bool,
    ) -> Interpretation {
        match self.mode {
            Mode::UploadPending if is_admin => Interpretation::Upload {
                kind,
                media_ref: media_ref.to_string(),
                caption: caption.unwrap_or_default().to_string(),
            },
            Mode::BroadcastCompose(ComposeStage::AwaitingMedia) if is_admin => {
                Interpretation::BroadcastPayload(Payload::media(
                    kind,
                    media_ref,
                    caption.filter(|c| !c.is_empty()).map(str::to_string),
                ))
            }
            Mode::ChannelManagement { awaiting_ref: true } if is_admin => {
                match inbound.forwarded_from {
                    Some(origin) => Interpretation::ChannelRef(ChannelRef::Forwarded(origin)),
                    None => Interpretation::Ignored,
                }
            }
            Mode::PaymentPending(payment) if kind == MediaKind::Photo => {
                Interpretation::PaymentProof {
                    kind: payment,
                    media_ref: media_ref.to_string(),
                }
            }
            _ => Interpretation::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_shared::{ChatKind, UserId};
    use sluice_gateway::Sender;

    fn inbound(kind: InboundKind) -> Inbound {
        Inbound {
            update_id: 1,
            chat_id: ChatId(5),
            chat_kind: ChatKind::Private,
            from: Some(Sender {
                id: UserId(5),
                first_name: Some("Ada".into()),
                last_name: None,
                username: None,
            }),
            forwarded_from: None,
            kind,
        }
    }

    fn photo() -> Inbound {
        inbound(InboundKind::Media {
            kind: MediaKind::Photo,
            media_ref: "p1".into(),
            caption: None,
        })
    }

    #[test]
    fn entering_clears_waiting_state() {
        let mut session = Session::new();
        assert!(session.enter(Mode::BroadcastCompose(ComposeStage::AwaitingText), true));
        assert!(session.hold_broadcast(Payload::text("hello")));
        assert!(session.pending_broadcast().is_some());

        assert!(session.enter(Mode::UploadPending, true));
        assert_eq!(session.mode(), Mode::UploadPending);
        assert!(session.pending_broadcast().is_none());
        assert_eq!(session.take_pending_broadcast(), None);
    }

    #[test]
    fn non_admin_cannot_enter_admin_modes() {
        let mut session = Session::new();
        assert!(session.enter(Mode::PaymentPending(PaymentKind::Premium), false));

        for mode in [
            Mode::Admin,
            Mode::UploadPending,
            Mode::Stats,
            Mode::BroadcastCompose(ComposeStage::AwaitingMedia),
            Mode::ChannelManagement { awaiting_ref: true },
        ] {
            assert!(!session.enter(mode, false));
            assert_eq!(session.mode(), Mode::PaymentPending(PaymentKind::Premium));
        }
    }

    #[test]
    fn photo_meaning_depends_on_mode() {
        let mut session = Session::new();
        assert_eq!(session.interpret(&photo(), true), Interpretation::Ignored);

        session.enter(Mode::UploadPending, true);
        assert!(matches!(
            session.interpret(&photo(), true),
            Interpretation::Upload { kind: MediaKind::Photo, .. }
        ));
        // The same photo from a non-admin is not an upload.
        assert_eq!(session.interpret(&photo(), false), Interpretation::Ignored);

        session.enter(Mode::PaymentPending(PaymentKind::Group), false);
        assert_eq!(
            session.interpret(&photo(), false),
            Interpretation::PaymentProof {
                kind: PaymentKind::Group,
                media_ref: "p1".into()
            }
        );

        session.reset();
        assert_eq!(session.interpret(&photo(), false), Interpretation::Ignored);
    }

    #[test]
    fn compose_then_take() {
        let mut session = Session::new();
        session.enter(Mode::BroadcastCompose(ComposeStage::AwaitingText), true);

        let text = inbound(InboundKind::Text { text: "news!".into() });
        let Interpretation::BroadcastPayload(payload) = session.interpret(&text, true) else {
            panic!("expected payload");
        };
        assert!(session.hold_broadcast(payload.clone()));
        assert_eq!(session.mode(), Mode::BroadcastCompose(ComposeStage::Ready));

        assert_eq!(session.take_pending_broadcast(), Some(payload));
        assert_eq!(session.mode(), Mode::Main);
        assert_eq!(session.take_pending_broadcast(), None);
    }

    #[test]
    fn channel_reference_forms() {
        let mut session = Session::new();
        session.enter(Mode::ChannelManagement { awaiting_ref: true }, true);

        let handle = inbound(InboundKind::Text { text: "@news".into() });
        assert_eq!(
            session.interpret(&handle, true),
            Interpretation::ChannelRef(ChannelRef::Target(ChatTarget::Handle("@news".into())))
        );

        let mut forwarded = photo();
        forwarded.forwarded_from = Some(ChatId(-1001));
        assert_eq!(
            session.interpret(&forwarded, true),
            Interpretation::ChannelRef(ChannelRef::Forwarded(ChatId(-1001)))
        );

        let junk = inbound(InboundKind::Text { text: "my channel".into() });
        assert_eq!(
            session.interpret(&junk, true),
            Interpretation::InvalidChannelRef("my channel".into())
        );
    }
}
