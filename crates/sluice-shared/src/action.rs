//! Structured inline-button actions.
//!
//! Handlers only ever see [`Action`] values. The compact string form that
//! travels through the chat platform (bincode, then base64url) is produced
//! and parsed at the gateway boundary via [`Action::encode`] and
//! [`Action::decode`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::CALLBACK_DATA_MAX;
use crate::error::ActionError;
use crate::types::{BroadcastTarget, PaymentKind, UserId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Action {
    // -- user menu --
    MainMenu,
    GetBatch,
    Subscribe,
    PurchaseGroup,
    PurchaseGroupPay,
    Demo,
    CopyPaymentRef,
    VerifyJoin,

    // -- admin panel --
    AdminBroadcastText,
    AdminBroadcastMedia,
    AdminUpload,
    AdminManageChannels,
    AddChannel,
    ListChannels,
    RemoveChannelMenu,
    RemoveChannel { id: Uuid },
    AdminStats,
    AdminDeleteBroadcast,
    DeleteBroadcast { id: Uuid },
    AdminCancel,
    ConfirmBroadcast { target: BroadcastTarget },

    // -- payment review --
    ApprovePayment { user: UserId, kind: PaymentKind },
    RejectPayment { user: UserId },
    BanUser { user: UserId },
    ViewUser { user: UserId },
}

impl Action {
    /// Whether only configured administrators may trigger this action.
    pub fn requires_admin(&self) -> bool {
        !matches!(
            self,
            Action::MainMenu
                | Action::GetBatch
                | Action::Subscribe
                | Action::PurchaseGroup
                | Action::PurchaseGroupPay
                | Action::Demo
                | Action::CopyPaymentRef
                | Action::VerifyJoin
        )
    }

    /// Encode as a base64url string suitable for a button's callback data.
    pub fn encode(&self) -> String {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;

        // Serializing a plain enum of fixed-size fields cannot fail.
        let bytes = bincode::serialize(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Decode callback data produced by [`Action::encode`].
    pub fn decode(data: &str) -> Result<Self, ActionError> {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;

        if data.len() > CALLBACK_DATA_MAX {
            return Err(ActionError::TooLong(data.len()));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(data.trim())
            .map_err(|_| ActionError::Base64Decode)?;
        bincode::deserialize(&bytes).map_err(|_| ActionError::InvalidFormat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_with_embedded_ids() {
        let actions = [
            Action::RemoveChannel { id: Uuid::new_v4() },
            Action::ApprovePayment {
                user: UserId(987_654_321),
                kind: PaymentKind::Group,
            },
            Action::ConfirmBroadcast {
                target: BroadcastTarget::All,
            },
            Action::MainMenu,
        ];

        for action in actions {
            let code = action.encode();
            assert!(code.len() <= CALLBACK_DATA_MAX, "{code} too long");
            assert_eq!(Action::decode(&code).unwrap(), action);
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            Action::decode("not base64!!"),
            Err(ActionError::Base64Decode)
        ));
        // Valid base64 but an out-of-range variant index.
        assert!(matches!(
            Action::decode("_____w"),
            Err(ActionError::InvalidFormat)
        ));
        assert!(matches!(
            Action::decode(&"A".repeat(CALLBACK_DATA_MAX + 1)),
            Err(ActionError::TooLong(_))
        ));
    }

    #[test]
    fn test_requires_admin() {
        assert!(!Action::GetBatch.requires_admin());
        assert!(!Action::VerifyJoin.requires_admin());
        assert!(Action::AdminStats.requires_admin());
        assert!(Action::BanUser { user: UserId(1) }.requires_admin());
    }
}
