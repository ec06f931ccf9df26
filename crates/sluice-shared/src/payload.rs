use serde::{Deserialize, Serialize};

use crate::types::MediaKind;

/// Content of a broadcast: either plain text or a media reference with an
/// optional caption.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Text {
        body: String,
    },
    Media {
        kind: MediaKind,
        media_ref: String,
        caption: Option<String>,
    },
}

impl Payload {
    pub fn text(body: impl Into<String>) -> Self {
        Payload::Text { body: body.into() }
    }

    pub fn media(kind: MediaKind, media_ref: impl Into<String>, caption: Option<String>) -> Self {
        Payload::Media {
            kind,
            media_ref: media_ref.into(),
            caption,
        }
    }

    /// Short human-readable label used in previews and record listings.
    pub fn summary(&self) -> String {
        match self {
            Payload::Text { body } => {
                let mut preview: String = body.chars().take(40).collect();
                if body.chars().count() > 40 {
                    preview.push('…');
                }
                preview
            }
            Payload::Media { kind, caption, .. } => match caption {
                Some(c) if !c.is_empty() => format!("{kind}: {c}"),
                _ => kind.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_json_shape() {
        let payload = Payload::media(MediaKind::Video, "file-1", Some("hi".into()));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "media");
        assert_eq!(json["kind"], "Video");
        assert_eq!(json["media_ref"], "file-1");

        let text: Payload = serde_json::from_str(r#"{"type":"text","body":"hello"}"#).unwrap();
        assert_eq!(text, Payload::text("hello"));
    }

    #[test]
    fn test_summary_truncates() {
        let long = "x".repeat(100);
        let summary = Payload::text(long).summary();
        assert_eq!(summary.chars().count(), 41);
        assert!(summary.ends_with('…'));

        assert_eq!(Payload::media(MediaKind::Photo, "f", None).summary(), "photo");
    }
}
