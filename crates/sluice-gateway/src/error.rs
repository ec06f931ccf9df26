use thiserror::Error;

/// Errors produced by a [`Gateway`](crate::Gateway) call.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The recipient can never be reached: it blocked the bot, was
    /// deactivated, or the chat does not exist.
    #[error("Recipient unreachable: {0}")]
    Unreachable(String),

    #[error("Rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Classify a failed Bot API response.
    pub fn from_api(code: i64, description: impl Into<String>, retry_after: Option<u64>) -> Self {
        let description = description.into();
        if code == 429 {
            return GatewayError::RateLimited {
                retry_after: retry_after.unwrap_or(1),
            };
        }

        let lower = description.to_lowercase();
        let unreachable = match code {
            403 => {
                lower.contains("blocked")
                    || lower.contains("deactivated")
                    || lower.contains("kicked")
                    || lower.contains("can't initiate")
            }
            400 => lower.contains("chat not found") || lower.contains("user not found"),
            _ => false,
        };

        if unreachable {
            GatewayError::Unreachable(description)
        } else {
            GatewayError::Api { code, description }
        }
    }

    /// Whether this failure is definitive for the recipient.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, GatewayError::Unreachable(_))
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_definitive_failures() {
        let blocked = GatewayError::from_api(403, "Forbidden: bot was blocked by the user", None);
        assert!(blocked.is_unreachable());

        let gone = GatewayError::from_api(403, "Forbidden: user is deactivated", None);
        assert!(gone.is_unreachable());

        let missing = GatewayError::from_api(400, "Bad Request: chat not found", None);
        assert!(missing.is_unreachable());
    }

    #[test]
    fn transient_failures_are_not_definitive() {
        let limited = GatewayError::from_api(429, "Too Many Requests: retry after 7", Some(7));
        assert!(matches!(limited, GatewayError::RateLimited { retry_after: 7 }));
        assert!(!limited.is_unreachable());

        let other = GatewayError::from_api(400, "Bad Request: message to delete not found", None);
        assert!(matches!(other, GatewayError::Api { code: 400, .. }));

        let server = GatewayError::from_api(502, "Bad Gateway", None);
        assert!(!server.is_unreachable());
    }
}
