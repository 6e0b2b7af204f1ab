//! Remote status values for shards and subscriptions.
//!
//! The service reports status as free-form strings. Known values map to
//! variants; anything else is kept verbatim in [`Status::Unrecognized`] so
//! it never accidentally equals a known status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status reported for a shard or a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    /// Delivering normally.
    Enabled,
    /// Waiting for the callback to answer the verification challenge.
    WebhookCallbackVerificationPending,
    /// The callback failed the verification challenge.
    WebhookCallbackVerificationFailed,
    /// Too many delivery failures.
    NotificationFailuresExceeded,
    /// The authorizing user revoked access.
    AuthorizationRevoked,
    /// A moderator used for the condition lost their role.
    ModeratorRemoved,
    /// The user in the condition was removed.
    UserRemoved,
    /// The subscription's version is no longer supported.
    VersionRemoved,
    /// Beta type under maintenance.
    BetaMaintenance,
    /// Websocket client disconnected.
    WebsocketDisconnected,
    /// Websocket client did not answer a ping.
    WebsocketFailedPingPong,
    /// Websocket client sent inbound traffic.
    WebsocketReceivedInboundTraffic,
    /// Websocket connection was never used.
    WebsocketConnectionUnused,
    /// Websocket server error.
    WebsocketInternalError,
    /// Websocket network timeout.
    WebsocketNetworkTimeout,
    /// Websocket network error.
    WebsocketNetworkError,
    /// Websocket client failed to reconnect.
    WebsocketFailedToReconnect,
    /// Any value not listed above.
    Unrecognized(String),
}

impl Status {
    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Enabled => "enabled",
            Self::WebhookCallbackVerificationPending => "webhook_callback_verification_pending",
            Self::WebhookCallbackVerificationFailed => "webhook_callback_verification_failed",
            Self::NotificationFailuresExceeded => "notification_failures_exceeded",
            Self::AuthorizationRevoked => "authorization_revoked",
            Self::ModeratorRemoved => "moderator_removed",
            Self::UserRemoved => "user_removed",
            Self::VersionRemoved => "version_removed",
            Self::BetaMaintenance => "beta_maintenance",
            Self::WebsocketDisconnected => "websocket_disconnected",
            Self::WebsocketFailedPingPong => "websocket_failed_ping_pong",
            Self::WebsocketReceivedInboundTraffic => "websocket_received_inbound_traffic",
            Self::WebsocketConnectionUnused => "websocket_connection_unused",
            Self::WebsocketInternalError => "websocket_internal_error",
            Self::WebsocketNetworkTimeout => "websocket_network_timeout",
            Self::WebsocketNetworkError => "websocket_network_error",
            Self::WebsocketFailedToReconnect => "websocket_failed_to_reconnect",
            Self::Unrecognized(value) => value,
        }
    }

    /// Returns `true` for [`Status::Enabled`].
    pub fn is_enabled(&self) -> bool {
        *self == Self::Enabled
    }

    /// Returns `true` if the value was not one of the known statuses.
    pub fn is_unrecognized(&self) -> bool {
        matches!(self, Self::Unrecognized(_))
    }
}

impl From<&str> for Status {
    fn from(value: &str) -> Self {
        match value {
            "enabled" => Self::Enabled,
            "webhook_callback_verification_pending" => Self::WebhookCallbackVerificationPending,
            "webhook_callback_verification_failed" => Self::WebhookCallbackVerificationFailed,
            "notification_failures_exceeded" => Self::NotificationFailuresExceeded,
            "authorization_revoked" => Self::AuthorizationRevoked,
            "moderator_removed" => Self::ModeratorRemoved,
            "user_removed" => Self::UserRemoved,
            "version_removed" => Self::VersionRemoved,
            "beta_maintenance" => Self::BetaMaintenance,
            "websocket_disconnected" => Self::WebsocketDisconnected,
            "websocket_failed_ping_pong" => Self::WebsocketFailedPingPong,
            "websocket_received_inbound_traffic" => Self::WebsocketReceivedInboundTraffic,
            "websocket_connection_unused" => Self::WebsocketConnectionUnused,
            "websocket_internal_error" => Self::WebsocketInternalError,
            "websocket_network_timeout" => Self::WebsocketNetworkTimeout,
            "websocket_network_error" => Self::WebsocketNetworkError,
            "websocket_failed_to_reconnect" => Self::WebsocketFailedToReconnect,
            other => Self::Unrecognized(other.to_string()),
        }
    }
}

impl From<String> for Status {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values_parse() {
        assert_eq!(Status::from("enabled"), Status::Enabled);
        assert_eq!(
            Status::from("webhook_callback_verification_pending"),
            Status::WebhookCallbackVerificationPending
        );
        assert_eq!(
            Status::from("websocket_failed_to_reconnect"),
            Status::WebsocketFailedToReconnect
        );
    }

    #[test]
    fn test_unknown_value_is_kept_verbatim() {
        let status = Status::from("brand_new_state");
        assert!(status.is_unrecognized());
        assert_eq!(status.as_str(), "brand_new_state");
        assert_ne!(status, Status::Enabled);
    }

    #[test]
    fn test_serde_uses_wire_strings() {
        let json = serde_json::to_string(&Status::NotificationFailuresExceeded).unwrap();
        assert_eq!(json, r#""notification_failures_exceeded""#);

        let parsed: Status = serde_json::from_str(r#""enabled""#).unwrap();
        assert!(parsed.is_enabled());

        let parsed: Status = serde_json::from_str(r#""mystery""#).unwrap();
        assert_eq!(parsed, Status::Unrecognized("mystery".to_string()));
    }
}
