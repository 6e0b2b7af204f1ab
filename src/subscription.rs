//! Subscriptions binding event types to a conduit.
//!
//! Subscriptions are not owned locally: creation is fire-and-forget and the
//! service's list endpoint is the only way to see them afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::EventType;
use crate::constants::CONDUIT_METHOD;
use crate::error::ConduitError;
use crate::status::Status;

/// A subscription as listed by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription id.
    pub id: String,
    /// Status reported by the service.
    pub status: Status,
    /// Event type.
    #[serde(rename = "type", default)]
    pub event_type: String,
    /// Event type version.
    #[serde(default)]
    pub version: String,
    /// Condition the subscription was created with.
    #[serde(default)]
    pub condition: serde_json::Value,
    /// Legacy per-user field; unused by conduit subscriptions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Creation timestamp, as reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Transport the subscription delivers through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<serde_json::Value>,
    /// Cost against the subscription budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<u32>,
}

/// Transport target of a conduit subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConduitTarget {
    /// Always `conduit`.
    pub method: String,
    /// Conduit receiving the events.
    pub conduit_id: String,
}

/// Body of a subscription-creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event type version.
    pub version: String,
    /// Condition, restricted to the fields the type accepts.
    pub condition: BTreeMap<String, String>,
    /// Conduit target.
    pub transport: ConduitTarget,
}

impl SubscriptionRequest {
    /// Builds the request for `event_type`, filtering `condition` to the
    /// fields the type accepts.
    pub fn new(
        event_type: &EventType,
        condition: &BTreeMap<String, String>,
        conduit_id: &str,
    ) -> Self {
        Self {
            event_type: event_type.name.clone(),
            version: event_type.version.clone(),
            condition: event_type.filter_condition(condition),
            transport: ConduitTarget {
                method: CONDUIT_METHOD.to_string(),
                conduit_id: conduit_id.to_string(),
            },
        }
    }
}

/// Result of one item in a bulk subscription request.
#[derive(Debug)]
pub enum SubscriptionOutcome {
    /// The service accepted the request.
    Created(SubscriptionRequest),
    /// The request failed or was never sent.
    Failed {
        /// Event type that was requested.
        event_type: String,
        /// Why it failed; [`ConduitError::UnknownEventType`] when the type
        /// is not in the catalog.
        error: ConduitError,
    },
}

impl SubscriptionOutcome {
    /// Returns `true` for [`SubscriptionOutcome::Created`].
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    /// Event type this outcome is for.
    pub fn event_type(&self) -> &str {
        match self {
            Self::Created(request) => &request.event_type,
            Self::Failed { event_type, .. } => event_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let event_type = EventType::new("channel.follow", "2", &["broadcaster_user_id", "moderator_user_id"]);
        let condition: BTreeMap<String, String> = [
            ("broadcaster_user_id", "1"),
            ("moderator_user_id", "2"),
            ("user_id", "3"),
        ]
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();

        let request = SubscriptionRequest::new(&event_type, &condition, "conduit-1");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "type": "channel.follow",
                "version": "2",
                "condition": {"broadcaster_user_id": "1", "moderator_user_id": "2"},
                "transport": {"method": "conduit", "conduit_id": "conduit-1"}
            })
        );
    }

    #[test]
    fn test_subscription_deserialize() {
        let subscription: Subscription = serde_json::from_value(json!({
            "id": "f1c2a387",
            "status": "webhook_callback_verification_failed",
            "type": "stream.online",
            "version": "1",
            "condition": {"broadcaster_user_id": "1234"},
            "created_at": "2024-01-01T00:00:00Z",
            "transport": {"method": "conduit", "conduit_id": "abc"},
            "cost": 0
        }))
        .unwrap();
        assert_eq!(subscription.id, "f1c2a387");
        assert_eq!(subscription.status, Status::WebhookCallbackVerificationFailed);
        assert_eq!(subscription.event_type, "stream.online");
    }

    #[test]
    fn test_outcome_event_type() {
        let failed = SubscriptionOutcome::Failed {
            event_type: "bogus.type".to_string(),
            error: ConduitError::UnknownEventType("bogus.type".to_string()),
        };
        assert!(!failed.is_created());
        assert_eq!(failed.event_type(), "bogus.type");
    }
}
