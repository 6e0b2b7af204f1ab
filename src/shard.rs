//! Conduit shards.
//!
//! A [`Shard`] is the local view of one delivery endpoint. It changes only
//! when a server payload is reconciled into it, and only for the fields the
//! payload actually carries.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ConduitError, Result};
use crate::status::Status;
use crate::transport::{Transport, TransportPatch};

/// One delivery endpoint within a conduit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    id: u32,
    transport: Transport,
    status: Option<Status>,
    session_id: Option<String>,
}

impl Shard {
    /// Builds a shard that has not been registered yet, with a freshly
    /// generated transport identity.
    pub fn create_pending(id: u32, base_callback_url: &str, key: &str) -> Self {
        Self {
            id,
            transport: Transport::generate(base_callback_url, key),
            status: None,
            session_id: None,
        }
    }

    /// Builds a shard from a server-reported descriptor.
    pub fn from_descriptor(base_callback_url: &str, descriptor: &ShardDescriptor) -> Result<Self> {
        let id = descriptor
            .shard_id()?
            .ok_or_else(|| ConduitError::InvalidResponse("shard without id".to_string()))?;

        let method = descriptor
            .transport
            .as_ref()
            .and_then(|t| t.method.as_deref())
            .unwrap_or_default();
        let mut shard = Self {
            id,
            transport: Transport::without_callback(base_callback_url, method),
            status: None,
            session_id: None,
        };
        shard.reconcile(descriptor)?;
        Ok(shard)
    }

    /// Shard id, unique within the conduit.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Transport identity.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Secret the webhook receiver verifies against.
    pub fn secret(&self) -> &str {
        self.transport.secret()
    }

    /// Callback URL.
    pub fn callback(&self) -> &str {
        self.transport.callback()
    }

    /// Last status reported by the service; `None` before registration.
    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    /// Websocket session id, for shards not using webhooks.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub(crate) fn set_transport(&mut self, transport: Transport) {
        self.transport = transport;
    }

    /// Applies the fields present in a server payload.
    ///
    /// Absent fields leave local values untouched, including the locally
    /// generated secret.
    pub fn reconcile(&mut self, payload: &ShardDescriptor) -> Result<()> {
        if let Some(id) = payload.shard_id()? {
            self.id = id;
        }
        if let Some(status) = &payload.status {
            self.status = Some(status.clone());
        }
        if let Some(session_id) = &payload.session_id {
            self.session_id = Some(session_id.clone());
        }
        if let Some(transport) = &payload.transport {
            if let Some(session_id) = &transport.session_id {
                self.session_id = Some(session_id.clone());
            }
            self.transport.apply(transport);
        }
        Ok(())
    }

    /// Wire form used for create and update requests.
    pub fn serialize(&self) -> ShardDescriptor {
        ShardDescriptor {
            id: Some(self.id.to_string()),
            transport: Some(self.transport.to_patch()),
            status: self.status.clone(),
            session_id: self.session_id.clone(),
        }
    }
}

/// Shard as it appears on the wire.
///
/// Every field is optional and absent fields are never serialized, so a
/// partial descriptor never tells the service to clear anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardDescriptor {
    /// Shard id. The service uses strings; numbers are accepted on input.
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    /// Transport fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportPatch>,
    /// Reported status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    /// Websocket session id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ShardDescriptor {
    /// Descriptor addressing shard `id` with no other fields.
    pub fn for_shard(id: u32) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::default()
        }
    }

    /// Sets the transport.
    pub fn with_transport(mut self, transport: TransportPatch) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Parses the id as a shard index.
    pub fn shard_id(&self) -> Result<Option<u32>> {
        self.id
            .as_deref()
            .map(|id| {
                id.parse::<u32>()
                    .map_err(|e| ConduitError::InvalidResponse(format!("shard id {id:?}: {e}")))
            })
            .transpose()
    }
}

/// A shard the service refused in a bulk update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardFailure {
    /// Id of the rejected shard.
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    /// Reason given by the service.
    #[serde(default)]
    pub message: String,
    /// Error code given by the service.
    #[serde(default)]
    pub code: String,
}

impl ShardFailure {
    /// Converts the rejection into a [`ConduitError::ShardRejected`].
    pub fn to_error(&self) -> ConduitError {
        ConduitError::ShardRejected {
            id: self.id.clone().unwrap_or_default(),
            code: self.code.clone(),
            message: self.message.clone(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: &str = "https://hooks.example.com/cb/";

    #[test]
    fn test_pending_shard_has_identity_but_no_status() {
        let shard = Shard::create_pending(3, BASE, "key");
        assert_eq!(shard.id(), 3);
        assert!(shard.status().is_none());
        assert_eq!(shard.callback(), format!("{BASE}{}", shard.secret()));
    }

    #[test]
    fn test_serialize_shape() {
        let shard = Shard::create_pending(0, BASE, "key");
        let json = serde_json::to_value(shard.serialize()).unwrap();
        assert_eq!(
            json,
            json!({
                "id": "0",
                "transport": {
                    "method": "webhook",
                    "callback": shard.callback(),
                    "secret": shard.secret(),
                }
            })
        );
    }

    #[test]
    fn test_reconcile_keeps_secret_when_transport_absent() {
        let mut shard = Shard::create_pending(0, BASE, "key");
        let secret = shard.secret().to_string();

        let payload: ShardDescriptor =
            serde_json::from_value(json!({"id": "0", "status": "enabled"})).unwrap();
        shard.reconcile(&payload).unwrap();

        assert_eq!(shard.status(), Some(&Status::Enabled));
        assert_eq!(shard.secret(), secret);
    }

    #[test]
    fn test_reconcile_partial_transport() {
        let mut shard = Shard::create_pending(0, BASE, "key");
        let secret = shard.secret().to_string();

        let payload: ShardDescriptor = serde_json::from_value(json!({
            "id": "0",
            "status": "webhook_callback_verification_pending",
            "transport": {"method": "webhook", "callback": format!("{BASE}{secret}")}
        }))
        .unwrap();
        shard.reconcile(&payload).unwrap();

        assert_eq!(shard.secret(), secret);
        assert_eq!(
            shard.status(),
            Some(&Status::WebhookCallbackVerificationPending)
        );
    }

    #[test]
    fn test_reconcile_overwrites_id() {
        let mut shard = Shard::create_pending(4, BASE, "key");
        shard.reconcile(&ShardDescriptor::for_shard(2)).unwrap();
        assert_eq!(shard.id(), 2);
    }

    #[test]
    fn test_from_descriptor_recovers_secret_from_callback() {
        let payload: ShardDescriptor = serde_json::from_value(json!({
            "id": 1,
            "status": "enabled",
            "transport": {"method": "webhook", "callback": format!("{BASE}cafe01")}
        }))
        .unwrap();
        let shard = Shard::from_descriptor(BASE, &payload).unwrap();
        assert_eq!(shard.id(), 1);
        assert_eq!(shard.secret(), "cafe01");
    }

    #[test]
    fn test_from_descriptor_websocket_shard() {
        let payload: ShardDescriptor = serde_json::from_value(json!({
            "id": "5",
            "status": "websocket_disconnected",
            "transport": {"method": "websocket", "session_id": "sess-1"}
        }))
        .unwrap();
        let shard = Shard::from_descriptor(BASE, &payload).unwrap();
        assert_eq!(shard.session_id(), Some("sess-1"));
        assert!(!shard.transport().has_secret());
        assert_eq!(shard.transport().method(), "websocket");
    }

    #[test]
    fn test_nulls_never_round_trip() {
        let partial: ShardDescriptor = serde_json::from_value(json!({
            "id": "0",
            "status": null,
            "session_id": null,
            "transport": {"method": "webhook", "callback": null, "secret": null}
        }))
        .unwrap();

        let text = serde_json::to_string(&partial).unwrap();
        assert!(!text.contains("null"), "{text}");
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&text).unwrap(),
            json!({"id": "0", "transport": {"method": "webhook"}})
        );
    }

    #[test]
    fn test_failure_becomes_rejection() {
        let failure: ShardFailure = serde_json::from_value(json!({
            "id": 7,
            "message": "callback unreachable",
            "code": "invalid_parameter"
        }))
        .unwrap();
        assert!(matches!(
            failure.to_error(),
            ConduitError::ShardRejected { ref id, ref code, .. }
                if id == "7" && code == "invalid_parameter"
        ));
    }

    #[test]
    fn test_non_numeric_id_is_rejected() {
        let payload = ShardDescriptor {
            id: Some("abc".to_string()),
            ..ShardDescriptor::default()
        };
        assert!(matches!(
            payload.shard_id(),
            Err(ConduitError::InvalidResponse(_))
        ));
    }
}
