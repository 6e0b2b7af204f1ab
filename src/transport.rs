//! Per-shard webhook transport identity.
//!
//! Each shard gets its own secret. The callback URL is always the configured
//! base URL followed by the secret, so the webhook receiver can recover the
//! shard from the request path and verify the payload signature with the
//! same value.

use data_encoding::HEXLOWER;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::WEBHOOK_METHOD;

/// Bytes of fresh entropy mixed into every generated secret.
const ENTROPY_BYTES: usize = 32;

/// Delivery method, callback and secret for one shard.
#[derive(Clone, PartialEq, Eq)]
pub struct Transport {
    method: String,
    base_callback_url: String,
    secret: String,
    callback: String,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("method", &self.method)
            .field("base_callback_url", &self.base_callback_url)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Generates a new identity.
    ///
    /// The secret is `SHA-256(hex(32 random bytes) ":" key)`, hex encoded.
    /// `key` only adds entropy; it is never sent anywhere.
    pub fn generate(base_callback_url: &str, key: &str) -> Self {
        let mut entropy = [0u8; ENTROPY_BYTES];
        rand::rng().fill_bytes(&mut entropy);

        let mut hasher = Sha256::new();
        hasher.update(HEXLOWER.encode(&entropy).as_bytes());
        hasher.update(b":");
        hasher.update(key.as_bytes());
        let secret = HEXLOWER.encode(&hasher.finalize());

        Self::reconstruct(base_callback_url, &secret)
    }

    /// Rebuilds an identity from a secret the service already knows.
    pub fn reconstruct(base_callback_url: &str, secret: &str) -> Self {
        Self {
            method: WEBHOOK_METHOD.to_string(),
            base_callback_url: base_callback_url.to_string(),
            secret: secret.to_string(),
            callback: format!("{base_callback_url}{secret}"),
        }
    }

    /// Rebuilds an identity from a callback reported by the service.
    ///
    /// The secret is the last path segment of the callback.
    pub fn from_callback(base_callback_url: &str, callback: &str) -> Option<Self> {
        secret_from_callback(callback).map(|secret| Self::reconstruct(base_callback_url, secret))
    }

    /// Identity for a shard that has no webhook callback (e.g. a websocket
    /// shard created elsewhere).
    pub fn without_callback(base_callback_url: &str, method: &str) -> Self {
        Self {
            method: method.to_string(),
            base_callback_url: base_callback_url.to_string(),
            secret: String::new(),
            callback: String::new(),
        }
    }

    /// Delivery method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Shared secret; empty for shards without a webhook callback.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Callback URL the service pushes to.
    pub fn callback(&self) -> &str {
        &self.callback
    }

    /// Base URL the callback is derived from.
    pub fn base_callback_url(&self) -> &str {
        &self.base_callback_url
    }

    /// Returns `true` if this transport has a webhook secret.
    pub fn has_secret(&self) -> bool {
        !self.secret.is_empty()
    }

    /// Applies the fields present in a server-reported transport.
    ///
    /// An explicit secret wins over one parsed from the callback. Either
    /// way the callback is re-derived from the secret.
    pub fn apply(&mut self, patch: &TransportPatch) {
        if let Some(method) = &patch.method {
            self.method.clone_from(method);
        }

        let secret = patch
            .secret
            .as_deref()
            .or_else(|| patch.callback.as_deref().and_then(secret_from_callback));

        if let Some(secret) = secret {
            let derived = format!("{}{}", self.base_callback_url, secret);
            if let Some(reported) = &patch.callback {
                if *reported != derived {
                    log::warn!(
                        "Reported callback {reported} does not match configured base {}",
                        self.base_callback_url
                    );
                }
            }
            self.secret = secret.to_string();
            self.callback = derived;
        }
    }

    /// Full wire form, including the secret.
    pub fn to_patch(&self) -> TransportPatch {
        TransportPatch {
            method: Some(self.method.clone()),
            callback: (!self.callback.is_empty()).then(|| self.callback.clone()),
            secret: (!self.secret.is_empty()).then(|| self.secret.clone()),
            session_id: None,
        }
    }
}

/// Transport as it appears on the wire; every field optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportPatch {
    /// Delivery method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Webhook callback URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<String>,
    /// Webhook secret. Never returned by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Websocket session id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Last non-empty path segment of a callback URL.
fn secret_from_callback(callback: &str) -> Option<&str> {
    let path = callback.split(['?', '#']).next().unwrap_or(callback);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
}
