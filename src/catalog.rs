//! Subscribable event types.
//!
//! Maps each event type to the version to subscribe with and the condition
//! fields it accepts. The service rejects conditions carrying extra fields,
//! so callers' condition maps are filtered through [`EventType::filter_condition`].

use std::collections::{BTreeMap, HashMap};

/// Built-in table: `(type, version, condition fields)`.
const BUILTIN: &[(&str, &str, &[&str])] = &[
    ("automod.message.hold", "1", &["broadcaster_user_id", "moderator_user_id"]),
    ("automod.message.update", "1", &["broadcaster_user_id", "moderator_user_id"]),
    ("automod.settings.update", "1", &["broadcaster_user_id", "moderator_user_id"]),
    ("automod.terms.update", "1", &["broadcaster_user_id", "moderator_user_id"]),
    ("channel.update", "2", &["broadcaster_user_id"]),
    ("channel.follow", "2", &["broadcaster_user_id", "moderator_user_id"]),
    ("channel.ad_break.begin", "1", &["broadcaster_user_id"]),
    ("channel.chat.clear", "1", &["broadcaster_user_id", "user_id"]),
    ("channel.chat.clear_user_messages", "1", &["broadcaster_user_id", "user_id"]),
    ("channel.chat.message", "1", &["broadcaster_user_id", "user_id"]),
    ("channel.chat.message_delete", "1", &["broadcaster_user_id", "user_id"]),
    ("channel.chat.notification", "1", &["broadcaster_user_id", "user_id"]),
    ("channel.chat_settings.update", "1", &["broadcaster_user_id", "user_id"]),
    ("channel.chat.user_message_hold", "1", &["broadcaster_user_id", "user_id"]),
    ("channel.chat.user_message_update", "1", &["broadcaster_user_id", "user_id"]),
    ("channel.subscribe", "1", &["broadcaster_user_id"]),
    ("channel.subscription.end", "1", &["broadcaster_user_id"]),
    ("channel.subscription.gift", "1", &["broadcaster_user_id"]),
    ("channel.subscription.message", "1", &["broadcaster_user_id"]),
    ("channel.cheer", "1", &["broadcaster_user_id"]),
    ("channel.raid", "1", &["from_broadcaster_user_id", "to_broadcaster_user_id"]),
    ("channel.ban", "1", &["broadcaster_user_id"]),
    ("channel.unban", "1", &["broadcaster_user_id"]),
    ("channel.unban_request.create", "1", &["broadcaster_user_id", "moderator_user_id"]),
    ("channel.unban_request.resolve", "1", &["broadcaster_user_id", "moderator_user_id"]),
    ("channel.moderate", "2", &["broadcaster_user_id", "moderator_user_id"]),
    ("channel.moderator.add", "1", &["broadcaster_user_id"]),
    ("channel.moderator.remove", "1", &["broadcaster_user_id"]),
    ("channel.guest_star_session.begin", "beta", &["broadcaster_user_id", "moderator_user_id"]),
    ("channel.guest_star_session.end", "beta", &["broadcaster_user_id", "moderator_user_id"]),
    ("channel.guest_star_guest.update", "beta", &["broadcaster_user_id", "moderator_user_id"]),
    ("channel.guest_star_settings.update", "beta", &["broadcaster_user_id", "moderator_user_id"]),
    ("channel.channel_points_automatic_reward_redemption.add", "1", &["broadcaster_user_id"]),
    ("channel.channel_points_custom_reward.add", "1", &["broadcaster_user_id"]),
    ("channel.channel_points_custom_reward.update", "1", &["broadcaster_user_id", "reward_id"]),
    ("channel.channel_points_custom_reward.remove", "1", &["broadcaster_user_id", "reward_id"]),
    ("channel.channel_points_custom_reward_redemption.add", "1", &["broadcaster_user_id", "reward_id"]),
    ("channel.channel_points_custom_reward_redemption.update", "1", &["broadcaster_user_id", "reward_id"]),
    ("channel.poll.begin", "1", &["broadcaster_user_id"]),
    ("channel.poll.progress", "1", &["broadcaster_user_id"]),
    ("channel.poll.end", "1", &["broadcaster_user_id"]),
    ("channel.prediction.begin", "1", &["broadcaster_user_id"]),
    ("channel.prediction.progress", "1", &["broadcaster_user_id"]),
    ("channel.prediction.lock", "1", &["broadcaster_user_id"]),
    ("channel.prediction.end", "1", &["broadcaster_user_id"]),
    ("channel.suspicious_user.message", "1", &["broadcaster_user_id", "moderator_user_id"]),
    ("channel.suspicious_user.update", "1", &["broadcaster_user_id", "moderator_user_id"]),
    ("channel.vip.add", "1", &["broadcaster_user_id"]),
    ("channel.vip.remove", "1", &["broadcaster_user_id"]),
    ("channel.warning.acknowledge", "1", &["broadcaster_user_id", "moderator_user_id"]),
    ("channel.warning.send", "1", &["broadcaster_user_id", "moderator_user_id"]),
    ("conduit.shard.disabled", "1", &["client_id", "conduit_id"]),
    ("drop.entitlement.grant", "1", &["organization_id", "category_id", "campaign_id"]),
    ("extension.bits_transaction.create", "1", &["extension_client_id"]),
    ("channel.goal.begin", "1", &["broadcaster_user_id"]),
    ("channel.goal.progress", "1", &["broadcaster_user_id"]),
    ("channel.goal.end", "1", &["broadcaster_user_id"]),
    ("channel.hype_train.begin", "1", &["broadcaster_user_id"]),
    ("channel.hype_train.progress", "1", &["broadcaster_user_id"]),
    ("channel.hype_train.end", "1", &["broadcaster_user_id"]),
    ("channel.shield_mode.begin", "1", &["broadcaster_user_id", "moderator_user_id"]),
    ("channel.shield_mode.end", "1", &["broadcaster_user_id", "moderator_user_id"]),
    ("channel.shoutout.create", "1", &["broadcaster_user_id", "moderator_user_id"]),
    ("channel.shoutout.receive", "1", &["broadcaster_user_id", "moderator_user_id"]),
    ("stream.online", "1", &["broadcaster_user_id"]),
    ("stream.offline", "1", &["broadcaster_user_id"]),
    ("user.authorization.grant", "1", &["client_id"]),
    ("user.authorization.revoke", "1", &["client_id"]),
    ("user.update", "1", &["user_id"]),
    ("user.whisper.message", "1", &["user_id"]),
];

/// One subscribable event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventType {
    /// Type name, e.g. `channel.follow`.
    pub name: String,
    /// Version to subscribe with (`"1"`, `"2"`, `"beta"`).
    pub version: String,
    /// Condition fields the type accepts.
    pub conditions: Vec<String>,
}

impl EventType {
    /// Creates an event type entry.
    pub fn new(name: &str, version: &str, conditions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            conditions: conditions.iter().map(|c| (*c).to_string()).collect(),
        }
    }

    /// Keeps only the condition fields this type accepts.
    ///
    /// Fields the caller did not supply are simply absent from the result.
    pub fn filter_condition(&self, condition: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        self.conditions
            .iter()
            .filter_map(|field| {
                condition
                    .get(field)
                    .map(|value| (field.clone(), value.clone()))
            })
            .collect()
    }
}

/// Lookup table of subscribable event types.
#[derive(Debug, Clone, Default)]
pub struct EventCatalog {
    entries: HashMap<String, EventType>,
}

impl EventCatalog {
    /// Catalog from caller-supplied entries.
    pub fn new(entries: impl IntoIterator<Item = EventType>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.name.clone(), entry))
                .collect(),
        }
    }

    /// The built-in catalog.
    pub fn builtin() -> Self {
        Self::new(
            BUILTIN
                .iter()
                .map(|(name, version, conditions)| EventType::new(name, version, conditions)),
        )
    }

    /// Looks up an event type by name.
    pub fn lookup(&self, name: &str) -> Option<&EventType> {
        self.entries.get(name)
    }

    /// Returns `true` if the catalog knows `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of known event types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All event types, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &EventType> {
        let mut entries: Vec<&EventType> = self.entries.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries.into_iter()
    }
}
