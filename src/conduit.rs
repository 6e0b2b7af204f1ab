//! Conduits and their shards.
//!
//! A [`Conduit`] owns its shards, keyed by shard id, plus a secondary index
//! from secret to shard id that is rebuilt on every change to the shard map.
//! Deleting a conduit is terminal: every later call fails with
//! [`ConduitError::InvalidState`].
//!
//! Shard creation is not atomic. Capacity may be grown and the shard
//! registration then fail; the next [`Conduit::refresh_shards`] brings the
//! local view back in line with the service. Nothing is rolled back.

use futures_util::stream::{self, StreamExt};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::catalog::EventCatalog;
use crate::constants::{CONDUITS_PATH, SHARDS_PATH, SUBSCRIPTIONS_PATH};
use crate::error::{ConduitError, Result};
use crate::executor::ApiResponse;
use crate::pagination::collect_pages;
use crate::retry::RetryPolicy;
use crate::session::Session;
use crate::shard::{Shard, ShardDescriptor, ShardFailure};
use crate::status::Status;
use crate::subscription::{SubscriptionOutcome, SubscriptionRequest};
use crate::transport::Transport;

/// Everything a conduit needs from its owner.
#[derive(Debug)]
pub(crate) struct ConduitContext {
    pub(crate) session: Arc<Session>,
    pub(crate) catalog: Arc<EventCatalog>,
    pub(crate) callback_base_url: String,
    pub(crate) max_concurrency: usize,
}

/// Lifecycle state of a conduit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConduitState {
    /// Usable.
    Active,
    /// Deleted remotely; terminal.
    Deleted,
}

/// Result of a bulk shard update.
///
/// The service answers 202 even when some shards were rejected; those are
/// listed in `errors`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardUpdateReport {
    /// Shards the service accepted, as it reports them.
    #[serde(rename = "data", default)]
    pub updated: Vec<ShardDescriptor>,
    /// Shards the service rejected.
    #[serde(default)]
    pub errors: Vec<ShardFailure>,
}

impl ShardUpdateReport {
    /// Rejection for shard `id`, if any.
    pub fn failure_for(&self, id: u32) -> Option<&ShardFailure> {
        let id = id.to_string();
        self.errors.iter().find(|f| f.id.as_deref() == Some(id.as_str()))
    }

    fn from_response(response: &ApiResponse) -> Result<Self> {
        if response.body.trim().is_empty() {
            return Ok(Self::default());
        }
        response.json()
    }
}

#[derive(Serialize)]
struct ShardUpdateBody<'a> {
    conduit_id: &'a str,
    shards: &'a [ShardDescriptor],
}

/// A named, capacity-bounded group of shards.
#[derive(Debug)]
pub struct Conduit {
    id: String,
    shard_count: u32,
    shards: BTreeMap<u32, Shard>,
    secret_index: HashMap<String, u32>,
    /// Whether `shards` mirrors every remote shard (not a filtered or
    /// never-loaded subset).
    complete: bool,
    state: ConduitState,
    context: Arc<ConduitContext>,
}

impl Conduit {
    /// A conduit whose shards have not been loaded yet.
    pub(crate) fn discovered(id: String, shard_count: u32, context: Arc<ConduitContext>) -> Self {
        Self::new(id, shard_count, false, context)
    }

    /// A conduit just created remotely, known to have no shards.
    pub(crate) fn created(id: String, shard_count: u32, context: Arc<ConduitContext>) -> Self {
        Self::new(id, shard_count, true, context)
    }

    fn new(id: String, shard_count: u32, complete: bool, context: Arc<ConduitContext>) -> Self {
        Self {
            id,
            shard_count,
            shards: BTreeMap::new(),
            secret_index: HashMap::new(),
            complete,
            state: ConduitState::Active,
            context,
        }
    }

    /// Conduit id assigned by the service.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Capacity the service routes to.
    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConduitState {
        self.state
    }

    /// Returns `true` once the conduit has been deleted.
    pub fn is_deleted(&self) -> bool {
        self.state == ConduitState::Deleted
    }

    /// Number of shards known locally.
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    /// Whether no shards are known locally.
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Shards in id order.
    pub fn shards(&self) -> impl Iterator<Item = &Shard> {
        self.shards.values()
    }

    /// Shard by id.
    pub fn shard(&self, id: u32) -> Option<&Shard> {
        self.shards.get(&id)
    }

    /// Shard whose webhook secret is `secret`.
    pub fn shard_by_secret(&self, secret: &str) -> Option<&Shard> {
        self.secret_index
            .get(secret)
            .and_then(|id| self.shards.get(id))
    }

    /// Number of entries in the secret index.
    pub fn indexed_secrets(&self) -> usize {
        self.secret_index.len()
    }

    /// Shards whose last reported status is `status`.
    pub fn shards_with_status<'a>(&'a self, status: &'a Status) -> impl Iterator<Item = &'a Shard> {
        self.shards
            .values()
            .filter(move |shard| shard.status() == Some(status))
    }

    /// `(secret, callback)` pairs for the webhook receiver.
    pub fn callback_credentials(&self) -> Vec<(String, String)> {
        self.shards
            .values()
            .filter(|shard| shard.transport().has_secret())
            .map(|shard| (shard.secret().to_string(), shard.callback().to_string()))
            .collect()
    }

    fn ensure_active(&self) -> Result<()> {
        match self.state {
            ConduitState::Active => Ok(()),
            ConduitState::Deleted => Err(ConduitError::InvalidState {
                conduit_id: self.id.clone(),
            }),
        }
    }

    fn session(&self) -> &Session {
        &self.context.session
    }

    fn local_count(&self) -> u32 {
        u32::try_from(self.shards.len()).unwrap_or(u32::MAX)
    }

    /// Next free index, starting at the local shard count.
    fn next_shard_id(&self) -> u32 {
        let mut id = self.local_count();
        while self.shards.contains_key(&id) {
            id = id.saturating_add(1);
        }
        id
    }

    fn reindex(&mut self) {
        self.secret_index.clear();
        for shard in self.shards.values() {
            if !shard.transport().has_secret() {
                continue;
            }
            if let Some(previous) = self
                .secret_index
                .insert(shard.secret().to_string(), shard.id())
            {
                log::warn!(
                    "Conduit {}: shards {previous} and {} share a secret",
                    self.id,
                    shard.id()
                );
            }
        }
    }

    fn replace_shards(&mut self, shards: Vec<Shard>) {
        self.shards = shards.into_iter().map(|shard| (shard.id(), shard)).collect();
        if self.local_count() > self.shard_count {
            log::warn!(
                "Conduit {} reports {} shards but shard_count is {}",
                self.id,
                self.shards.len(),
                self.shard_count
            );
            self.shard_count = self.local_count();
        }
        self.reindex();
    }

    /// Sets the conduit's capacity.
    ///
    /// This is a pure state-set, so connection timeouts are retried until
    /// the call goes through. Shrinking below the number of local shards
    /// is refused.
    pub async fn update_capacity(&mut self, shard_count: u32) -> Result<()> {
        self.ensure_active()?;
        if shard_count < self.local_count() {
            return Err(ConduitError::InvalidArgument(format!(
                "shard_count {shard_count} is below the {} shards of conduit {}",
                self.shards.len(),
                self.id
            )));
        }

        let request = self
            .session()
            .request(Method::PATCH, CONDUITS_PATH)?
            .json(&serde_json::json!({ "id": self.id, "shard_count": shard_count }))?;

        let session = self.session();
        let policy = RetryPolicy::unbounded(session.executor().retry_policy().delay);
        policy
            .execute("update conduit", || session.send(&request))
            .await?
            .expect_status(200)?;

        log::info!(
            "Conduit {} shard count updated {} -> {shard_count}",
            self.id,
            self.shard_count
        );
        self.shard_count = shard_count;
        Ok(())
    }

    /// Deletes the conduit remotely. On success the conduit becomes
    /// [`ConduitState::Deleted`]; on failure it stays active.
    ///
    /// Only reachable through [`ConduitRegistry::delete_conduit`], which
    /// also drops the conduit from its collection.
    ///
    /// [`ConduitRegistry::delete_conduit`]: crate::registry::ConduitRegistry::delete_conduit
    pub(crate) async fn delete(&mut self) -> Result<()> {
        self.ensure_active()?;

        let request = self
            .session()
            .request(Method::DELETE, CONDUITS_PATH)?
            .query("id", self.id.as_str());
        self.session().send(&request).await?.expect_status(204)?;

        log::info!("Conduit {} deleted", self.id);
        self.state = ConduitState::Deleted;
        self.shards.clear();
        self.secret_index.clear();
        self.complete = false;
        Ok(())
    }

    /// Replaces the local shard list with the service's, walking every page.
    ///
    /// With a status filter only matching shards are kept. Filtering on an
    /// unrecognized status is refused. Returns the number of shards loaded.
    pub async fn refresh_shards(&mut self, status: Option<&Status>) -> Result<usize> {
        self.ensure_active()?;
        if let Some(status) = status.filter(|s| s.is_unrecognized()) {
            return Err(ConduitError::InvalidArgument(format!(
                "cannot filter on unrecognized status {status}"
            )));
        }

        let mut query = vec![("conduit_id", self.id.as_str())];
        if let Some(status) = status {
            query.push(("status", status.as_str()));
        }
        let descriptors: Vec<ShardDescriptor> =
            collect_pages(self.session(), SHARDS_PATH, &query).await?;

        let shards = descriptors
            .iter()
            .map(|descriptor| Shard::from_descriptor(&self.context.callback_base_url, descriptor))
            .collect::<Result<Vec<_>>>()?;
        self.replace_shards(shards);
        self.complete = status.is_none();

        log::debug!("Conduit {}: {} shard(s) loaded", self.id, self.shards.len());
        Ok(self.shards.len())
    }

    /// Registers a new webhook shard, growing capacity by one first if the
    /// conduit is full.
    ///
    /// `key` only seeds the secret. The request is sent once (plus the
    /// executor's connect-timeout retries).
    ///
    /// The new id must not collide with a remote shard, so if the local
    /// view is filtered or was never loaded, the full shard list is fetched
    /// first.
    pub async fn create_shard(&mut self, key: &str) -> Result<&Shard> {
        self.ensure_active()?;
        if !self.complete {
            self.refresh_shards(None).await?;
        }
        if self.local_count() >= self.shard_count {
            self.update_capacity(self.shard_count.saturating_add(1)).await?;
        }

        let id = self.next_shard_id();
        let mut shard = Shard::create_pending(id, &self.context.callback_base_url, key);
        let descriptors = [shard.serialize()];
        let request = self
            .session()
            .request(Method::PATCH, SHARDS_PATH)?
            .json(&ShardUpdateBody {
                conduit_id: &self.id,
                shards: &descriptors,
            })?;

        let response = self.session().send(&request).await?.expect_status(202)?;
        let report = ShardUpdateReport::from_response(&response)?;

        if let Some(failure) = report.failure_for(id) {
            return Err(failure.to_error());
        }
        let id_text = id.to_string();
        if let Some(reported) = report
            .updated
            .iter()
            .find(|d| d.id.as_deref() == Some(id_text.as_str()))
            .or_else(|| report.updated.first())
        {
            shard.reconcile(reported)?;
        }

        let shard_id = shard.id();
        self.shards.insert(shard_id, shard);
        self.reindex();
        log::info!("Conduit {}: shard {shard_id} registered", self.id);

        self.shards
            .get(&shard_id)
            .ok_or_else(|| ConduitError::InvalidResponse(format!("shard {shard_id} missing")))
    }

    /// Bulk-patches shards.
    ///
    /// Descriptors never carry null fields on the wire. Accepted shards are
    /// reconciled into the local view (new ids are added); rejected ones
    /// are returned in the report.
    pub async fn update_shards(&mut self, shards: &[ShardDescriptor]) -> Result<ShardUpdateReport> {
        self.ensure_active()?;
        if shards.is_empty() {
            return Ok(ShardUpdateReport::default());
        }

        let request = self
            .session()
            .request(Method::PATCH, SHARDS_PATH)?
            .json(&ShardUpdateBody {
                conduit_id: &self.id,
                shards,
            })?;
        let response = self.session().send(&request).await?.expect_status(202)?;
        let report = ShardUpdateReport::from_response(&response)?;

        // Every reported id must parse before any local shard is touched.
        let reported = report
            .updated
            .iter()
            .filter_map(|descriptor| {
                descriptor
                    .shard_id()
                    .transpose()
                    .map(|id| id.map(|id| (id, descriptor)))
            })
            .collect::<Result<Vec<_>>>()?;

        let applied = self.apply_reported(&reported);
        self.reindex();
        applied?;

        for failure in &report.errors {
            log::warn!(
                "Conduit {}: shard {} rejected ({}): {}",
                self.id,
                failure.id.as_deref().unwrap_or("?"),
                failure.code,
                failure.message
            );
        }
        Ok(report)
    }

    fn apply_reported(&mut self, reported: &[(u32, &ShardDescriptor)]) -> Result<()> {
        for &(id, descriptor) in reported {
            match self.shards.entry(id) {
                Entry::Occupied(mut entry) => entry.get_mut().reconcile(descriptor)?,
                Entry::Vacant(entry) => {
                    entry.insert(Shard::from_descriptor(
                        &self.context.callback_base_url,
                        descriptor,
                    )?);
                }
            }
        }
        Ok(())
    }

    /// Gives an existing shard a fresh secret and callback.
    pub async fn rotate_secret(&mut self, shard_id: u32, key: &str) -> Result<&Shard> {
        self.ensure_active()?;
        if !self.shards.contains_key(&shard_id) {
            return Err(ConduitError::InvalidArgument(format!(
                "conduit {} has no shard {shard_id}",
                self.id
            )));
        }

        let transport = Transport::generate(&self.context.callback_base_url, key);
        let descriptor = ShardDescriptor::for_shard(shard_id).with_transport(transport.to_patch());
        let report = self.update_shards(std::slice::from_ref(&descriptor)).await?;
        if let Some(failure) = report.failure_for(shard_id) {
            return Err(failure.to_error());
        }

        if let Some(shard) = self.shards.get_mut(&shard_id) {
            shard.set_transport(transport);
        }
        self.reindex();
        log::info!("Conduit {}: shard {shard_id} secret rotated", self.id);

        self.shards
            .get(&shard_id)
            .ok_or_else(|| ConduitError::InvalidResponse(format!("shard {shard_id} missing")))
    }

    /// Subscribes this conduit to each event type, concurrently.
    ///
    /// Returns one outcome per requested type, in request order. Types not
    /// in the catalog are never sent and come back as
    /// [`ConduitError::UnknownEventType`] failures. One failure does not
    /// affect the others.
    pub async fn create_subscriptions(
        &self,
        event_types: &[&str],
        condition: &BTreeMap<String, String>,
    ) -> Result<Vec<SubscriptionOutcome>> {
        self.ensure_active()?;

        let outcomes: Vec<SubscriptionOutcome> = stream::iter(
            event_types
                .iter()
                .map(|event_type| self.create_subscription(event_type, condition)),
        )
        .buffered(self.context.max_concurrency.max(1))
        .collect()
        .await;

        let created = outcomes.iter().filter(|o| o.is_created()).count();
        log::info!(
            "Conduit {}: {created}/{} subscription(s) created",
            self.id,
            outcomes.len()
        );
        Ok(outcomes)
    }

    async fn create_subscription(
        &self,
        event_type: &str,
        condition: &BTreeMap<String, String>,
    ) -> SubscriptionOutcome {
        let Some(entry) = self.context.catalog.lookup(event_type) else {
            log::warn!("Skipping unknown event type {event_type}");
            return SubscriptionOutcome::Failed {
                event_type: event_type.to_string(),
                error: ConduitError::UnknownEventType(event_type.to_string()),
            };
        };

        let request = SubscriptionRequest::new(entry, condition, &self.id);
        match self.send_subscription(&request).await {
            Ok(()) => SubscriptionOutcome::Created(request),
            Err(error) => {
                log::warn!("Subscription to {event_type} failed: {error}");
                SubscriptionOutcome::Failed {
                    event_type: event_type.to_string(),
                    error,
                }
            }
        }
    }

    async fn send_subscription(&self, request: &SubscriptionRequest) -> Result<()> {
        let api_request = self
            .session()
            .request(Method::POST, SUBSCRIPTIONS_PATH)?
            .json(request)?;
        self.session().send(&api_request).await?.expect_status(202)?;
        Ok(())
    }
}
