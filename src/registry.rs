//! Top-level owner of every conduit belonging to the application.

use futures_util::stream::{self, StreamExt};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{self, ValidateResponse};
use crate::catalog::EventCatalog;
use crate::conduit::{Conduit, ConduitContext};
use crate::config::Config;
use crate::constants::{CONDUITS_PATH, SUBSCRIPTIONS_PATH};
use crate::error::{ConduitError, Result};
use crate::executor::RequestExecutor;
use crate::pagination::collect_pages;
use crate::session::Session;
use crate::subscription::Subscription;

/// Conduit as listed by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConduitInfo {
    /// Conduit id.
    pub id: String,
    /// Configured capacity.
    pub shard_count: u32,
}

#[derive(Deserialize)]
struct ConduitList {
    #[serde(default)]
    data: Vec<ConduitInfo>,
}

/// Owns the shared session and the known conduits.
///
/// Conduits are held in discovery/creation order. A conduit removed through
/// [`ConduitRegistry::delete_conduit`] is handed back to the caller already
/// in the deleted state.
#[derive(Debug)]
pub struct ConduitRegistry {
    config: Config,
    context: Arc<ConduitContext>,
    conduits: Vec<Conduit>,
}

impl ConduitRegistry {
    /// Creates a registry using the built-in event catalog.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_catalog(config, EventCatalog::builtin())
    }

    /// Creates a registry with a caller-supplied catalog.
    pub fn with_catalog(mut config: Config, catalog: EventCatalog) -> Result<Self> {
        config.normalize();
        config.validate()?;

        let executor = RequestExecutor::new(config.request_timeout(), config.connect_timeout())?;
        let session = Session::new(executor, config.api_base_url.as_str(), config.client_id.as_str());
        let context = ConduitContext {
            session: Arc::new(session),
            catalog: Arc::new(catalog),
            callback_base_url: config.callback_base_url.clone(),
            max_concurrency: config.max_concurrent_requests,
        };

        Ok(Self {
            config,
            context: Arc::new(context),
            conduits: Vec::new(),
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared session.
    pub fn session(&self) -> &Session {
        &self.context.session
    }

    /// Event catalog used for subscriptions.
    pub fn catalog(&self) -> &EventCatalog {
        &self.context.catalog
    }

    /// Known conduits.
    pub fn conduits(&self) -> &[Conduit] {
        &self.conduits
    }

    /// Conduit by id.
    pub fn conduit(&self, id: &str) -> Option<&Conduit> {
        self.conduits.iter().find(|c| c.id() == id)
    }

    /// Mutable conduit by id.
    pub fn conduit_mut(&mut self, id: &str) -> Option<&mut Conduit> {
        self.conduits.iter_mut().find(|c| c.id() == id)
    }

    /// Acquires an app access token and installs it in the session.
    pub async fn acquire_token(&self) -> Result<()> {
        let token = auth::acquire_token(
            self.session().executor(),
            &self.config.token_url,
            &self.config.client_id,
            &self.config.client_secret,
        )
        .await?;
        self.session().set_token(token.access_token);
        Ok(())
    }

    /// Validates the current token. `Ok(None)` means it was rejected.
    pub async fn validate_token(&self) -> Result<Option<ValidateResponse>> {
        let token = self.session().token()?;
        auth::validate_token(self.session().executor(), &self.config.validate_url, &token).await
    }

    /// Replaces the local conduit list with the service's.
    ///
    /// Shards are not loaded; call [`Conduit::refresh_shards`] for that.
    pub async fn discover_conduits(&mut self) -> Result<usize> {
        let request = self.session().request(Method::GET, CONDUITS_PATH)?;
        let list: ConduitList = self.session().send(&request).await?.expect_status(200)?.json()?;

        self.conduits = list
            .data
            .into_iter()
            .map(|info| Conduit::discovered(info.id, info.shard_count, Arc::clone(&self.context)))
            .collect();

        log::info!("Discovered {} conduit(s)", self.conduits.len());
        Ok(self.conduits.len())
    }

    /// Creates a conduit with the given capacity. It starts with no shards.
    pub async fn create_conduit(&mut self, shard_count: u32) -> Result<&mut Conduit> {
        let request = self
            .session()
            .request(Method::POST, CONDUITS_PATH)?
            .json(&serde_json::json!({ "shard_count": shard_count }))?;
        let list: ConduitList = self.session().send(&request).await?.expect_status(200)?.json()?;

        let info = list.data.into_iter().next().ok_or_else(|| {
            ConduitError::InvalidResponse("conduit creation returned no conduit".to_string())
        })?;
        log::info!("Created conduit {} with shard_count {}", info.id, info.shard_count);

        self.conduits
            .push(Conduit::created(info.id, info.shard_count, Arc::clone(&self.context)));
        let index = self.conduits.len() - 1;
        Ok(&mut self.conduits[index])
    }

    /// Deletes a conduit remotely and drops it from the registry.
    ///
    /// If the remote delete fails the conduit stays registered and active.
    pub async fn delete_conduit(&mut self, id: &str) -> Result<Conduit> {
        let index = self
            .conduits
            .iter()
            .position(|c| c.id() == id)
            .ok_or_else(|| ConduitError::InvalidArgument(format!("unknown conduit {id}")))?;

        self.conduits[index].delete().await?;
        Ok(self.conduits.remove(index))
    }

    /// Lists every subscription of the application, across all pages.
    pub async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        collect_pages(self.session(), SUBSCRIPTIONS_PATH, &[]).await
    }

    /// Deletes one subscription. Returns `true` only on a 204.
    pub async fn delete_subscription(&self, id: &str) -> bool {
        let request = match self.session().request(Method::DELETE, SUBSCRIPTIONS_PATH) {
            Ok(request) => request.query("id", id),
            Err(e) => {
                log::warn!("Cannot delete subscription {id}: {e}");
                return false;
            }
        };

        match self.session().send(&request).await {
            Ok(response) if response.status == 204 => true,
            Ok(response) => {
                log::warn!(
                    "Deleting subscription {id} returned {}: {}",
                    response.status,
                    response.body
                );
                false
            }
            Err(e) => {
                log::warn!("Deleting subscription {id} failed: {e}");
                false
            }
        }
    }

    /// Deletes every subscription whose status is not `enabled`.
    ///
    /// Deletes run concurrently. Returns the ids actually deleted, in list
    /// order; individual failures are logged and left out.
    pub async fn cleanup_subscriptions(&self) -> Result<Vec<String>> {
        let stale: Vec<String> = self
            .list_subscriptions()
            .await?
            .into_iter()
            .filter(|s| !s.status.is_enabled())
            .map(|s| s.id)
            .collect();

        let results: Vec<(String, bool)> = stream::iter(stale)
            .map(|id| async move {
                let deleted = self.delete_subscription(&id).await;
                (id, deleted)
            })
            .buffered(self.config.max_concurrent_requests.max(1))
            .collect()
            .await;

        let deleted: Vec<String> = results
            .into_iter()
            .filter_map(|(id, deleted)| deleted.then_some(id))
            .collect();
        log::info!("Removed {} stale subscription(s)", deleted.len());
        Ok(deleted)
    }

    /// Acquires a token, discovers conduits and loads each one's shards.
    pub async fn start(&mut self) -> Result<()> {
        self.acquire_token().await?;
        self.discover_conduits().await?;
        for conduit in &mut self.conduits {
            conduit.refresh_shards(None).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            callback_base_url: "https://hooks.example.com/cb".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_new_normalizes_config() {
        let registry = ConduitRegistry::new(config()).unwrap();
        assert_eq!(
            registry.config().callback_base_url,
            "https://hooks.example.com/cb/"
        );
        assert!(registry.conduits().is_empty());
        assert!(!registry.session().has_token());
    }

    #[test]
    fn test_new_rejects_incomplete_config() {
        let mut incomplete = config();
        incomplete.client_secret.clear();
        assert!(matches!(
            ConduitRegistry::new(incomplete),
            Err(ConduitError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_calls_before_token_fail() {
        let mut registry = ConduitRegistry::new(config()).unwrap();
        assert!(matches!(
            registry.discover_conduits().await,
            Err(ConduitError::MissingToken)
        ));
        assert!(!registry.delete_subscription("abc").await);
    }

    #[tokio::test]
    async fn test_delete_unknown_conduit() {
        let mut registry = ConduitRegistry::new(config()).unwrap();
        assert!(matches!(
            registry.delete_conduit("nope").await,
            Err(ConduitError::InvalidArgument(_))
        ));
    }
}
