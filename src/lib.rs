//! EventSub conduits - conduit, shard and subscription management.
//!
//! This crate keeps a local, reconciled view of an application's conduits
//! and their webhook shards, and drives the remote API that creates,
//! resizes and deletes them and subscribes them to events.
//!
//! # Architecture
//!
//! - **ConduitRegistry** - Owns the shared session and every known conduit
//! - **Conduit** - Capacity-bounded group of shards, indexed by id and secret
//! - **Shard** - One delivery endpoint with its transport identity
//! - **RequestExecutor** - Outbound HTTP with retry on connect timeouts
//!
//! # Modules
//!
//! - [`registry`] - Token, discovery and subscription housekeeping
//! - [`conduit`] - Shard lifecycle and bulk subscription creation
//! - [`transport`] - Secret generation and callback derivation
//! - [`catalog`] - Known event types, versions and condition fields
//! - [`config`] - Configuration loading/saving

// Library modules
pub mod auth;
pub mod catalog;
pub mod conduit;
pub mod registry;
pub mod shard;
pub mod subscription;
pub mod transport;

pub mod config;
pub mod constants;
pub mod error;
pub mod executor;
pub mod pagination;
pub mod retry;
pub mod session;
pub mod status;

// Re-export commonly used types
pub use catalog::{EventCatalog, EventType};
pub use conduit::{Conduit, ConduitState, ShardUpdateReport};
pub use config::Config;
pub use error::{ConduitError, Result};
pub use registry::ConduitRegistry;
pub use shard::{Shard, ShardDescriptor};
pub use status::Status;
pub use subscription::{Subscription, SubscriptionOutcome};
pub use transport::Transport;
