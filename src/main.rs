//! Conduits CLI - manages EventSub conduits, shards and subscriptions.
//!
//! This is the main binary entry point. See the `eventsub_conduits` library
//! for the core functionality.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use eventsub_conduits::{Config, ConduitRegistry, Status, SubscriptionOutcome};
use std::collections::BTreeMap;

#[derive(Parser)]
#[command(name = "conduits")]
#[command(version)]
#[command(about = "Manage EventSub conduits, shards and subscriptions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire a token, discover conduits and list their shards
    Start,
    /// Create a conduit
    CreateConduit {
        /// Initial capacity
        #[arg(long, default_value_t = 1)]
        shards: u32,
    },
    /// Delete a conduit
    DeleteConduit {
        /// Conduit id
        id: String,
    },
    /// Set a conduit's shard capacity
    Resize {
        /// Conduit id
        id: String,
        /// New shard count
        shard_count: u32,
    },
    /// Register a new webhook shard on a conduit
    AddShard {
        /// Conduit id
        id: String,
        /// Key mixed into the generated secret
        #[arg(long)]
        key: String,
    },
    /// List a conduit's shards
    Shards {
        /// Conduit id
        id: String,
        /// Only shards with this status
        #[arg(long)]
        status: Option<String>,
    },
    /// Subscribe a conduit to event types
    Subscribe {
        /// Conduit id
        id: String,
        /// Event types (repeatable)
        #[arg(long = "type", required = true)]
        types: Vec<String>,
        /// Condition field as key=value (repeatable)
        #[arg(long, value_parser = parse_key_value)]
        condition: Vec<(String, String)>,
    },
    /// List all subscriptions
    Subscriptions,
    /// Delete every subscription that is not enabled
    Cleanup,
    /// List known event types
    EventTypes,
    /// Print the active configuration
    Config,
}

fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    Ok((key.to_string(), value.to_string()))
}

/// Builds a registry, acquires a token and loads conduits with their shards.
async fn connect(config: Config) -> Result<ConduitRegistry> {
    let mut registry = ConduitRegistry::new(config).context("invalid configuration")?;
    registry.start().await.context("failed to load conduits")?;
    Ok(registry)
}

fn print_shards<'a>(shards: impl Iterator<Item = &'a eventsub_conduits::Shard>) {
    for shard in shards {
        let status = shard.status().map_or("pending", Status::as_str);
        let target = if shard.callback().is_empty() {
            shard.session_id().unwrap_or("-")
        } else {
            shard.callback()
        };
        println!("  [{}] {status} {target}", shard.id());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Start => {
            let registry = connect(config).await?;
            for conduit in registry.conduits() {
                println!(
                    "{} ({} shard(s), capacity {})",
                    conduit.id(),
                    conduit.len(),
                    conduit.shard_count()
                );
                print_shards(conduit.shards());
            }
        }
        Commands::CreateConduit { shards } => {
            let mut registry = connect(config).await?;
            let conduit = registry.create_conduit(shards).await?;
            println!("{}", conduit.id());
        }
        Commands::DeleteConduit { id } => {
            let mut registry = connect(config).await?;
            registry.delete_conduit(&id).await?;
            println!("Deleted conduit {id}");
        }
        Commands::Resize { id, shard_count } => {
            let mut registry = connect(config).await?;
            let Some(conduit) = registry.conduit_mut(&id) else {
                bail!("unknown conduit {id}");
            };
            conduit.update_capacity(shard_count).await?;
            println!("Conduit {id} capacity set to {shard_count}");
        }
        Commands::AddShard { id, key } => {
            let mut registry = connect(config).await?;
            let Some(conduit) = registry.conduit_mut(&id) else {
                bail!("unknown conduit {id}");
            };
            let shard = conduit.create_shard(&key).await?;
            println!("Shard {} -> {}", shard.id(), shard.callback());
        }
        Commands::Shards { id, status } => {
            let mut registry = connect(config).await?;
            let Some(conduit) = registry.conduit_mut(&id) else {
                bail!("unknown conduit {id}");
            };
            let filter = status.map(Status::from);
            conduit.refresh_shards(filter.as_ref()).await?;
            print_shards(conduit.shards());
        }
        Commands::Subscribe { id, types, condition } => {
            let registry = connect(config).await?;
            let Some(conduit) = registry.conduit(&id) else {
                bail!("unknown conduit {id}");
            };
            let condition: BTreeMap<String, String> = condition.into_iter().collect();
            let types: Vec<&str> = types.iter().map(String::as_str).collect();

            for outcome in conduit.create_subscriptions(&types, &condition).await? {
                match outcome {
                    SubscriptionOutcome::Created(request) => {
                        println!("ok     {} v{}", request.event_type, request.version);
                    }
                    SubscriptionOutcome::Failed { event_type, error } => {
                        println!("failed {event_type}: {error}");
                    }
                }
            }
        }
        Commands::Subscriptions => {
            let registry = ConduitRegistry::new(config)?;
            registry.acquire_token().await?;
            for subscription in registry.list_subscriptions().await? {
                println!(
                    "{} {} v{} {}",
                    subscription.id,
                    subscription.event_type,
                    subscription.version,
                    subscription.status
                );
            }
        }
        Commands::Cleanup => {
            let registry = ConduitRegistry::new(config)?;
            registry.acquire_token().await?;
            let deleted = registry.cleanup_subscriptions().await?;
            println!("Deleted {} subscription(s)", deleted.len());
        }
        Commands::EventTypes => {
            for event_type in eventsub_conduits::EventCatalog::builtin().iter() {
                println!(
                    "{} v{} [{}]",
                    event_type.name,
                    event_type.version,
                    event_type.conditions.join(", ")
                );
            }
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
