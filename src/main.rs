mod broadcast;
mod config;
mod event;
mod moderation;
mod platform;
mod router;
mod server;
mod store;
#[cfg(test)]
mod testing;
mod util;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::platform::telegram::TelegramPlatform;
use crate::router::{EventRouter, RouterSettings};
use crate::store::{AuditLog, AuditTrail, DisabledStore, SqliteStore, SubscriberRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,linkguard=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Operators: {:?}", config.telegram.operator_ids);
    info!("  Moderated chat kinds: {:?}", config.moderation.moderated_kinds());
    info!("  Admin exemption: {}", config.moderation.exempt_admins);
    info!("  Broadcast concurrency: {}", config.broadcast.concurrency);

    let platform = Arc::new(TelegramPlatform::new(
        &config.telegram.bot_token,
        config.timeouts.telegram(),
    )?);

    let subscribers: Arc<dyn SubscriberRegistry>;
    let audit_log: Arc<dyn AuditLog>;
    match &config.storage {
        Some(storage) => {
            let store = SqliteStore::open(&storage.database_path)?;
            info!("  Subscribers: {}", store.count_subscribers().await?);
            subscribers = Arc::new(store.clone());
            audit_log = Arc::new(store);
        }
        None => {
            warn!("No [storage] configured: subscribers and audit records are not kept");
            subscribers = Arc::new(DisabledStore);
            audit_log = Arc::new(DisabledStore);
        }
    }

    let router = Arc::new(EventRouter::new(
        platform,
        subscribers,
        AuditTrail::new(audit_log, config.timeouts.storage()),
        RouterSettings::from_config(&config),
    ));

    info!("Bot is starting...");
    server::serve(
        router,
        &config.server.bind_address,
        &config.server.webhook_path,
    )
    .await?;

    Ok(())
}
