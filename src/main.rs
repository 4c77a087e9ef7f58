// This is the entry point of the gamba bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic): commands, ledger, duels
// - `infra/` = Implementations of core traits (SQLite, JSON files)
// - `commands/` = The chat commands themselves, built on core services
// - `discord/` = Discord adapter (messages in, replies out)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Start background tasks

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "commands/command_catalog.rs"]
mod commands;
mod config;
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::commands::{build_catalog, ChatServices};
use crate::config::BotConfig;
use crate::core::channels::ChannelSettingsService;
use crate::core::chatters::ChatterStore;
use crate::core::commands::{CooldownStore, Dispatcher};
use crate::core::gamba::{
    CoinFlip, DuelConfig, DuelService, LedgerService, OsCoinFlip, RouletteService,
};
use crate::discord::chat::permissions::PermissionRules;
use crate::discord::chat::{duel_sweeper, handle_message};
use crate::discord::{Data, Error};
use crate::infra::channels::JsonChannelSettingsStore;
use crate::infra::chatters::SqliteChatterStore;
use crate::infra::commands::{InMemoryCooldownStore, SqliteCooldownStore};
use crate::infra::gamba::SqliteGambaStore;
use crate::infra::sqlite::open_pool;
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Event handler for non-command Discord events.
/// Every chat message goes through the command dispatcher.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if let serenity::FullEvent::Message { new_message } = event {
        if let Err(e) = handle_message(ctx, new_message, data).await {
            tracing::error!(
                channel_id = new_message.channel_id.get(),
                "Error handling message: {}",
                e
            );
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = BotConfig::from_env()?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let pool = open_pool(&config.database_path())
        .await
        .context("Failed to open the SQLite database")?;

    let gamba_store = Arc::new(SqliteGambaStore::new(pool.clone()));
    gamba_store
        .migrate()
        .await
        .context("Failed to migrate the gamba tables")?;

    let chatter_store = Arc::new(SqliteChatterStore::new(pool.clone()));
    chatter_store
        .migrate()
        .await
        .context("Failed to migrate the chatters table")?;
    let chatters: Arc<dyn ChatterStore> = chatter_store;

    let cooldowns: Arc<dyn CooldownStore> = if config.persist_cooldowns {
        let store = SqliteCooldownStore::new(pool);
        store
            .migrate()
            .await
            .context("Failed to migrate the cooldowns table")?;
        Arc::new(store)
    } else {
        Arc::new(InMemoryCooldownStore::new())
    };

    let channel_store = JsonChannelSettingsStore::new(config.channel_settings_path())
        .context("Failed to load channel settings")?;
    let channels = Arc::new(ChannelSettingsService::new(
        channel_store,
        config.default_prefix.clone(),
    ));

    let coin: Arc<dyn CoinFlip> = Arc::new(OsCoinFlip);
    let duels = Arc::new(DuelService::new_with_config(
        Arc::clone(&gamba_store),
        Arc::clone(&coin),
        DuelConfig {
            acceptance_window: config.duel_window,
        },
    ));

    let services = ChatServices {
        ledger: Arc::new(LedgerService::new(Arc::clone(&gamba_store))),
        roulette: Arc::new(RouletteService::new(Arc::clone(&gamba_store), coin)),
        duels: Arc::clone(&duels),
        chatters: Arc::clone(&chatters),
        channels: Arc::clone(&channels),
    };

    let catalog = build_catalog(&services).context("Invalid command catalog")?;
    tracing::info!(commands = catalog.len(), "Command catalog loaded");

    // Create the data structure shared with every event
    let data = Data {
        dispatcher: Arc::new(Dispatcher::new(catalog, cooldowns)),
        chatters,
        channels,
        permissions: PermissionRules {
            admin_user_ids: config.admin_user_ids.clone(),
            moderator_role_ids: config.moderator_role_ids.clone(),
        },
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================
    // Chat commands are prefix commands parsed by our own dispatcher, so the
    // poise command list stays empty and everything arrives as events.

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::DIRECT_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | serenity::GatewayIntents::GUILDS;

    let sweep_interval = config.duel_sweep_interval;
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![],
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, _framework| {
            Box::pin(async move {
                tracing::info!(user = %ready.user.name, "Bot is ready");

                // Background duel sweeper: expires unanswered duels.
                tokio::spawn(duel_sweeper::run(
                    ctx.http.clone(),
                    duels,
                    sweep_interval,
                ));

                Ok(data)
            })
        })
        .build();

    // Create the client and start the bot
    let mut client = serenity::ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await
        .context("Error creating client")?;

    client.start().await.context("Error running bot")?;
    Ok(())
}
