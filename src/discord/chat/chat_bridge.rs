// Bridges Discord messages to the command dispatcher.
//
// This layer is THIN: pull plain data out of serenity types, hand an
// `IncomingMessage` to the dispatcher, post whatever comes back.

pub mod duel_sweeper;
pub mod permissions;

use crate::core::channels::ChannelSettingsService;
use crate::core::chatters::ChatterStore;
use crate::core::commands::{DispatchError, Dispatcher, IncomingMessage, OutgoingMessage};
use crate::infra::channels::JsonChannelSettingsStore;
use chrono::Utc;
use permissions::{AuthorFacts, PermissionRules};
use poise::serenity_prelude as serenity;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// Discord caps a message at 2000 characters.
const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Shared state handed to every event.
pub struct Data {
    pub dispatcher: Arc<Dispatcher>,
    pub chatters: Arc<dyn ChatterStore>,
    pub channels: Arc<ChannelSettingsService<JsonChannelSettingsStore>>,
    pub permissions: PermissionRules,
}

pub async fn handle_message(
    ctx: &serenity::Context,
    message: &serenity::Message,
    data: &Data,
) -> Result<(), Error> {
    // Ignore bot messages (including our own)
    if message.author.bot {
        return Ok(());
    }

    let now = Utc::now();
    let channel = message.channel_id.get().to_string();
    let user_id = message.author.id.get().to_string();

    // Every author and every mentioned user becomes resolvable by name.
    remember(data, &user_id, &message.author.name, now).await;
    let mut mentioned = Vec::with_capacity(message.mentions.len());
    for user in message.mentions.iter().filter(|user| !user.bot) {
        remember(data, &user.id.get().to_string(), &user.name, now).await;
        mentioned.push((user.id.get(), user.name.as_str()));
    }

    let author = author_facts(ctx, message);
    let incoming = IncomingMessage {
        text: rewrite_mentions(&message.content, &mentioned),
        prefix: data.channels.prefix_for(&channel).await?,
        channel,
        user: message.author.name.clone(),
        user_id,
        timestamp: now,
        permission: data.permissions.resolve(&author),
    };

    let replies = replies_for(&incoming, data.dispatcher.handle(&incoming).await);
    send_replies(&ctx.http, replies).await;
    Ok(())
}

/// Failures are logged and never reach the channel.
fn replies_for(
    incoming: &IncomingMessage,
    result: Result<Vec<OutgoingMessage>, DispatchError>,
) -> Vec<OutgoingMessage> {
    match result {
        Ok(replies) => replies,
        Err(err) => {
            tracing::error!(
                user_id = %incoming.user_id,
                channel = %incoming.channel,
                "Command failed: {}",
                err
            );
            Vec::new()
        }
    }
}

async fn remember(data: &Data, user_id: &str, name: &str, now: chrono::DateTime<Utc>) {
    if let Err(err) = data.chatters.remember(user_id, name, now).await {
        tracing::warn!(user_id, "Failed to remember chatter: {}", err);
    }
}

/// Owner, roles and boost status, best-effort from the cache and the
/// partial member attached to guild messages. DMs get no special rights.
fn author_facts(ctx: &serenity::Context, message: &serenity::Message) -> AuthorFacts {
    let mut facts = AuthorFacts {
        user_id: message.author.id.get(),
        ..Default::default()
    };

    if let Some(guild_id) = message.guild_id {
        facts.is_guild_owner = ctx
            .cache
            .guild(guild_id)
            .map(|guild| guild.owner_id == message.author.id)
            .unwrap_or(false);
    }
    if let Some(member) = &message.member {
        facts.role_ids = member.roles.iter().map(|role| role.get()).collect();
        facts.is_booster = member.premium_since.is_some();
    }

    facts
}

/// Turn `<@123>` and `<@!123>` into `@name` so mentions parse like typed
/// names.
pub fn rewrite_mentions(text: &str, mentioned: &[(u64, &str)]) -> String {
    let mut text = text.to_string();
    for (id, name) in mentioned {
        let replacement = format!("@{}", name);
        text = text
            .replace(&format!("<@!{}>", id), &replacement)
            .replace(&format!("<@{}>", id), &replacement);
    }
    text
}

pub async fn send_replies(http: &serenity::Http, replies: Vec<OutgoingMessage>) {
    for reply in replies {
        send_text(http, &reply.channel, &reply.text).await;
    }
}

/// Post `text` to `channel`, split into as many messages as needed.
pub async fn send_text(http: &serenity::Http, channel: &str, text: &str) {
    let Ok(channel_id) = channel.parse::<u64>() else {
        tracing::warn!(channel, "Reply addressed to a non-Discord channel");
        return;
    };
    if channel_id == 0 {
        tracing::warn!("Reply addressed to channel 0");
        return;
    }

    let channel_id = serenity::ChannelId::new(channel_id);
    for chunk in split_message(text) {
        if let Err(e) = channel_id.say(http, chunk).await {
            tracing::error!(channel, "Failed to send reply: {}", e);
        }
    }
}

/// Split on character (not byte) boundaries into Discord-sized pieces.
pub fn split_message(text: &str) -> Vec<String> {
    text.chars()
        .collect::<Vec<char>>()
        .chunks(DISCORD_MESSAGE_LIMIT)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
