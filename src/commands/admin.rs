// Moderator and broadcaster commands.

use super::{find_chatter, format_number};
use crate::core::channels::{ChannelSettingsService, PrefixChange, MAX_PREFIX_LEN};
use crate::core::chatters::ChatterStore;
use crate::core::commands::{CommandContext, CommandError, CommandHandler, OutgoingMessage};
use crate::core::gamba::{credited, LedgerService, MAX_BALANCE};
use crate::infra::channels::JsonChannelSettingsStore;
use crate::infra::gamba::SqliteGambaStore;
use async_trait::async_trait;
use std::sync::Arc;

pub const GIVE_POINTS_GAME: &str = "GivePoints";

/// `givepoints <user> <amount>`: mint points out of thin air.
pub struct GivePointsCommand {
    pub ledger: Arc<LedgerService<SqliteGambaStore>>,
    pub chatters: Arc<dyn ChatterStore>,
}

#[async_trait]
impl CommandHandler for GivePointsCommand {
    async fn run(&self, ctx: &CommandContext<'_>) -> Result<Vec<OutgoingMessage>, CommandError> {
        let (Some(name), Some(amount)) = (ctx.args.text("user"), ctx.args.integer("amount")) else {
            return Ok(vec![ctx.usage()]);
        };
        if amount < 1 {
            return Ok(vec![ctx.reply("You need to give at least 1 point.")]);
        }

        let Some(recipient) = find_chatter(self.chatters.as_ref(), name).await? else {
            return Ok(vec![ctx.reply(format!("I haven't seen {} in chat yet.", name))]);
        };

        let current = self.ledger.balance_of(&recipient.id).await?;
        let Some(balance) = credited(current, amount) else {
            return Ok(vec![ctx.reply(format!(
                "{} can't hold more than {} points.",
                recipient.name,
                format_number(MAX_BALANCE)
            ))]);
        };

        self.ledger
            .record_transaction(&recipient.id, GIVE_POINTS_GAME, amount)
            .await?;

        tracing::info!(
            giver_id = %ctx.message.user_id,
            recipient_id = %recipient.id,
            amount,
            "Points given"
        );

        Ok(vec![ctx.reply(format!(
            "Gave {} points to {}, who now has {}.",
            format_number(amount),
            recipient.name,
            format_number(balance)
        ))])
    }
}

/// `setprefix <prefix>` for the current channel.
pub struct SetPrefixCommand {
    pub channels: Arc<ChannelSettingsService<JsonChannelSettingsStore>>,
}

#[async_trait]
impl CommandHandler for SetPrefixCommand {
    async fn run(&self, ctx: &CommandContext<'_>) -> Result<Vec<OutgoingMessage>, CommandError> {
        let Some(prefix) = ctx.args.text("prefix") else {
            return Ok(vec![ctx.usage()]);
        };

        let text = match self.channels.set_prefix(&ctx.message.channel, prefix).await? {
            PrefixChange::Changed(prefix) => format!("Command prefix is now {}", prefix),
            PrefixChange::Invalid => format!(
                "A prefix needs 1 to {} characters and no spaces.",
                MAX_PREFIX_LEN
            ),
        };

        Ok(vec![ctx.reply(text)])
    }
}
