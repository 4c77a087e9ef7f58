// Duel commands: `duel <target> <amount>`, `accept`, `decline`.

use super::{find_chatter, format_number};
use crate::core::chatters::ChatterStore;
use crate::core::commands::{CommandContext, CommandError, CommandHandler, OutgoingMessage};
use crate::core::gamba::{
    AcceptOutcome, DeclineOutcome, Duel, DuelService, Participant, ProposeOutcome, MAX_BALANCE,
};
use crate::infra::gamba::SqliteGambaStore;
use async_trait::async_trait;
use std::sync::Arc;

const NONE_PENDING: &str = "You have no duels pending against you.";

fn caller(ctx: &CommandContext<'_>) -> Participant {
    Participant::new(ctx.message.user_id.clone(), ctx.message.user.clone())
}

/// Posted to the duel's own channel once its window has run out.
pub fn expiry_notice(duel: &Duel) -> OutgoingMessage {
    OutgoingMessage {
        channel: duel.channel.clone(),
        text: format!(
            "{} didn't answer {}'s duel in time.",
            duel.target_name, duel.challenger_name
        ),
    }
}

pub struct DuelCommand {
    pub duels: Arc<DuelService<SqliteGambaStore>>,
    pub chatters: Arc<dyn ChatterStore>,
}

#[async_trait]
impl CommandHandler for DuelCommand {
    async fn run(&self, ctx: &CommandContext<'_>) -> Result<Vec<OutgoingMessage>, CommandError> {
        let (Some(name), Some(amount)) = (ctx.args.text("target"), ctx.args.integer("amount"))
        else {
            return Ok(vec![ctx.usage()]);
        };

        let Some(target) = find_chatter(self.chatters.as_ref(), name).await? else {
            return Ok(vec![ctx.reply(format!("I haven't seen {} in chat yet.", name))]);
        };

        // Sweep here so timed-out duels get their notice before the reply.
        let mut replies: Vec<OutgoingMessage> = self
            .duels
            .expire_stale(ctx.message.timestamp)
            .await?
            .iter()
            .map(expiry_notice)
            .collect();

        let challenger = caller(ctx);
        let outcome = self
            .duels
            .propose(
                &ctx.message.channel,
                &challenger,
                &target,
                amount,
                ctx.message.timestamp,
            )
            .await?;

        let text = match outcome {
            ProposeOutcome::Proposed(duel) => format!(
                "@{}, {} has challenged you to a duel for {} points! Type {}accept or {}decline within {} seconds.",
                duel.target_name,
                duel.challenger_name,
                format_number(duel.amount),
                ctx.message.prefix,
                ctx.message.prefix,
                self.duels.acceptance_window().num_seconds()
            ),
            ProposeOutcome::SelfDuel => "You can't duel yourself.".to_string(),
            ProposeOutcome::InvalidAmount => "You need to duel for at least 1 point.".to_string(),
            ProposeOutcome::ChallengerPending => "You already have a duel pending.".to_string(),
            ProposeOutcome::TargetPending => format!("{} already has a duel pending.", target.name),
            ProposeOutcome::ChallengerInsufficient { balance } => format!(
                "You don't have enough points for that (you have {}).",
                format_number(balance)
            ),
            ProposeOutcome::TargetInsufficient { .. } => {
                format!("{} doesn't have enough points for that duel.", target.name)
            }
        };

        replies.push(ctx.reply(text));
        Ok(replies)
    }
}

pub struct AcceptCommand {
    pub duels: Arc<DuelService<SqliteGambaStore>>,
}

#[async_trait]
impl CommandHandler for AcceptCommand {
    async fn run(&self, ctx: &CommandContext<'_>) -> Result<Vec<OutgoingMessage>, CommandError> {
        let text = match self.duels.accept(&caller(ctx), ctx.message.timestamp).await? {
            AcceptOutcome::NonePending => NONE_PENDING.to_string(),
            AcceptOutcome::Settled(settlement) => format!(
                "{} won the duel against {} and takes {} points! ({} now has {}, {} has {})",
                settlement.winner.name,
                settlement.loser.name,
                format_number(settlement.amount),
                settlement.winner.name,
                format_number(settlement.winner_balance),
                settlement.loser.name,
                format_number(settlement.loser_balance)
            ),
            AcceptOutcome::NoLongerCovered { short, .. } => {
                format!("{} no longer has enough points for that duel.", short.name)
            }
            AcceptOutcome::OverLimit { capped, .. } => format!(
                "{} can't hold more than {} points, so the duel is off.",
                capped.name,
                format_number(MAX_BALANCE)
            ),
        };

        Ok(vec![ctx.reply(text)])
    }
}

pub struct DeclineCommand {
    pub duels: Arc<DuelService<SqliteGambaStore>>,
}

#[async_trait]
impl CommandHandler for DeclineCommand {
    async fn run(&self, ctx: &CommandContext<'_>) -> Result<Vec<OutgoingMessage>, CommandError> {
        let text = match self.duels.decline(&caller(ctx), ctx.message.timestamp).await? {
            DeclineOutcome::NonePending => NONE_PENDING.to_string(),
            DeclineOutcome::Declined(duel) => format!(
                "{} declined the duel from {}.",
                duel.target_name, duel.challenger_name
            ),
        };

        Ok(vec![ctx.reply(text)])
    }
}
