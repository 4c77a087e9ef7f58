use super::format_number;
use crate::core::commands::{CommandContext, CommandError, CommandHandler, OutgoingMessage};
use crate::core::gamba::{RouletteOutcome, RouletteService, MAX_BALANCE};
use crate::infra::gamba::SqliteGambaStore;
use async_trait::async_trait;
use std::sync::Arc;

/// `roulette <amount>`: double or nothing.
pub struct RouletteCommand {
    pub roulette: Arc<RouletteService<SqliteGambaStore>>,
}

#[async_trait]
impl CommandHandler for RouletteCommand {
    async fn run(&self, ctx: &CommandContext<'_>) -> Result<Vec<OutgoingMessage>, CommandError> {
        let Some(amount) = ctx.args.integer("amount") else {
            return Ok(vec![ctx.usage()]);
        };

        let user = &ctx.message.user;
        let text = match self.roulette.spin(&ctx.message.user_id, amount).await? {
            RouletteOutcome::InvalidAmount => "You need to bet at least 1 point.".to_string(),
            RouletteOutcome::InsufficientPoints { balance } => format!(
                "You don't have enough points for that (you have {}).",
                format_number(balance)
            ),
            RouletteOutcome::OverLimit { .. } => format!(
                "A win would take you past {} points, so bet less.",
                format_number(MAX_BALANCE)
            ),
            RouletteOutcome::Won { amount, balance } => format!(
                "{} won {} points in roulette and now has {} points!",
                user,
                format_number(amount),
                format_number(balance)
            ),
            RouletteOutcome::Lost { amount, balance } => format!(
                "{} lost {} points in roulette and now has {} points.",
                user,
                format_number(amount),
                format_number(balance)
            ),
        };

        Ok(vec![ctx.reply(text)])
    }
}
