// Balance lookups: `points [user]` and `leaderboard`.

use super::{find_chatter, format_number, signed};
use crate::core::chatters::ChatterStore;
use crate::core::commands::{CommandContext, CommandError, CommandHandler, OutgoingMessage};
use crate::core::gamba::LedgerService;
use crate::infra::gamba::SqliteGambaStore;
use async_trait::async_trait;
use std::sync::Arc;

const LEADERBOARD_SIZE: usize = 5;

pub struct PointsCommand {
    pub ledger: Arc<LedgerService<SqliteGambaStore>>,
    pub chatters: Arc<dyn ChatterStore>,
}

#[async_trait]
impl CommandHandler for PointsCommand {
    async fn run(&self, ctx: &CommandContext<'_>) -> Result<Vec<OutgoingMessage>, CommandError> {
        let (user_id, subject) = match ctx.args.text("user") {
            Some(name) => match find_chatter(self.chatters.as_ref(), name).await? {
                Some(chatter) => (chatter.id, format!("{} has", chatter.name)),
                None => {
                    return Ok(vec![
                        ctx.reply(format!("I haven't seen {} in chat yet.", name))
                    ])
                }
            },
            None => (ctx.message.user_id.clone(), "You have".to_string()),
        };

        let balance = self.ledger.balance_of(&user_id).await?;
        let mut text = format!("{} {} points.", subject, format_number(balance));

        if let Some(last) = self.ledger.recent_entries(&user_id, 1).await?.first() {
            text.push_str(&format!(" Last: {} from {}.", signed(last.delta), last.game));
        }

        Ok(vec![ctx.reply(text)])
    }
}

pub struct LeaderboardCommand {
    pub ledger: Arc<LedgerService<SqliteGambaStore>>,
    pub chatters: Arc<dyn ChatterStore>,
}

#[async_trait]
impl CommandHandler for LeaderboardCommand {
    async fn run(&self, ctx: &CommandContext<'_>) -> Result<Vec<OutgoingMessage>, CommandError> {
        let rows = self.ledger.leaderboard(LEADERBOARD_SIZE).await?;
        if rows.is_empty() {
            return Ok(vec![ctx.reply("Nobody has any points yet.")]);
        }

        let mut places = Vec::with_capacity(rows.len());
        for (rank, row) in rows.iter().enumerate() {
            let name = self
                .chatters
                .find_by_id(&row.user_id)
                .await?
                .map(|chatter| chatter.display_name)
                .unwrap_or_else(|| row.user_id.clone());
            places.push(format!("{}. {} ({})", rank + 1, name, format_number(row.balance)));
        }

        Ok(vec![ctx.reply(format!("Top points: {}", places.join(", ")))])
    }
}
