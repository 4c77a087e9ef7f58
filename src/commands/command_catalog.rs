// Chat commands.
//
// Handlers only see `CommandContext` and return replies, so they work on any
// chat platform. `build_catalog` is the single place where names, aliases,
// parameters, permissions and cooldowns are declared.

pub mod admin;
pub mod duel;
pub mod points;
pub mod roulette;

use crate::core::channels::ChannelSettingsService;
use crate::core::chatters::ChatterStore;
use crate::core::commands::{
    CatalogError, Command, CommandCatalog, CommandError, Cooldown, Parameter, ParameterKind,
    PermissionLevel,
};
use crate::core::gamba::{DuelService, LedgerService, Participant, RouletteService};
use crate::infra::channels::JsonChannelSettingsStore;
use crate::infra::gamba::SqliteGambaStore;
use chrono::Duration;
use std::sync::Arc;

/// Services the chat commands depend on.
#[derive(Clone)]
pub struct ChatServices {
    pub ledger: Arc<LedgerService<SqliteGambaStore>>,
    pub roulette: Arc<RouletteService<SqliteGambaStore>>,
    pub duels: Arc<DuelService<SqliteGambaStore>>,
    pub chatters: Arc<dyn ChatterStore>,
    pub channels: Arc<ChannelSettingsService<JsonChannelSettingsStore>>,
}

pub fn build_catalog(services: &ChatServices) -> Result<CommandCatalog, CatalogError> {
    CommandCatalog::new(vec![
        Command::new(
            "points",
            Arc::new(points::PointsCommand {
                ledger: Arc::clone(&services.ledger),
                chatters: Arc::clone(&services.chatters),
            }),
        )
        .alias("balance")
        .alias("pts")
        .param(Parameter::optional("user", ParameterKind::Username))
        .cooldown(Cooldown::per_user(Duration::seconds(3))),
        Command::new(
            "roulette",
            Arc::new(roulette::RouletteCommand {
                roulette: Arc::clone(&services.roulette),
            }),
        )
        .alias("gamble")
        .param(Parameter::required("amount", ParameterKind::Integer))
        .cooldown(Cooldown::per_user(Duration::seconds(5))),
        Command::new(
            "duel",
            Arc::new(duel::DuelCommand {
                duels: Arc::clone(&services.duels),
                chatters: Arc::clone(&services.chatters),
            }),
        )
        .param(Parameter::required("target", ParameterKind::Username))
        .param(Parameter::required("amount", ParameterKind::Integer))
        .cooldown(Cooldown::per_user(Duration::seconds(5))),
        Command::new(
            "accept",
            Arc::new(duel::AcceptCommand {
                duels: Arc::clone(&services.duels),
            }),
        ),
        Command::new(
            "decline",
            Arc::new(duel::DeclineCommand {
                duels: Arc::clone(&services.duels),
            }),
        ),
        Command::new(
            "leaderboard",
            Arc::new(points::LeaderboardCommand {
                ledger: Arc::clone(&services.ledger),
                chatters: Arc::clone(&services.chatters),
            }),
        )
        .alias("top")
        .cooldown(Cooldown::per_channel(Duration::seconds(30))),
        Command::new(
            "givepoints",
            Arc::new(admin::GivePointsCommand {
                ledger: Arc::clone(&services.ledger),
                chatters: Arc::clone(&services.chatters),
            }),
        )
        .param(Parameter::required("user", ParameterKind::Username))
        .param(Parameter::required("amount", ParameterKind::Integer))
        .permission(PermissionLevel::Moderator),
        Command::new(
            "setprefix",
            Arc::new(admin::SetPrefixCommand {
                channels: Arc::clone(&services.channels),
            }),
        )
        .param(Parameter::required("prefix", ParameterKind::String).with_hint("new prefix"))
        .permission(PermissionLevel::Broadcaster),
    ])
}

/// Resolve a chat name to the participant behind it.
async fn find_chatter(
    chatters: &dyn ChatterStore,
    name: &str,
) -> Result<Option<Participant>, CommandError> {
    Ok(chatters
        .find_by_name(name)
        .await?
        .map(|chatter| Participant::new(chatter.user_id, chatter.display_name)))
}

/// Format a number with thousands separators (1234567 -> "1,234,567").
pub fn format_number(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();

    let mut result = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    if n < 0 {
        result.insert(0, '-');
    }
    result
}

/// A delta with an explicit sign: "+10", "-1,000".
fn signed(delta: i64) -> String {
    if delta >= 0 {
        format!("+{}", format_number(delta))
    } else {
        format_number(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commands::{Dispatcher, IncomingMessage, OutgoingMessage};
    use crate::core::gamba::coin_flip::FixedCoinFlip;
    use crate::core::gamba::{CoinFlip, DuelConfig, DuelStore, LedgerStore, NewLedgerEntry};
    use crate::infra::chatters::SqliteChatterStore;
    use crate::infra::commands::InMemoryCooldownStore;
    use crate::infra::sqlite::memory_pool;
    use chrono::{DateTime, Utc};

    struct Harness {
        dispatcher: Dispatcher,
        store: Arc<SqliteGambaStore>,
        chatters: Arc<SqliteChatterStore>,
        _dir: tempfile::TempDir,
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    /// The real catalog over in-memory SQLite. `challenger_wins` fixes every
    /// coin flip, so roulette wins exactly when it is true.
    async fn harness(challenger_wins: bool) -> Harness {
        let pool = memory_pool().await;
        let store = Arc::new(SqliteGambaStore::new(pool.clone()));
        store.migrate().await.unwrap();
        let chatters = Arc::new(SqliteChatterStore::new(pool));
        chatters.migrate().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let channels = JsonChannelSettingsStore::new(dir.path().join("channels.json")).unwrap();

        let coin: Arc<dyn CoinFlip> = Arc::new(FixedCoinFlip(challenger_wins));
        let services = ChatServices {
            ledger: Arc::new(LedgerService::new(Arc::clone(&store))),
            roulette: Arc::new(RouletteService::new(Arc::clone(&store), Arc::clone(&coin))),
            duels: Arc::new(DuelService::new_with_config(
                Arc::clone(&store),
                coin,
                DuelConfig::default(),
            )),
            chatters: chatters.clone(),
            channels: Arc::new(ChannelSettingsService::new(channels, "!")),
        };

        Harness {
            dispatcher: Dispatcher::new(
                build_catalog(&services).unwrap(),
                Arc::new(InMemoryCooldownStore::new()),
            ),
            store,
            chatters,
            _dir: dir,
        }
    }

    impl Harness {
        async fn user(&self, id: &str, name: &str, balance: i64) {
            self.chatters.remember(id, name, at(0)).await.unwrap();
            if balance != 0 {
                self.store
                    .append(NewLedgerEntry {
                        user_id: id.into(),
                        game: "Seed".into(),
                        delta: balance,
                        created_at: at(0),
                    })
                    .await
                    .unwrap();
            }
        }

        async fn say(&self, id: &str, name: &str, text: &str, secs: i64) -> Vec<OutgoingMessage> {
            self.say_as(id, name, text, secs, PermissionLevel::Everyone).await
        }

        async fn say_as(
            &self,
            id: &str,
            name: &str,
            text: &str,
            secs: i64,
            permission: PermissionLevel,
        ) -> Vec<OutgoingMessage> {
            self.dispatcher
                .handle(&IncomingMessage {
                    text: text.into(),
                    channel: "lobby".into(),
                    user: name.into(),
                    user_id: id.into(),
                    timestamp: at(secs),
                    prefix: "!".into(),
                    permission,
                })
                .await
                .unwrap()
        }

        async fn balance(&self, id: &str) -> i64 {
            self.store.balance_of(id).await.unwrap()
        }
    }

    fn texts(replies: Vec<OutgoingMessage>) -> Vec<String> {
        replies.into_iter().map(|reply| reply.text).collect()
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(100), "100");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(-1234567), "-1,234,567");
        assert_eq!(format_number(i64::MIN), "-9,223,372,036,854,775,808");
        assert_eq!(signed(10), "+10");
        assert_eq!(signed(-10), "-10");
    }

    #[tokio::test]
    async fn winning_roulette_adds_the_bet() {
        let h = harness(true).await;
        h.user("1", "alice", 50).await;

        let replies = texts(h.say("1", "alice", "!roulette 10", 0).await);
        assert_eq!(replies, vec!["alice won 10 points in roulette and now has 60 points!"]);
        assert_eq!(h.balance("1").await, 60);

        let entries = h.store.recent_entries("1", 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].delta, 10);
        assert_eq!(entries[0].game, "Roulette");
    }

    #[tokio::test]
    async fn roulette_without_amount_prints_usage() {
        let h = harness(true).await;
        h.user("1", "alice", 50).await;

        assert_eq!(
            texts(h.say("1", "alice", "!gamble lots", 0).await),
            vec!["Usage: !roulette <amount>"]
        );
        assert_eq!(h.balance("1").await, 50);
    }

    #[tokio::test]
    async fn accepted_duel_pays_the_winner() {
        let h = harness(true).await;
        h.user("1", "user1", 50).await;
        h.user("2", "user2", 50).await;

        let proposed = texts(h.say("1", "user1", "!duel @user2 25", 0).await);
        assert!(proposed[0].starts_with("@user2, user1 has challenged you to a duel for 25 points!"));

        let settled = texts(h.say("2", "user2", "!accept", 10).await);
        assert!(settled[0].starts_with("user1 won the duel against user2"));
        assert_eq!(h.balance("1").await, 75);
        assert_eq!(h.balance("2").await, 25);

        let duel = h.store.get(1).await.unwrap().unwrap();
        assert!(!duel.pending);
        assert!(duel.accepted);
    }

    #[tokio::test]
    async fn second_duel_proposal_is_rejected() {
        let h = harness(true).await;
        h.user("1", "user1", 50).await;
        h.user("2", "user2", 50).await;
        h.user("3", "user3", 50).await;

        h.say("1", "user1", "!duel user2 10", 0).await;
        // Past the 5s command cooldown, inside the 30s duel window.
        let replies = texts(h.say("1", "user1", "!duel user3 10", 6).await);
        assert_eq!(replies, vec!["You already have a duel pending."]);

        let replies = texts(h.say("3", "user3", "!duel user2 10", 7).await);
        assert_eq!(replies, vec!["user2 already has a duel pending."]);
    }

    #[tokio::test]
    async fn elapsed_duel_cannot_be_accepted() {
        let h = harness(true).await;
        h.user("1", "user1", 50).await;
        h.user("2", "user2", 50).await;

        h.say("1", "user1", "!duel user2 25", 0).await;
        let replies = texts(h.say("2", "user2", "!accept", 31).await);
        assert_eq!(replies, vec!["You have no duels pending against you."]);
        assert_eq!(h.balance("1").await, 50);
        assert_eq!(h.balance("2").await, 50);
    }

    #[tokio::test]
    async fn duel_rejections_are_explained() {
        let h = harness(true).await;
        h.user("1", "user1", 50).await;
        h.user("2", "user2", 5).await;

        let cases = [
            ("!duel user1 10", "You can't duel yourself.", 0),
            ("!duel user2 0", "You need to duel for at least 1 point.", 10),
            ("!duel user2 100", "You don't have enough points for that (you have 50).", 20),
            ("!duel user2 10", "user2 doesn't have enough points for that duel.", 30),
            ("!duel nobody 10", "I haven't seen nobody in chat yet.", 40),
            ("!duel user2", "Usage: !duel <target> <amount>", 50),
        ];
        for (text, expected, secs) in cases {
            assert_eq!(texts(h.say("1", "user1", text, secs).await), vec![expected]);
        }
        assert_eq!(texts(h.say("1", "user1", "!decline", 60).await), vec![
            "You have no duels pending against you."
        ]);
    }

    #[tokio::test]
    async fn declined_duel_moves_no_points() {
        let h = harness(false).await;
        h.user("1", "user1", 50).await;
        h.user("2", "user2", 50).await;

        h.say("1", "user1", "!duel user2 25", 0).await;
        assert_eq!(
            texts(h.say("1", "user1", "!accept", 1).await),
            vec!["You have no duels pending against you."]
        );
        assert_eq!(
            texts(h.say("2", "user2", "!decline", 2).await),
            vec!["user2 declined the duel from user1."]
        );
        assert_eq!(h.balance("1").await, 50);
        assert_eq!(h.balance("2").await, 50);
    }

    #[tokio::test]
    async fn points_cooldown_is_per_user() {
        let h = harness(true).await;
        h.user("1", "alice", 1500).await;
        h.user("2", "bob", 0).await;

        assert_eq!(
            texts(h.say("1", "alice", "!points", 0).await),
            vec!["You have 1,500 points. Last: +1,500 from Seed."]
        );
        assert!(h.say("1", "alice", "!pts", 2).await.is_empty());
        assert_eq!(
            texts(h.say("2", "bob", "!balance @Alice", 2).await),
            vec!["alice has 1,500 points. Last: +1,500 from Seed."]
        );
        assert_eq!(texts(h.say("2", "bob", "!points", 5).await), vec!["You have 0 points."]);
    }

    #[tokio::test]
    async fn leaderboard_uses_display_names_and_channel_cooldown() {
        let h = harness(true).await;
        assert_eq!(
            texts(h.say("1", "alice", "!top", 0).await),
            vec!["Nobody has any points yet."]
        );

        h.user("1", "alice", 10).await;
        h.user("2", "bob", 2000).await;
        assert!(h.say("2", "bob", "!leaderboard", 10).await.is_empty());

        assert_eq!(
            texts(h.say("2", "bob", "!leaderboard", 30).await),
            vec!["Top points: 1. bob (2,000), 2. alice (10)"]
        );
    }

    #[tokio::test]
    async fn givepoints_needs_moderator() {
        let h = harness(true).await;
        h.user("1", "alice", 0).await;

        assert!(h.say("1", "alice", "!givepoints alice 100", 0).await.is_empty());
        assert_eq!(h.balance("1").await, 0);

        let replies = h
            .say_as("9", "mod", "!givepoints alice 100", 0, PermissionLevel::Moderator)
            .await;
        assert_eq!(texts(replies), vec!["Gave 100 points to alice, who now has 100."]);
        assert_eq!(h.balance("1").await, 100);
    }

    #[tokio::test]
    async fn setprefix_changes_channel_prefix() {
        let h = harness(true).await;

        let replies = h
            .say_as("1", "owner", "!setprefix $", 0, PermissionLevel::Broadcaster)
            .await;
        assert_eq!(texts(replies), vec!["Command prefix is now $"]);

        let replies = h
            .say_as("1", "owner", "!setprefix", 1, PermissionLevel::Broadcaster)
            .await;
        assert_eq!(texts(replies), vec!["Usage: !setprefix <new prefix>"]);

        assert!(h
            .say_as("2", "modnick", "!setprefix #", 2, PermissionLevel::Moderator)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn accept_is_refused_once_the_loser_spent_the_stake() {
        let h = harness(true).await;
        h.user("1", "user1", 50).await;
        h.user("2", "user2", 50).await;

        h.say("1", "user1", "!duel user2 50", 0).await;
        h.user("2", "user2", -50).await;

        assert_eq!(
            texts(h.say("2", "user2", "!accept", 5).await),
            vec!["user2 no longer has enough points for that duel."]
        );
        assert_eq!(h.balance("1").await, 50);
        assert_eq!(h.balance("2").await, 0);
        assert!(!h.store.get(1).await.unwrap().unwrap().accepted);
    }

    #[tokio::test]
    async fn huge_grants_and_bets_stop_at_the_balance_limit() {
        let h = harness(true).await;
        h.user("1", "alice", 0).await;
        let limit_reply = "alice can't hold more than 1,000,000,000,000,000 points.";

        for secs in [0, 1] {
            let text = "!givepoints alice 9223372036854775807";
            let replies = h
                .say_as("9", "mod", text, secs, PermissionLevel::Moderator)
                .await;
            assert_eq!(texts(replies), vec![limit_reply]);
        }
        assert_eq!(texts(h.say("1", "alice", "!points", 2).await), vec!["You have 0 points."]);

        let text = "!givepoints alice 1000000000000000";
        let replies = h
            .say_as("9", "mod", text, 3, PermissionLevel::Moderator)
            .await;
        assert_eq!(
            texts(replies),
            vec!["Gave 1,000,000,000,000,000 points to alice, who now has 1,000,000,000,000,000."]
        );
        assert_eq!(
            texts(h.say("1", "alice", "!roulette 1000000000000000", 4).await),
            vec!["A win would take you past 1,000,000,000,000,000 points, so bet less."]
        );
        assert_eq!(h.balance("1").await, 1_000_000_000_000_000);
    }

    #[tokio::test]
    async fn timed_out_duel_is_announced_before_the_next_proposal() {
        let h = harness(true).await;
        h.user("1", "user1", 50).await;
        h.user("2", "user2", 50).await;
        h.user("3", "user3", 50).await;

        h.say("1", "user1", "!duel user2 10", 0).await;
        let replies = h.say("1", "user1", "!duel user3 10", 45).await;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].text, "user2 didn't answer user1's duel in time.");
        assert_eq!(replies[0].channel, "lobby");
        assert!(replies[1].text.starts_with("@user3, user1 has challenged you"));
    }
}
