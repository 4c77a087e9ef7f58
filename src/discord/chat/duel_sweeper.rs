use crate::commands::duel::expiry_notice;
use crate::core::gamba::DuelService;
use crate::infra::gamba::SqliteGambaStore;
use chrono::Utc;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Duration as StdDuration;

/// Expire unanswered duels every `period` and tell their channel about it.
pub async fn run(
    http: Arc<serenity::Http>,
    duels: Arc<DuelService<SqliteGambaStore>>,
    period: StdDuration,
) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;

        let expired = match duels.expire_stale(Utc::now()).await {
            Ok(expired) => expired,
            Err(err) => {
                tracing::warn!("Duel sweep failed: {}", err);
                continue;
            }
        };

        super::send_replies(&http, expired.iter().map(expiry_notice).collect()).await;
    }
}
