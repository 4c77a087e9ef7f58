// Maps a Discord author onto the platform-neutral permission tiers.

use crate::core::commands::PermissionLevel;

/// What we know about a message author, pulled out of serenity types.
#[derive(Debug, Clone, Default)]
pub struct AuthorFacts {
    pub user_id: u64,
    pub is_guild_owner: bool,
    pub role_ids: Vec<u64>,
    pub is_booster: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PermissionRules {
    pub admin_user_ids: Vec<u64>,
    pub moderator_role_ids: Vec<u64>,
}

impl PermissionRules {
    /// The highest tier `author` qualifies for.
    pub fn resolve(&self, author: &AuthorFacts) -> PermissionLevel {
        if self.admin_user_ids.contains(&author.user_id) {
            PermissionLevel::Admin
        } else if author.is_guild_owner {
            PermissionLevel::Broadcaster
        } else if author
            .role_ids
            .iter()
            .any(|role| self.moderator_role_ids.contains(role))
        {
            PermissionLevel::Moderator
        } else if author.is_booster {
            PermissionLevel::Subscriber
        } else {
            PermissionLevel::Everyone
        }
    }
}
