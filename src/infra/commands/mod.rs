// Cooldown record storage.
//
// In-memory by default. The SQLite store keeps windows across restarts.

mod in_memory_cooldowns;
mod sqlite_cooldowns;

pub use in_memory_cooldowns::InMemoryCooldownStore;
pub use sqlite_cooldowns::SqliteCooldownStore;
