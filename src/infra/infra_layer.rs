// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "channels/json_store.rs"]
pub mod channels;

#[path = "chatters/sqlite_chatter_store.rs"]
pub mod chatters;

#[path = "commands/mod.rs"]
pub mod commands;

#[path = "gamba/mod.rs"]
pub mod gamba;

pub mod sqlite;
