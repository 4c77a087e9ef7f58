// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "channels/channel_settings.rs"]
pub mod channels;

#[path = "chatters/chatter_store.rs"]
pub mod chatters;

pub mod commands;

pub mod gamba;
