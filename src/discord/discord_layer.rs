// Discord layer - gateway events in, chat replies out.

#[path = "chat/chat_bridge.rs"]
pub mod chat;

pub use chat::{Data, Error};
