// Domain models for chat commands.
//
// Nothing in here knows about a specific chat platform. The platform adapter
// fills in an `IncomingMessage` (including the caller's permission level) and
// ships the returned `OutgoingMessage`s.

use super::arguments::{Arguments, Parameter};
use crate::core::channels::ChannelSettingsError;
use crate::core::chatters::ChatterError;
use crate::core::gamba::GambaError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// MESSAGES
// ============================================================================

/// Ordinal permission tiers. Higher tiers include everything below them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum PermissionLevel {
    #[default]
    Everyone,
    Subscriber,
    #[allow(dead_code)] // Discord has no VIP role to map from
    Vip,
    Moderator,
    Broadcaster,
    Admin,
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PermissionLevel::Everyone => "everyone",
            PermissionLevel::Subscriber => "subscriber",
            PermissionLevel::Vip => "vip",
            PermissionLevel::Moderator => "moderator",
            PermissionLevel::Broadcaster => "broadcaster",
            PermissionLevel::Admin => "admin",
        };
        f.write_str(name)
    }
}

/// A chat message as handed over by the platform adapter.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub text: String,
    pub channel: String,
    /// Display name of the author.
    pub user: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    /// Command prefix configured for `channel`.
    pub prefix: String,
    pub permission: PermissionLevel,
}

impl IncomingMessage {
    /// A reply to the channel this message came from.
    pub fn reply(&self, text: impl Into<String>) -> OutgoingMessage {
        OutgoingMessage {
            channel: self.channel.clone(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub channel: String,
    pub text: String,
}

// ============================================================================
// COOLDOWNS
// ============================================================================

/// Whose invocations share a cooldown window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CooldownKind {
    /// One window per channel, shared by everyone in it.
    Channel,
    /// One window per user, across all channels.
    User,
}

impl CooldownKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CooldownKind::Channel => "channel",
            CooldownKind::User => "user",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldown {
    pub kind: CooldownKind,
    pub window: Duration,
}

impl Cooldown {
    pub fn per_channel(window: Duration) -> Self {
        Self {
            kind: CooldownKind::Channel,
            window,
        }
    }

    pub fn per_user(window: Duration) -> Self {
        Self {
            kind: CooldownKind::User,
            window,
        }
    }

    /// The record this cooldown guards for a given invocation.
    pub fn key_for(&self, command: &str, message: &IncomingMessage) -> CooldownKey {
        let subject = match self.kind {
            CooldownKind::Channel => message.channel.clone(),
            CooldownKind::User => message.user_id.clone(),
        };
        CooldownKey {
            kind: self.kind,
            command: command.to_string(),
            subject,
        }
    }
}

/// Identifies one cooldown record: (kind, command, channel-or-user).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CooldownKey {
    pub kind: CooldownKind,
    pub command: String,
    pub subject: String,
}

// ============================================================================
// ERRORS
// ============================================================================

/// Infrastructure failures raised by command handlers.
///
/// Usage mistakes and business-rule rejections are replies, not errors.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Gamba(#[from] GambaError),

    #[error(transparent)]
    Chatters(#[from] ChatterError),

    #[error(transparent)]
    ChannelSettings(#[from] ChannelSettingsError),
}

// ============================================================================
// COMMANDS
// ============================================================================

/// Everything a handler gets to see about one invocation.
pub struct CommandContext<'a> {
    pub message: &'a IncomingMessage,
    pub args: Arguments,
    pub command: &'a Command,
}

impl CommandContext<'_> {
    pub fn reply(&self, text: impl Into<String>) -> OutgoingMessage {
        self.message.reply(text)
    }

    /// "Usage: !duel <user> <amount>"
    pub fn usage(&self) -> OutgoingMessage {
        self.reply(format!(
            "Usage: {}{}",
            self.message.prefix,
            self.command.usage()
        ))
    }
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn run(&self, ctx: &CommandContext<'_>) -> Result<Vec<OutgoingMessage>, CommandError>;
}

/// A registered command. Built once at start-up and shared read-only.
pub struct Command {
    pub name: &'static str,
    pub aliases: Vec<&'static str>,
    pub parameters: Vec<Parameter>,
    pub required_permission: PermissionLevel,
    pub cooldown: Option<Cooldown>,
    /// When false the command also matches without the channel prefix.
    pub prefix_only: bool,
    pub handler: Arc<dyn CommandHandler>,
}

impl Command {
    pub fn new(name: &'static str, handler: Arc<dyn CommandHandler>) -> Self {
        Self {
            name,
            aliases: Vec::new(),
            parameters: Vec::new(),
            required_permission: PermissionLevel::Everyone,
            cooldown: None,
            prefix_only: true,
            handler,
        }
    }

    pub fn alias(mut self, alias: &'static str) -> Self {
        self.aliases.push(alias);
        self
    }

    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn permission(mut self, level: PermissionLevel) -> Self {
        self.required_permission = level;
        self
    }

    pub fn cooldown(mut self, cooldown: Cooldown) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    /// Answer to the bare name too, prefix or not.
    #[allow(dead_code)] // Every shipped command wants its prefix
    pub fn without_prefix(mut self) -> Self {
        self.prefix_only = false;
        self
    }

    /// Every name this command answers to.
    pub fn invocations(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.name).chain(self.aliases.iter().copied())
    }

    pub fn answers_to(&self, token: &str) -> bool {
        self.invocations()
            .any(|name| name.eq_ignore_ascii_case(token))
    }

    pub fn usage(&self) -> String {
        self.parameters
            .iter()
            .fold(self.name.to_string(), |mut line, parameter| {
                line.push(' ');
                line.push_str(&parameter.usage());
                line
            })
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("parameters", &self.parameters)
            .field("required_permission", &self.required_permission)
            .field("cooldown", &self.cooldown)
            .field("prefix_only", &self.prefix_only)
            .finish_non_exhaustive()
    }
}
