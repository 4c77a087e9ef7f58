// The dispatcher routes one chat message to at most one command handler.
//
// Pipeline: resolve -> permission -> cooldown -> parse -> run.
// Every gate that fails ends the pipeline quietly with no output, so chat
// stays clean and users can't probe for commands above their level.

use super::arguments::parse_all;
use super::catalog::CommandCatalog;
use super::command_models::{CommandContext, CommandError, IncomingMessage, OutgoingMessage};
use super::cooldown::{CooldownError, CooldownStore};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Cooldown store error: {0}")]
    Cooldown(#[from] CooldownError),

    #[error("Command `{command}` failed: {source}")]
    Handler {
        command: String,
        #[source]
        source: CommandError,
    },
}

pub struct Dispatcher {
    catalog: CommandCatalog,
    cooldowns: Arc<dyn CooldownStore>,
}

impl Dispatcher {
    pub fn new(catalog: CommandCatalog, cooldowns: Arc<dyn CooldownStore>) -> Self {
        Self { catalog, cooldowns }
    }

    /// Handle one incoming chat message.
    ///
    /// Returns the replies to send. An empty list is the normal result for
    /// ordinary chat, missing permissions and active cooldowns. Only
    /// infrastructure failures come back as `Err`.
    ///
    /// A cooldown window is claimed before the handler runs and released
    /// again if the handler fails, so only successful runs consume it.
    pub async fn handle(
        &self,
        message: &IncomingMessage,
    ) -> Result<Vec<OutgoingMessage>, DispatchError> {
        let Some(invocation) = self.catalog.resolve(&message.text, &message.prefix) else {
            return Ok(Vec::new());
        };
        let command = invocation.command;

        if message.permission < command.required_permission {
            debug!(
                command = command.name,
                user_id = %message.user_id,
                level = %message.permission,
                required = %command.required_permission,
                "Permission too low, ignoring"
            );
            return Ok(Vec::new());
        }

        let claim = match &command.cooldown {
            Some(cooldown) => {
                let key = cooldown.key_for(command.name, message);
                let claimed = self
                    .cooldowns
                    .try_claim(&key, message.timestamp, cooldown.window)
                    .await?;
                match claimed {
                    Some(claim) => Some((key, claim)),
                    None => {
                        debug!(
                            command = command.name,
                            scope = cooldown.kind.as_str(),
                            subject = %key.subject,
                            "Cooldown active, ignoring"
                        );
                        return Ok(Vec::new());
                    }
                }
            }
            None => None,
        };

        let ctx = CommandContext {
            message,
            args: parse_all(&command.parameters, invocation.rest),
            command,
        };

        info!(
            command = command.name,
            user_id = %message.user_id,
            channel = %message.channel,
            "Running command"
        );

        match command.handler.run(&ctx).await {
            Ok(replies) => Ok(replies),
            Err(source) => {
                if let Some((key, claim)) = claim {
                    if let Err(err) = self.cooldowns.release(&key, claim).await {
                        warn!(command = command.name, "Failed to release cooldown: {}", err);
                    }
                }
                Err(DispatchError::Handler {
                    command: command.name.to_string(),
                    source,
                })
            }
        }
    }
}
