use super::arguments::ParameterKind;
use super::command_models::Command;
use std::collections::HashMap;
use thiserror::Error;

/// Mistakes in the static command definitions, caught at start-up.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("command `{command}` has an empty name or alias")]
    EmptyName { command: String },

    #[error("`{invocation}` is registered by both `{first}` and `{second}`")]
    DuplicateInvocation {
        invocation: String,
        first: String,
        second: String,
    },

    #[error("command `{command}` declares a variadic parameter that is not last")]
    VariadicNotLast { command: String },

    #[error("command `{command}` declares more than one optional parameter")]
    MultipleOptional { command: String },
}

/// A message that resolved to a command.
#[derive(Debug)]
pub struct Invocation<'c, 't> {
    pub command: &'c Command,
    /// Text after the invocation token, leading whitespace removed.
    pub rest: &'t str,
}

/// The validated, read-only set of registered commands.
#[derive(Debug)]
pub struct CommandCatalog {
    commands: Vec<Command>,
}

impl CommandCatalog {
    pub fn new(commands: Vec<Command>) -> Result<Self, CatalogError> {
        let mut owners: HashMap<String, &'static str> = HashMap::new();

        for command in &commands {
            validate_parameters(command)?;

            for invocation in command.invocations() {
                if invocation.trim().is_empty() || invocation.contains(char::is_whitespace) {
                    return Err(CatalogError::EmptyName {
                        command: command.name.to_string(),
                    });
                }

                let normalized = invocation.to_lowercase();
                if let Some(first) = owners.insert(normalized.clone(), command.name) {
                    return Err(CatalogError::DuplicateInvocation {
                        invocation: normalized,
                        first: first.to_string(),
                        second: command.name.to_string(),
                    });
                }
            }
        }

        Ok(Self { commands })
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Find the command `text` invokes, in registration order.
    ///
    /// A leading `prefix` is stripped when present. Prefix-only commands only
    /// match when it was. An empty prefix counts as always present.
    pub fn resolve<'c, 't>(&'c self, text: &'t str, prefix: &str) -> Option<Invocation<'c, 't>> {
        let trimmed = text.trim_start();
        let (body, prefixed) = match trimmed.strip_prefix(prefix) {
            Some(stripped) => (stripped, true),
            None => (trimmed, false),
        };

        let token_end = body.find(char::is_whitespace).unwrap_or(body.len());
        let (token, rest) = body.split_at(token_end);
        if token.is_empty() {
            return None;
        }

        self.commands
            .iter()
            .filter(|command| prefixed || !command.prefix_only)
            .find(|command| command.answers_to(token))
            .map(|command| Invocation {
                command,
                rest: rest.trim_start(),
            })
    }
}

fn validate_parameters(command: &Command) -> Result<(), CatalogError> {
    let last = command.parameters.len().saturating_sub(1);

    let variadic_misplaced = command
        .parameters
        .iter()
        .enumerate()
        .any(|(i, p)| p.kind == ParameterKind::Variadic && i != last);
    if variadic_misplaced {
        return Err(CatalogError::VariadicNotLast {
            command: command.name.to_string(),
        });
    }

    let optional_count = command.parameters.iter().filter(|p| !p.required).count();
    if optional_count > 1 {
        return Err(CatalogError::MultipleOptional {
            command: command.name.to_string(),
        });
    }

    Ok(())
}
