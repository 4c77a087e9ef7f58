// Command framework - argument grammar, catalog, cooldowns and dispatch.

pub mod arguments;
pub mod catalog;
pub mod command_models;
pub mod cooldown;
pub mod dispatcher;

pub use arguments::{ArgValue, Arguments, Parameter, ParameterKind, ParsedArgument};
pub use catalog::{CatalogError, CommandCatalog};
pub use command_models::{
    Command, CommandContext, CommandError, CommandHandler, Cooldown, CooldownKey, IncomingMessage,
    OutgoingMessage, PermissionLevel,
};
pub use cooldown::{CooldownClaim, CooldownError, CooldownStore};
pub use dispatcher::{DispatchError, Dispatcher};
