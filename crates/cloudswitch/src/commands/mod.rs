//! Command handlers, one module per top-level subcommand.

pub mod auth;
pub mod config_cmd;
pub mod devices;
pub mod listen;
pub mod switches;
pub mod util;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn dispatch(cli: Cli) -> Result<(), CliError> {
    tracing::debug!(command = ?cli.command, "dispatching command");

    match cli.command {
        Command::Login(args) => auth::login(args, &cli.global).await,
        Command::Logout => auth::logout(&cli.global),
        Command::Devices(args) => devices::handle(args, &cli.global).await,
        Command::Switches(args) => switches::handle(args, &cli.global),
        Command::Toggle(args) => switches::toggle(args, &cli.global).await,
        Command::Listen(args) => listen::handle(args, &cli.global).await,
        Command::Config(args) => config_cmd::handle(&args, &cli.global),
    }
}
