//! Command dispatch.

pub mod actions;
pub mod config_cmd;
pub mod entities;
pub mod temperature;
pub mod util;
pub mod watch;

use dobiss_core::Controller;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub async fn dispatch(cmd: Command, controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Discover(args) => entities::discover(args, controller, global).await,
        Command::Status(args) => entities::status(args, controller, global).await,
        Command::On(args) => actions::on(args, controller, global).await,
        Command::Off(args) => actions::off(args, controller, global).await,
        Command::Toggle(args) => actions::toggle(args, controller, global).await,
        Command::Temp(args) => temperature::handle(args, controller, global).await,
        Command::Watch(args) => watch::handle(args, controller, global).await,
        Command::AuthCheck => {
            if controller.auth_check().await {
                output::print_output("authenticated", global.quiet);
                Ok(())
            } else {
                Err(CliError::AuthFailed {
                    profile: global.profile.clone().unwrap_or_else(|| "current".into()),
                })
            }
        }
        Command::Config(args) => config_cmd::handle(args, global),
    }
}
