//! On / off / toggle handlers.

use dobiss_core::{Controller, ObjectId, TurnOff, TurnOn};

use crate::cli::{GlobalOpts, IdArg, OffArgs, OnArgs};
use crate::error::CliError;
use crate::output;

use super::util;

fn confirm(controller: &Controller, id: &ObjectId, verb: &str, global: &GlobalOpts) {
    let name = controller
        .entity(id)
        .map(|e| e.name())
        .unwrap_or_default();
    output::print_output(&format!("{verb} {id} ({name})"), global.quiet);
}

pub async fn on(args: OnArgs, controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let id = util::resolve_entity(controller, &args.id).await?;
    let params = TurnOn {
        brightness: args.brightness,
        delay_on: util::seconds(args.delay_on),
        delay_off: util::seconds(args.delay_off),
    };
    controller.turn_on(&id, params).await?;
    confirm(controller, &id, "switched on", global);
    Ok(())
}

pub async fn off(args: OffArgs, controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let id = util::resolve_entity(controller, &args.id).await?;
    let params = TurnOff {
        delay_on: util::seconds(args.delay_on),
        delay_off: util::seconds(args.delay_off),
    };
    controller.turn_off(&id, params).await?;
    confirm(controller, &id, "switched off", global);
    Ok(())
}

/// Toggle decides from the last known state, so refresh it first.
pub async fn toggle(args: IdArg, controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let id = util::resolve_entity(controller, &args.id).await?;
    controller.update_entity(&id).await?;
    controller.toggle(&id).await?;
    confirm(controller, &id, "toggled", global);
    Ok(())
}
