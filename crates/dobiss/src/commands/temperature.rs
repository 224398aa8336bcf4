//! Temperature zone handlers.

use tabled::Tabled;

use dobiss_core::{Controller, TempCalendar};

use crate::cli::{GlobalOpts, Switch, TempArgs, TempCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct CalendarRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
}

impl From<&TempCalendar> for CalendarRow {
    fn from(c: &TempCalendar) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
        }
    }
}

pub async fn handle(args: TempArgs, controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        TempCommand::Set { id, temperature } => {
            let id = util::resolve_entity(controller, &id).await?;
            controller.set_temperature(&id, temperature).await?;
            output::print_output(&format!("{id} set to {temperature}°C"), global.quiet);
        }

        TempCommand::Timer {
            id,
            temperature,
            minutes,
        } => {
            let id = util::resolve_entity(controller, &id).await?;
            controller.set_temp_timer(&id, temperature, minutes).await?;
            let until = match minutes {
                dobiss_core::INDEFINITE_MINUTES => "indefinitely".to_string(),
                dobiss_core::CALENDAR_MINUTES => "until the calendar takes over".to_string(),
                m => format!("for {m} min"),
            };
            output::print_output(&format!("{id} held at {temperature}°C {until}"), global.quiet);
        }

        TempCommand::Preset { id, calendar } => {
            let id = util::resolve_entity(controller, &id).await?;
            controller.set_preset(&id, &calendar).await?;
            output::print_output(&format!("{id} follows calendar '{calendar}'"), global.quiet);
        }

        TempCommand::Manual { id, state } => {
            let id = util::resolve_entity(controller, &id).await?;
            // Manual-on reuses the last requested target, so read it first.
            controller.update_entity(&id).await?;
            let enabled = state == Switch::On;
            controller.set_manual_mode(&id, enabled).await?;
            let mode = if enabled { "manual" } else { "calendar" };
            output::print_output(&format!("{id} in {mode} mode"), global.quiet);
        }

        TempCommand::Calendars => {
            controller.discover().await?;
            let calendars = controller.calendars();
            let out = output::render_list(global.output, &calendars, |c| CalendarRow::from(c), |c| {
                format!("{}\t{}", c.id, c.name)
            });
            output::print_output(&out, global.quiet);
        }
    }
    Ok(())
}
