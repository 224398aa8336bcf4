//! Discover and status command handlers.

use std::fmt::Write;

use tabled::Tabled;

use dobiss_core::{Controller, EntityKind, EntitySnapshot};

use crate::cli::{DiscoverArgs, GlobalOpts, StatusArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct EntityRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Dim")]
    dimmable: String,
    #[tabled(rename = "Paired")]
    buddy: String,
}

impl From<&EntitySnapshot> for EntityRow {
    fn from(e: &EntitySnapshot) -> Self {
        Self {
            id: e.object_id.to_string(),
            name: e.name.clone(),
            group: e.group.clone(),
            kind: e.kind.to_string(),
            dimmable: if e.dimmable { "yes".into() } else { String::new() },
            buddy: e.buddy.as_ref().map(ToString::to_string).unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Value")]
    value: String,
}

pub fn format_value(e: &EntitySnapshot) -> String {
    let Some(value) = e.value else {
        return "-".into();
    };
    let mut out = format!("{value}{}", e.unit.unwrap_or_default());
    if let Some(ref temperature) = e.temperature {
        if let Some(asked) = temperature.asked_temperature {
            let _ = write!(out, " → {asked}°C");
        }
    }
    out
}

fn status_row(e: &EntitySnapshot, color: bool) -> StatusRow {
    let state = match e.kind {
        EntityKind::TemperatureZone | EntityKind::LightSensor => String::new(),
        _ => output::state_label(e.is_on, color),
    };
    StatusRow {
        id: e.object_id.to_string(),
        name: e.name.clone(),
        kind: e.kind.to_string(),
        state,
        value: format_value(e),
    }
}

pub fn status_line(e: &EntitySnapshot) -> String {
    format!("{}\t{}\t{}", e.object_id, e.name, format_value(e))
}

fn snapshots(controller: &Controller, kind: Option<EntityKind>) -> Vec<EntitySnapshot> {
    let entities = match kind {
        Some(kind) => controller.entities_by_kind(kind),
        None => controller.entities(),
    };
    entities.iter().map(|e| e.snapshot()).collect()
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn discover(
    args: DiscoverArgs,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    controller.discover().await?;
    let data = snapshots(controller, args.kind);
    let out = output::render_list(global.output, &data, |e| EntityRow::from(e), |e| {
        e.object_id.to_string()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn status(
    args: StatusArgs,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    controller.discover().await?;

    let data = if args.ids.is_empty() {
        let report = controller.refresh_all().await?;
        if report.failed > 0 {
            tracing::warn!(failed = report.failed, "some entities reported unreadable status");
        }
        snapshots(controller, args.kind)
    } else {
        let mut data = Vec::with_capacity(args.ids.len());
        for raw in &args.ids {
            let id = util::parse_object_id(raw)?;
            controller.update_entity(&id).await?;
            if let Some(entity) = controller.entity(&id) {
                if args.kind.is_none_or(|k| k == entity.kind()) {
                    data.push(entity.snapshot());
                }
            }
        }
        data
    };

    let color = output::should_color(global.color);
    let out = output::render_list(global.output, &data, |e| status_row(e, color), status_line);
    output::print_output(&out, global.quiet);
    Ok(())
}
