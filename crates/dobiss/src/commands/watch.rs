//! Live status following.

use std::collections::HashSet;

use tokio::sync::mpsc;

use dobiss_core::{Controller, Entity, EntityKind, EntitySnapshot, ObjectId};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::entities::format_value;

/// Register a forwarding observer on every entity not yet watched.
fn subscribe_new(
    controller: &Controller,
    kind: Option<EntityKind>,
    tx: &mpsc::UnboundedSender<EntitySnapshot>,
    watched: &mut HashSet<ObjectId>,
) {
    for entity in controller.entities() {
        if kind.is_some_and(|k| k != entity.kind()) || !watched.insert(entity.object_id().clone()) {
            continue;
        }
        let tx = tx.clone();
        entity.register_observer(move |e: &Entity| {
            let _ = tx.send(e.snapshot());
        });
    }
}

fn event_line(snapshot: &EntitySnapshot, format: OutputFormat, color: bool) -> String {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(snapshot, true),
        OutputFormat::Table | OutputFormat::Plain => format!(
            "{}  {}  {}  {}  {}",
            chrono::Local::now().format("%H:%M:%S"),
            snapshot.object_id,
            snapshot.name,
            output::state_label(snapshot.is_on, color),
            format_value(snapshot),
        ),
    }
}

pub async fn handle(args: WatchArgs, controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    controller.discover().await?;
    controller.refresh_all().await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watched = HashSet::new();
    subscribe_new(controller, args.kind, &tx, &mut watched);
    if !global.quiet {
        eprintln!("watching {} entities, Ctrl-C to stop", watched.len());
    }

    let color = output::should_color(global.color);
    let mut states = controller.subscribe_listener_state();
    let mut rediscover = tokio::time::interval(controller.discovery_interval());
    rediscover.tick().await;

    controller.start_monitoring();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(snapshot) = rx.recv() => {
                output::print_output(&event_line(&snapshot, global.output, color), global.quiet);
            }
            Ok(()) = states.changed() => {
                let state = *states.borrow_and_update();
                tracing::info!(%state, "listener state");
            }
            _ = rediscover.tick() => match controller.discover().await {
                Ok(_) => subscribe_new(controller, args.kind, &tx, &mut watched),
                Err(e) => tracing::warn!(error = %e, "rediscovery failed"),
            },
        }
    }

    controller.shutdown().await;
    Ok(())
}
