//! Shared helpers for command handlers.

use std::time::Duration;

use dobiss_core::{Controller, ObjectId};

use crate::error::CliError;

/// Parse `dobissid_<address>_<channel>` or `<address>:<channel>`.
pub fn parse_object_id(raw: &str) -> Result<ObjectId, CliError> {
    let trimmed = raw.trim();
    let parts = trimmed
        .strip_prefix("dobissid_")
        .and_then(|rest| rest.split_once('_'))
        .or_else(|| trimmed.split_once(':'));

    let parsed = parts.and_then(|(address, channel)| {
        Some((address.parse::<u32>().ok()?, channel.parse::<u32>().ok()?))
    });

    parsed
        .map(|(address, channel)| ObjectId::new(address, channel))
        .ok_or_else(|| CliError::Validation {
            field: "id".into(),
            reason: format!("expected dobissid_<address>_<channel> or <address>:<channel>, got '{raw}'"),
        })
}

/// Discover, then resolve `raw` to a known entity id.
pub async fn resolve_entity(controller: &Controller, raw: &str) -> Result<ObjectId, CliError> {
    let id = parse_object_id(raw)?;
    controller.discover().await?;
    if controller.entity(&id).is_none() {
        return Err(CliError::NotFound {
            identifier: id.to_string(),
        });
    }
    Ok(id)
}

pub fn seconds(value: Option<u64>) -> Option<Duration> {
    value.map(Duration::from_secs)
}
