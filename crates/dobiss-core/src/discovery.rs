// ── Discovery cache ──
//
// Fetches the gateway's subject tree at most once per interval (unless
// forced), maps subjects to entities, reconciles them into the registry
// in place, and pairs up/down actuators.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use dobiss_api::{DiscoveryResponse, DobissClient, TempCalendar, coerce_i64};

use crate::config::{DEFAULT_DISCOVERY_INTERVAL, validate_discovery_interval};
use crate::error::CoreError;
use crate::model::{Entity, EntityMetadata, ObjectId, classify};
use crate::store::EntityRegistry;

/// Reserved system group; never holds user-facing subjects.
const SYSTEM_GROUP: i64 = 0;

/// Name suffixes of up/down pairs, up side first.
const BUDDY_SUFFIXES: [(&str, &str); 3] = [(" op", " neer"), (" open", " dicht"), (" up", " down")];

#[derive(Debug)]
struct Schedule {
    last_discovery: Option<Instant>,
    force: bool,
    interval: Duration,
}

impl Schedule {
    /// Decide whether to hit the gateway. Consumes the force flag.
    fn should_refetch(&mut self, now: Instant) -> bool {
        if std::mem::take(&mut self.force) {
            return true;
        }
        match self.last_discovery {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.interval,
        }
    }
}

pub struct DiscoveryCache {
    client: DobissClient,
    registry: Arc<EntityRegistry>,
    schedule: Mutex<Schedule>,
    /// Serializes refetches so concurrent callers share one fetch.
    fetch_gate: tokio::sync::Mutex<()>,
    calendars: RwLock<Vec<TempCalendar>>,
}

impl DiscoveryCache {
    pub fn new(client: DobissClient, registry: Arc<EntityRegistry>) -> Self {
        Self {
            client,
            registry,
            schedule: Mutex::new(Schedule {
                last_discovery: None,
                force: false,
                interval: DEFAULT_DISCOVERY_INTERVAL,
            }),
            fetch_gate: tokio::sync::Mutex::new(()),
            calendars: RwLock::new(Vec::new()),
        }
    }

    fn schedule(&self) -> MutexGuard<'_, Schedule> {
        self.schedule.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn registry(&self) -> &Arc<EntityRegistry> {
        &self.registry
    }

    pub fn interval(&self) -> Duration {
        self.schedule().interval
    }

    /// Change the refetch interval. Intervals under ten seconds are refused.
    pub fn set_interval(&self, interval: Duration) -> Result<(), CoreError> {
        validate_discovery_interval(interval)?;
        self.schedule().interval = interval;
        Ok(())
    }

    /// Make the next `discover()` hit the gateway regardless of age.
    pub fn force_next(&self) {
        self.schedule().force = true;
    }

    pub fn last_discovery(&self) -> Option<Instant> {
        self.schedule().last_discovery
    }

    /// Temperature calendars from the last successful discovery.
    pub fn calendars(&self) -> Vec<TempCalendar> {
        self.calendars
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// All known entities, refetching from the gateway when the cache is
    /// stale or a refetch was forced.
    ///
    /// The fetch time is recorded even when the request fails, so a broken
    /// gateway is retried at the normal interval rather than on every call.
    pub async fn discover(&self) -> Result<Vec<Arc<Entity>>, CoreError> {
        let _gate = self.fetch_gate.lock().await;

        if !self.schedule().should_refetch(Instant::now()) {
            debug!("discovery: using cached entities");
            return Ok(self.registry.snapshot().to_vec());
        }

        let result = self.client.discover().await;
        self.schedule().last_discovery = Some(Instant::now());
        let response = result?;

        self.reconcile(&response);
        Ok(self.registry.snapshot().to_vec())
    }

    /// Merge a discovery response into the registry.
    pub fn reconcile(&self, response: &DiscoveryResponse) {
        let (mut added, mut updated) = (0usize, 0usize);

        for entry in &response.groups {
            if entry.group.id == SYSTEM_GROUP {
                continue;
            }
            for subject in &entry.subjects {
                debug!(
                    name = %subject.name,
                    address = subject.address,
                    channel = subject.channel,
                    module_type = subject.module_type,
                    icons_id = subject.icons_id,
                    "discovered subject"
                );
                let Some(kind) = classify(subject) else {
                    debug!(name = %subject.name, "subject not exposed, skipped");
                    continue;
                };
                let meta = EntityMetadata::from_subject(subject, &entry.group.name, kind);

                match self.registry.find(subject.address, subject.channel) {
                    Some(existing) => {
                        if existing.update_metadata(meta) {
                            updated += 1;
                        }
                    }
                    None => {
                        let entity =
                            Entity::new(subject.address, subject.channel, meta, self.client.clone());
                        if self.registry.get_or_insert(entity).1 {
                            added += 1;
                        }
                    }
                }
            }
        }

        *self.calendars.write().unwrap_or_else(PoisonError::into_inner) =
            response.temp_calendars.clone();

        self.resolve_buddies();
        info!(
            added,
            updated,
            total = self.registry.len(),
            calendars = response.temp_calendars.len(),
            "discovery reconciled"
        );
    }

    /// Re-pair from scratch each cycle so a rewired pair leaves no stale
    /// back-reference on its old partner.
    fn resolve_buddies(&self) {
        let entities = self.registry.snapshot();
        for entity in entities.iter() {
            entity.set_buddy(None);
        }
        for device in entities.iter().filter(|e| e.is_up_class()) {
            match find_buddy(device, &entities) {
                Some(buddy) => {
                    device.set_buddy(Some(buddy.object_id().clone()));
                    buddy.set_buddy(Some(device.object_id().clone()));
                    debug!(object_id = %device.object_id(), buddy = %buddy.object_id(), "buddy paired");
                }
                None => {
                    warn!(object_id = %device.object_id(), name = %device.name(), "no buddy found");
                }
            }
        }
    }
}

fn find_buddy(device: &Entity, entities: &[Arc<Entity>]) -> Option<Arc<Entity>> {
    if let Some(channel) = device.attribute("lock").as_ref().and_then(lock_channel) {
        let id = ObjectId::new(device.address(), channel);
        if &id != device.object_id() {
            if let Some(buddy) = entities.iter().find(|e| e.object_id() == &id) {
                return Some(Arc::clone(buddy));
            }
        }
    }

    let target = buddy_name(&device.name());
    entities
        .iter()
        .find(|e| e.is_down_class() && e.name() == target)
        .cloned()
}

/// Channel named by an explicit `lock` pairing field.
fn lock_channel(lock: &Value) -> Option<u32> {
    let raw = match lock {
        Value::Object(fields) => fields.get("channel").and_then(coerce_i64),
        Value::Number(_) | Value::String(_) => coerce_i64(lock),
        _ => None,
    }?;
    u32::try_from(raw).ok()
}

/// Expected name of the down counterpart of an up-class entity. Names
/// without a known suffix are their own counterpart.
pub fn buddy_name(name: &str) -> String {
    BUDDY_SUFFIXES
        .iter()
        .find_map(|(up, down)| name.strip_suffix(up).map(|stem| format!("{stem}{down}")))
        .unwrap_or_else(|| name.to_owned())
}
