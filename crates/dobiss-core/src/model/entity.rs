// ── Entity ──
//
// One controllable or observable point on the gateway. Identity is fixed
// at construction; everything else lives behind a short-lived RwLock that
// is never held across an await. Observers run after the lock is dropped.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use dobiss_api::{DobissClient, StatusFilter, Subject, coerce_i64};

use super::kind::{EntityKind, icon_name, icons};
use super::output::Output;
use super::temperature::{TemperatureState, TemperatureZone};
use crate::error::{CoreError, ProjectionError};

// ── ObjectId ────────────────────────────────────────────────────────

/// Stable identity of an entity: `dobissid_{address}_{channel}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(address: u32, channel: u32) -> Self {
        Self(format!("dobissid_{address}_{channel}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ── Metadata ────────────────────────────────────────────────────────

/// Everything discovery knows about a subject, after kind mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMetadata {
    pub name: String,
    pub group: String,
    pub kind: EntityKind,
    pub dimmable: bool,
    pub icons_id: i64,
    pub module_type: i64,
    pub attributes: BTreeMap<String, Value>,
}

impl EntityMetadata {
    pub fn from_subject(subject: &Subject, group: &str, kind: EntityKind) -> Self {
        Self {
            name: subject.name.clone(),
            group: group.to_owned(),
            kind,
            dimmable: subject.dimmable,
            icons_id: subject.icons_id,
            module_type: subject.module_type,
            attributes: subject.attributes.clone(),
        }
    }
}

#[derive(Debug)]
struct EntityState {
    meta: EntityMetadata,
    value: Option<f64>,
    buddy: Option<ObjectId>,
    temperature: Option<TemperatureState>,
}

// ── Observers ───────────────────────────────────────────────────────

/// Handle returned by [`Entity::register_observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Callback = Arc<dyn Fn(&Entity) + Send + Sync>;

// ── Snapshot ────────────────────────────────────────────────────────

/// Point-in-time, serializable copy of an entity.
#[derive(Debug, Clone, Serialize)]
pub struct EntitySnapshot {
    pub object_id: ObjectId,
    pub address: u32,
    pub channel: u32,
    pub name: String,
    pub group: String,
    pub kind: EntityKind,
    pub dimmable: bool,
    pub icons_id: i64,
    #[serde(rename = "type")]
    pub module_type: i64,
    pub icon: Option<&'static str>,
    pub unit: Option<&'static str>,
    pub value: Option<f64>,
    pub is_on: bool,
    pub buddy: Option<ObjectId>,
    pub attributes: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<TemperatureState>,
}

// ── Entity ──────────────────────────────────────────────────────────

pub struct Entity {
    object_id: ObjectId,
    address: u32,
    channel: u32,
    client: DobissClient,
    state: RwLock<EntityState>,
    observers: Mutex<Vec<(ObserverId, Callback)>>,
    next_observer: AtomicU64,
}

impl Entity {
    pub fn new(address: u32, channel: u32, meta: EntityMetadata, client: DobissClient) -> Self {
        let temperature = (meta.kind == EntityKind::TemperatureZone).then(TemperatureState::default);
        Self {
            object_id: ObjectId::new(address, channel),
            address,
            channel,
            client,
            state: RwLock::new(EntityState {
                meta,
                value: None,
                buddy: None,
                temperature,
            }),
            observers: Mutex::new(Vec::new()),
            next_observer: AtomicU64::new(0),
        }
    }

    pub fn from_subject(subject: &Subject, group: &str, kind: EntityKind, client: DobissClient) -> Self {
        Self::new(
            subject.address,
            subject.channel,
            EntityMetadata::from_subject(subject, group, kind),
            client,
        )
    }

    fn read(&self) -> RwLockReadGuard<'_, EntityState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EntityState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }

    pub(crate) fn client(&self) -> &DobissClient {
        &self.client
    }

    pub fn name(&self) -> String {
        self.read().meta.name.clone()
    }

    pub fn group(&self) -> String {
        self.read().meta.group.clone()
    }

    pub fn kind(&self) -> EntityKind {
        self.read().meta.kind
    }

    pub fn dimmable(&self) -> bool {
        self.read().meta.dimmable
    }

    pub fn icons_id(&self) -> i64 {
        self.read().meta.icons_id
    }

    pub fn module_type(&self) -> i64 {
        self.read().meta.module_type
    }

    pub fn attributes(&self) -> BTreeMap<String, Value> {
        self.read().meta.attributes.clone()
    }

    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.read().meta.attributes.get(key).cloned()
    }

    /// Last observed value; `None` until the first status arrives.
    pub fn value(&self) -> Option<f64> {
        self.read().value
    }

    pub fn is_on(&self) -> bool {
        self.value().is_some_and(|v| v > 0.0)
    }

    pub fn temperature(&self) -> Option<TemperatureState> {
        self.read().temperature.clone()
    }

    pub fn buddy(&self) -> Option<ObjectId> {
        self.read().buddy.clone()
    }

    pub fn icon(&self) -> Option<&'static str> {
        icon_name(self.icons_id())
    }

    /// Up-class entities (covers, shutters) pair with a down counterpart.
    pub fn is_up_class(&self) -> bool {
        self.icons_id() == icons::UP
    }

    pub fn is_down_class(&self) -> bool {
        self.icons_id() == icons::DOWN
    }

    /// Display unit for the value, if any.
    pub fn unit(&self) -> Option<&'static str> {
        unit_for(&self.read().meta)
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        let state = self.read();
        EntitySnapshot {
            object_id: self.object_id.clone(),
            address: self.address,
            channel: self.channel,
            name: state.meta.name.clone(),
            group: state.meta.group.clone(),
            kind: state.meta.kind,
            dimmable: state.meta.dimmable,
            icons_id: state.meta.icons_id,
            module_type: state.meta.module_type,
            icon: icon_name(state.meta.icons_id),
            unit: unit_for(&state.meta),
            value: state.value,
            is_on: state.value.is_some_and(|v| v > 0.0),
            buddy: state.buddy.clone(),
            attributes: state.meta.attributes.clone(),
            temperature: state.temperature.clone(),
        }
    }

    // ── Capability views ─────────────────────────────────────────────

    pub fn as_output(&self) -> Result<Output<'_>, CoreError> {
        let kind = self.kind();
        if kind.is_actionable() {
            Ok(Output::new(self))
        } else {
            Err(CoreError::Unsupported {
                operation: "switch".into(),
                kind: kind.to_string(),
            })
        }
    }

    pub fn as_temperature_zone(&self) -> Result<TemperatureZone<'_>, CoreError> {
        let kind = self.kind();
        if kind == EntityKind::TemperatureZone {
            Ok(TemperatureZone::new(self))
        } else {
            Err(CoreError::Unsupported {
                operation: "temperature control".into(),
                kind: kind.to_string(),
            })
        }
    }

    // ── Observers ────────────────────────────────────────────────────

    pub fn register_observer(&self, callback: impl Fn(&Entity) + Send + Sync + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer.fetch_add(1, Ordering::Relaxed));
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        id
    }

    /// Returns `false` if the id was not registered.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(oid, _)| *oid != id);
        observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn notify(&self) {
        let callbacks: Vec<Callback> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(self);
        }
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Replace discovery metadata. Attributes from discovery are merged
    /// over the current set so status-derived keys survive. Returns
    /// whether anything changed (observers are notified if so).
    pub fn update_metadata(&self, meta: EntityMetadata) -> bool {
        let changed = {
            let mut state = self.write();
            let mut attributes = state.meta.attributes.clone();
            attributes.extend(meta.attributes);
            let next = EntityMetadata { attributes, ..meta };
            if next == state.meta {
                false
            } else {
                if next.kind == EntityKind::TemperatureZone && state.temperature.is_none() {
                    state.temperature = Some(TemperatureState::default());
                }
                state.meta = next;
                true
            }
        };
        if changed {
            debug!(object_id = %self.object_id, "metadata updated by discovery");
            self.notify();
        }
        changed
    }

    pub(crate) fn set_buddy(&self, buddy: Option<ObjectId>) {
        self.write().buddy = buddy;
    }

    pub(crate) fn set_default_manual_minutes(&self, minutes: i32) {
        self.write()
            .temperature
            .get_or_insert_with(TemperatureState::default)
            .default_manual_minutes = minutes;
    }

    /// Project a status snapshot (keyed by address, then channel) onto this
    /// entity. Absent cells are a no-op. Returns whether the value or
    /// attributes changed; observers are notified on change or when `force`
    /// is set.
    pub fn apply_status(&self, snapshot: &Value, force: bool) -> Result<bool, ProjectionError> {
        match locate_cell(snapshot, self.address, self.channel) {
            Some(cell) => self.apply_cell(cell, force),
            None => {
                trace!(object_id = %self.object_id, "not present in status snapshot");
                Ok(false)
            }
        }
    }

    /// Project a single status cell (scalar, or record for temperature
    /// zones) onto this entity.
    #[allow(
        clippy::float_cmp,
        clippy::cast_precision_loss,
        clippy::as_conversions
    )]
    pub fn apply_cell(&self, cell: &Value, force: bool) -> Result<bool, ProjectionError> {
        let changed = {
            let mut state = self.write();
            if state.meta.kind == EntityKind::TemperatureZone {
                let Value::Object(record) = cell else {
                    return Err(ProjectionError::NotARecord {
                        object_id: self.object_id.clone(),
                        value: cell.clone(),
                    });
                };
                let value = record.get("temp").and_then(dobiss_api::coerce_f64);
                let mut attributes = state.meta.attributes.clone();
                for (key, v) in record {
                    attributes.insert(key.clone(), v.clone());
                }
                let temperature = state
                    .temperature
                    .clone()
                    .unwrap_or_default()
                    .with_record(record);

                let changed = value != state.value
                    || attributes != state.meta.attributes
                    || Some(&temperature) != state.temperature.as_ref();
                state.value = value;
                state.meta.attributes = attributes;
                state.temperature = Some(temperature);
                changed
            } else {
                let Some(raw) = coerce_i64(cell) else {
                    return Err(ProjectionError::NotAnInteger {
                        object_id: self.object_id.clone(),
                        value: cell.clone(),
                    });
                };
                let value = Some(raw as f64);
                let changed = value != state.value;
                state.value = value;
                changed
            }
        };

        if changed {
            debug!(object_id = %self.object_id, value = ?self.value(), "status changed");
        }
        if changed || force {
            self.notify();
        }
        Ok(changed)
    }

    /// Poll this entity's status from the gateway.
    pub async fn update(&self) -> Result<bool, CoreError> {
        let status = self
            .client
            .status(&StatusFilter::single(self.address, self.channel))
            .await?;
        Ok(self.apply_cell(&status, false)?)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("object_id", &self.object_id)
            .field("state", &*self.read())
            .finish_non_exhaustive()
    }
}

fn unit_for(meta: &EntityMetadata) -> Option<&'static str> {
    match meta.kind {
        EntityKind::TemperatureZone => Some("°C"),
        EntityKind::LightSensor => Some("%"),
        kind if kind.is_actionable() && meta.dimmable => Some("%"),
        _ => None,
    }
}

/// Find the cell for `address`/`channel` in a status snapshot.
///
/// A module entry is either an array indexed by channel or an object keyed
/// by the channel number as a string.
pub fn locate_cell(snapshot: &Value, address: u32, channel: u32) -> Option<&Value> {
    match snapshot.get(address.to_string())? {
        Value::Array(cells) => cells.get(usize::try_from(channel).ok()?),
        Value::Object(cells) => cells.get(&channel.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::atomic::AtomicUsize;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::test_client;

    fn meta(kind: EntityKind) -> EntityMetadata {
        EntityMetadata {
            name: "Spots".into(),
            group: "Living".into(),
            kind,
            dimmable: true,
            icons_id: icons::LIGHT,
            module_type: 8,
            attributes: BTreeMap::new(),
        }
    }

    fn counting(entity: &Entity) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        entity.register_observer(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    #[test]
    fn object_id_format() {
        assert_eq!(ObjectId::new(65, 3).as_str(), "dobissid_65_3");
    }

    #[test]
    fn value_starts_unset() {
        let e = Entity::new(65, 0, meta(EntityKind::Light), test_client());
        assert_eq!(e.value(), None);
        assert!(!e.is_on());
    }

    #[test]
    fn array_and_object_cells_are_located() {
        let snap = json!({"65": [0, 40], "66": {"2": 1}});
        assert_eq!(locate_cell(&snap, 65, 1), Some(&json!(40)));
        assert_eq!(locate_cell(&snap, 66, 2), Some(&json!(1)));
        assert_eq!(locate_cell(&snap, 65, 2), None);
        assert_eq!(locate_cell(&snap, 67, 0), None);
    }

    #[test]
    fn projection_is_idempotent_unless_forced() {
        let e = Entity::new(65, 1, meta(EntityKind::Light), test_client());
        let count = counting(&e);
        let snap = json!({"65": [0, "40"]});

        assert!(e.apply_status(&snap, false).unwrap());
        assert_eq!(e.value(), Some(40.0));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(!e.apply_status(&snap, false).unwrap());
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(!e.apply_status(&snap, true).unwrap());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_cell_is_a_noop_even_when_forced() {
        let e = Entity::new(65, 5, meta(EntityKind::Light), test_client());
        let count = counting(&e);
        assert!(!e.apply_status(&json!({"65": [1]}), true).unwrap());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn non_integer_cell_is_projection_error() {
        let e = Entity::new(65, 0, meta(EntityKind::Switch), test_client());
        let err = e.apply_status(&json!({"65": [{"x": 1}]}), false).unwrap_err();
        assert!(matches!(err, ProjectionError::NotAnInteger { .. }));
        assert_eq!(e.value(), None);
    }

    #[test]
    fn temperature_record_merges_into_attributes() {
        let e = Entity::new(204, 0, meta(EntityKind::TemperatureZone), test_client());
        let snap = json!({"204": {"0": {"temp": "19.5", "asked": 21, "time": 254, "status": 1}}});

        assert!(e.apply_status(&snap, false).unwrap());
        assert_eq!(e.value(), Some(19.5));
        assert_eq!(e.attribute("asked"), Some(json!(21)));
        let t = e.temperature().unwrap();
        assert_eq!(t.asked_temperature, Some(21.0));
        assert_eq!(t.timer_minutes, Some(-15));

        assert!(!e.apply_status(&snap, false).unwrap());
    }

    #[test]
    fn unparsable_temperature_unsets_value() {
        let e = Entity::new(204, 0, meta(EntityKind::TemperatureZone), test_client());
        e.apply_cell(&json!({"temp": 20}), false).unwrap();
        assert_eq!(e.value(), Some(20.0));
        e.apply_cell(&json!({"temp": "n/a"}), false).unwrap();
        assert_eq!(e.value(), None);
        assert!(matches!(
            e.apply_cell(&json!(20), false),
            Err(ProjectionError::NotARecord { .. })
        ));
    }

    #[test]
    fn removed_observer_is_not_called() {
        let e = Entity::new(1, 0, meta(EntityKind::Switch), test_client());
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let id = e.register_observer(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert!(e.remove_observer(id));
        assert!(!e.remove_observer(id));
        e.apply_cell(&json!(1), true).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn observer_can_read_entity_during_notification() {
        let e = Entity::new(1, 0, meta(EntityKind::Switch), test_client());
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        e.register_observer(move |entity| {
            *sink.lock().unwrap() = entity.value();
        });
        e.apply_cell(&json!(true), false).unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(1.0));
    }

    #[test]
    fn metadata_update_keeps_value_and_notifies_once() {
        let e = Entity::new(65, 1, meta(EntityKind::Light), test_client());
        e.apply_cell(&json!(30), false).unwrap();
        let count = counting(&e);

        assert!(!e.update_metadata(meta(EntityKind::Light)));
        let mut renamed = meta(EntityKind::Light);
        renamed.name = "Ceiling".into();
        assert!(e.update_metadata(renamed));

        assert_eq!(e.name(), "Ceiling");
        assert_eq!(e.value(), Some(30.0));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn units_follow_kind() {
        let temp = Entity::new(204, 0, meta(EntityKind::TemperatureZone), test_client());
        assert_eq!(temp.unit(), Some("°C"));
        let mut m = meta(EntityKind::Switch);
        m.dimmable = false;
        assert_eq!(Entity::new(1, 0, m, test_client()).unit(), None);
        assert_eq!(temp.snapshot().unit, Some("°C"));
    }

    #[test]
    fn views_check_kind() {
        let light = Entity::new(65, 1, meta(EntityKind::Light), test_client());
        assert!(light.as_output().is_ok());
        assert!(matches!(
            light.as_temperature_zone(),
            Err(CoreError::Unsupported { .. })
        ));
        let sensor = Entity::new(1, 0, meta(EntityKind::LightSensor), test_client());
        assert!(sensor.as_output().is_err());
    }
}
