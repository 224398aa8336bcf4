// ── Reactive entity registry ──
//
// Concurrent O(1) lookup by object id plus an insertion-ordered snapshot
// broadcast through a `watch` channel. Entities are only ever added: a
// subject missing from a later discovery keeps its entity.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;

use crate::model::{Entity, EntityKind, ObjectId};

pub struct EntityRegistry {
    by_id: DashMap<ObjectId, Arc<Entity>>,
    /// Insertion-ordered snapshot, rebuilt on every insert.
    snapshot: watch::Sender<Arc<Vec<Arc<Entity>>>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            by_id: DashMap::new(),
            snapshot,
        }
    }

    /// Return the entity registered under `entity.object_id()`, inserting
    /// `entity` first if there is none. The flag is `true` on insert.
    pub fn get_or_insert(&self, entity: Entity) -> (Arc<Entity>, bool) {
        let inserted = match self.by_id.entry(entity.object_id().clone()) {
            Entry::Occupied(existing) => return (Arc::clone(existing.get()), false),
            Entry::Vacant(slot) => Arc::clone(slot.insert(Arc::new(entity)).value()),
        };

        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| {
            let mut next = Vec::with_capacity(snap.len() + 1);
            next.extend(snap.iter().cloned());
            next.push(Arc::clone(&inserted));
            *snap = Arc::new(next);
        });
        (inserted, true)
    }

    pub fn get(&self, id: &ObjectId) -> Option<Arc<Entity>> {
        self.by_id.get(id).map(|r| Arc::clone(r.value()))
    }

    pub fn find(&self, address: u32, channel: u32) -> Option<Arc<Entity>> {
        self.get(&ObjectId::new(address, channel))
    }

    /// All entities in discovery order (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<Vec<Arc<Entity>>> {
        self.snapshot.borrow().clone()
    }

    pub fn by_kind(&self, kind: EntityKind) -> Vec<Arc<Entity>> {
        self.snapshot()
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect()
    }

    /// Subscribe to membership changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<Entity>>>> {
        self.snapshot.subscribe()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
