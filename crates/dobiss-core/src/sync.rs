// ── Status synchronizer ──
//
// Fans a status snapshot (pulled or pushed) out to every known entity.
// One entity failing to project never stops the others.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use dobiss_api::{DobissClient, StatusFilter};

use crate::error::CoreError;
use crate::store::EntityRegistry;

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Entities the snapshot was offered to.
    pub examined: usize,
    /// Entities whose value or attributes changed.
    pub updated: usize,
    /// Entities whose cell could not be interpreted.
    pub failed: usize,
}

pub struct StatusSynchronizer {
    client: DobissClient,
    registry: Arc<EntityRegistry>,
}

impl StatusSynchronizer {
    pub fn new(client: DobissClient, registry: Arc<EntityRegistry>) -> Self {
        Self { client, registry }
    }

    /// Offer `snapshot` to every entity. Snapshots that are not JSON
    /// objects carry nothing addressable and are ignored.
    pub fn apply_global_status(&self, snapshot: &Value, force: bool) -> SyncReport {
        let mut report = SyncReport::default();
        if !snapshot.is_object() {
            debug!(%snapshot, "ignoring non-object status snapshot");
            return report;
        }

        for entity in self.registry.snapshot().iter() {
            report.examined += 1;
            match entity.apply_status(snapshot, force) {
                Ok(true) => report.updated += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        object_id = %entity.object_id(),
                        address = entity.address(),
                        channel = entity.channel(),
                        error = %e,
                        "status projection failed"
                    );
                }
            }
        }

        debug!(
            examined = report.examined,
            updated = report.updated,
            failed = report.failed,
            "status applied"
        );
        report
    }

    /// Pull the full status from the gateway and apply it.
    pub async fn refresh_all(&self) -> Result<SyncReport, CoreError> {
        let status = self.client.status(&StatusFilter::all()).await?;
        Ok(self.apply_global_status(&status, false))
    }
}
