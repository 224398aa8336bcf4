//! Domain layer between `dobiss-api` and consumers (CLI, home-automation
//! bridges).
//!
//! - **[`Controller`]**: one context object per gateway. Owns the token
//!   provider, REST client, registry, discovery cache, synchronizer and
//!   realtime listener, and exposes every operation by [`ObjectId`].
//!
//! - **[`DiscoveryCache`]**: rate-limited discovery that reconciles the
//!   gateway's subject tree into the [`EntityRegistry`] without ever
//!   replacing an existing [`Entity`].
//!
//! - **[`StatusSynchronizer`]**: fans a status snapshot out to all entities,
//!   isolating per-entity failures.
//!
//! - **[`RealtimeListener`]**: background status-socket task with fixed-delay
//!   reconnect.
//!
//! - **Domain model** ([`model`]): [`Entity`] with observers, plus capability
//!   views ([`Output`], [`TemperatureZone`]) for the kinds that accept actions.

pub mod config;
pub mod controller;
pub mod discovery;
pub mod error;
pub mod model;
pub mod realtime;
pub mod store;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ControllerConfig, TlsVerification};
pub use controller::Controller;
pub use discovery::{DiscoveryCache, buddy_name};
pub use error::{CoreError, ProjectionError};
pub use realtime::{ListenerState, RealtimeListener};
pub use store::EntityRegistry;
pub use sync::{StatusSynchronizer, SyncReport};

pub use model::{
    Actionable, CALENDAR_MINUTES, Entity, EntityKind, EntityMetadata, EntitySnapshot,
    INDEFINITE_MINUTES, ObjectId, ObserverId, Output, TemperatureControllable, TemperatureState,
    TemperatureZone, TurnOff, TurnOn,
};

pub use dobiss_api::TempCalendar;
