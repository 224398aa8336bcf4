// ── Controller facade ──
//
// One explicit context object per gateway. Owns the token provider, REST
// client, entity registry, discovery cache, synchronizer and realtime
// listener; no process-wide state.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info};

use dobiss_api::{DobissClient, TempCalendar, TlsMode, TokenProvider, TransportConfig};

use crate::config::{ControllerConfig, TlsVerification};
use crate::discovery::DiscoveryCache;
use crate::error::CoreError;
use crate::model::temperature::find_calendar;
use crate::model::{
    Actionable, Entity, EntityKind, ObjectId, TemperatureControllable, TurnOff, TurnOn,
};
use crate::realtime::{ListenerState, RealtimeListener};
use crate::store::EntityRegistry;
use crate::sync::{StatusSynchronizer, SyncReport};

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Construction does no I/O.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    client: DobissClient,
    registry: Arc<EntityRegistry>,
    discovery: DiscoveryCache,
    sync: Arc<StatusSynchronizer>,
    listener: RealtimeListener,
}

impl Controller {
    /// Validate `config` and wire up every component.
    pub fn new(config: ControllerConfig) -> Result<Self, CoreError> {
        config.validate()?;

        let tokens = Arc::new(TokenProvider::new(
            config.secret.clone(),
            config.application.clone(),
        ));
        let client = DobissClient::new(
            config.base_url()?,
            config.socket_url()?,
            tokens,
            build_transport(&config),
        );

        let registry = Arc::new(EntityRegistry::new());
        let discovery = DiscoveryCache::new(client.clone(), Arc::clone(&registry));
        discovery.set_interval(config.discovery_interval)?;
        let sync = Arc::new(StatusSynchronizer::new(client.clone(), Arc::clone(&registry)));
        let listener = RealtimeListener::new(client.clone(), Arc::clone(&sync), config.reconnect_delay);

        debug!(host = %config.host, secure = config.secure, "controller created");

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                client,
                registry,
                discovery,
                sync,
                listener,
            }),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &DobissClient {
        &self.inner.client
    }

    // ── Discovery ────────────────────────────────────────────────

    /// Known entities, refetched from the gateway when stale.
    pub async fn discover(&self) -> Result<Vec<Arc<Entity>>, CoreError> {
        self.inner.discovery.discover().await
    }

    /// Make the next `discover()` refetch.
    pub fn force_discovery(&self) {
        self.inner.discovery.force_next();
    }

    pub fn set_discovery_interval(&self, interval: Duration) -> Result<(), CoreError> {
        self.inner.discovery.set_interval(interval)
    }

    pub fn discovery_interval(&self) -> Duration {
        self.inner.discovery.interval()
    }

    pub fn calendars(&self) -> Vec<TempCalendar> {
        self.inner.discovery.calendars()
    }

    // ── Entity lookup ────────────────────────────────────────────

    /// Entities known so far, in discovery order. No I/O.
    pub fn entities(&self) -> Vec<Arc<Entity>> {
        self.inner.registry.snapshot().to_vec()
    }

    pub fn entities_by_kind(&self, kind: EntityKind) -> Vec<Arc<Entity>> {
        self.inner.registry.by_kind(kind)
    }

    pub fn entity(&self, id: &ObjectId) -> Option<Arc<Entity>> {
        self.inner.registry.get(id)
    }

    pub fn entity_by_address(&self, address: u32, channel: u32) -> Option<Arc<Entity>> {
        self.inner.registry.find(address, channel)
    }

    /// Subscribe to registry membership changes.
    pub fn watch_entities(&self) -> watch::Receiver<Arc<Vec<Arc<Entity>>>> {
        self.inner.registry.subscribe()
    }

    fn require(&self, id: &ObjectId) -> Result<Arc<Entity>, CoreError> {
        self.entity(id).ok_or_else(|| CoreError::not_found(id))
    }

    // ── Status ───────────────────────────────────────────────────

    /// Pull the full status and apply it to every entity.
    pub async fn refresh_all(&self) -> Result<SyncReport, CoreError> {
        self.inner.sync.refresh_all().await
    }

    /// Apply a status snapshot obtained elsewhere.
    pub fn apply_status(&self, snapshot: &Value, force: bool) -> SyncReport {
        self.inner.sync.apply_global_status(snapshot, force)
    }

    /// Poll a single entity.
    pub async fn update_entity(&self, id: &ObjectId) -> Result<bool, CoreError> {
        self.require(id)?.update().await
    }

    /// `true` if the gateway accepts our token.
    pub async fn auth_check(&self) -> bool {
        self.inner.client.auth_check().await
    }

    // ── Monitoring ───────────────────────────────────────────────

    /// Start the realtime listener. After [`stop_monitoring`](Self::stop_monitoring)
    /// this withdraws the pending stop if the old loop has not exited yet.
    /// Returns `false` if it was already running or is still shutting down.
    pub fn start_monitoring(&self) -> bool {
        let started = self.inner.listener.start();
        if started {
            info!(url = %self.inner.client.socket_url(), "monitoring started");
        }
        started
    }

    /// Cooperative stop; the listener exits at its next wake-up.
    pub fn stop_monitoring(&self) {
        self.inner.listener.stop();
    }

    pub fn listener_state(&self) -> ListenerState {
        self.inner.listener.state()
    }

    pub fn subscribe_listener_state(&self) -> watch::Receiver<ListenerState> {
        self.inner.listener.subscribe_state()
    }

    // ── Actions ──────────────────────────────────────────────────

    pub async fn turn_on(&self, id: &ObjectId, params: TurnOn) -> Result<(), CoreError> {
        let entity = self.require(id)?;
        entity.as_output()?.turn_on(params).await
    }

    pub async fn turn_off(&self, id: &ObjectId, params: TurnOff) -> Result<(), CoreError> {
        let entity = self.require(id)?;
        entity.as_output()?.turn_off(params).await
    }

    pub async fn toggle(&self, id: &ObjectId) -> Result<(), CoreError> {
        let entity = self.require(id)?;
        entity.as_output()?.toggle().await
    }

    pub async fn set_temp_timer(
        &self,
        id: &ObjectId,
        temperature: f64,
        minutes: i32,
    ) -> Result<(), CoreError> {
        let entity = self.require(id)?;
        entity
            .as_temperature_zone()?
            .set_temp_timer(temperature, minutes)
            .await
    }

    pub async fn set_temperature(&self, id: &ObjectId, temperature: f64) -> Result<(), CoreError> {
        let entity = self.require(id)?;
        entity.as_temperature_zone()?.set_temperature(temperature).await
    }

    /// Switch a zone to the calendar called `calendar_name`.
    pub async fn set_preset(&self, id: &ObjectId, calendar_name: &str) -> Result<(), CoreError> {
        let entity = self.require(id)?;
        let zone = entity.as_temperature_zone()?;
        let calendars = self.calendars();
        let calendar = find_calendar(&calendars, calendar_name)?;
        zone.set_preset(calendar).await
    }

    pub async fn set_manual_mode(&self, id: &ObjectId, enabled: bool) -> Result<(), CoreError> {
        let entity = self.require(id)?;
        entity.as_temperature_zone()?.set_manual_mode(enabled).await
    }

    pub fn set_default_manual_duration(&self, id: &ObjectId, minutes: i32) -> Result<(), CoreError> {
        let entity = self.require(id)?;
        entity
            .as_temperature_zone()?
            .set_default_manual_duration(minutes)
    }

    // ── Teardown ─────────────────────────────────────────────────

    /// Stop the listener, wait for it, and close the HTTP session.
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        self.inner.listener.shutdown();
        self.inner.listener.join().await;
        self.inner.client.close_session();
        debug!("controller shut down");
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("host", &self.inner.config.host)
            .field("entities", &self.inner.registry.len())
            .field("listener", &self.inner.listener.state())
            .finish_non_exhaustive()
    }
}

fn build_transport(config: &ControllerConfig) -> TransportConfig {
    let tls = match &config.tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    };
    TransportConfig {
        tls,
        timeout: config.timeout,
    }
}
