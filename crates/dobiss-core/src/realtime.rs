// ── Realtime listener ──
//
// Background task holding the status socket open. Every pushed document is
// fed to the synchronizer. Any connection-level failure closes the socket
// and retries after a fixed delay, forever, until stopped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use strum::Display;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dobiss_api::{DobissClient, SocketMessage, StatusSocket};

use crate::sync::StatusSynchronizer;

// ── ListenerState ────────────────────────────────────────────────────

/// Listener lifecycle, observable through [`RealtimeListener::subscribe_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ListenerState {
    Stopped,
    Connecting,
    Listening,
}

// ── RealtimeListener ─────────────────────────────────────────────────

/// Cheaply cloneable handle to the status-socket task.
#[derive(Clone)]
pub struct RealtimeListener {
    inner: Arc<ListenerInner>,
}

struct ListenerInner {
    client: DobissClient,
    sync: Arc<StatusSynchronizer>,
    reconnect_delay: Duration,
    state: watch::Sender<ListenerState>,
    stop: AtomicBool,
    cancel: Mutex<CancellationToken>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ListenerInner {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_cancelled()
    }

    fn set_state(&self, state: ListenerState) {
        self.state.send_replace(state);
    }

    /// Publish `Stopped` if an exit was requested. Decided under the state
    /// channel's lock, so a concurrent `start()` either sees `Stopped` and
    /// spawns a fresh loop or withdraws the stop before this check.
    fn try_finish(&self, cancel: &CancellationToken) -> bool {
        self.state.send_if_modified(|state| {
            if self.stopped() || cancel.is_cancelled() {
                *state = ListenerState::Stopped;
                true
            } else {
                false
            }
        })
    }
}

impl RealtimeListener {
    pub fn new(client: DobissClient, sync: Arc<StatusSynchronizer>, reconnect_delay: Duration) -> Self {
        let (state, _) = watch::channel(ListenerState::Stopped);
        Self {
            inner: Arc::new(ListenerInner {
                client,
                sync,
                reconnect_delay,
                state,
                stop: AtomicBool::new(true),
                cancel: Mutex::new(CancellationToken::new()),
                task: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> ListenerState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ListenerState> {
        self.inner.state.subscribe()
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.inner.reconnect_delay
    }

    /// Spawn the listen loop. If a loop is still alive after a cooperative
    /// [`stop`](Self::stop), the stop request is withdrawn and that loop
    /// keeps running. Returns `true` when the listener will be running,
    /// `false` when it already was or is winding down after
    /// [`shutdown`](Self::shutdown) (call [`join`](Self::join) first).
    /// Must be called inside a tokio runtime.
    pub fn start(&self) -> bool {
        let mut resumed = false;
        let claimed = self.inner.state.send_if_modified(|state| {
            if *state == ListenerState::Stopped {
                *state = ListenerState::Connecting;
                return true;
            }
            if self.inner.stopped() && !self.inner.cancelled() {
                self.inner.stop.store(false, Ordering::SeqCst);
                resumed = true;
            }
            false
        });
        if resumed {
            debug!(state = %self.state(), "pending stop withdrawn");
            return true;
        }
        if !claimed {
            debug!(state = %self.state(), "listener already running");
            return false;
        }

        self.inner.stop.store(false, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        *self.inner.cancel.lock().unwrap_or_else(PoisonError::into_inner) = cancel.clone();

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            listen_loop(&inner, &cancel).await;
        });
        *self.inner.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        true
    }

    /// Ask the loop to exit. Cooperative: an in-flight receive is not
    /// interrupted, so the loop may linger until the next message or
    /// failure.
    pub fn stop(&self) {
        self.inner.stop.store(true, Ordering::SeqCst);
    }

    /// Stop and interrupt any pending receive, connect or reconnect delay.
    pub fn shutdown(&self) {
        self.stop();
        self.inner
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    /// Wait for the background task to finish.
    pub async fn join(&self) {
        let handle = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "listener task panicked");
            }
        }
    }
}

impl std::fmt::Debug for RealtimeListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeListener")
            .field("state", &self.state())
            .field("reconnect_delay", &self.inner.reconnect_delay)
            .finish_non_exhaustive()
    }
}

// ── Background loop ──────────────────────────────────────────────────

/// connect → read → on failure, wait the fixed delay → reconnect.
async fn listen_loop(inner: &ListenerInner, cancel: &CancellationToken) {
    while !inner.try_finish(cancel) {
        inner.set_state(ListenerState::Connecting);

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => continue,
            result = connect_and_listen(inner) => result,
        };

        match outcome {
            // Left because of a stop request; re-check it before reconnecting.
            Ok(()) => continue,
            Err(e) => warn!(error = %e, "status socket failed"),
        }
        if inner.stopped() {
            continue;
        }

        info!(
            delay_ms = u64::try_from(inner.reconnect_delay.as_millis()).unwrap_or(u64::MAX),
            "waiting before reconnect"
        );
        inner.set_state(ListenerState::Connecting);
        tokio::select! {
            biased;
            () = cancel.cancelled() => {}
            () = tokio::time::sleep(inner.reconnect_delay) => {}
        }
    }

    debug!("listener loop exiting");
}

/// One connection: returns `Ok` when the stop flag is seen, `Err` on any
/// connection-level failure. The socket is closed either way.
async fn connect_and_listen(inner: &ListenerInner) -> Result<(), dobiss_api::Error> {
    let bearer = inner.client.tokens().bearer()?;
    let client = &inner.client;
    let mut socket = StatusSocket::connect(client.socket_url(), &bearer, client.transport()).await?;
    inner.set_state(ListenerState::Listening);

    let result = loop {
        if inner.stopped() {
            break Ok(());
        }
        match socket.next_message().await {
            Ok(SocketMessage::Status(doc)) => {
                debug!(%doc, "status pushed");
                inner.sync.apply_global_status(&doc, false);
            }
            Ok(SocketMessage::Malformed { error, raw }) => {
                warn!(%error, %raw, "malformed status message skipped");
            }
            Err(e) => break Err(e),
        }
    };

    socket.close().await;
    info!("status socket closed");
    result
}
