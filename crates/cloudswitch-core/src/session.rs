// ── Session facade ──
//
// Session is the single entry point consumers hold: it owns the cloud
// client, the device list and selection, the switch bank, and the RF
// listener. All state lives behind an `Arc`, so clones are cheap and
// every clone observes the same session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use secrecy::SecretString;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use cloudswitch_api::{CloudClient, EventStreamHandle, ReconnectConfig, TransportConfig};

use crate::error::CoreError;
use crate::events::SessionEvent;
use crate::model::device::SWITCH_FUNCTION;
use crate::model::{CloudDevice, DeviceId, SwitchBank, TristateCode};
use crate::persist::{SavedState, StateStore};

/// Default cloud API root.
pub const DEFAULT_API_URL: &str = "https://api.particle.io/";

/// Event name prefix the firmware publishes received RF codes under.
const CODE_EVENT_PREFIX: &str = "tristate";

/// Capacity of the session event channel. Consumers that fall more
/// than this far behind see a `Lagged` error instead of stale events.
const SESSION_EVENT_CAPACITY: usize = 64;

// ── Configuration ───────────────────────────────────────────────────

/// Connection settings for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Cloud API root URL.
    pub api_url: Url,

    /// HTTP transport settings (timeouts).
    pub transport: TransportConfig,

    /// Backoff policy for the RF listener's stream reconnects.
    pub reconnect: ReconnectConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            // The literal is a valid URL; parse cannot fail.
            api_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            transport: TransportConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

// ── Session ─────────────────────────────────────────────────────────

/// Facade over the device cloud: authentication, device selection,
/// switch toggling, and the inbound RF code listener.
///
/// Cheaply cloneable; all clones share one underlying session. State
/// changes are announced as [`SessionEvent`]s through the channel
/// vended by [`subscribe`](Self::subscribe).
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    state: RwLock<SessionState>,
    /// Built lazily on first use; `Arc` so callers can clone it out of
    /// the lock before awaiting.
    client: RwLock<Option<Arc<CloudClient>>>,
    /// Guards against overlapping login attempts.
    login_in_flight: AtomicBool,
    event_tx: broadcast::Sender<SessionEvent>,
    store: Box<dyn StateStore>,
    listener: Mutex<Option<Listener>>,
}

/// Everything behind the state lock. Mutated only while holding the
/// write guard; never held across an await.
struct SessionState {
    authenticated: bool,
    devices: Vec<CloudDevice>,
    selected: Option<CloudDevice>,
    bank: SwitchBank,
    /// Device id to restore on the next [`Session::restore_device`].
    /// Survives logout so a re-login lands on the same device.
    persisted_selection: Option<DeviceId>,
}

/// A running RF listener.
struct Listener {
    cancel: CancellationToken,
}

impl Session {
    /// Create a session, restoring the switch bank and remembered
    /// device id from the store.
    ///
    /// Construction never fails: an unreadable store logs a warning
    /// and falls back to defaults.
    pub fn new(config: SessionConfig, store: Box<dyn StateStore>) -> Self {
        let saved = store.load().unwrap_or_else(|e| {
            warn!(error = %e, "failed to load saved state, starting fresh");
            SavedState::default()
        });

        let (event_tx, _) = broadcast::channel(SESSION_EVENT_CAPACITY);

        Self {
            inner: Arc::new(SessionInner {
                config,
                state: RwLock::new(SessionState {
                    authenticated: false,
                    devices: Vec::new(),
                    selected: None,
                    bank: saved.bank,
                    persisted_selection: saved.selected_device,
                }),
                client: RwLock::new(None),
                login_in_flight: AtomicBool::new(false),
                event_tx,
                store,
                listener: Mutex::new(None),
            }),
        }
    }

    /// Create a session around a pre-built [`CloudClient`].
    ///
    /// Used by tests to point at a mock server.
    pub fn with_client(
        config: SessionConfig,
        client: CloudClient,
        store: Box<dyn StateStore>,
    ) -> Self {
        let session = Self::new(config, store);
        *session
            .inner
            .client
            .write()
            .expect("client lock poisoned") = Some(Arc::new(client));
        session
    }

    /// Subscribe to session state-change notifications.
    ///
    /// Events are delivered on whatever task polls the receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.event_tx.subscribe()
    }

    // ── Authentication ───────────────────────────────────────────────

    /// Log in with username/password.
    ///
    /// On success the device list is populated and a single
    /// [`SessionEvent::AuthenticationChanged`] is emitted. A second
    /// login started while one is in flight fails with
    /// [`CoreError::LoginInProgress`] without touching session state.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), CoreError> {
        if self.inner.login_in_flight.swap(true, Ordering::SeqCst) {
            return Err(CoreError::LoginInProgress);
        }
        let result = self.login_inner(username, password).await;
        self.inner.login_in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn login_inner(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<(), CoreError> {
        let client = self.client()?;

        info!(username, "logging in");
        client.login(username, password).await?;

        let devices: Vec<CloudDevice> = client
            .list_devices()
            .await?
            .into_iter()
            .map(CloudDevice::from)
            .collect();

        {
            let mut state = self.state_mut();
            state.authenticated = true;

            // Refresh the selection from the fresh list. The list
            // endpoint omits functions, so keep the capability flag.
            if let Some(selected) = state.selected.as_mut() {
                if let Some(fresh) = devices.iter().find(|d| d.id == selected.id) {
                    selected.name = fresh.name.clone();
                    selected.reachable = fresh.reachable;
                    selected.has_switch_function |= fresh.has_switch_function;
                }
            }
            state.devices = devices;
        }

        info!("login successful");
        self.emit(SessionEvent::AuthenticationChanged);
        Ok(())
    }

    /// Log out: stop the listener, revoke the token (best effort), and
    /// clear authentication state, device list, and selection.
    ///
    /// Emits [`SessionEvent::AuthenticationChanged`]. The remembered
    /// device id stays persisted so the next login can restore it.
    pub async fn logout(&self) {
        self.stop_listen();

        if let Some(client) = self.current_client() {
            if client.has_token() {
                if let Err(e) = client.revoke_token().await {
                    warn!(error = %e, "token revoke failed, discarding token anyway");
                }
            }
        }

        {
            let mut state = self.state_mut();
            state.authenticated = false;
            state.devices.clear();
            state.selected = None;
        }

        info!("logged out");
        self.emit(SessionEvent::AuthenticationChanged);
    }

    /// Whether a login has completed.
    pub fn is_authenticated(&self) -> bool {
        self.state().authenticated
    }

    // ── Device selection ─────────────────────────────────────────────

    /// Devices known from the last login.
    pub fn available_devices(&self) -> Vec<CloudDevice> {
        self.state().devices.clone()
    }

    /// The currently selected device, if any.
    pub fn selected_device(&self) -> Option<CloudDevice> {
        self.state().selected.clone()
    }

    /// Whether the selected device is currently reachable.
    pub fn device_reachable(&self) -> bool {
        self.state()
            .selected
            .as_ref()
            .is_some_and(|d| d.reachable)
    }

    /// Select a device from the known list and persist the choice.
    ///
    /// Emits [`SessionEvent::SwitchStateChanged`] on success. Fails
    /// with [`CoreError::DeviceNotFound`] for an id that is not in the
    /// device list; the previous selection is untouched.
    pub fn select_device(&self, id: &DeviceId) -> Result<(), CoreError> {
        let device = self
            .state()
            .devices
            .iter()
            .find(|d| &d.id == id)
            .cloned()
            .ok_or_else(|| CoreError::DeviceNotFound { id: id.to_string() })?;

        {
            let mut state = self.state_mut();
            state.selected = Some(device);
            state.persisted_selection = Some(id.clone());
        }
        self.persist()?;

        info!(device_id = %id, "device selected");
        self.emit(SessionEvent::SwitchStateChanged);
        Ok(())
    }

    /// Re-select the device remembered from a previous run.
    ///
    /// When authenticated the device is refreshed from the cloud (the
    /// detail endpoint also reveals whether the switch firmware is
    /// present); otherwise an unreachable placeholder is selected so
    /// the switch bank is usable offline. Idempotent: a repeat call
    /// that changes nothing emits no event.
    pub async fn restore_device(&self) -> Result<(), CoreError> {
        let Some(id) = self.state().persisted_selection.clone() else {
            debug!("no remembered device to restore");
            return Ok(());
        };

        let refreshed = match self.current_client() {
            Some(client) if client.has_token() => match client.get_device(id.as_str()).await {
                Ok(raw) => CloudDevice::from(raw),
                Err(e) => {
                    debug!(error = %e, device_id = %id, "device refresh failed during restore");
                    CloudDevice::restored(id.clone())
                }
            },
            _ => CloudDevice::restored(id.clone()),
        };

        let changed = {
            let mut state = self.state_mut();
            if state.selected.as_ref() == Some(&refreshed) {
                false
            } else {
                state.selected = Some(refreshed);
                true
            }
        };

        if changed {
            debug!(device_id = %id, "restored remembered device");
            self.emit(SessionEvent::SwitchStateChanged);
        }
        Ok(())
    }

    // ── Switch bank ──────────────────────────────────────────────────

    /// Number of switch slots.
    pub fn switch_count(&self) -> usize {
        self.state().bank.len()
    }

    /// Current switch names, in slot order.
    pub fn switch_names(&self) -> Vec<String> {
        self.state().bank.names().to_vec()
    }

    /// Current tristate codes, in slot order.
    pub fn switch_codes(&self) -> Vec<TristateCode> {
        self.state().bank.codes().to_vec()
    }

    /// Rename a switch slot and assign its tristate code, persisting
    /// the bank.
    ///
    /// Emits [`SessionEvent::SwitchStateChanged`] on success. An
    /// out-of-range index fails without mutating anything.
    pub fn update_switch(
        &self,
        index: usize,
        name: impl Into<String>,
        code: TristateCode,
    ) -> Result<(), CoreError> {
        self.state_mut().bank.set(index, name, code)?;
        self.persist()?;

        debug!(index, "switch slot updated");
        self.emit(SessionEvent::SwitchStateChanged);
        Ok(())
    }

    /// Replay the tristate code stored in slot `index` through the
    /// selected device.
    ///
    /// All preconditions are checked before any network call: a valid
    /// index, an authenticated session, a selected and reachable
    /// device, and a non-empty code. No session state is mutated and
    /// no event is emitted; the firmware transmits the code and the
    /// physical switch changes, not our model.
    pub async fn toggle_switch(&self, index: usize) -> Result<(), CoreError> {
        let (device_id, code) = {
            let state = self.state();
            let (_, code) = state.bank.get(index)?;
            if !state.authenticated {
                return Err(CoreError::NotAuthenticated);
            }
            let device = state.selected.as_ref().ok_or(CoreError::NoDeviceSelected)?;
            if !device.reachable {
                return Err(CoreError::DeviceUnreachable {
                    id: device.id.to_string(),
                });
            }
            if code.is_empty() {
                return Err(CoreError::SwitchNotConfigured { index });
            }
            (device.id.clone(), code.clone())
        };

        let client = self.current_client().ok_or(CoreError::NotAuthenticated)?;

        debug!(index, device_id = %device_id, code = %code, "toggling switch");
        client
            .call_function(device_id.as_str(), SWITCH_FUNCTION, code.as_str())
            .await?;

        info!(index, "switch toggled");
        Ok(())
    }

    // ── RF code listener ─────────────────────────────────────────────

    /// Start listening for RF codes published by the selected device.
    ///
    /// Received codes arrive as [`SessionEvent::CodeReceived`]. A
    /// second call while a listener is active is a no-op; the running
    /// stream keeps its connection.
    pub fn start_listen(&self) -> Result<(), CoreError> {
        let mut guard = self.inner.listener.lock().expect("listener lock poisoned");
        if guard.is_some() {
            debug!("listener already active");
            return Ok(());
        }

        let device_id = {
            let state = self.state();
            if !state.authenticated {
                return Err(CoreError::NotAuthenticated);
            }
            state
                .selected
                .as_ref()
                .ok_or(CoreError::NoDeviceSelected)?
                .id
                .clone()
        };

        let client = self.current_client().ok_or(CoreError::NotAuthenticated)?;
        let token = client.token().ok_or(CoreError::NotAuthenticated)?;

        let url = client
            .base_url()
            .join(&format!(
                "v1/devices/{device_id}/events/{CODE_EVENT_PREFIX}"
            ))
            .map_err(|e| CoreError::ConnectionFailed {
                reason: format!("invalid event stream URL: {e}"),
            })?;

        let http = self
            .inner
            .config
            .transport
            .build_streaming_client()
            .map_err(CoreError::from)?;

        let cancel = CancellationToken::new();
        let handle = EventStreamHandle::connect(
            http,
            url,
            token,
            self.inner.config.reconnect.clone(),
            cancel.clone(),
        );

        // Bridge raw stream events into session notifications.
        let mut stream_rx = handle.subscribe();
        let event_tx = self.inner.event_tx.clone();
        let bridge_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = bridge_cancel.cancelled() => break,
                    event = stream_rx.recv() => match event {
                        Ok(event) => {
                            if !event.event.starts_with(CODE_EVENT_PREFIX) {
                                continue;
                            }
                            match TristateCode::parse(&event.data) {
                                Ok(code) => {
                                    debug!(code = %code, "RF code received");
                                    let _ = event_tx.send(SessionEvent::CodeReceived(code));
                                }
                                Err(e) => {
                                    warn!(error = %e, data = %event.data, "ignoring malformed RF code");
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "RF code bridge lagged behind the stream");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            debug!("RF code bridge exiting");
        });

        info!(device_id = %device_id, "RF listener started");
        *guard = Some(Listener { cancel });
        Ok(())
    }

    /// Stop the RF listener. A no-op when none is running.
    pub fn stop_listen(&self) {
        if let Some(listener) = self
            .inner
            .listener
            .lock()
            .expect("listener lock poisoned")
            .take()
        {
            listener.cancel.cancel();
            info!("RF listener stopped");
        }
    }

    /// Whether the RF listener is currently active.
    pub fn is_listening(&self) -> bool {
        self.inner
            .listener
            .lock()
            .expect("listener lock poisoned")
            .is_some()
    }

    // ── One-shot mode ────────────────────────────────────────────────

    /// Login, run `f`, logout. For single-command consumers that do
    /// not keep a session alive.
    ///
    /// Logout runs whether `f` succeeded or failed.
    pub async fn oneshot<F, Fut, T>(
        config: SessionConfig,
        store: Box<dyn StateStore>,
        username: &str,
        password: &SecretString,
        f: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let session = Session::new(config, store);
        session.login(username, password).await?;
        let result = f(session.clone()).await;
        session.logout().await;
        result
    }

    // ── Internals ────────────────────────────────────────────────────

    /// The cloud client, building it on first use.
    fn client(&self) -> Result<Arc<CloudClient>, CoreError> {
        if let Some(client) = self.current_client() {
            return Ok(client);
        }
        let mut guard = self.inner.client.write().expect("client lock poisoned");
        // Double-checked: another clone may have built it meanwhile.
        if let Some(client) = guard.as_ref() {
            return Ok(Arc::clone(client));
        }
        let client = Arc::new(CloudClient::new(
            self.inner.config.api_url.clone(),
            &self.inner.config.transport,
        )?);
        *guard = Some(Arc::clone(&client));
        Ok(client)
    }

    fn current_client(&self) -> Option<Arc<CloudClient>> {
        self.inner
            .client
            .read()
            .expect("client lock poisoned")
            .as_ref()
            .map(Arc::clone)
    }

    fn state(&self) -> std::sync::RwLockReadGuard<'_, SessionState> {
        self.inner.state.read().expect("state lock poisoned")
    }

    fn state_mut(&self) -> std::sync::RwLockWriteGuard<'_, SessionState> {
        self.inner.state.write().expect("state lock poisoned")
    }

    /// Write the remembered device id and switch bank to the store.
    fn persist(&self) -> Result<(), CoreError> {
        let saved = {
            let state = self.state();
            SavedState {
                selected_device: state.persisted_selection.clone(),
                bank: state.bank.clone(),
            }
        };
        self.inner.store.save(&saved)
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.inner.event_tx.send(event);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Session")
            .field("authenticated", &state.authenticated)
            .field("devices", &state.devices.len())
            .field("selected", &state.selected.as_ref().map(|d| d.id.as_str()))
            .field("listening", &self.is_listening())
            .finish_non_exhaustive()
    }
}
