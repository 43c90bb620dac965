//! Connection orchestrator
//!
//! `WalletMux` is the single entry point the UI layer talks to. It owns
//! the provider session, gates every backend behind the capability
//! table, funnels each operation to the active driver, and guarantees
//! connect/rollback atomicity: a failed connect leaves the session
//! exactly empty, never partially populated.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use crate::backend::{SigningContext, WalletBackend};
use crate::capability::{CapabilityTable, HostProbe};
use crate::error::{MuxError, MuxResult, Severity};
use crate::events::{refresh_basic_info, EventBridge};
use crate::session::{ProviderSession, SessionHandle};
use crate::storage::{PreferenceStore, BACKEND_KEY, NETWORK_KEY};
use crate::types::{
    Backend, Balance, Inscription, Network, SignOutcome, SignRequest, SigningPhase,
};
use crate::{log_debug, log_warn};

/// Construction options for [`WalletMux`].
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Network used before any preference or backend reports one.
    pub network: Network,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
        }
    }
}

/// The unified wallet adapter.
///
/// All session mutation funnels through here (and through the event
/// bridge it spawns); every other component reads.
pub struct WalletMux {
    capabilities: CapabilityTable,
    drivers: BTreeMap<Backend, Arc<dyn WalletBackend>>,
    session: Arc<SessionHandle>,
    store: Arc<dyn PreferenceStore>,
    bridge_task: Mutex<Option<JoinHandle<()>>>,
}

// Clears the connecting flag on every connect exit path, including
// panics inside a driver handshake.
struct ConnectingGuard<'a> {
    session: &'a SessionHandle,
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.session.end_connect();
    }
}

impl WalletMux {
    pub fn new(probe: &dyn HostProbe, store: Arc<dyn PreferenceStore>) -> Self {
        Self::with_config(probe, store, MuxConfig::default())
    }

    pub fn with_config(
        probe: &dyn HostProbe,
        store: Arc<dyn PreferenceStore>,
        config: MuxConfig,
    ) -> Self {
        let capabilities = CapabilityTable::detect(probe);
        // A persisted network survives reloads and wins over the config
        // default.
        let network = store
            .get(NETWORK_KEY)
            .and_then(|s| s.parse().ok())
            .unwrap_or(config.network);
        Self {
            capabilities,
            drivers: BTreeMap::new(),
            session: Arc::new(SessionHandle::new(network)),
            store,
            bridge_task: Mutex::new(None),
        }
    }

    /// Register a backend driver, keyed by its identity.
    pub fn register(&mut self, driver: Arc<dyn WalletBackend>) {
        self.drivers.insert(driver.id(), driver);
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    /// Read-only snapshot of the provider session.
    pub fn session(&self) -> ProviderSession {
        self.session.snapshot()
    }

    pub fn active_backend(&self) -> Option<Backend> {
        self.session.snapshot().backend
    }

    // =========================================================================
    // Connection lifecycle
    // =========================================================================

    /// Connect to a backend. On success the session is committed as one
    /// fully-populated value; on any failure it is cleared back to empty
    /// and the error carries the cause.
    pub async fn connect(&self, backend: Backend) -> MuxResult<ProviderSession> {
        if !self.capabilities.is_installed(backend) {
            return Err(MuxError::BackendAbsent { backend });
        }
        let driver = self
            .drivers
            .get(&backend)
            .cloned()
            .ok_or(MuxError::BackendAbsent { backend })?;

        // At most one connect in flight; a second caller is rejected
        // rather than interleaved with a half-committed session.
        if !self.session.begin_connect() {
            return Err(MuxError::Connection {
                backend,
                cause: anyhow::anyhow!("another connect is already in flight"),
            });
        }
        let _guard = ConnectingGuard {
            session: &self.session,
        };

        log_debug!("mux", "connecting", backend = backend);
        let network = self.session.snapshot().network;
        match driver.connect(network).await {
            Ok(outcome) => {
                let session = ProviderSession {
                    connected: true,
                    connecting: false,
                    backend: Some(backend),
                    accounts: outcome.accounts,
                    identity_address: outcome.identity_address,
                    payment_address: outcome.payment_address,
                    identity_public_key: outcome.identity_public_key,
                    payment_public_key: outcome.payment_public_key,
                    balance: outcome.balance,
                    network: outcome.network,
                };
                self.session.commit(session.clone());
                self.store.set(BACKEND_KEY, backend.as_str());
                self.store.set(NETWORK_KEY, session.network.as_str());
                self.spawn_bridge(&driver);
                log_debug!(
                    "mux",
                    "connected",
                    backend = backend,
                    identity_address = session.identity_address
                );
                Ok(session)
            }
            Err(err) => {
                self.session.clear();
                log_debug!("mux", "connect failed, session rolled back", backend = backend);
                Err(connect_error(backend, err))
            }
        }
    }

    /// Tear down the session and forget the persisted backend. Safe to
    /// call when already disconnected.
    pub fn disconnect(&self) {
        if let Some(task) = self.bridge_task.lock().unwrap().take() {
            task.abort();
        }
        self.session.clear();
        self.store.remove(BACKEND_KEY);
        log_debug!("mux", "disconnected");
    }

    /// Re-establish the last used backend after a host reload.
    /// Best-effort: any failure leaves the session empty and is not
    /// surfaced to the caller.
    pub async fn reconnect_from_preference(&self) -> Option<ProviderSession> {
        let backend = self.store.get(BACKEND_KEY)?.parse::<Backend>().ok()?;
        match self.connect(backend).await {
            Ok(session) => Some(session),
            Err(err) => {
                log_debug!(
                    "mux",
                    "best-effort reconnect failed",
                    backend = backend,
                    error = err
                );
                None
            }
        }
    }

    /// Switch the active backend to another network, then rebuild the
    /// session wholesale under it.
    pub async fn switch_network(&self, network: Network) -> MuxResult<ProviderSession> {
        let (driver, generation, snapshot) = self.active()?;
        driver.switch_network(network).await?;

        let mut next = snapshot;
        next.network = network;
        let next = refresh_basic_info(&driver, next).await;
        if !self.session.replace_if_current(generation, next.clone()) {
            return Err(MuxError::NoActiveSession);
        }
        self.store.set(NETWORK_KEY, next.network.as_str());
        Ok(next)
    }

    // =========================================================================
    // Pass-through operations
    // =========================================================================

    pub async fn request_accounts(&self) -> MuxResult<Vec<String>> {
        let (driver, generation, _) = self.active()?;
        let accounts = driver.request_accounts().await?;
        self.session.ensure_current(generation)?;
        Ok(accounts)
    }

    pub async fn get_network(&self) -> MuxResult<Network> {
        let (driver, generation, _) = self.active()?;
        let network = driver.get_network().await?;
        self.session.ensure_current(generation)?;
        Ok(network)
    }

    pub async fn get_public_key(&self) -> MuxResult<String> {
        let (driver, generation, _) = self.active()?;
        let public_key = driver.get_public_key().await?;
        self.session.ensure_current(generation)?;
        Ok(public_key)
    }

    /// Query the backend's balance without touching the session.
    pub async fn get_balance(&self) -> MuxResult<Balance> {
        let (driver, generation, _) = self.active()?;
        let balance = driver.get_balance().await?;
        self.session.ensure_current(generation)?;
        Ok(balance)
    }

    /// Query the balance and fold it into the session.
    pub async fn refresh_balance(&self) -> MuxResult<Balance> {
        let (driver, generation, mut snapshot) = self.active()?;
        let balance = driver.get_balance().await?;
        snapshot.balance = balance;
        if !self.session.replace_if_current(generation, snapshot) {
            return Err(MuxError::NoActiveSession);
        }
        Ok(balance)
    }

    pub async fn get_inscriptions(&self, offset: u32, limit: u32) -> MuxResult<Vec<Inscription>> {
        let (driver, generation, _) = self.active()?;
        let inscriptions = driver.get_inscriptions(offset, limit).await?;
        self.session.ensure_current(generation)?;
        Ok(inscriptions)
    }

    pub async fn send_bitcoin(&self, to: &str, sats: u64) -> MuxResult<String> {
        let (driver, generation, _) = self.active()?;
        let result = driver.send_bitcoin(to, sats).await;
        self.session.ensure_current(generation)?;
        if result.is_err() {
            log_warn!("mux", "send failed", backend = driver.id(), recipient = to);
        }
        result
    }

    pub async fn sign_message(&self, message: &str) -> MuxResult<String> {
        let (driver, generation, _) = self.active()?;
        let result = driver.sign_message(message).await;
        self.session.ensure_current(generation)?;
        if let Err(err) = &result {
            if err.severity() == Severity::Error {
                log_warn!("mux", "message signing failed", backend = driver.id());
            }
        }
        result
    }

    /// Sign (and optionally finalize/broadcast) a PSBT through the
    /// active backend. Never mutates the session.
    pub async fn sign_psbt(&self, request: &SignRequest) -> MuxResult<SignOutcome> {
        let (driver, generation, snapshot) = self.active()?;
        let ctx = SigningContext::from_session(&snapshot)?;

        log_debug!(
            "mux",
            "psbt signing",
            backend = driver.id(),
            phase = SigningPhase::Requesting
        );
        let result = driver.sign_psbt(request, &ctx).await;
        // A disconnect or reconnect underneath makes the result stale;
        // discard it instead of handing it to the caller.
        self.session.ensure_current(generation)?;

        let phase = SigningPhase::from_result(&result);
        match &result {
            Err(err) if err.severity() == Severity::Error => {
                log_warn!("mux", "psbt signing failed", backend = driver.id(), phase = phase);
            }
            _ => {
                log_debug!("mux", "psbt signing finished", backend = driver.id(), phase = phase);
            }
        }
        result
    }

    /// Broadcast a signed transaction. Never mutates the session
    /// balance; callers refresh explicitly.
    pub async fn push_psbt(&self, signed_hex: &str) -> MuxResult<String> {
        let (driver, generation, _) = self.active()?;
        let txid = driver.push_psbt(signed_hex).await?;
        self.session.ensure_current(generation)?;
        Ok(txid)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn active(&self) -> MuxResult<(Arc<dyn WalletBackend>, u64, ProviderSession)> {
        let snapshot = self.session.snapshot();
        if !snapshot.connected {
            return Err(MuxError::NoActiveSession);
        }
        let backend = snapshot.backend.ok_or(MuxError::NoActiveSession)?;
        let driver = self
            .drivers
            .get(&backend)
            .cloned()
            .ok_or(MuxError::BackendAbsent { backend })?;
        Ok((driver, self.session.generation(), snapshot))
    }

    fn spawn_bridge(&self, driver: &Arc<dyn WalletBackend>) {
        let mut slot = self.bridge_task.lock().unwrap();
        if let Some(task) = slot.take() {
            task.abort();
        }
        if let Some(events) = driver.take_events() {
            let bridge = EventBridge::new(driver.clone(), self.session.clone(), self.store.clone());
            *slot = Some(tokio::spawn(bridge.run(events)));
        }
    }
}

/// Wrap a handshake failure so it always carries the backend and cause.
/// Cancellation and role-resolution failures keep their own kinds.
fn connect_error(backend: Backend, err: MuxError) -> MuxError {
    match err {
        MuxError::UserCancelled | MuxError::RoleResolution(_) | MuxError::Connection { .. } => err,
        other => MuxError::Connection {
            backend,
            cause: anyhow::Error::new(other),
        },
    }
}
