//! Event bridge
//!
//! Folds backend-emitted account and network change notifications back
//! into the provider session. Every fold is a whole-session rebuild and
//! commit, never a field patch, so dependent fields (balance, public
//! key) can never pair with a network they were not fetched under.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::backend::{BackendEvent, WalletBackend};
use crate::log_debug;
use crate::network::to_shared;
use crate::session::{ProviderSession, SessionHandle};
use crate::storage::{PreferenceStore, NETWORK_KEY};

/// Re-derive the session fields that depend on backend state: public
/// key, balance, and (when the backend can answer) the live network.
/// Best-effort; a field whose fetch fails keeps a neutral value rather
/// than a stale cross-network one.
pub(crate) async fn refresh_basic_info(
    driver: &Arc<dyn WalletBackend>,
    mut session: ProviderSession,
) -> ProviderSession {
    if let Ok(public_key) = driver.get_public_key().await {
        session.identity_public_key = public_key.clone();
        session.payment_public_key = public_key;
    }
    session.balance = driver.get_balance().await.unwrap_or_default();
    if let Ok(network) = driver.get_network().await {
        session.network = network;
    }
    session
}

/// Subscribes to one connected backend and folds its notifications into
/// the shared session.
pub struct EventBridge {
    driver: Arc<dyn WalletBackend>,
    session: Arc<SessionHandle>,
    store: Arc<dyn PreferenceStore>,
}

impl EventBridge {
    pub fn new(
        driver: Arc<dyn WalletBackend>,
        session: Arc<SessionHandle>,
        store: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self {
            driver,
            session,
            store,
        }
    }

    /// Drain the notification stream until the backend closes it.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<BackendEvent>) {
        while let Some(event) = events.recv().await {
            self.apply(event).await;
        }
    }

    /// Fold a single notification into the session.
    pub async fn apply(&self, event: BackendEvent) {
        match event {
            BackendEvent::AccountsChanged(accounts) => self.on_accounts_changed(accounts).await,
            BackendEvent::NetworkChanged(native) => self.on_network_changed(&native).await,
        }
    }

    async fn on_accounts_changed(&self, accounts: Vec<String>) {
        let snapshot = self.session.snapshot();
        if !snapshot.connected {
            return;
        }
        // Some backends emit spurious repeats of the current account.
        if accounts.first().map(String::as_str) == snapshot.primary_account() {
            return;
        }
        if accounts.is_empty() {
            log_debug!("events", "backend dropped all accounts, clearing session");
            self.session.clear();
            return;
        }

        // A different primary account is a fresh connection in all but
        // name: rebuild the session from scratch.
        let primary = accounts[0].clone();
        log_debug!("events", "primary account changed", account = primary);
        let mut next = snapshot;
        next.accounts = accounts;
        next.identity_address = primary.clone();
        next.payment_address = primary;
        let next = refresh_basic_info(&self.driver, next).await;
        self.session.commit(next);
    }

    async fn on_network_changed(&self, native: &str) {
        let snapshot = self.session.snapshot();
        if !snapshot.connected {
            return;
        }
        let network = to_shared(self.driver.id(), native);
        log_debug!("events", "backend switched network", network = network);

        let mut next = snapshot;
        next.network = network;
        let next = refresh_basic_info(&self.driver, next).await;
        let committed_network = next.network;
        self.session.commit(next);
        self.store.set(NETWORK_KEY, committed_network.as_str());
    }
}
