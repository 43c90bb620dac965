//! Provider session state
//!
//! One session value describes the currently active backend connection.
//! Mutation discipline: only the connection orchestrator and the event
//! bridge write, always by whole-object replacement, so a reader can
//! never observe a half-updated combination of fields.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{MuxError, MuxResult};
use crate::types::{Backend, Balance, Network};

/// Connection state for the active wallet backend.
///
/// Created empty at process start, populated atomically by a successful
/// connect, and cleared entirely on disconnect or failed connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSession {
    pub connected: bool,
    pub connecting: bool,
    pub backend: Option<Backend>,
    pub accounts: Vec<String>,
    pub identity_address: String,
    pub payment_address: String,
    pub identity_public_key: String,
    pub payment_public_key: String,
    pub balance: Balance,
    pub network: Network,
}

impl ProviderSession {
    /// The empty lifecycle state under a given base network.
    pub fn empty(network: Network) -> Self {
        Self {
            connected: false,
            connecting: false,
            backend: None,
            accounts: Vec::new(),
            identity_address: String::new(),
            payment_address: String::new(),
            identity_public_key: String::new(),
            payment_public_key: String::new(),
            balance: Balance::default(),
            network,
        }
    }

    /// Primary account, when any account is known.
    pub fn primary_account(&self) -> Option<&str> {
        self.accounts.first().map(String::as_str)
    }
}

/// Shared handle over the single session value.
///
/// The generation counter increases on every commit and clear; in-flight
/// operations capture it before a backend call and check it after, so a
/// result can be discarded instead of landing on a replaced session.
#[derive(Debug)]
pub struct SessionHandle {
    state: RwLock<ProviderSession>,
    generation: AtomicU64,
    base_network: Network,
}

impl SessionHandle {
    pub fn new(base_network: Network) -> Self {
        Self {
            state: RwLock::new(ProviderSession::empty(base_network)),
            generation: AtomicU64::new(0),
            base_network,
        }
    }

    /// Clone of the current session value.
    pub fn snapshot(&self) -> ProviderSession {
        self.state.read().unwrap().clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Replace the session wholesale and advance the generation.
    pub fn commit(&self, session: ProviderSession) {
        let mut state = self.state.write().unwrap();
        *state = session;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Reset to the empty lifecycle state and advance the generation.
    /// Idempotent.
    pub fn clear(&self) {
        self.commit(ProviderSession::empty(self.base_network));
    }

    /// Replace the session only if no commit happened since `generation`
    /// was captured. Returns whether the replacement landed.
    pub fn replace_if_current(&self, generation: u64, session: ProviderSession) -> bool {
        let mut state = self.state.write().unwrap();
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        *state = session;
        self.generation.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Fail with `NoActiveSession` when the session was replaced under an
    /// in-flight operation.
    pub fn ensure_current(&self, generation: u64) -> MuxResult<()> {
        if self.generation() == generation {
            Ok(())
        } else {
            Err(MuxError::NoActiveSession)
        }
    }

    /// Atomically claim the in-flight connect slot. Returns `false` when
    /// another connect is already in flight.
    pub fn begin_connect(&self) -> bool {
        let mut state = self.state.write().unwrap();
        if state.connecting {
            return false;
        }
        let mut next = state.clone();
        next.connecting = true;
        *state = next;
        true
    }

    /// Drop the connecting flag without touching the generation. Used by
    /// the guaranteed-cleanup path of connect.
    pub fn end_connect(&self) {
        let mut state = self.state.write().unwrap();
        if state.connecting {
            let mut next = state.clone();
            next.connecting = false;
            *state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_and_clear_round_trip() {
        let handle = SessionHandle::new(Network::Mainnet);
        let empty = handle.snapshot();
        assert!(!empty.connected);

        let mut session = ProviderSession::empty(Network::Mainnet);
        session.connected = true;
        session.backend = Some(Backend::Unisat);
        session.accounts = vec!["bc1q-a".into()];
        handle.commit(session.clone());
        assert_eq!(handle.snapshot(), session);

        handle.clear();
        assert_eq!(handle.snapshot(), empty);
    }

    #[test]
    fn test_generation_advances_on_commit_and_clear() {
        let handle = SessionHandle::new(Network::Mainnet);
        let g0 = handle.generation();
        handle.commit(ProviderSession::empty(Network::Mainnet));
        handle.clear();
        assert_eq!(handle.generation(), g0 + 2);
    }

    #[test]
    fn test_stale_generation_is_detected() {
        let handle = SessionHandle::new(Network::Mainnet);
        let generation = handle.generation();
        assert!(handle.ensure_current(generation).is_ok());
        handle.clear();
        assert!(matches!(
            handle.ensure_current(generation),
            Err(MuxError::NoActiveSession)
        ));
        assert!(!handle.replace_if_current(generation, ProviderSession::empty(Network::Mainnet)));
    }

    #[test]
    fn test_single_connect_slot() {
        let handle = SessionHandle::new(Network::Mainnet);
        assert!(handle.begin_connect());
        assert!(!handle.begin_connect());
        handle.end_connect();
        assert!(handle.begin_connect());
    }

    #[test]
    fn test_connecting_flag_does_not_move_generation() {
        let handle = SessionHandle::new(Network::Mainnet);
        let generation = handle.generation();
        handle.begin_connect();
        handle.end_connect();
        assert_eq!(handle.generation(), generation);
    }
}
