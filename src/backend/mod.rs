//! Backend drivers
//!
//! One driver per wallet backend, all implementing the shared
//! [`WalletBackend`] contract. Capabilities are independently optional:
//! the default body of every operation reports it unsupported, and a
//! driver overrides exactly what its backend can do. Raw transport
//! traits (the host-injected globals) live in each driver module.

pub mod leather;
pub mod oyl;
pub mod unisat;
pub mod xverse;

pub use leather::{LeatherApi, LeatherBackend};
pub use oyl::{OylApi, OylBackend, OylSignedPsbt};
pub use unisat::{UnisatApi, UnisatBackend};
pub use xverse::{
    AddressRequest, AddressResponse, XverseApi, XverseBackend, XverseSignRequest,
    XverseSignResponse,
};

use async_trait::async_trait;
use bitcoin::Address;
use tokio::sync::mpsc;

use crate::error::{MuxError, MuxResult};
use crate::psbt::checked_address;
use crate::session::ProviderSession;
use crate::types::{Backend, Balance, Inscription, Network, SignOutcome, SignRequest};

/// Fully-populated result of a backend handshake, committed into the
/// provider session as one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub accounts: Vec<String>,
    pub identity_address: String,
    pub payment_address: String,
    pub identity_public_key: String,
    pub payment_public_key: String,
    pub balance: Balance,
    pub network: Network,
}

/// Session context a signing call runs under: both role addresses pinned
/// to the active network.
#[derive(Debug, Clone)]
pub struct SigningContext {
    pub identity: Address,
    pub payment: Address,
    pub network: Network,
}

impl SigningContext {
    /// Build from a connected session, validating that both role
    /// addresses decode under the session's active network.
    pub fn from_session(session: &ProviderSession) -> MuxResult<Self> {
        let identity = checked_address(&session.identity_address, session.network)?;
        let payment = checked_address(&session.payment_address, session.network)?;
        Ok(Self {
            identity,
            payment,
            network: session.network,
        })
    }
}

/// Notification emitted by a backend after connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// The account list changed; first entry is the new primary.
    AccountsChanged(Vec<String>),
    /// The backend switched networks; payload is its native token.
    NetworkChanged(String),
}

/// The shared capability contract every backend driver implements.
///
/// Operations a backend lacks keep the default body and surface as
/// `UnsupportedOperation`, uniformly, rather than being absent from the
/// interface.
#[async_trait]
pub trait WalletBackend: Send + Sync {
    fn id(&self) -> Backend;

    /// Backend-specific handshake. Must return a fully-populated outcome
    /// or fail; there is no partial success.
    async fn connect(&self, network: Network) -> MuxResult<ConnectOutcome>;

    async fn request_accounts(&self) -> MuxResult<Vec<String>> {
        Err(self.unsupported("requestAccounts"))
    }

    async fn get_network(&self) -> MuxResult<Network> {
        Err(self.unsupported("getNetwork"))
    }

    async fn switch_network(&self, _network: Network) -> MuxResult<()> {
        Err(self.unsupported("switchNetwork"))
    }

    async fn get_public_key(&self) -> MuxResult<String> {
        Err(self.unsupported("getPublicKey"))
    }

    async fn get_balance(&self) -> MuxResult<Balance> {
        Err(self.unsupported("getBalance"))
    }

    async fn get_inscriptions(&self, _offset: u32, _limit: u32) -> MuxResult<Vec<Inscription>> {
        Err(self.unsupported("getInscriptions"))
    }

    async fn send_bitcoin(&self, _to: &str, _sats: u64) -> MuxResult<String> {
        Err(self.unsupported("sendBitcoin"))
    }

    async fn sign_message(&self, _message: &str) -> MuxResult<String> {
        Err(self.unsupported("signMessage"))
    }

    async fn sign_psbt(
        &self,
        _request: &SignRequest,
        _ctx: &SigningContext,
    ) -> MuxResult<SignOutcome> {
        Err(self.unsupported("signPsbt"))
    }

    async fn push_psbt(&self, _psbt_hex: &str) -> MuxResult<String> {
        Err(self.unsupported("pushPsbt"))
    }

    /// Hand over the backend's change-notification stream, if it emits
    /// one. Yields at most once.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<BackendEvent>> {
        None
    }

    /// Typed rejection for an operation this backend lacks.
    fn unsupported(&self, operation: &'static str) -> MuxError {
        MuxError::UnsupportedOperation {
            backend: self.id(),
            operation,
        }
    }
}

/// Funnel a raw transport failure into the adapter taxonomy.
pub(crate) fn request_failed(backend: Backend, cause: anyhow::Error) -> MuxError {
    MuxError::RequestFailed { backend, cause }
}
