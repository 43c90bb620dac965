//! walletmux
//!
//! Unified adapter over browser-injected Bitcoin wallet backends.
//!
//! # Architecture
//!
//! This crate provides:
//! - **capability**: host-environment probing for installed backends
//! - **network**: per-backend network vocabulary normalization
//! - **roles**: identity/payment address role resolution
//! - **session**: the single provider session value and its handle
//! - **backend**: one driver per wallet backend behind a shared trait
//! - **mux**: the connection orchestrator the UI layer talks to
//! - **events**: folding of backend change notifications into the session
//! - **psbt**: signing-request parsing and input-ownership classification
//!
//! # Boundary
//!
//! This is a library boundary, not a service boundary: no listener, no
//! CLI, no file format. The host injects the raw backend transports
//! (one trait per backend under [`backend`]) and a best-effort
//! [`PreferenceStore`]; everything above that line lives here. Signing
//! itself always happens inside the external wallet backend.
//!
//! # Example
//!
//! ```rust,ignore
//! use walletmux::{Backend, WalletMux};
//!
//! let mut mux = WalletMux::new(&probe, store);
//! mux.register(std::sync::Arc::new(unisat_driver));
//! let session = mux.connect(Backend::Unisat).await?;
//! println!("identity address: {}", session.identity_address);
//! ```

pub mod backend;
pub mod capability;
pub mod completion;
pub mod error;
pub mod events;
pub mod logging;
pub mod mux;
pub mod network;
pub mod psbt;
pub mod roles;
pub mod session;
pub mod storage;
pub mod types;

// Re-export key types for convenience
pub use error::{ErrorKind, MuxError, MuxResult, Severity};
pub use types::{
    AddressKind, AddressPurpose, Backend, Balance, InputOwnership, Inscription, Network,
    RawAddress, ResolvedRoles, SignOutcome, SignRequest, SigningPhase,
};

pub use capability::{CapabilityTable, HostProbe, StaticProbe};
pub use mux::{MuxConfig, WalletMux};
pub use session::{ProviderSession, SessionHandle};
pub use storage::{MemoryStore, PreferenceStore, BACKEND_KEY, NETWORK_KEY};

pub use backend::{
    BackendEvent, ConnectOutcome, LeatherApi, LeatherBackend, OylApi, OylBackend, SigningContext,
    UnisatApi, UnisatBackend, WalletBackend, XverseApi, XverseBackend,
};
pub use completion::{completion, Completion, CompletionError, CompletionFuture};
pub use events::EventBridge;

// Re-export the pure helpers used directly by tests and thin hosts
pub use network::{to_native, to_shared};
pub use roles::resolve_roles;
