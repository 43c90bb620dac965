//! Shared types for walletmux
//!
//! All data structures that cross module boundaries are defined here
//! for consistent serialization toward the UI layer.

use serde::{Deserialize, Serialize};

// =============================================================================
// Backend identity
// =============================================================================

/// Supported wallet backends
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Oyl,
    Unisat,
    Xverse,
    Leather,
}

impl Backend {
    /// Every backend this crate knows about, in registry order.
    pub const ALL: [Backend; 4] = [
        Backend::Oyl,
        Backend::Unisat,
        Backend::Xverse,
        Backend::Leather,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Oyl => "oyl",
            Backend::Unisat => "unisat",
            Backend::Xverse => "xverse",
            Backend::Leather => "leather",
        }
    }

    /// Whether this backend completes requests through registered callbacks
    /// rather than returned futures.
    pub fn is_callback_style(&self) -> bool {
        matches!(self, Backend::Xverse)
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "oyl" => Ok(Backend::Oyl),
            "unisat" => Ok(Backend::Unisat),
            "xverse" => Ok(Backend::Xverse),
            "leather" => Ok(Backend::Leather),
            _ => Err(format!("Unknown backend: {}", s)),
        }
    }
}

// =============================================================================
// Network
// =============================================================================

/// Shared network model across all backends
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    pub const ALL: [Network; 3] = [Network::Mainnet, Network::Testnet, Network::Regtest];

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        }
    }

    pub fn is_testnet(&self) -> bool {
        !matches!(self, Network::Mainnet)
    }

    /// Network parameters used for script and address decoding.
    pub fn to_bitcoin(&self) -> bitcoin::Network {
        match self {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" | "livenet" | "bitcoin" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "regtest" | "regression" => Ok(Network::Regtest),
            _ => Err(format!("Unknown network: {}", s)),
        }
    }
}

// =============================================================================
// Addresses and roles
// =============================================================================

/// Script kind a backend declares for an address entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    P2tr,
    P2wpkh,
    P2sh,
    P2pkh,
}

impl std::str::FromStr for AddressKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "p2tr" | "taproot" => Ok(AddressKind::P2tr),
            "p2wpkh" | "segwit" => Ok(AddressKind::P2wpkh),
            "p2sh" => Ok(AddressKind::P2sh),
            "p2pkh" => Ok(AddressKind::P2pkh),
            _ => Err(format!("Unknown address kind: {}", s)),
        }
    }
}

/// Role a backend declares for an address entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressPurpose {
    Ordinals,
    Payment,
}

/// One address entry as returned by a backend handshake.
///
/// Backends disagree on which of `kind` and `purpose` they populate;
/// role resolution accepts either marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAddress {
    pub address: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub kind: Option<AddressKind>,
    #[serde(default)]
    pub purpose: Option<AddressPurpose>,
}

/// Outcome of address role resolution: exactly one address per role.
/// A backend may legitimately supply the same address for both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoles {
    pub identity: RawAddress,
    pub payment: RawAddress,
}

// =============================================================================
// Balance
// =============================================================================

/// Wallet balance in satoshis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub confirmed: u64,
    pub unconfirmed: u64,
    pub total: u64,
}

impl Balance {
    pub fn new(confirmed: u64, unconfirmed: u64) -> Self {
        Self {
            confirmed,
            unconfirmed,
            total: confirmed + unconfirmed,
        }
    }
}

// =============================================================================
// Signing
// =============================================================================

/// A request to sign a partially-signed transaction.
///
/// `raw` accepts the PSBT in either hex or base64 encoding; transient,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignRequest {
    pub raw: String,
    pub finalize: bool,
    pub broadcast: bool,
}

impl SignRequest {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            finalize: false,
            broadcast: false,
        }
    }

    pub fn with_finalize(mut self, finalize: bool) -> Self {
        self.finalize = finalize;
        self
    }

    pub fn with_broadcast(mut self, broadcast: bool) -> Self {
        self.broadcast = broadcast;
        self
    }
}

/// Result of a signing request.
///
/// A broadcast result never carries byte encodings that predate the
/// broadcast; when a backend reports only a transaction id, the encodings
/// are absent rather than stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SignOutcome {
    /// Signed (and possibly finalized) but not broadcast.
    Signed { hex: String, base64: String },
    /// Broadcast by the backend. Encodings are present only when the
    /// backend returned the signed bytes alongside the id.
    Broadcast {
        txid: String,
        hex: Option<String>,
        base64: Option<String>,
    },
}

impl SignOutcome {
    pub fn txid(&self) -> Option<&str> {
        match self {
            SignOutcome::Signed { .. } => None,
            SignOutcome::Broadcast { txid, .. } => Some(txid),
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, SignOutcome::Broadcast { .. })
    }
}

/// Ownership hint for one signing address: which input indices it funds.
/// Derived per request, in ascending index order; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputOwnership {
    pub address: String,
    pub indices: Vec<usize>,
}

/// Lifecycle of a single signing attempt.
///
/// `Cancelled` is a clean user action, distinct from `Failed`; callers
/// must not surface it at error severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningPhase {
    Idle,
    Requesting,
    Signed,
    Cancelled,
    Failed,
}

impl SigningPhase {
    /// Terminal phase for a finished signing attempt.
    pub fn from_result<T>(result: &crate::error::MuxResult<T>) -> Self {
        match result {
            Ok(_) => SigningPhase::Signed,
            Err(crate::error::MuxError::UserCancelled) => SigningPhase::Cancelled,
            Err(_) => SigningPhase::Failed,
        }
    }
}

impl std::fmt::Display for SigningPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SigningPhase::Idle => "idle",
            SigningPhase::Requesting => "requesting",
            SigningPhase::Signed => "signed",
            SigningPhase::Cancelled => "cancelled",
            SigningPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Inscriptions
// =============================================================================

/// An inscription as listed by an inscription-capable backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inscription {
    /// Inscription ID (txid + index format)
    pub id: String,
    /// Inscription number
    pub number: u64,
    /// Content type (MIME type)
    pub content_type: String,
    /// Content length in bytes
    pub content_length: u64,
    /// Current output (txid:vout)
    pub output: String,
    /// Current owner address
    pub address: Option<String>,
}

impl Inscription {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn is_text(&self) -> bool {
        self.content_type.starts_with("text/") || self.content_type == "application/json"
    }
}
