//! Network normalization
//!
//! Each backend names networks in its own vocabulary. These tables map
//! every native token to the shared [`Network`] model and back. Both
//! directions are pure, total functions over the closed backend domain.

use crate::types::{Backend, Network};

/// Normalize a backend-native network token into the shared model.
///
/// Backends occasionally return vendor-specific strings outside the
/// expected set; those map to `Mainnet` by policy rather than failing.
pub fn to_shared(backend: Backend, native: &str) -> Network {
    match backend {
        Backend::Unisat => match native {
            "livenet" => Network::Mainnet,
            "testnet" => Network::Testnet,
            "regtest" => Network::Regtest,
            _ => Network::Mainnet,
        },
        Backend::Xverse => match native {
            "Mainnet" => Network::Mainnet,
            "Testnet" => Network::Testnet,
            "Regtest" => Network::Regtest,
            _ => Network::Mainnet,
        },
        Backend::Oyl | Backend::Leather => match native {
            "mainnet" => Network::Mainnet,
            "testnet" => Network::Testnet,
            "regtest" => Network::Regtest,
            _ => Network::Mainnet,
        },
    }
}

/// Render the shared model in a backend's native vocabulary.
pub fn to_native(backend: Backend, network: Network) -> &'static str {
    match backend {
        Backend::Unisat => match network {
            Network::Mainnet => "livenet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        },
        Backend::Xverse => match network {
            Network::Mainnet => "Mainnet",
            Network::Testnet => "Testnet",
            Network::Regtest => "Regtest",
        },
        Backend::Oyl | Backend::Leather => network.as_str(),
    }
}
