//! Leather backend driver
//!
//! Leather speaks JSON-RPC through one `request(method, params)` entry
//! point. The handshake returns typed address entries carrying a script
//! kind tag, which drives role resolution (taproot entry is the
//! identity, segwit entry the payment address).

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::backend::{request_failed, ConnectOutcome, WalletBackend};
use crate::error::MuxResult;
use crate::roles::resolve_roles;
use crate::types::{AddressKind, Backend, Balance, Network, RawAddress};

/// Raw transport for the injected Leather provider: a single JSON-RPC
/// call surface. The returned value is the RPC `result` member.
#[async_trait]
pub trait LeatherApi: Send + Sync {
    async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value>;
}

#[derive(Debug, Deserialize)]
struct AddressesResult {
    addresses: Vec<LeatherAddress>,
}

#[derive(Debug, Deserialize)]
struct LeatherAddress {
    address: String,
    #[serde(default, rename = "publicKey")]
    public_key: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignMessageResult {
    signature: String,
}

#[derive(Debug, Deserialize)]
struct SendTransferResult {
    txid: String,
}

pub struct LeatherBackend {
    api: Arc<dyn LeatherApi>,
}

impl LeatherBackend {
    pub fn new(api: Arc<dyn LeatherApi>) -> Self {
        Self { api }
    }

    fn fail(&self, cause: anyhow::Error) -> crate::error::MuxError {
        request_failed(Backend::Leather, cause)
    }

    async fn get_addresses(&self) -> MuxResult<Vec<RawAddress>> {
        let value = self
            .api
            .request("getAddresses", json!({}))
            .await
            .map_err(|e| self.fail(e))?;
        let result: AddressesResult =
            serde_json::from_value(value).map_err(|e| self.fail(e.into()))?;
        Ok(result
            .addresses
            .into_iter()
            .map(|entry| RawAddress {
                address: entry.address,
                public_key: entry.public_key,
                kind: entry
                    .kind
                    .as_deref()
                    .and_then(|k| AddressKind::from_str(k).ok()),
                purpose: None,
            })
            .collect())
    }
}

#[async_trait]
impl WalletBackend for LeatherBackend {
    fn id(&self) -> Backend {
        Backend::Leather
    }

    async fn connect(&self, network: Network) -> MuxResult<ConnectOutcome> {
        let addresses = self.get_addresses().await?;
        let roles = resolve_roles(&addresses)?;
        let accounts = addresses.iter().map(|a| a.address.clone()).collect();

        Ok(ConnectOutcome {
            accounts,
            identity_address: roles.identity.address,
            payment_address: roles.payment.address,
            identity_public_key: roles.identity.public_key,
            payment_public_key: roles.payment.public_key,
            // No balance primitive; the session starts at zero.
            balance: Balance::default(),
            network,
        })
    }

    async fn request_accounts(&self) -> MuxResult<Vec<String>> {
        let addresses = self.get_addresses().await?;
        Ok(addresses.into_iter().map(|a| a.address).collect())
    }

    async fn sign_message(&self, message: &str) -> MuxResult<String> {
        // The message is paired with the taproot identity address; the
        // pairing is Leather's choice, not the caller's.
        let value = self
            .api
            .request(
                "signMessage",
                json!({ "message": message, "paymentType": "p2tr" }),
            )
            .await
            .map_err(|e| self.fail(e))?;
        let result: SignMessageResult =
            serde_json::from_value(value).map_err(|e| self.fail(e.into()))?;
        Ok(result.signature)
    }

    async fn send_bitcoin(&self, to: &str, sats: u64) -> MuxResult<String> {
        let value = self
            .api
            .request(
                "sendTransfer",
                json!({ "address": to, "amount": sats.to_string() }),
            )
            .await
            .map_err(|e| self.fail(e))?;
        let result: SendTransferResult =
            serde_json::from_value(value).map_err(|e| self.fail(e.into()))?;
        Ok(result.txid)
    }
}
