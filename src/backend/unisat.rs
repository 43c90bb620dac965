//! Unisat backend driver
//!
//! The widest native surface of the four: network query and switch,
//! balance, message signing, send, and change notifications. Returns a
//! single account that fills both address roles.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::backend::{request_failed, BackendEvent, ConnectOutcome, SigningContext, WalletBackend};
use crate::error::MuxResult;
use crate::network::{to_native, to_shared};
use crate::psbt;
use crate::types::{Backend, Balance, Inscription, Network, SignOutcome, SignRequest};

/// Raw transport for the injected Unisat global.
///
/// Network values cross this boundary in Unisat's own vocabulary
/// (`livenet`/`testnet`/`regtest`); normalization happens in the driver.
#[async_trait]
pub trait UnisatApi: Send + Sync {
    async fn request_accounts(&self) -> anyhow::Result<Vec<String>>;
    async fn get_public_key(&self) -> anyhow::Result<String>;
    async fn get_balance(&self) -> anyhow::Result<Balance>;
    async fn get_network(&self) -> anyhow::Result<String>;
    async fn switch_network(&self, native: &str) -> anyhow::Result<()>;
    async fn send_bitcoin(&self, to: &str, sats: u64) -> anyhow::Result<String>;
    async fn sign_message(&self, message: &str) -> anyhow::Result<String>;
    /// Returns the signed PSBT as hex, finalized when requested.
    async fn sign_psbt(&self, psbt_hex: &str, auto_finalize: bool) -> anyhow::Result<String>;
    async fn push_psbt(&self, psbt_hex: &str) -> anyhow::Result<String>;
    async fn get_inscriptions(&self, offset: u32, limit: u32) -> anyhow::Result<Vec<Inscription>>;

    /// Change-notification stream, if the host wired one up. Called at
    /// most once per connection.
    fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<BackendEvent>> {
        None
    }
}

pub struct UnisatBackend {
    api: Arc<dyn UnisatApi>,
}

impl UnisatBackend {
    pub fn new(api: Arc<dyn UnisatApi>) -> Self {
        Self { api }
    }

    fn fail(&self, cause: anyhow::Error) -> crate::error::MuxError {
        request_failed(Backend::Unisat, cause)
    }
}

#[async_trait]
impl WalletBackend for UnisatBackend {
    fn id(&self) -> Backend {
        Backend::Unisat
    }

    async fn connect(&self, network: Network) -> MuxResult<ConnectOutcome> {
        let accounts = self
            .api
            .request_accounts()
            .await
            .map_err(|e| self.fail(e))?;
        let primary = accounts
            .first()
            .cloned()
            .ok_or_else(|| self.fail(anyhow::anyhow!("backend returned no accounts")))?;

        let public_key = self.api.get_public_key().await.unwrap_or_default();
        let balance = self.api.get_balance().await.unwrap_or_default();
        // The wallet's own network wins over the requested one; unknown
        // vendor tokens normalize to mainnet.
        let network = match self.api.get_network().await {
            Ok(native) => to_shared(Backend::Unisat, &native),
            Err(_) => network,
        };

        Ok(ConnectOutcome {
            accounts,
            identity_address: primary.clone(),
            payment_address: primary,
            identity_public_key: public_key.clone(),
            payment_public_key: public_key,
            balance,
            network,
        })
    }

    async fn request_accounts(&self) -> MuxResult<Vec<String>> {
        self.api.request_accounts().await.map_err(|e| self.fail(e))
    }

    async fn get_network(&self) -> MuxResult<Network> {
        let native = self.api.get_network().await.map_err(|e| self.fail(e))?;
        Ok(to_shared(Backend::Unisat, &native))
    }

    async fn switch_network(&self, network: Network) -> MuxResult<()> {
        self.api
            .switch_network(to_native(Backend::Unisat, network))
            .await
            .map_err(|e| self.fail(e))
    }

    async fn get_public_key(&self) -> MuxResult<String> {
        self.api.get_public_key().await.map_err(|e| self.fail(e))
    }

    async fn get_balance(&self) -> MuxResult<Balance> {
        self.api.get_balance().await.map_err(|e| self.fail(e))
    }

    async fn get_inscriptions(&self, offset: u32, limit: u32) -> MuxResult<Vec<Inscription>> {
        self.api
            .get_inscriptions(offset, limit)
            .await
            .map_err(|e| self.fail(e))
    }

    async fn send_bitcoin(&self, to: &str, sats: u64) -> MuxResult<String> {
        self.api
            .send_bitcoin(to, sats)
            .await
            .map_err(|e| self.fail(e))
    }

    async fn sign_message(&self, message: &str) -> MuxResult<String> {
        self.api.sign_message(message).await.map_err(|e| self.fail(e))
    }

    async fn sign_psbt(
        &self,
        request: &SignRequest,
        _ctx: &SigningContext,
    ) -> MuxResult<SignOutcome> {
        let parsed = psbt::parse_psbt(&request.raw)?;
        let (psbt_hex, _) = psbt::encode_pair(&parsed);

        let signed_hex = self
            .api
            .sign_psbt(&psbt_hex, request.finalize)
            .await
            .map_err(|e| self.fail(e))?;

        let signed = psbt::parse_psbt(&signed_hex)?;
        let (hex, base64) = psbt::encode_pair(&signed);

        if request.broadcast {
            let txid = self.api.push_psbt(&hex).await.map_err(|e| self.fail(e))?;
            return Ok(SignOutcome::Broadcast {
                txid,
                hex: Some(hex),
                base64: Some(base64),
            });
        }
        Ok(SignOutcome::Signed { hex, base64 })
    }

    async fn push_psbt(&self, psbt_hex: &str) -> MuxResult<String> {
        self.api.push_psbt(psbt_hex).await.map_err(|e| self.fail(e))
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<BackendEvent>> {
        self.api.subscribe()
    }
}
