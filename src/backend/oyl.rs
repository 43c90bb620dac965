//! Oyl backend driver
//!
//! Simple request/response surface: one account list call, the first
//! account fills both address roles. Signing is a raw pass-through that
//! returns both encodings.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::{request_failed, ConnectOutcome, SigningContext, WalletBackend};
use crate::error::MuxResult;
use crate::psbt;
use crate::types::{Backend, Balance, Inscription, Network, SignOutcome, SignRequest};

/// Signed PSBT pair as the Oyl global returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OylSignedPsbt {
    pub signed_psbt_hex: String,
    pub signed_psbt_base64: String,
}

/// Raw transport for the injected Oyl global.
#[async_trait]
pub trait OylApi: Send + Sync {
    async fn request_accounts(&self) -> anyhow::Result<Vec<String>>;
    async fn get_public_key(&self) -> anyhow::Result<String>;
    async fn get_balance(&self) -> anyhow::Result<Balance>;
    async fn get_inscriptions(&self, offset: u32, limit: u32) -> anyhow::Result<Vec<Inscription>>;
    async fn sign_psbt(&self, psbt_hex: &str) -> anyhow::Result<OylSignedPsbt>;
    async fn push_psbt(&self, psbt_hex: &str) -> anyhow::Result<String>;
}

pub struct OylBackend {
    api: Arc<dyn OylApi>,
}

impl OylBackend {
    pub fn new(api: Arc<dyn OylApi>) -> Self {
        Self { api }
    }

    fn fail(&self, cause: anyhow::Error) -> crate::error::MuxError {
        request_failed(Backend::Oyl, cause)
    }
}

#[async_trait]
impl WalletBackend for OylBackend {
    fn id(&self) -> Backend {
        Backend::Oyl
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

    async fn sign_psbt(
        &self,
        request: &SignRequest,
        _ctx: &SigningContext,
    ) -> MuxResult<SignOutcome> {
        let parsed = psbt::parse_psbt(&request.raw)?;
        let (psbt_hex, _) = psbt::encode_pair(&parsed);

        let signed = self
            .api
            .sign_psbt(&psbt_hex)
            .await
            .map_err(|e| self.fail(e))?;

        // Re-encode canonically instead of trusting the backend's pair
        // to agree with each other.
        let signed_psbt = psbt::parse_psbt(&signed.signed_psbt_hex)?;
        let (hex, base64) = psbt::encode_pair(&signed_psbt);

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
}
