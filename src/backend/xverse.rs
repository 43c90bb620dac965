//! Xverse backend driver
//!
//! Xverse exposes a fire-request/await-callback surface: every call
//! takes `onFinish`/`onCancel` handlers instead of returning a result.
//! The driver converts each call into a single awaited completion and
//! maps the cancel handler to an explicit user-cancellation failure.
//!
//! Signing additionally requires telling the wallet which inputs belong
//! to which address, so the driver classifies input ownership against
//! the session's identity and payment addresses before submitting.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::{request_failed, ConnectOutcome, SigningContext, WalletBackend};
use crate::completion::{completion, Completion, CompletionError};
use crate::error::{MuxError, MuxResult};
use crate::network::to_native;
use crate::psbt;
use crate::roles::resolve_roles;
use crate::types::{
    AddressPurpose, Backend, Balance, InputOwnership, Network, RawAddress, SignOutcome,
    SignRequest,
};

/// Payload of an address handshake request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRequest {
    pub purposes: Vec<AddressPurpose>,
    pub message: String,
    /// Network in Xverse's native vocabulary.
    pub network: String,
}

/// Completion payload of an address handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressResponse {
    pub addresses: Vec<RawAddress>,
}

/// Payload of a signing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XverseSignRequest {
    pub network: String,
    pub message: String,
    pub psbt_base64: String,
    pub broadcast: bool,
    pub inputs_to_sign: Vec<InputOwnership>,
}

/// Completion payload of a signing request. A populated `txid` means the
/// wallet already broadcast; the base64 field is then absent or stale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XverseSignResponse {
    pub psbt_base64: Option<String>,
    pub txid: Option<String>,
}

/// Raw transport for the injected Xverse provider. Requests are fired;
/// results arrive through the completion handle.
pub trait XverseApi: Send + Sync {
    fn request_address(&self, request: AddressRequest, done: Completion<AddressResponse>);
    fn request_sign(&self, request: XverseSignRequest, done: Completion<XverseSignResponse>);
}

pub struct XverseBackend {
    api: Arc<dyn XverseApi>,
    // Network of the last successful handshake; later account requests
    // must stay on it.
    active_network: Mutex<Network>,
}

impl XverseBackend {
    pub fn new(api: Arc<dyn XverseApi>) -> Self {
        Self {
            api,
            active_network: Mutex::new(Network::Mainnet),
        }
    }

    fn map_completion_error(&self, err: CompletionError) -> MuxError {
        match err {
            CompletionError::Cancelled => MuxError::UserCancelled,
            CompletionError::Abandoned => request_failed(
                Backend::Xverse,
                anyhow::anyhow!("backend dropped the request without resolving it"),
            ),
        }
    }

    async fn handshake(&self, network: Network) -> MuxResult<AddressResponse> {
        let (done, fut) = completion();
        self.api.request_address(
            AddressRequest {
                purposes: vec![AddressPurpose::Ordinals, AddressPurpose::Payment],
                message: "Address for receiving Ordinals and payments".into(),
                network: to_native(Backend::Xverse, network).into(),
            },
            done,
        );
        fut.wait().await.map_err(|e| self.map_completion_error(e))
    }
}

#[async_trait]
impl WalletBackend for XverseBackend {
    fn id(&self) -> Backend {
        Backend::Xverse
    }

    async fn connect(&self, network: Network) -> MuxResult<ConnectOutcome> {
        let response = self.handshake(network).await?;
        *self.active_network.lock().unwrap() = network;
        let roles = resolve_roles(&response.addresses)?;
        let accounts = response
            .addresses
            .iter()
            .map(|a| a.address.clone())
            .collect();

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
        let network = *self.active_network.lock().unwrap();
        let response = self.handshake(network).await?;
        Ok(response
            .addresses
            .iter()
            .map(|a| a.address.clone())
            .collect())
    }

    async fn sign_psbt(
        &self,
        request: &SignRequest,
        ctx: &SigningContext,
    ) -> MuxResult<SignOutcome> {
        let parsed = psbt::parse_psbt(&request.raw)?;
        let inputs_to_sign =
            psbt::classify_inputs(&parsed, &ctx.identity, &ctx.payment, ctx.network)?;
        if inputs_to_sign.is_empty() {
            return Err(MuxError::InsufficientInputData(
                "no input is owned by a session address".into(),
            ));
        }
        let (_, psbt_base64) = psbt::encode_pair(&parsed);

        let (done, fut) = completion();
        self.api.request_sign(
            XverseSignRequest {
                network: to_native(Backend::Xverse, ctx.network).into(),
                message: "Sign Transaction".into(),
                psbt_base64,
                broadcast: request.broadcast,
                inputs_to_sign,
            },
            done,
        );
        let response = fut.wait().await.map_err(|e| self.map_completion_error(e))?;

        // A reported txid always wins: the wallet broadcast the
        // transaction, so any byte encoding in hand predates it.
        if let Some(txid) = response.txid.filter(|t| !t.is_empty()) {
            return Ok(SignOutcome::Broadcast {
                txid,
                hex: None,
                base64: None,
            });
        }
        let signed_base64 = response.psbt_base64.ok_or_else(|| {
            request_failed(
                Backend::Xverse,
                anyhow::anyhow!("completion payload carried neither txid nor psbt"),
            )
        })?;
        let signed = psbt::parse_psbt(&signed_base64)?;
        let (hex, base64) = psbt::encode_pair(&signed);
        Ok(SignOutcome::Signed { hex, base64 })
    }
}
