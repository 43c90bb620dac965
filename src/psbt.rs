//! PSBT handling for the signing adapter
//!
//! Parses signing requests (hex or base64), produces the two canonical
//! output encodings, and classifies which transaction inputs belong to
//! which session address for backends that require explicit ownership
//! hints.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, Psbt, Script};

use crate::error::{MuxError, MuxResult};
use crate::types::{InputOwnership, Network};

/// Decode a PSBT supplied in either hex or base64.
pub fn parse_psbt(raw: &str) -> MuxResult<Psbt> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MuxError::Psbt("empty transaction payload".into()));
    }
    let bytes = if looks_like_hex(trimmed) {
        hex::decode(trimmed)?
    } else {
        BASE64.decode(trimmed)?
    };
    Ok(Psbt::deserialize(&bytes)?)
}

/// The two canonical encodings of a PSBT: `(hex, base64)`.
pub fn encode_pair(psbt: &Psbt) -> (String, String) {
    let bytes = psbt.serialize();
    (hex::encode(&bytes), BASE64.encode(&bytes))
}

/// Parse an address string and pin it to the active network.
///
/// A session address that does not decode under the active network means
/// the session and the operation disagree about which network is live.
pub fn checked_address(address: &str, network: Network) -> MuxResult<Address> {
    address
        .parse::<Address<NetworkUnchecked>>()
        .ok()
        .and_then(|a| a.require_network(network.to_bitcoin()).ok())
        .ok_or_else(|| MuxError::NetworkMismatch {
            expected: network,
            address: address.to_string(),
        })
}

/// Group the PSBT's input indices by owning session address.
///
/// Each input's funding script is decoded to an address under the active
/// network and matched against the payment and identity addresses.
/// Inputs matching neither stay unclassified and appear in no group; the
/// backend is trusted to reject or ignore them. Indices within a group
/// are ascending. Fails only when not a single input carries resolvable
/// ownership information.
pub fn classify_inputs(
    psbt: &Psbt,
    identity: &Address,
    payment: &Address,
    network: Network,
) -> MuxResult<Vec<InputOwnership>> {
    let mut identity_indices = Vec::new();
    let mut payment_indices = Vec::new();
    let mut resolvable = 0usize;

    for (index, input) in psbt.inputs.iter().enumerate() {
        let script = funding_script(psbt, index, input);
        let Some(script) = script else { continue };
        let Ok(owner) = Address::from_script(script, network.to_bitcoin()) else {
            continue;
        };
        resolvable += 1;
        // Payment checked first: when one address fills both roles the
        // input lands in the payment group, not in both.
        if owner == *payment {
            payment_indices.push(index);
        } else if owner == *identity {
            identity_indices.push(index);
        }
    }

    if resolvable == 0 {
        return Err(MuxError::InsufficientInputData(
            "no input carries a resolvable funding script".into(),
        ));
    }

    let mut groups = Vec::new();
    if !identity_indices.is_empty() {
        groups.push(InputOwnership {
            address: identity.to_string(),
            indices: identity_indices,
        });
    }
    if !payment_indices.is_empty() {
        groups.push(InputOwnership {
            address: payment.to_string(),
            indices: payment_indices,
        });
    }
    Ok(groups)
}

fn funding_script<'a>(
    psbt: &'a Psbt,
    index: usize,
    input: &'a bitcoin::psbt::Input,
) -> Option<&'a Script> {
    if let Some(utxo) = &input.witness_utxo {
        return Some(utxo.script_pubkey.as_script());
    }
    let prev_tx = input.non_witness_utxo.as_ref()?;
    let vout = psbt.unsigned_tx.input.get(index)?.previous_output.vout as usize;
    prev_tx
        .output
        .get(vout)
        .map(|o| o.script_pubkey.as_script())
}

fn looks_like_hex(s: &str) -> bool {
    s.len() % 2 == 0 && s.bytes().all(|b| b.is_ascii_hexdigit())
}
