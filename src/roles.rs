//! Address role resolution
//!
//! A backend handshake returns a list of address entries; exactly one
//! must serve the ordinals/identity role and one the payment role. Both
//! roles may resolve to the same literal address.

use crate::error::{MuxError, MuxResult};
use crate::types::{AddressKind, AddressPurpose, RawAddress, ResolvedRoles};

/// Pick the identity and payment addresses out of a raw handshake list.
///
/// First entry marked taproot/ordinals wins the identity role; first
/// entry marked segwit/payment wins the payment role. A missing role is
/// a fatal connect failure, never a partial success.
pub fn resolve_roles(addresses: &[RawAddress]) -> MuxResult<ResolvedRoles> {
    let identity = addresses.iter().find(|a| {
        a.purpose == Some(AddressPurpose::Ordinals) || a.kind == Some(AddressKind::P2tr)
    });
    let payment = addresses.iter().find(|a| {
        a.purpose == Some(AddressPurpose::Payment) || a.kind == Some(AddressKind::P2wpkh)
    });

    match (identity, payment) {
        (Some(identity), Some(payment)) => Ok(ResolvedRoles {
            identity: identity.clone(),
            payment: payment.clone(),
        }),
        (None, _) => Err(MuxError::RoleResolution(
            "backend returned no ordinals-capable address".into(),
        )),
        (_, None) => Err(MuxError::RoleResolution(
            "backend returned no payment-capable address".into(),
        )),
    }
}
