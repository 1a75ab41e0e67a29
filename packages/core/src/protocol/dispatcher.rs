//! Protocol Dispatcher
//!
//! Классифицирует входящий конверт по коду и решает, кому его отдать.
//! Конверт, адресованный не нам или пришедший не от закреплённого
//! собеседника, отбрасывается до любой криптографии.

use crate::crypto::keys::{PeerIdentity, PublicKey};
use crate::protocol::envelope::{Content, Envelope, KeyExchange};
use crate::protocol::validation;
use crate::utils::error::{Result, TandemError};

/// Куда направить конверт
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// SessionEstablisher
    KeyExchange(&'a KeyExchange),
    /// SecureChannel
    Content(&'a Content),
}

pub fn dispatch<'a>(
    envelope: &'a Envelope,
    local: &PublicKey,
    peer: Option<&PeerIdentity>,
) -> Result<Route<'a>> {
    if envelope.recipient() != local {
        tracing::debug!(
            target: "protocol::dispatcher",
            recipient = %envelope.recipient().snippet(),
            "Envelope addressed to someone else"
        );
        return Err(TandemError::Misaddressed(envelope.recipient().snippet()));
    }

    match peer {
        None => {
            return Err(TandemError::UnknownSender(envelope.sender().snippet()));
        }
        Some(peer) if !peer.matches(envelope.sender()) => {
            tracing::warn!(
                target: "protocol::dispatcher",
                sender = %envelope.sender().snippet(),
                pinned = %peer.public_key().snippet(),
                "Envelope from a third party, possible intrusion"
            );
            return Err(TandemError::UnknownSender(envelope.sender().snippet()));
        }
        Some(_) => {}
    }

    validation::validate_envelope(envelope)?;

    Ok(match envelope {
        Envelope::KeyExchange(kx) => Route::KeyExchange(kx),
        Envelope::Content(content) => Route::Content(content),
    })
}
