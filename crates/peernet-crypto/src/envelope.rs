//! Authenticated packet envelope (spec §4.A)
//!
//! `PacketDecrypt(bytes, localPrivKey) -> (decoded, senderPublicKey)` in the
//! original source is sign/verify, not confidentiality at rest (spec
//! Non-goals: "does not provide ... content encryption at rest"). The
//! envelope wraps an already wire-encoded packet with the sender's
//! compressed public key and an ECDSA signature over its BLAKE3 digest,
//! named [`seal`]/[`open`] here to avoid implying symmetric encryption that
//! isn't actually performed.
//!
//! Layout: `sender_pubkey(33) | signature(64, compact) | payload(..)`.

use secp256k1::ecdsa::Signature;
use secp256k1::{Message, Secp256k1};

use crate::error::{CryptoError, CryptoResult};
use crate::identity::{Keypair, PublicKey, PUBLIC_KEY_LEN};

const SIGNATURE_LEN: usize = 64;
const HEADER_LEN: usize = PUBLIC_KEY_LEN + SIGNATURE_LEN;

fn digest(payload: &[u8]) -> Message {
    let hash = blake3::hash(payload);
    Message::from_digest(*hash.as_bytes())
}

/// Sign `payload` and prepend the sender's public key and signature.
pub fn seal(local: &Keypair, payload: &[u8]) -> Vec<u8> {
    let secp = Secp256k1::new();
    let msg = digest(payload);
    let sig = secp.sign_ecdsa(&msg, local.secret());

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&local.public().to_compressed());
    out.extend_from_slice(&sig.serialize_compact());
    out.extend_from_slice(payload);
    out
}

/// Verify and strip the envelope, returning the payload and the sender's
/// public key. Fails if the envelope is malformed, the signature doesn't
/// verify, or the sender's key equals `local_public` (spec §4.A).
pub fn open(envelope: &[u8], local_public: &PublicKey) -> CryptoResult<(Vec<u8>, PublicKey)> {
    if envelope.len() < HEADER_LEN {
        return Err(CryptoError::DataTooShort {
            expected: HEADER_LEN,
            actual: envelope.len(),
        });
    }

    let (pubkey_bytes, rest) = envelope.split_at(PUBLIC_KEY_LEN);
    let (sig_bytes, payload) = rest.split_at(SIGNATURE_LEN);

    let sender = PublicKey::from_compressed(pubkey_bytes)?;

    if sender == *local_public {
        return Err(CryptoError::SenderIsSelf);
    }

    let sig = Signature::from_compact(sig_bytes)
        .map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))?;

    let secp = Secp256k1::new();
    let msg = digest(payload);

    secp.verify_ecdsa(&msg, &sig, &sender.0)
        .map_err(|_| CryptoError::SignatureVerificationFailed)?;

    Ok((payload.to_vec(), sender))
}
