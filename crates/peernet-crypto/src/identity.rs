//! Keypair and NodeID derivation (spec §3, §4.A)

use std::fmt;

use secp256k1::{rand, Secp256k1, SecretKey};

use peernet_core::identity::{NodeId, NODE_ID_LEN};

use crate::error::{CryptoError, CryptoResult};

/// Byte length of a compressed secp256k1 public key.
pub const PUBLIC_KEY_LEN: usize = 33;

/// Byte-exact compressed public key. Identity equality is defined by these
/// bytes (spec §4.A).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(pub(crate) secp256k1::PublicKey);

impl PublicKey {
    pub fn from_compressed(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != PUBLIC_KEY_LEN {
            return Err(CryptoError::DataTooShort {
                expected: PUBLIC_KEY_LEN,
                actual: bytes.len(),
            });
        }
        secp256k1::PublicKey::from_slice(bytes)
            .map(PublicKey)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    pub fn to_compressed(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.0.serialize()
    }

    /// Derive the NodeID: BLAKE3-256 of the compressed public key bytes
    /// (spec §3: "hash of compressed key").
    pub fn node_id(&self) -> NodeId {
        let hash = blake3::hash(&self.to_compressed());
        let mut bytes = [0u8; NODE_ID_LEN];
        bytes.copy_from_slice(hash.as_bytes());
        NodeId::from_bytes(bytes)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(&self.to_compressed()[..4]))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_compressed()))
    }
}

/// A peer's secp256k1 identity: secret key plus the derived public key.
#[derive(Clone)]
pub struct Keypair {
    secret: SecretKey,
    public: PublicKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let mut rng = rand::thread_rng();
        let (secret, public) = secp.generate_keypair(&mut rng);
        Keypair {
            secret,
            public: PublicKey(public),
        }
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let secret =
            SecretKey::from_slice(bytes).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let secp = Secp256k1::new();
        let public = PublicKey(secp256k1::PublicKey::from_secret_key(&secp, &secret));
        Ok(Keypair { secret, public })
    }

    pub fn public(&self) -> PublicKey {
        self.public
    }

    pub fn node_id(&self) -> NodeId {
        self.public.node_id()
    }

    /// Raw 32-byte secret scalar, for persisting the identity to disk.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.secret_bytes()
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_is_deterministic() {
        let kp = Keypair::generate();
        assert_eq!(kp.node_id(), kp.public().node_id());
    }

    #[test]
    fn different_keys_different_node_ids() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        assert_ne!(a.node_id(), b.node_id());
    }

    #[test]
    fn compressed_roundtrip() {
        let kp = Keypair::generate();
        let bytes = kp.public().to_compressed();
        let restored = PublicKey::from_compressed(&bytes).unwrap();
        assert_eq!(kp.public(), restored);
    }

    #[test]
    fn rejects_wrong_length() {
        let err = PublicKey::from_compressed(&[0u8; 10]);
        assert!(err.is_err());
    }

    #[test]
    fn secret_bytes_roundtrip_through_from_secret_bytes() {
        let kp = Keypair::generate();
        let restored = Keypair::from_secret_bytes(&kp.secret_bytes()).unwrap();
        assert_eq!(kp.node_id(), restored.node_id());
    }
}
