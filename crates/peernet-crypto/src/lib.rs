//! # Peernet Crypto
//!
//! Cryptographic primitives for the Peernet core (spec §4.A).
//!
//! Provides secp256k1 keypair generation, deterministic NodeID derivation
//! from a compressed public key, message signing/verification, and the
//! authenticated packet envelope every inbound/outbound packet passes
//! through.
//!
//! ## Key Types
//!
//! - [`Keypair`]: A peer's secp256k1 identity.
//! - [`PublicKey`]: Byte-exact, compressed public key wrapper.
//!
//! ## Example
//!
//! ```
//! use peernet_crypto::{envelope, Keypair};
//!
//! let alice = Keypair::generate();
//! let bob = Keypair::generate();
//!
//! let sealed = envelope::seal(&alice, b"hello");
//! let (payload, sender) = envelope::open(&sealed, &bob.public()).unwrap();
//! assert_eq!(payload, b"hello");
//! assert_eq!(sender, alice.public());
//! ```

pub mod envelope;
pub mod error;
pub mod identity;

pub use error::{CryptoError, CryptoResult};
pub use identity::{Keypair, PublicKey};
