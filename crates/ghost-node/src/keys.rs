//! Ed25519 key scheme and address codec.
//!
//! An address is base58 of `version_byte ‖ 32-byte public key`; signatures
//! travel base64-encoded. Implements the [`SignatureVerifier`] seam the
//! validator consumes.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use ed25519_dalek::{Signer, Verifier};
use thiserror::Error;

use ghost_core::traits::SignatureVerifier;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("address is not base58")] NotBase58,
    #[error("address has the wrong length")] BadLength,
    #[error("address version {got:#04x} does not match {expected:#04x}")] WrongVersion { got: u8, expected: u8 },
    #[error("invalid public key bytes")] InvalidPublicKey,
}

/// Encode a public key as a version-prefixed base58 address.
pub fn address_from_pubkey(version: u8, pubkey: &[u8; 32]) -> String {
    let mut payload = Vec::with_capacity(33);
    payload.push(version);
    payload.extend_from_slice(pubkey);
    bs58::encode(payload).into_string()
}

/// Decode and version-check an address back to its public key bytes.
pub fn pubkey_from_address(version: u8, addr: &str) -> Result<[u8; 32], KeyError> {
    let payload = bs58::decode(addr)
        .into_vec()
        .map_err(|_| KeyError::NotBase58)?;
    if payload.len() != 33 {
        return Err(KeyError::BadLength);
    }
    if payload[0] != version {
        return Err(KeyError::WrongVersion {
            got: payload[0],
            expected: version,
        });
    }
    let mut pubkey = [0u8; 32];
    pubkey.copy_from_slice(&payload[1..]);
    Ok(pubkey)
}

/// An Ed25519 keypair bound to an address version.
pub struct KeyPair {
    signing_key: ed25519_dalek::SigningKey,
    version: u8,
}

impl KeyPair {
    /// Generate a random keypair with the OS RNG.
    pub fn generate(version: u8) -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
            version,
        }
    }

    /// Reconstruct a keypair from 32-byte secret material.
    pub fn from_secret_bytes(version: u8, bytes: [u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&bytes),
            version,
        }
    }

    /// The address this keypair signs for.
    pub fn address(&self) -> String {
        address_from_pubkey(self.version, &self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a digest, returning the base64 signature for a `sigs` entry.
    pub fn sign(&self, digest: &[u8; 32]) -> String {
        B64.encode(self.signing_key.sign(digest).to_bytes())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// [`SignatureVerifier`] backed by the address codec: the public key is
/// recovered from the address itself, so no key registry is needed.
pub struct Ed25519Verifier {
    version: u8,
}

impl Ed25519Verifier {
    pub fn new(version: u8) -> Self {
        Self { version }
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, addr: &str, signature: &str, digest: &[u8; 32]) -> bool {
        let Ok(pubkey) = pubkey_from_address(self.version, addr) else {
            return false;
        };
        let Ok(verifying_key) = ed25519_dalek::VerifyingKey::from_bytes(&pubkey) else {
            return false;
        };
        let Ok(sig_bytes) = B64.decode(signature) else {
            return false;
        };
        let Ok(sig_array) = <[u8; 64]>::try_from(sig_bytes.as_slice()) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(&sig_array);
        verifying_key.verify(digest, &sig).is_ok()
    }
}
