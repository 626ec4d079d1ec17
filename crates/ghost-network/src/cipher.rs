//! AES-256-GCM session encryption.
//!
//! Every encrypted frame body is `nonce (12 bytes) ‖ ciphertext + tag`
//! under the connection's session key. The key is the 32-byte truncation
//! of the SRP shared master key and is zeroized on drop.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use ghost_core::error::WireError;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// GCM authentication tag length in bytes.
const TAG_LEN: usize = 16;

/// A 32-byte AES-256 session key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; 32]);

impl SessionKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Truncate a shared master key to the AES-256 key size.
    ///
    /// `None` when the master key is shorter than 32 bytes.
    pub fn from_master(master: &[u8]) -> Option<Self> {
        let mut key = [0u8; 32];
        key.copy_from_slice(master.get(..32)?);
        Some(Self(key))
    }

    /// Encrypt `plaintext`, returning `nonce ‖ ciphertext`.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, WireError> {
        let cipher = Aes256Gcm::new_from_slice(&self.0).map_err(|_| WireError::EncryptFailed)?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| WireError::EncryptFailed)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt a `nonce ‖ ciphertext` body produced by [`seal`](Self::seal).
    pub fn open(&self, data: &[u8]) -> Result<Vec<u8>, WireError> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(WireError::DecryptFailed);
        }
        let cipher = Aes256Gcm::new_from_slice(&self.0).map_err(|_| WireError::DecryptFailed)?;
        let nonce = Nonce::from_slice(&data[..NONCE_LEN]);
        cipher
            .decrypt(nonce, &data[NONCE_LEN..])
            .map_err(|_| WireError::DecryptFailed)
    }
}

impl std::fmt::Debug for SessionKey {
    // Key material stays out of logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}
