//! Shared-key payload encryption using ChaCha20-Poly1305 AEAD.
//!
//! Every client holding the same passphrase derives the same key, so any of
//! them can open any sealed unit. Relay notices are never sealed and fail
//! authentication, which is how they are told apart from chat lines.
//!
//! Sealed unit layout: `[nonce (12)][ciphertext + tag (16)]`

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305, Nonce,
};
use zeroize::Zeroize;

use chatrelay_protocol::{PayloadTransform, TransformError};

use crate::error::{ClientError, Result};

/// Environment variable holding the shared passphrase
pub const KEY_ENV: &str = "CHATRELAY_KEY";

/// blake3 key-derivation context; changing it breaks compatibility
const KEY_CONTEXT: &str = "chatrelay 2024-06-01 shared chat payload key";

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Symmetric payload transform keyed from a shared passphrase.
pub struct SharedKeyCipher {
    cipher: ChaCha20Poly1305,
}

impl SharedKeyCipher {
    /// Derives the chat key from `passphrase`.
    ///
    /// # Errors
    ///
    /// `ClientError::EmptyKey` if the passphrase is blank.
    pub fn from_passphrase(passphrase: &str) -> Result<Self> {
        if passphrase.trim().is_empty() {
            return Err(ClientError::EmptyKey);
        }

        let mut key = blake3::derive_key(KEY_CONTEXT, passphrase.as_bytes());
        let cipher = ChaCha20Poly1305::new(&key.into());

        // Zeroize sensitive data
        key.zeroize();

        Ok(Self { cipher })
    }
}

impl std::fmt::Debug for SharedKeyCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKeyCipher").finish_non_exhaustive()
    }
}

impl PayloadTransform for SharedKeyCipher {
    fn seal(&self, plaintext: &[u8]) -> std::result::Result<Vec<u8>, TransformError> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| TransformError::Seal(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn open(&self, payload: &[u8]) -> Option<Vec<u8>> {
        if payload.len() < NONCE_LEN + TAG_LEN {
            return None;
        }

        let (nonce, ciphertext) = payload.split_at(NONCE_LEN);
        self.cipher.decrypt(Nonce::from_slice(nonce), ciphertext).ok()
    }
}
