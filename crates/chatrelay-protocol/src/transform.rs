//! Client-side payload transform seam.
//!
//! The relay never looks inside user payloads. Clients may wrap outgoing
//! bytes (for example with a symmetric cipher) and unwrap incoming ones;
//! the relay behaves identically for plaintext and ciphertext.

use thiserror::Error;

/// Failure to wrap an outgoing payload.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Failed to seal payload: {0}")]
    Seal(String),
}

/// Wraps and unwraps message-unit payloads on the client side.
pub trait PayloadTransform: Send + Sync {
    /// Transforms outgoing plaintext into the bytes put on the wire.
    ///
    /// An error means nothing may be sent; callers never fall back to the
    /// plaintext.
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, TransformError>;

    /// Recovers plaintext from an incoming unit.
    ///
    /// Returns `None` when the unit was not produced by `seal`, which is
    /// how relay notices (always plaintext) are told apart.
    fn open(&self, payload: &[u8]) -> Option<Vec<u8>>;
}

/// Identity transform.
#[derive(Debug, Clone, Copy, Default)]
pub struct Plaintext;

impl PayloadTransform for Plaintext {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, TransformError> {
        Ok(plaintext.to_vec())
    }

    fn open(&self, payload: &[u8]) -> Option<Vec<u8>> {
        Some(payload.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plaintext_is_identity() {
        let bytes = [0u8, 159, 146, 150, b'x'];
        assert_eq!(Plaintext.seal(&bytes).unwrap(), bytes.to_vec());
        assert_eq!(Plaintext.open(&bytes), Some(bytes.to_vec()));
    }
}
