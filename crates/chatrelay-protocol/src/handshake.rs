//! Nickname handshake parsing.

use thiserror::Error;

/// Why a nickname reply was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("nickname is empty")]
    Empty,

    #[error("nickname is not valid UTF-8")]
    InvalidUtf8,
}

/// Decodes a nickname reply: UTF-8, surrounding whitespace trimmed,
/// non-empty.
pub fn parse_nickname(reply: &[u8]) -> Result<String, HandshakeError> {
    let text = std::str::from_utf8(reply).map_err(|_| HandshakeError::InvalidUtf8)?;
    let name = text.trim();
    if name.is_empty() {
        return Err(HandshakeError::Empty);
    }
    Ok(name.to_string())
}
