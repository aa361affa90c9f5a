//! Error types for the chatrelay client.

use std::io;
use thiserror::Error;

use chatrelay_protocol::TransformError;

/// Client errors.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The initial connection attempt failed.
    ///
    /// Fatal for this client run; the binary reports it and exits.
    #[error("Server unreachable at {addr}: {error}")]
    TransportRefused {
        /// Address that was dialled
        addr: String,
        /// Underlying error text
        error: String,
    },

    /// The nickname was empty after trimming.
    #[error("Nickname cannot be empty")]
    EmptyNickname,

    /// The shared key passphrase was empty.
    #[error("Encryption key cannot be empty")]
    EmptyKey,

    /// An outgoing line could not be encrypted; nothing was sent.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// I/O error passthrough for a session already in progress.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias using `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_refused_display() {
        let err = ClientError::TransportRefused {
            addr: "127.0.0.1:55555".to_string(),
            error: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Server unreachable at 127.0.0.1:55555: connection refused"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let err: ClientError = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert!(matches!(err, ClientError::Io(_)));
    }

    #[test]
    fn test_transform_error_conversion() {
        let err: ClientError = TransformError::Seal("aead::Error".to_string()).into();
        assert_eq!(err.to_string(), "Failed to seal payload: aead::Error");
    }
}
