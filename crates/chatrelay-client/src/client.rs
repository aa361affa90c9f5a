//! Relay connection and chat loops.

use std::borrow::Cow;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use chatrelay_protocol::{
    PayloadTransform, Plaintext, ServerFrame, DEFAULT_HOST, DEFAULT_PORT, READ_BUFFER_SIZE,
};

use crate::error::{ClientError, Result};

// ============================================================================
// Configuration
// ============================================================================

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay host
    pub host: String,

    /// Relay port
    pub port: u16,

    /// Size of a single read from the relay
    pub read_buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            read_buffer_size: READ_BUFFER_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ============================================================================
// Chat Client
// ============================================================================

/// A connected chat client.
///
/// The payload transform wraps outgoing chat lines and unwraps incoming
/// units; relay notices that it cannot open are shown as plain text.
///
/// # Example
///
/// ```rust,ignore
/// let client = ChatClient::connect(&ClientConfig::default(), "alice").await?;
/// let stdin = tokio::io::BufReader::new(tokio::io::stdin());
/// client.run(stdin, tokio::io::stdout()).await?;
/// ```
pub struct ChatClient<T = Plaintext> {
    stream: TcpStream,
    nickname: String,
    transform: T,
    read_buffer_size: usize,
    cancel_token: CancellationToken,
}

impl ChatClient<Plaintext> {
    /// Connects without any payload transform.
    pub async fn connect(config: &ClientConfig, nickname: &str) -> Result<Self> {
        Self::connect_with(config, nickname, Plaintext).await
    }
}

impl<T: PayloadTransform> ChatClient<T> {
    /// Connects using `transform` for chat payloads.
    ///
    /// # Errors
    ///
    /// - `ClientError::EmptyNickname` if `nickname` is blank
    /// - `ClientError::TransportRefused` if the relay cannot be reached
    pub async fn connect_with(config: &ClientConfig, nickname: &str, transform: T) -> Result<Self> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(ClientError::EmptyNickname);
        }

        let addr = config.server_addr();
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| ClientError::TransportRefused {
                addr: addr.clone(),
                error: e.to_string(),
            })?;

        info!(addr = %addr, nickname = %nickname, "Connected to relay");

        Ok(Self {
            stream,
            nickname: nickname.to_string(),
            transform,
            read_buffer_size: config.read_buffer_size.max(1),
            cancel_token: CancellationToken::new(),
        })
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Token that stops `run` when cancelled (e.g. on Ctrl+C).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Runs the receive and send loops until either ends.
    ///
    /// `input` supplies chat lines; everything the relay sends is written
    /// to `output`, one line per message unit. The connection is shut down
    /// on return.
    pub async fn run<R, W>(self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (mut reader, writer) = self.stream.into_split();
        let writer = Mutex::new(writer);

        let result = tokio::select! {
            r = receive_loop(
                &mut reader,
                &writer,
                &self.nickname,
                &self.transform,
                &mut output,
                self.read_buffer_size,
            ) => {
                debug!("Relay closed the connection");
                r
            }
            r = send_loop(input, &writer, &self.nickname, &self.transform) => {
                debug!("Input closed");
                r
            }
            _ = self.cancel_token.cancelled() => Ok(()),
        };

        if let Err(e) = writer.lock().await.shutdown().await {
            debug!(error = %e, "Socket shutdown failed");
        }
        info!("Disconnected");
        result
    }
}

/// Prints relay traffic and answers the nickname request.
async fn receive_loop<T, W>(
    reader: &mut OwnedReadHalf,
    writer: &Mutex<OwnedWriteHalf>,
    nickname: &str,
    transform: &T,
    output: &mut W,
    buffer_size: usize,
) -> Result<()>
where
    T: PayloadTransform,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; buffer_size];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }

        match ServerFrame::classify(&buf[..n]) {
            ServerFrame::NickRequest => {
                let mut writer = writer.lock().await;
                writer.write_all(nickname.as_bytes()).await?;
                writer.flush().await?;
            }
            ServerFrame::Payload(unit) => {
                let text = render(transform, unit);
                output.write_all(text.as_bytes()).await?;
                output.write_all(b"\n").await?;
                output.flush().await?;
            }
        }
    }
}

/// Sends each non-empty input line as `<nick>: <text>`.
async fn send_loop<R, T>(
    input: R,
    writer: &Mutex<OwnedWriteHalf>,
    nickname: &str,
    transform: &T,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    T: PayloadTransform,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            continue;
        }

        let payload = transform.seal(format!("{nickname}: {line}").as_bytes())?;
        let mut writer = writer.lock().await;
        writer.write_all(&payload).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Opens a unit through the transform, falling back to plain text for
/// relay notices.
fn render<'a, T: PayloadTransform>(transform: &T, unit: &'a [u8]) -> Cow<'a, str> {
    match transform.open(unit) {
        Some(plain) => Cow::Owned(String::from_utf8_lossy(&plain).into_owned()),
        None => String::from_utf8_lossy(unit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::SharedKeyCipher;
    use chatrelay_protocol::TransformError;

    /// Only opens payloads prefixed with `ENC:`.
    struct Prefixed;

    impl PayloadTransform for Prefixed {
        fn seal(&self, plaintext: &[u8]) -> std::result::Result<Vec<u8>, TransformError> {
            Ok([b"ENC:".as_slice(), plaintext].concat())
        }

        fn open(&self, payload: &[u8]) -> Option<Vec<u8>> {
            payload.strip_prefix(b"ENC:").map(<[u8]>::to_vec)
        }
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.server_addr(), "127.0.0.1:55555");
        assert_eq!(config.read_buffer_size, 4096);
    }

    #[test]
    fn test_render_opens_sealed_payload() {
        assert_eq!(render(&Prefixed, b"ENC:alice: hi"), "alice: hi");
    }

    #[test]
    fn test_render_falls_back_to_plaintext() {
        assert_eq!(render(&Prefixed, b"bob joined the chat."), "bob joined the chat.");
    }

    #[test]
    fn test_render_with_cipher_shows_notices_as_text() {
        let cipher = SharedKeyCipher::from_passphrase("hunter2").unwrap();
        let sealed = cipher.seal(b"alice: hi").unwrap();

        assert_eq!(render(&cipher, &sealed), "alice: hi");
        assert_eq!(render(&cipher, b"bob left the chat."), "bob left the chat.");
    }

    #[test]
    fn test_render_lossy_for_binary() {
        assert_eq!(render(&Plaintext, &[b'a', 0xff]), "a\u{fffd}");
    }

    #[tokio::test]
    async fn test_empty_nickname_rejected_before_connect() {
        let config = ClientConfig {
            port: 1,
            ..Default::default()
        };
        let result = ChatClient::connect(&config, "  ").await;
        assert!(matches!(result, Err(ClientError::EmptyNickname)));
    }
}
