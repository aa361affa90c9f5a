//! chatrelay - interactive chat client
//!
//! # Usage
//!
//! ```bash
//! # Prompt for a nickname, connect to 127.0.0.1:55555
//! chatrelay
//!
//! chatrelay --host chat.example.org --port 6000 --nick alice
//!
//! # End-to-end encrypt chat lines; peers need the same passphrase
//! CHATRELAY_KEY='correct horse' chatrelay --nick alice
//! ```

use std::env;
use std::process;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use chatrelay_client::{ChatClient, ClientConfig, ClientError, SharedKeyCipher, KEY_ENV};
use chatrelay_protocol::{PayloadTransform, Plaintext, DEFAULT_HOST, DEFAULT_PORT};

/// chatrelay client
#[derive(Parser, Debug)]
#[command(name = "chatrelay", version, about)]
struct Args {
    /// Server address
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Nickname (prompted for when omitted)
    #[arg(short, long)]
    nick: Option<String>,

    /// Shared passphrase for end-to-end encryption (falls back to CHATRELAY_KEY)
    #[arg(short, long)]
    key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr and stay quiet unless asked for
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let mut input = BufReader::new(tokio::io::stdin());

    let nickname = match args.nick {
        Some(nick) => nick,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(b"Nickname: ").await?;
            stdout.flush().await?;

            let mut line = String::new();
            input.read_line(&mut line).await?;
            line
        }
    };

    let config = ClientConfig {
        host: args.host,
        port: args.port,
        ..Default::default()
    };

    match args.key.or_else(|| env::var(KEY_ENV).ok()) {
        Some(passphrase) => match SharedKeyCipher::from_passphrase(&passphrase) {
            Ok(cipher) => chat(&config, &nickname, cipher, input).await,
            Err(e) => {
                eprintln!("[!] {e}.");
                process::exit(1);
            }
        },
        None => chat(&config, &nickname, Plaintext, input).await,
    }
}

/// Connects with `transform` and runs the session on stdin/stdout.
async fn chat<T, R>(config: &ClientConfig, nickname: &str, transform: T, input: R) -> Result<()>
where
    T: PayloadTransform,
    R: AsyncBufRead + Unpin,
{
    let client = match ChatClient::connect_with(config, nickname, transform).await {
        Ok(client) => client,
        Err(ClientError::EmptyNickname) => {
            eprintln!("[!] Nickname cannot be empty.");
            process::exit(1);
        }
        Err(e @ ClientError::TransportRefused { .. }) => {
            eprintln!("[!] {e}. Make sure chatrelayd is running.");
            process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    println!("[*] Connected to {} as {}", config.server_addr(), client.nickname());

    let token = client.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C");
            token.cancel();
        }
    });

    client.run(input, tokio::io::stdout()).await?;
    Ok(())
}
