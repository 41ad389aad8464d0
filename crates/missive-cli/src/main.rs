//! Missive CLI
//!
//! Thin wrapper around missive-core for command-line usage, running against
//! the local redb-backed store so the whole protocol works offline.
//!
//! ## Usage
//!
//! ```bash
//! # Create (or show) the local identity
//! missive identity new
//! missive identity show
//!
//! # Send a message
//! missive send 0xabc...def "hello there"
//!
//! # Send an encrypted message (32-byte key, hex)
//! missive send 0xabc...def "secret" --key <hex key>
//!
//! # Show conversations with one or more counterparties
//! missive inbox 0xabc...def 0x123...456
//!
//! # Full history with one counterparty, oldest first
//! missive history 0xabc...def
//!
//! # Publish an empty profile, orphaning all history
//! missive clear --yes
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use missive_core::{sort_messages, Address, KeypairSigner, LinkSigner, LocalStore, Messenger};

/// Missive - decentralized messaging over content-addressed storage
#[derive(Parser)]
#[command(name = "missive")]
#[command(version = "0.1.0")]
#[command(about = "Missive - decentralized messaging over content-addressed storage")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Data directory (default: ~/.missive/data)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Identity management
    Identity {
        #[command(subcommand)]
        command: IdentityCommands,
    },

    /// Send a message to a recipient
    Send {
        /// Recipient address (0x...)
        recipient: String,
        /// Message text
        text: String,
        /// Encrypt the body with this 32-byte hex key
        #[arg(long)]
        key: Option<String>,
    },

    /// Show conversations with the given counterparties
    Inbox {
        /// Counterparty addresses (0x...)
        counterparties: Vec<String>,
        /// Decrypt bodies with this 32-byte hex key
        #[arg(long)]
        key: Option<String>,
    },

    /// Show the full history with one counterparty, oldest first
    History {
        /// Counterparty address (0x...)
        counterparty: String,
        /// Decrypt bodies with this 32-byte hex key
        #[arg(long)]
        key: Option<String>,
    },

    /// Publish an empty profile, orphaning all message history
    Clear {
        /// Confirm the operation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum IdentityCommands {
    /// Generate a new identity key (fails if one exists)
    New,
    /// Show the current identity address
    Show,
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".missive")
        .join("data")
}

fn identity_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("identity.key")
}

fn load_identity(data_dir: &std::path::Path) -> Result<KeypairSigner> {
    let path = identity_path(data_dir);
    let hex_key = std::fs::read_to_string(&path)
        .with_context(|| format!("no identity at {} (run `missive identity new`)", path.display()))?;
    let bytes = hex::decode(hex_key.trim()).context("identity file is not valid hex")?;
    let secret: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow!("identity key must be 32 bytes"))?;
    Ok(KeypairSigner::from_secret_bytes(secret)?)
}

fn create_identity(data_dir: &std::path::Path) -> Result<KeypairSigner> {
    let path = identity_path(data_dir);
    if path.exists() {
        return Err(anyhow!("identity already exists at {}", path.display()));
    }
    std::fs::create_dir_all(data_dir)?;

    let signer = KeypairSigner::generate();
    std::fs::write(&path, hex::encode(signer.secret_bytes()))?;
    Ok(signer)
}

fn parse_address(s: &str) -> Result<Address> {
    s.parse::<Address>()
        .map_err(|e| anyhow!("invalid address {:?}: {}", s, e))
}

fn parse_key(hex_key: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(hex_key.trim_start_matches("0x"))
        .context("encryption key is not valid hex")?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow!("encryption key must be 32 bytes"))
}

fn open_messenger(data_dir: &std::path::Path, key: Option<&str>) -> Result<Messenger> {
    let signer = load_identity(data_dir)?;
    let store = Arc::new(LocalStore::open(data_dir.join("missive.redb"))?);

    let mut messenger = Messenger::new(store.clone(), store, Arc::new(signer));
    if let Some(hex_key) = key {
        messenger = messenger.with_encryption_key(&parse_key(hex_key)?);
    }
    Ok(messenger)
}

fn format_time(unix_secs: i64) -> String {
    chrono::DateTime::from_timestamp(unix_secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| unix_secs.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);

    match cli.command {
        Commands::Identity { command } => match command {
            IdentityCommands::New => {
                let signer = create_identity(&data_dir)?;
                println!("Created identity {}", signer.address());
                println!("Key stored at {}", identity_path(&data_dir).display());
            }
            IdentityCommands::Show => {
                let signer = load_identity(&data_dir)?;
                println!("Identity: {}", signer.address());
            }
        },

        Commands::Send {
            recipient,
            text,
            key,
        } => {
            let recipient = parse_address(&recipient)?;
            let messenger = open_messenger(&data_dir, key.as_deref())?;

            let link = messenger
                .send_message(&recipient, &text, key.is_some())
                .await?;
            println!(
                "Sent {} to {} (cid {})",
                link.name, recipient, link.cid
            );
        }

        Commands::Inbox {
            counterparties,
            key,
        } => {
            if counterparties.is_empty() {
                return Err(anyhow!("pass at least one counterparty address"));
            }
            let addresses: Vec<Address> = counterparties
                .iter()
                .map(|s| parse_address(s))
                .collect::<Result<_>>()?;
            let messenger = open_messenger(&data_dir, key.as_deref())?;

            let groups = messenger.conversations(&addresses).await;
            if groups.is_empty() {
                println!("No conversations.");
            }
            for group in groups {
                println!(
                    "{} ({} messages, last at {})",
                    group.counterparty,
                    group.messages.len(),
                    format_time(group.last_message.signed_at())
                );
                let mark = if group.last_message.is_verified { "" } else { " [unverified]" };
                println!("  {}{}", group.last_message.txt, mark);
            }
        }

        Commands::History { counterparty, key } => {
            let counterparty = parse_address(&counterparty)?;
            let messenger = open_messenger(&data_dir, key.as_deref())?;
            let me = messenger.identity();

            let groups = messenger.conversations(&[counterparty]).await;
            let mut messages = groups
                .into_iter()
                .flat_map(|g| g.messages)
                .collect::<Vec<_>>();
            sort_messages(&mut messages);

            if messages.is_empty() {
                println!("No messages with {}.", counterparty);
            }
            for message in messages {
                let who = if message.is_mine(&me) { "me" } else { "them" };
                let mark = if message.is_verified { "" } else { " [unverified]" };
                println!(
                    "[{}] {}: {}{}",
                    format_time(message.signed_at()),
                    who,
                    message.txt,
                    mark
                );
            }
        }

        Commands::Clear { yes } => {
            if !yes {
                return Err(anyhow!(
                    "this orphans all published history; re-run with --yes to confirm"
                ));
            }
            let messenger = open_messenger(&data_dir, None)?;
            let root = messenger.clear_history().await?;
            println!("History cleared; new root {}", root);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_lengths() {
        assert!(parse_key(&"ab".repeat(32)).is_ok());
        assert!(parse_key(&format!("0x{}", "ab".repeat(32))).is_ok());
        assert!(parse_key("abcd").is_err());
        assert!(parse_key("not hex").is_err());
    }

    #[test]
    fn test_identity_create_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let created = create_identity(dir.path()).unwrap();
        let loaded = load_identity(dir.path()).unwrap();
        assert_eq!(created.address(), loaded.address());

        // Second create refuses to overwrite
        assert!(create_identity(dir.path()).is_err());
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "1970-01-01 00:00:00");
    }
}
