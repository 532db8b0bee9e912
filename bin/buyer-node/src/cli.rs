//! CLI argument assembly: a thin `clap` layer mirroring the reference
//! codebase's `cli.rs`/args split (small `#[derive(Args)]` structs
//! flattened into a top-level [`Cli`]).

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

/// Drive one buy through the buyer-side trade engine.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Logging configuration.
    #[command(flatten)]
    pub logs: LogArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Perform one buy end to end: establish with the coordinator, transfer
    /// the work, receive and decrypt the result, print its path.
    Buy(BuyArgs),
}

/// Arguments for the `buy` command.
#[derive(Debug, Args)]
pub struct BuyArgs {
    /// Path to the work file to sell on this buy.
    #[arg(long, value_name = "PATH")]
    pub work: PathBuf,

    /// Coordinator configuration.
    #[command(flatten)]
    pub coordinator: CoordinatorArgs,

    /// Identity / signing configuration.
    #[command(flatten)]
    pub identity: IdentityArgs,

    /// Content-addressable store configuration.
    #[command(flatten)]
    pub store: StoreArgs,

    /// Transfer tuning.
    #[command(flatten)]
    pub transfer: TransferArgs,
}

/// Where the coordinator lives and which transaction this buy joins.
#[derive(Debug, Args)]
#[command(next_help_heading = "Coordinator")]
pub struct CoordinatorArgs {
    /// Base URL of the coordinator the buyer talks to (e.g.
    /// `https://bitwrk-coordinator.example`).
    #[arg(long = "coordinator.url", env = "BUYER_COORDINATOR_URL", value_name = "URL")]
    pub base_url: String,

    /// Coordinator-assigned transaction id this buy joins. In production
    /// this is handed to the buy activity by an upstream scheduler that
    /// negotiated the buy; the CLI takes it directly since it drives one
    /// buy in isolation.
    #[arg(long = "coordinator.tx-id", env = "BUYER_TX_ID", value_name = "TXID")]
    pub tx_id: String,

    /// Interval between transaction polls, in milliseconds.
    #[arg(long = "coordinator.poll-interval-ms", default_value_t = 2_000, value_name = "MS")]
    pub poll_interval_ms: u64,

    /// Ceiling the exponential poll backoff is clamped to, in milliseconds.
    #[arg(long = "coordinator.backoff-max-ms", default_value_t = 30_000, value_name = "MS")]
    pub backoff_max_ms: u64,
}

impl CoordinatorArgs {
    pub fn poll_config(&self) -> buyer_txclient::PollConfig {
        buyer_txclient::PollConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
            backoff_max: Duration::from_millis(self.backoff_max_ms),
        }
    }
}

/// Identity / keystore configuration.
#[derive(Debug, Args)]
#[command(next_help_heading = "Identity")]
pub struct IdentityArgs {
    /// Opaque identity string known to the coordinator (e.g. an account
    /// name or public key fingerprint).
    #[arg(long = "identity.name", env = "BUYER_IDENTITY", value_name = "NAME")]
    pub identity: String,

    /// Hex-encoded 32-byte ECDSA private key. If omitted, a fresh signing
    /// key is generated for this run only (fine for smoke-testing against a
    /// coordinator that doesn't persist identities across runs).
    #[arg(long = "identity.key", env = "BUYER_IDENTITY_KEY", value_name = "HEX")]
    pub key_hex: Option<String>,
}

/// Content-addressable store configuration.
#[derive(Debug, Args)]
#[command(next_help_heading = "Store")]
pub struct StoreArgs {
    /// Directory the filesystem-backed CAFS store is rooted at. Created if
    /// missing.
    #[arg(long = "store.dir", env = "BUYER_STORE_DIR", default_value = "./buyer-store", value_name = "PATH")]
    pub dir: PathBuf,
}

/// Work-transfer tuning.
#[derive(Debug, Args)]
#[command(next_help_heading = "Transfer")]
pub struct TransferArgs {
    /// Maximum number of chunks a work file may be split into before the
    /// chunked path refuses it with `WorkTooLarge`.
    #[arg(long = "transfer.max-chunks", default_value_t = 16_384, value_name = "N")]
    pub max_chunks: usize,
}

/// Logging configuration: verbosity/quiet/filter composition.
#[derive(Debug, Args, Clone)]
#[command(next_help_heading = "Logging")]
pub struct LogArgs {
    /// Silence all output except errors.
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose mode (-v, -vv, -vvv, ...).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Additional `tracing` filter directives (e.g.
    /// `buyer_transfer=trace,reqwest=warn`), layered on top of the
    /// verbosity-derived base level.
    #[arg(long = "log.filter", value_name = "DIRECTIVES")]
    pub filter: Option<String>,
}
