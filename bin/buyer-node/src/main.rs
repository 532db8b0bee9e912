//! Buyer node binary: a thin wrapper around the buyer-side trade engine
//! that drives one [`buyer_activity::BuyActivity::perform_buy`] to
//! completion for a work file given on the command line, printing the path
//! of the resulting plaintext result file. This is scaffolding to exercise
//! the engine end to end, not a new product surface — there is no GUI and
//! no persisted trade history.

mod cli;
mod logging;

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use eyre::{eyre, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use buyer_activity::{BuyActivity, BuyContext, Clearance, ClearanceGate, RemoteTarget, Scheduler, TransmissionToken};
use buyer_assist::AssistiveTicketRegistry;
use buyer_cafs::CafsStore;
use buyer_identity::{LocalSigner, Signer};
use buyer_primitives::{Fingerprint, WorkFile};

use cli::{BuyArgs, Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.logs)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building the tokio runtime")?;

    let result = runtime.block_on(run(cli));
    if let Err(error) = &result {
        error!(%error, "buy failed");
    }
    result
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Buy(args) => run_buy(args).await,
    }
}

async fn run_buy(args: BuyArgs) -> Result<()> {
    let store = CafsStore::open(&args.store.dir)
        .with_context(|| format!("opening content store at {}", args.store.dir.display()))?;

    let work_file = store
        .import_file(&args.work)
        .with_context(|| format!("importing work file {}", args.work.display()))?;
    info!(key = %work_file.key().to_hex(), size = work_file.size(), "work file imported");

    let identity: Arc<dyn Signer> = match &args.identity.key_hex {
        Some(hex_key) => Arc::new(
            LocalSigner::from_hex(args.identity.identity.clone(), hex_key)
                .context("loading identity signing key")?,
        ),
        None => {
            info!("no identity key given, generating an ephemeral one for this run");
            Arc::new(LocalSigner::generate(
                args.identity.identity.clone(),
                &mut rand::thread_rng(),
            ))
        }
    };

    let http = reqwest::Client::builder()
        .build()
        .context("building the HTTP client")?;

    let ctx = BuyContext {
        identity: identity.clone(),
        cafs: Arc::new(store),
        registry: AssistiveTicketRegistry::new(),
        scheduler: Arc::new(UnlimitedScheduler),
        max_chunks: args.transfer.max_chunks,
    };

    let remote = RemoteTarget {
        http,
        coordinator_base: args.coordinator.base_url.clone(),
        tx_id: args.coordinator.tx_id.clone(),
        poll_config: args.coordinator.poll_config(),
    };

    let buyer_secret = Fingerprint::random(&mut rand::thread_rng());
    let activity = BuyActivity::new(work_file, buyer_secret);

    let interrupt = CancellationToken::new();
    let interrupt_for_signal = interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, aborting buy");
            interrupt_for_signal.cancel();
        }
    });

    let result = activity
        .perform_buy(Arc::new(AlwaysRemote), remote, ctx, interrupt)
        .await
        .map_err(|e| eyre!("{e}"))
        .context("performing buy")?;

    println!(
        "{}",
        args.store.dir.join(result.key().to_hex()).display()
    );
    Ok(())
}

/// A clearance gate for the CLI's single, always-remote buy: the local
/// matching engine is an external collaborator this binary doesn't wire
/// up, so every buy goes straight to the remote protocol.
struct AlwaysRemote;

#[async_trait]
impl ClearanceGate for AlwaysRemote {
    async fn await_clearance(&self, _work: &dyn WorkFile) -> Clearance {
        Clearance::Remote
    }
}

/// A scheduler with no admission limit: this binary drives exactly one buy
/// at a time, so there is nothing to bound concurrency against.
struct UnlimitedScheduler;

#[async_trait]
impl Scheduler for UnlimitedScheduler {
    async fn acquire_transmission_token(&self) -> TransmissionToken {
        TransmissionToken::unlimited()
    }
}
