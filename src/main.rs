//! MERCURY: Aptos NFT marketplace sniper.
//!
//! Entry point. Parses the command line, initialises structured logging,
//! loads config and persisted settings, connects the wallet to the node,
//! and runs the poll → submit → confirm loop until Ctrl-C.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use mercury::chain::node::NodeClient;
use mercury::chain::ChainClient;
use mercury::config::AppConfig;
use mercury::engine::pipeline::TransactionPipeline;
use mercury::engine::poller::ListingPoller;
use mercury::engine::reporter;
use mercury::engine::sequencer::SubmissionWorker;
use mercury::marketplaces;
use mercury::storage::{self, Settings, SettingsError};
use mercury::types::{Marketplace, Octas, PriceError};
use mercury::wallet::{AccountState, Wallet};

const BANNER: &str = r#"
 __  __ _____ ____   ____ _   _ ______   __
|  \/  | ____|  _ \ / ___| | | |  _ \ \ / /
| |\/| |  _| | |_) | |   | | | | |_) \ V /
| |  | | |___|  _ <| |___| |_| |  _ < | |
|_|  |_|_____|_| \_\\____|\___/|_| \_\|_|

  Aptos NFT sniper for Topaz and BlueMove
"#;

#[derive(Parser, Debug)]
#[command(name = "mercury", version, about = "Aptos NFT marketplace sniper")]
struct Cli {
    /// Runtime tuning file.
    #[arg(long, global = true, default_value = "config.toml")]
    config: String,

    /// Persisted settings (node URL, wallet seed, Discord hook, last collections).
    #[arg(long, global = true, default_value = storage::DEFAULT_SETTINGS_FILE)]
    settings: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch a collection and buy every listing at or under the price ceiling.
    Snipe(SnipeArgs),
    /// Update persisted settings.
    Settings {
        #[command(subcommand)]
        target: SettingsCommand,
    },
    /// Print wallet address, balance and sequence number.
    Account,
}

#[derive(Args, Debug)]
struct SnipeArgs {
    #[arg(value_enum)]
    marketplace: Marketplace,

    /// Price ceiling in APT, inclusive (e.g. 0.5).
    #[arg(long, value_parser = parse_price)]
    max_price: Octas,

    /// Collection slug. Resolved and remembered; omit to reuse the last one.
    #[arg(long)]
    collection: Option<String>,
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    /// Discord notification settings.
    Discord {
        #[arg(long)]
        hook: Option<String>,
        #[arg(long)]
        send_fail: Option<bool>,
    },
}

fn parse_price(input: &str) -> Result<Octas, PriceError> {
    Octas::from_apt_str(input)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    init_logging();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cfg = AppConfig::load_or_default(&cli.config)?;

    match cli.command {
        Command::Snipe(args) => snipe(&cfg, &cli.settings, args).await,
        Command::Settings {
            target: SettingsCommand::Discord { hook, send_fail },
        } => update_discord(&cli.settings, hook, send_fail),
        Command::Account => show_account(&cfg, &cli.settings).await,
    }
}

/// Node reachability, wallet derivation, then balance and sequence number.
async fn connect(cfg: &AppConfig, settings: &Settings) -> Result<(Arc<NodeClient>, AccountState)> {
    let node = Arc::new(NodeClient::new(&settings.node_url, cfg.request_timeout())?);
    node.ping()
        .await
        .with_context(|| format!("Aptos node {} is not reachable", settings.node_url))?;

    let wallet = Wallet::from_seed_hex(&settings.private_key()).context("Invalid aptos_private_key")?;
    let account = AccountState::load(wallet, node.as_ref())
        .await
        .context("Failed to load account from node")?;

    Ok((node, account))
}

async fn snipe(cfg: &AppConfig, settings_path: &str, args: SnipeArgs) -> Result<()> {
    let mut settings = storage::load_settings(Some(settings_path))?;
    settings.validate()?;

    let (node, account) = connect(cfg, &settings).await?;

    println!("{BANNER}");
    info!(
        address = %account.wallet.address(),
        balance = %account.balance,
        sequence_number = account.sequence_number(),
        "MERCURY starting up"
    );

    let adapter = marketplaces::adapter_for(args.marketplace, &cfg.marketplaces, cfg.request_timeout())?;

    let collection = match &args.collection {
        Some(slug) => {
            let info = adapter
                .resolve_collection(slug)
                .await
                .with_context(|| format!("Failed to resolve collection {slug}"))?;
            settings.remember_collection(args.marketplace, info.clone());
            storage::save_settings(&settings, Some(settings_path))?;
            info!(name = %info.name, id = %info.id, creator = %info.creator, "Collection resolved");
            info
        }
        None => settings
            .last_collection(args.marketplace)
            .cloned()
            .with_context(|| {
                format!(
                    "No {} collection stored yet; pass --collection <slug>",
                    args.marketplace
                )
            })?,
    };

    let chain: Arc<dyn ChainClient> = node;
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let reporter = tokio::spawn(reporter::run(events_rx));

    let (submitter, worker) = SubmissionWorker::spawn(
        account,
        Arc::clone(&chain),
        cfg.gas_schedule(),
        cfg.chain.submission_queue,
    );
    let pipeline = Arc::new(TransactionPipeline::new(
        submitter,
        chain,
        events_tx.clone(),
        cfg.confirmation_delay(),
    ));
    let poller = ListingPoller::new(
        adapter,
        collection,
        args.max_price,
        pipeline,
        events_tx,
        cfg.poll_timing(),
        cfg.sniper.dedup_capacity,
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received."),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C, stopping"),
        }
        let _ = stop_tx.send(true);
    });

    info!("Entering poll loop. Press Ctrl+C to stop.");
    let poller = poller.run(stop_rx).await;
    drop(poller);

    // In-flight attempts hold the last submission handles and event senders.
    info!("Waiting for in-flight purchases to finish");
    let account = worker.await.context("Submission worker panicked")?;
    reporter.await.context("Reporter panicked")?;

    info!(
        sequence_number = account.sequence_number(),
        "MERCURY shut down cleanly."
    );
    Ok(())
}

async fn show_account(cfg: &AppConfig, settings_path: &str) -> Result<()> {
    let settings = storage::load_settings(Some(settings_path))?;
    let (node, account) = connect(cfg, &settings).await?;

    println!("node             {}", node.base_url());
    println!("address          {}", account.wallet.address());
    println!("public key       {}", account.wallet.public_key());
    println!("balance          {}", account.balance);
    println!("sequence number  {}", account.sequence_number());
    Ok(())
}

fn update_discord(settings_path: &str, hook: Option<String>, send_fail: Option<bool>) -> Result<()> {
    let mut settings = match storage::load_settings(Some(settings_path)) {
        Ok(s) => s,
        // First run: the template was just written, fill it in.
        Err(e) if matches!(e.downcast_ref::<SettingsError>(), Some(SettingsError::Created(_))) => {
            Settings::template()
        }
        Err(e) => return Err(e),
    };

    if let Some(hook) = hook {
        settings.discord.hook = hook;
    }
    if let Some(send_fail) = send_fail {
        settings.discord.send_fail = send_fail;
    }
    storage::save_settings(&settings, Some(settings_path))?;

    println!(
        "Discord hook {}, send_fail = {}",
        if settings.discord.hook.is_empty() { "not set" } else { "set" },
        settings.discord.send_fail
    );
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mercury=info"));

    let json_logging = std::env::var("MERCURY_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
