//! Shelf CLI
//!
//! Operates an inventory replica stored in a local SQLite file and, when a
//! remote endpoint is configured, keeps it in sync with the remote copy.
//!
//! # Usage
//!
//! ```bash
//! # Work offline
//! shelf item add A1 "Widget" --stock 12 --price 4.5
//! shelf scan 8001234567890 --kind OUT
//!
//! # Sync with a remote endpoint
//! shelf --endpoint https://example.com/exec --key secret sync
//!
//! # Keep pulling until Ctrl-C
//! shelf --config /etc/shelf/shelf.toml watch
//! ```

mod config;
mod output;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Parser, Subcommand};
use colored::*;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use shelf_core::{ItemDraft, TieBreak, TxKind, LOW_STOCK_THRESHOLD};
use shelf_storage::SqliteStore;
use shelf_sync::{Replica, SyncOutcome, SyncStatus};

use crate::config::{FileConfig, Overrides, Settings};

/// Shelf - offline-first inventory replica
#[derive(Parser, Debug)]
#[command(name = "shelf")]
#[command(author, version, about = "Shelf CLI - offline-first inventory replica")]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "SHELF_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite file holding the local replica
    #[arg(long, env = "SHELF_DB")]
    db: Option<PathBuf>,

    /// Remote save/load endpoint (omit to work offline)
    #[arg(short, long, env = "SHELF_ENDPOINT")]
    endpoint: Option<String>,

    /// Shared secret sent to the remote
    #[arg(short, long, env = "SHELF_KEY")]
    key: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "SHELF_TIMEOUT")]
    timeout: Option<u64>,

    /// Side that keeps equal-stamp conflicts (remote, local)
    #[arg(long, env = "SHELF_TIE_BREAK")]
    tie_break: Option<TieBreak>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SHELF_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage items
    #[command(subcommand)]
    Item(ItemCommand),

    /// Manage barcode aliases
    #[command(subcommand)]
    Barcode(BarcodeCommand),

    /// Manage stock movements
    #[command(subcommand)]
    Tx(TxCommand),

    /// Record a movement for a scanned barcode or sku
    Scan {
        code: String,
        #[arg(long, default_value = "IN")]
        kind: TxKind,
        #[arg(long, default_value_t = 1.0)]
        qty: f64,
        #[arg(long, default_value_t = 0.0)]
        price: f64,
    },

    /// Set the company name
    Company { name: String },

    /// Set the logo from an image file, or clear it
    Logo {
        #[arg(required_unless_present = "clear")]
        file: Option<PathBuf>,
        #[arg(long, conflicts_with = "file")]
        clear: bool,
    },

    /// Fetch the remote copy and merge it
    Pull,

    /// Send the local replica to the remote
    Push,

    /// Push, then pull
    Sync,

    /// Show the replica and sync state
    Status,

    /// Pull periodically until Ctrl-C
    Watch {
        /// Pull period in seconds (default: [sync].pull_interval_secs)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// List items at or below a stock threshold
    LowStock {
        #[arg(long, default_value_t = LOW_STOCK_THRESHOLD)]
        threshold: f64,
    },
}

#[derive(Subcommand, Debug)]
enum ItemCommand {
    /// Create or update an item
    Add {
        sku: String,
        name: String,
        #[arg(long, default_value = "")]
        position: String,
        #[arg(long, default_value_t = 0.0)]
        stock: f64,
        #[arg(long, default_value_t = 0.0)]
        cost: f64,
        #[arg(long, default_value_t = 0.0)]
        price: f64,
    },
    /// List items with their current stock
    List,
}

#[derive(Subcommand, Debug)]
enum BarcodeCommand {
    /// Point a barcode at a sku
    Assign { code: String, sku: String },
}

#[derive(Subcommand, Debug)]
enum TxCommand {
    /// Record a movement (IN, OUT, BREAKAGE)
    Add {
        sku: String,
        kind: TxKind,
        qty: f64,
        #[arg(long, default_value_t = 0.0)]
        price: f64,
    },
    /// Confirm a pending sale, optionally correcting its price
    Confirm {
        id: String,
        #[arg(long)]
        price: Option<f64>,
    },
    /// List movements
    List {
        /// Only unconfirmed sales
        #[arg(long)]
        pending: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let overrides = Overrides {
        db: args.db,
        endpoint: args.endpoint,
        key: args.key,
        timeout_secs: args.timeout,
        tie_break: args.tie_break,
        log_level: args.log_level,
    };
    let settings = Settings::resolve(overrides, file)?;

    init_logging(&settings.log_level);

    let online = settings.sync.is_online();
    let sync_config = settings.sync.clone().with_auto_push(online);
    let gateway = sync_config
        .gateway()
        .context("Failed to build the remote gateway")?;
    let store = Arc::new(
        SqliteStore::new(&settings.db)
            .with_context(|| format!("Failed to open replica {}", settings.db.display()))?,
    );
    let replica = Replica::open(store, gateway, sync_config)
        .await
        .context("Failed to open replica")?;
    info!(db = %settings.db.display(), online, "Shelf ready");

    run(&replica, args.command, &settings).await?;

    if online {
        if let Some(outcome) = replica.flush().await {
            if !outcome.is_completed() {
                output::print_outcome("push", &outcome);
                warn!("Local edits are saved and will be pushed on the next sync");
            }
        }
    }

    Ok(())
}

async fn run(replica: &Replica, command: Command, settings: &Settings) -> Result<()> {
    let online = settings.sync.is_online();

    match command {
        Command::Item(ItemCommand::Add {
            sku,
            name,
            position,
            stock,
            cost,
            price,
        }) => {
            let draft = ItemDraft::new(sku, name)
                .position(position)
                .stock_init(stock)
                .prices(cost, price);
            let item = replica.upsert_item(draft).await?;
            output::print_item(&item);
        }
        Command::Item(ItemCommand::List) => {
            replica.read(output::print_items).await;
        }
        Command::Barcode(BarcodeCommand::Assign { code, sku }) => {
            let item = replica.assign_barcode(&code, &sku).await?;
            output::print_item(&item);
        }
        Command::Tx(TxCommand::Add {
            sku,
            kind,
            qty,
            price,
        }) => {
            let tx = replica.record_transaction(&sku, kind, qty, price).await?;
            output::print_transaction(&tx);
        }
        Command::Tx(TxCommand::Confirm { id, price }) => {
            let tx = replica.confirm_transaction(&id, price).await?;
            output::print_transaction(&tx);
        }
        Command::Tx(TxCommand::List { pending }) => {
            replica
                .read(|s| output::print_transactions(&s.transactions, pending))
                .await;
        }
        Command::Scan {
            code,
            kind,
            qty,
            price,
        } => {
            let tx = replica.record_scan(&code, kind, qty, price).await?;
            output::print_transaction(&tx);
        }
        Command::Company { name } => {
            replica.set_company_name(&name).await?;
            println!("{}", "+OK".green());
        }
        Command::Logo { file, clear } => {
            let logo = match file {
                Some(path) if !clear => Some(logo_data_url(&path)?),
                _ => None,
            };
            replica.set_logo(logo).await?;
            println!("{}", "+OK".green());
        }
        Command::Pull => {
            require_online(online)?;
            output::print_outcome("pull", &replica.pull_now().await);
        }
        Command::Push => {
            require_online(online)?;
            output::print_outcome("push", &replica.push_now().await);
        }
        Command::Sync => {
            require_online(online)?;
            let report = replica.sync_now().await;
            output::print_outcome("push", &report.push);
            output::print_outcome("pull", &report.pull);
        }
        Command::Status => {
            let snapshot = replica.snapshot().await;
            output::print_status(&snapshot, &replica.status(), &replica.stats(), online);
        }
        Command::Watch { interval } => {
            require_online(online)?;
            let period = interval
                .map(Duration::from_secs)
                .unwrap_or(settings.pull_interval);
            watch(replica, period).await?;
        }
        Command::LowStock { threshold } => {
            let rows = replica.low_stock(threshold).await;
            output::print_low_stock(&rows, threshold);
        }
    }

    Ok(())
}

async fn watch(replica: &Replica, period: Duration) -> Result<()> {
    println!(
        "{}",
        format!(
            "Pulling every {}s, press Ctrl-C to stop",
            period.as_secs_f64()
        )
        .cyan()
    );

    let mut updates = replica.subscribe();
    output::print_outcome("pull", &replica.pull_now().await);
    replica.start_periodic_pull(period);

    let mut last = updates.borrow_and_update().clone();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = updates.borrow_and_update().clone();
                if settled_change(&last, &status) {
                    report_change(replica, &status).await;
                }
                last = status;
            }
            result = &mut shutdown => {
                result.context("Failed to listen for Ctrl-C")?;
                println!();
                break;
            }
        }
    }

    replica.stop_periodic_pull();
    Ok(())
}

/// Whether a status update finished an operation
fn settled_change(before: &SyncStatus, after: &SyncStatus) -> bool {
    !after.syncing
        && (before.last_pull != after.last_pull
            || before.last_push != after.last_push
            || before.last_error != after.last_error)
}

async fn report_change(replica: &Replica, status: &SyncStatus) {
    match &status.last_error {
        Some(failure) => output::print_outcome("sync", &SyncOutcome::Failed(failure.clone())),
        None => {
            let (version, items, transactions) = replica
                .read(|s| (s.version, s.items.len(), s.transactions.len()))
                .await;
            println!(
                "{} version {} ({} items, {} transactions)",
                "+OK".green(),
                version,
                items,
                transactions
            );
        }
    }
}

fn require_online(online: bool) -> Result<()> {
    if !online {
        bail!("No remote endpoint configured; pass --endpoint or set [remote].endpoint");
    }
    Ok(())
}

/// Read an image file into a `data:` URL
fn logo_data_url(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read logo {}", path.display()))?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_() != mime_guess::mime::IMAGE {
        warn!(mime = %mime, "Logo file does not look like an image");
    }
    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
}

fn init_logging(level: &str) {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_scan_defaults() {
        let args = Args::try_parse_from(["shelf", "scan", "800123"]).unwrap();
        match args.command {
            Command::Scan {
                code,
                kind,
                qty,
                price,
            } => {
                assert_eq!(code, "800123");
                assert_eq!(kind, TxKind::In);
                assert_eq!(qty, 1.0);
                assert_eq!(price, 0.0);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parses_legacy_kind() {
        let args = Args::try_parse_from(["shelf", "tx", "add", "A1", "rottura", "2"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Tx(TxCommand::Add {
                kind: TxKind::Breakage,
                ..
            })
        ));
        assert!(Args::try_parse_from(["shelf", "tx", "add", "A1", "LOAN", "2"]).is_err());
    }

    #[test]
    fn test_logo_requires_file_or_clear() {
        assert!(Args::try_parse_from(["shelf", "logo"]).is_err());
        assert!(Args::try_parse_from(["shelf", "logo", "--clear"]).is_ok());
        assert!(Args::try_parse_from(["shelf", "logo", "a.png", "--clear"]).is_err());
    }

    #[test]
    fn test_logo_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let url = logo_data_url(&path).unwrap();
        assert_eq!(url, "data:image/png;base64,iVBORw==");
        assert!(logo_data_url(&dir.path().join("missing.png")).is_err());
    }

    #[test]
    fn test_settled_change() {
        let idle = SyncStatus::default();
        let busy = SyncStatus {
            syncing: true,
            ..Default::default()
        };
        let pulled = SyncStatus {
            last_pull: Some(10),
            ..Default::default()
        };
        assert!(!settled_change(&idle, &busy));
        assert!(settled_change(&busy, &pulled));
        assert!(!settled_change(&pulled, &pulled));
    }
}
