//! SmartShop point of sale - clerk console.
//!
//! # Architecture
//!
//! - One controller owns the catalog, cart, and invoices
//! - Firestore subscriptions feed the controller through an event channel
//! - When Firestore is missing or failing, everything runs from the local
//!   cache and is written back to it
//!
//! # Usage
//!
//! ```bash
//! # Connect to the configured Firestore project
//! smartshop
//!
//! # Ignore Firestore and run from the local cache
//! smartshop --offline --cache-dir /var/lib/smartshop
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use sentry::integrations::tracing as sentry_tracing;
use smartshop_storefront::cache::{FileBackend, LocalCache};
use smartshop_storefront::config::StorefrontConfig;
use smartshop_storefront::console::{self, Command, Flow};
use smartshop_storefront::controller::Controller;
use smartshop_storefront::health::RemediationLinks;
use smartshop_storefront::remote::FirestoreRemote;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "smartshop")]
#[command(author, version, about = "SmartShop point-of-sale console")]
struct Cli {
    /// Directory for the offline cache (overrides `SMARTSHOP_CACHE_DIR`)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Run from the local cache only, even if Firestore is configured
    #[arg(long)]
    offline: bool,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    // Load configuration from environment (needed for Sentry init)
    let mut config = StorefrontConfig::from_env().expect("Failed to load configuration");
    if let Some(dir) = cli.cache_dir {
        config.cache_dir = dir;
    }
    if cli.offline {
        config.remote = None;
    }

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "smartshop_storefront=info,smartshop::speech=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cache = LocalCache::new(FileBackend::new(&config.cache_dir));
    let remote = config.remote.as_ref().map(FirestoreRemote::new);
    let mut controller = Controller::new(remote, cache).with_bank(config.bank.clone());
    if let Some(remote_config) = &config.remote {
        controller = controller.with_links(RemediationLinks::from(remote_config));
    }
    controller.start();
    tracing::info!(
        cache_dir = %config.cache_dir.display(),
        health = %controller.health(),
        "smartshop started"
    );

    let mut stdout = std::io::stdout();
    writeln!(stdout, "{}", console::HELP)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(event) = controller.next_event() => {
                controller.handle_event(event);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(command) => {
                        if console::execute(&mut controller, command, &mut stdout).await? == Flow::Quit {
                            break;
                        }
                    }
                    Err(e) => writeln!(stdout, "{e}")?,
                }
                stdout.flush()?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    controller.shutdown();
    Ok(())
}
