//! Widget MVC - interactive host for remote-backed widgets
//!
//! Loads widgets and models from YAML, keeps them in sync with a remote
//! key/value service and lets you drive them from a REPL.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use widget_mvc::api;
use widget_mvc::cli;
use widget_mvc::config::{AppConfig, ConfigWatcher};
use widget_mvc::hub::{Hub, HubHandle, HubNotification, HubSettings};
use widget_mvc::remote::{HttpRemote, MemoryRemote, RemoteService, ResourceStore};
use widget_mvc::render::ConsoleRenderer;

/// Widget MVC - View/Controller/Model state sync against a remote service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Use an in-process remote instead of remote.base_url
    #[arg(long)]
    offline: bool,

    /// Run the development remote service instead of the REPL
    #[arg(long)]
    serve: bool,

    /// Development remote service port
    #[arg(long, default_value_t = api::DEFAULT_PORT)]
    port: u16,

    /// Validate the configuration file and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting Widget MVC v{}...", env!("CARGO_PKG_VERSION"));

    if args.serve {
        return api::serve(ResourceStore::new(), args.port).await;
    }

    if args.check_config {
        let config = AppConfig::load(&args.config).await?;
        println!(
            "{} {} ({} models, {} widgets)",
            "✅".green(),
            args.config,
            config.models.len(),
            config.widgets.len()
        );
        return Ok(());
    }

    info!("Configuration file: {}", args.config);
    let (config_watcher, initial_config) = ConfigWatcher::new(args.config.clone()).await?;
    info!("Configuration loaded successfully with hot-reload enabled");

    let remote: Arc<dyn RemoteService> = if args.offline {
        info!("Offline mode: using in-process remote");
        Arc::new(MemoryRemote::new(ResourceStore::new()))
    } else {
        info!("Remote service: {}", initial_config.remote.base_url);
        Arc::new(
            HttpRemote::new(initial_config.remote.base_url.clone(), initial_config.request_timeout())
                .context("Failed to create HTTP client")?,
        )
    };

    let hub = Hub::from_config(&initial_config, remote, |_| Box::new(ConsoleRenderer::new()))
        .context("Failed to build widgets from configuration")?;
    let notifications = hub.subscribe();
    let handle = hub.spawn();
    tokio::spawn(log_notifications(notifications));

    run_app(handle, config_watcher).await?;

    info!("Widget MVC shutdown complete");
    Ok(())
}

async fn run_app(hub: HubHandle, mut config_watcher: ConfigWatcher) -> Result<()> {
    let repl = cli::run_repl(hub.clone());
    tokio::pin!(repl);

    loop {
        tokio::select! {
            result = &mut repl => {
                if let Err(e) = result {
                    warn!("REPL stopped: {:#}", e);
                }
                break;
            }

            Some(reload) = config_watcher.next_config() => {
                info!("📝 Configuration file changed, applying model endpoints and timeouts");
                hub.update_settings(HubSettings::for_reload(config_watcher.running(), &reload.config));
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    hub.shutdown();
    Ok(())
}

/// Print hub notifications that are not already visible through rendering
async fn log_notifications(mut rx: tokio::sync::broadcast::Receiver<HubNotification>) {
    loop {
        match rx.recv().await {
            Ok(HubNotification::ModelFailure { widget, error, message }) => {
                println!("  {} {} {}: {}", "✗".red(), widget.bright_white(), error.red(), message);
            }
            Ok(HubNotification::RawData { widget, data }) => {
                println!("  {} {} {}", "◆".magenta(), widget.bright_white(), data);
            }
            Ok(HubNotification::EditDropped { widget }) => {
                debug!(widget = %widget, "Edit dropped");
            }
            Ok(HubNotification::Confirmed { widget, forced, .. }) => {
                debug!(widget = %widget, forced, "State confirmed");
            }
            Err(RecvError::Lagged(n)) => warn!("Notification listener lagged by {} messages", n),
            Err(RecvError::Closed) => break,
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}
